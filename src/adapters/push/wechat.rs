//! WeChat Official Account Gateway - Token Exchange and Template Send
//!
//! Implements `PushGateway` against the `cgi-bin` API:
//! - `GET /cgi-bin/token?grant_type=client_credential&appid=&secret=`
//! - `POST /cgi-bin/message/template/send?access_token=`
//!
//! Both endpoints answer HTTP 200 and report errors in-band through
//! `errcode`/`errmsg`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::ReportError;
use crate::ports::{hint_for, AccessToken, PushGateway, SendReceipt, TemplateMessage};

const NAME: &str = "wechat";

/// Token endpoint response (success or in-band error).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// HTTP gateway to the WeChat API.
pub struct WeChatGateway {
    /// Underlying HTTP client.
    http: Client,
    /// API base URL (e.g. `https://api.weixin.qq.com`).
    base_url: String,
}

impl WeChatGateway {
    /// Create the gateway.
    ///
    /// # Errors
    /// Fails when the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build push HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Request URLs carry the app secret or access token, so neither
/// error mapping keeps the URL.
fn transport(e: reqwest::Error) -> ReportError {
    ReportError::unavailable(NAME, e.without_url().to_string())
}

fn malformed(e: reqwest::Error) -> ReportError {
    ReportError::parse(NAME, e.without_url().to_string())
}

#[async_trait]
impl PushGateway for WeChatGateway {
    #[instrument(skip_all)]
    async fn access_token(
        &self,
        app_id: &str,
        app_secret: &str,
    ) -> Result<AccessToken, ReportError> {
        let url = format!("{}/cgi-bin/token", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", app_id),
                ("secret", app_secret),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::unavailable(NAME, format!("HTTP {status}")));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(malformed)?;

        if body.errcode != 0 {
            return Err(ReportError::DispatchFailure {
                code: body.errcode,
                message: body.errmsg,
                hint: hint_for(body.errcode).map(str::to_string),
            });
        }
        let token = body
            .access_token
            .ok_or_else(|| ReportError::parse(NAME, "token response without access_token"))?;
        debug!(expires_in = body.expires_in, "Token exchange succeeded");
        Ok(AccessToken {
            token,
            expires_in: body.expires_in,
        })
    }

    #[instrument(skip_all, fields(template_id = %message.template_id))]
    async fn send_template(
        &self,
        token: &AccessToken,
        message: &TemplateMessage,
    ) -> Result<SendReceipt, ReportError> {
        let url = format!("{}/cgi-bin/message/template/send", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("access_token", token.token.as_str())])
            .json(message)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::unavailable(NAME, format!("HTTP {status}")));
        }
        response
            .json::<SendReceipt>()
            .await
            .map_err(malformed)
    }
}
