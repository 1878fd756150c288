//! Notification Dispatcher - Report to Template Message
//!
//! Two sequential steps per run: exchange the app credentials for a
//! bearer token, then submit one template message carrying the twelve
//! report fields. A non-zero remote code is surfaced with an operator
//! hint for the codes that have a known cause. No retries.

use std::collections::BTreeMap;

use tracing::{error, info, instrument};

use crate::config::credentials::PushCredentials;
use crate::domain::{Report, ReportField};
use crate::error::ReportError;
use crate::ports::{hint_for, PushGateway, TemplateMessage, TemplateValue};

/// Successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Remote message id, when returned.
    pub msgid: Option<i64>,
}

/// Builds and sends the template message.
pub struct NotificationDispatcher<G: PushGateway> {
    /// Push API.
    gateway: G,
    /// Link opened from the message.
    link_url: String,
}

impl<G: PushGateway> NotificationDispatcher<G> {
    /// Create a dispatcher.
    pub fn new(gateway: G, link_url: impl Into<String>) -> Self {
        Self {
            gateway,
            link_url: link_url.into(),
        }
    }

    /// Template message for `report`.
    pub fn message(&self, report: &Report, credentials: &PushCredentials) -> TemplateMessage {
        let data: BTreeMap<String, TemplateValue> = ReportField::ALL
            .into_iter()
            .map(|field| {
                (
                    field.key().to_string(),
                    TemplateValue {
                        value: report.value(field).to_string(),
                    },
                )
            })
            .collect();

        TemplateMessage {
            touser: credentials.open_id.clone(),
            template_id: credentials.template_id.clone(),
            url: self.link_url.clone(),
            data,
        }
    }

    /// Token exchange then send.
    ///
    /// # Errors
    /// - token exchange failures as returned by the gateway
    /// - `DispatchFailure` with a hint when the send is rejected
    #[instrument(skip_all)]
    pub async fn dispatch(
        &self,
        report: &Report,
        credentials: &PushCredentials,
    ) -> Result<Delivery, ReportError> {
        let token = self
            .gateway
            .access_token(&credentials.app_id, &credentials.app_secret)
            .await?;
        info!(token = %token.masked(), expires_in = token.expires_in, "Access token obtained");

        let message = self.message(report, credentials);
        let receipt = self.gateway.send_template(&token, &message).await?;

        if receipt.errcode == 0 {
            info!(msgid = ?receipt.msgid, "Report delivered");
            return Ok(Delivery {
                msgid: receipt.msgid,
            });
        }

        let hint = hint_for(receipt.errcode).map(str::to_string);
        error!(
            code = receipt.errcode,
            message = %receipt.errmsg,
            hint = hint.as_deref().unwrap_or("none"),
            "Report delivery rejected"
        );
        Err(ReportError::DispatchFailure {
            code: receipt.errcode,
            message: receipt.errmsg,
            hint,
        })
    }
}
