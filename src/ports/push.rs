//! Push Gateway Port - Template-Message Delivery Interface
//!
//! Defines the two-step exchange with the push-notification API:
//! trade app credentials for a short-lived bearer token, then submit
//! one template message for one recipient.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Short-lived bearer credential returned by the token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Opaque token value (never logged).
    pub token: String,
    /// Lifetime in seconds as reported by the provider.
    pub expires_in: u64,
}

impl AccessToken {
    /// First characters of the token for operator output.
    pub fn masked(&self) -> String {
        let prefix: String = self.token.chars().take(8).collect();
        format!("{prefix}...")
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// One named value in the template body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateValue {
    /// Display string.
    pub value: String,
}

/// Template-message request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateMessage {
    /// Recipient identifier (open id).
    pub touser: String,
    /// Message template identifier.
    pub template_id: String,
    /// Link opened when the recipient taps the message.
    pub url: String,
    /// Named value fields.
    pub data: BTreeMap<String, TemplateValue>,
}

/// Provider response to a send request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendReceipt {
    /// `0` on success, provider error code otherwise.
    #[serde(default)]
    pub errcode: i64,
    /// Provider message.
    #[serde(default)]
    pub errmsg: String,
    /// Message id on success.
    #[serde(default)]
    pub msgid: Option<i64>,
}

/// Remote error codes with a known operator action.
const HINTS: &[(i64, &str)] = &[
    (40001, "invalid credential: check APP_SECRET, or the access token is stale"),
    (40003, "invalid OPEN_ID: the recipient must follow the test account again"),
    (40013, "invalid APP_ID"),
    (40037, "invalid TEMPLATE_ID: check the template id on the test account page"),
    (40125, "invalid APP_SECRET"),
    (40164, "caller IP is not in the API whitelist"),
    (41001, "access token missing from the request"),
    (42001, "access token expired: run again to fetch a fresh one"),
    (43004, "recipient has not followed the account"),
    (47003, "template fields do not match the template definition"),
];

/// Operator hint for a remote error code.
pub fn hint_for(code: i64) -> Option<&'static str> {
    HINTS.iter().find(|(c, _)| *c == code).map(|(_, h)| *h)
}

/// Trait for push-notification providers.
#[async_trait]
pub trait PushGateway: Send + Sync + 'static {
    /// Exchange app id + secret for a bearer token.
    ///
    /// # Errors
    /// `DispatchFailure` when the provider returns an error code,
    /// `SourceUnavailable`/`ParseFailure` on transport problems.
    async fn access_token(
        &self,
        app_id: &str,
        app_secret: &str,
    ) -> Result<AccessToken, ReportError>;

    /// Submit one template message. The receipt is returned verbatim;
    /// interpreting `errcode` is the dispatcher's job.
    async fn send_template(
        &self,
        token: &AccessToken,
        message: &TemplateMessage,
    ) -> Result<SendReceipt, ReportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_hints() {
        assert!(hint_for(40037).unwrap().contains("TEMPLATE_ID"));
        assert!(hint_for(42001).unwrap().contains("expired"));
        assert!(hint_for(99999).is_none());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken {
            token: "ACCESS_TOKEN_VALUE".into(),
            expires_in: 7200,
        };
        assert!(!format!("{token:?}").contains("ACCESS_TOKEN_VALUE"));
        assert_eq!(token.masked(), "ACCESS_T...");
    }
}
