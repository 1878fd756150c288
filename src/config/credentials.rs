//! Credentials - Environment-sourced Secrets
//!
//! Secrets are read from the process environment (after `.env` has
//! been loaded by `dotenvy`), trimmed, and never printed in full.

use crate::error::ReportError;

/// Push-notification app id.
pub const ENV_APP_ID: &str = "APP_ID";
/// Push-notification app secret.
pub const ENV_APP_SECRET: &str = "APP_SECRET";
/// Recipient open id.
pub const ENV_OPEN_ID: &str = "OPEN_ID";
/// Template id.
pub const ENV_TEMPLATE_ID: &str = "TEMPLATE_ID";
/// QWeather API key.
pub const ENV_HEFENG_KEY: &str = "HEFENG_KEY";
/// QWeather host override.
pub const ENV_HEFENG_HOST: &str = "HEFENG_HOST";
/// Tushare Pro token (optional).
pub const ENV_TUSHARE_TOKEN: &str = "TUSHARE_TOKEN";

/// Everything the push step needs.
#[derive(Clone, PartialEq, Eq)]
pub struct PushCredentials {
    /// App id.
    pub app_id: String,
    /// App secret.
    pub app_secret: String,
    /// Recipient open id.
    pub open_id: String,
    /// Template id.
    pub template_id: String,
}

impl std::fmt::Debug for PushCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushCredentials")
            .field("app_id", &mask(&self.app_id))
            .field("app_secret", &"<redacted>")
            .field("open_id", &mask(&self.open_id))
            .field("template_id", &mask(&self.template_id))
            .finish()
    }
}

/// All optional secrets, as found in the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    /// App id.
    pub app_id: Option<String>,
    /// App secret.
    pub app_secret: Option<String>,
    /// Recipient open id.
    pub open_id: Option<String>,
    /// Template id.
    pub template_id: Option<String>,
    /// QWeather key.
    pub hefeng_key: Option<String>,
    /// QWeather host override.
    pub hefeng_host: Option<String>,
    /// Tushare token.
    pub tushare_token: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup.
    ///
    /// Values are trimmed; blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            app_id: get(ENV_APP_ID),
            app_secret: get(ENV_APP_SECRET),
            open_id: get(ENV_OPEN_ID),
            template_id: get(ENV_TEMPLATE_ID),
            hefeng_key: get(ENV_HEFENG_KEY),
            hefeng_host: get(ENV_HEFENG_HOST),
            tushare_token: get(ENV_TUSHARE_TOKEN),
        }
    }

    /// Names of required variables that are absent.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            (ENV_APP_ID, &self.app_id),
            (ENV_APP_SECRET, &self.app_secret),
            (ENV_OPEN_ID, &self.open_id),
            (ENV_TEMPLATE_ID, &self.template_id),
            (ENV_HEFENG_KEY, &self.hefeng_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }

    /// Push credentials, or `ConfigMissing` naming what is absent.
    ///
    /// # Errors
    /// `ReportError::ConfigMissing` when any push variable is unset.
    pub fn push(&self) -> Result<PushCredentials, ReportError> {
        match (&self.app_id, &self.app_secret, &self.open_id, &self.template_id) {
            (Some(app_id), Some(app_secret), Some(open_id), Some(template_id)) => {
                Ok(PushCredentials {
                    app_id: app_id.clone(),
                    app_secret: app_secret.clone(),
                    open_id: open_id.clone(),
                    template_id: template_id.clone(),
                })
            }
            _ => {
                let missing: Vec<&str> = self
                    .missing_required()
                    .into_iter()
                    .filter(|name| *name != ENV_HEFENG_KEY)
                    .collect();
                Err(ReportError::ConfigMissing(missing.join(", ")))
            }
        }
    }

    /// `(name, masked value or "unset")` rows for `check-env`.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let show = |v: &Option<String>| v.as_deref().map_or_else(|| "unset".to_string(), mask);
        vec![
            (ENV_APP_ID, show(&self.app_id)),
            (
                ENV_APP_SECRET,
                self.app_secret
                    .as_ref()
                    .map_or_else(|| "unset".to_string(), |_| "<redacted>".to_string()),
            ),
            (ENV_OPEN_ID, show(&self.open_id)),
            (ENV_TEMPLATE_ID, show(&self.template_id)),
            (ENV_HEFENG_KEY, show(&self.hefeng_key)),
            (
                ENV_HEFENG_HOST,
                self.hefeng_host
                    .clone()
                    .unwrap_or_else(|| "unset".to_string()),
            ),
            (ENV_TUSHARE_TOKEN, show(&self.tushare_token)),
        ]
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.summary()).finish()
    }
}

/// First 8 characters followed by `...`.
pub fn mask(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    format!("{prefix}...")
}
