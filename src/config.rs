use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::ping::Snowflake;

/// The remote configuration document, fetched as JSON from the URL given by
/// the `PICARTOSTREAMNOTIFIER_CONFIG_URL` environment variable and
/// re-fetched periodically while running.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    pub user_agent: String,
    pub email: String,
    #[serde(default)]
    pub webhooks: HashMap<String, WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub creators: HashMap<String, CreatorConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatorConfig {
    #[serde(default)]
    pub pings: Vec<PingEntry>,
}

/// One entry of a creator's `pings` list. Unrecognized shapes land in
/// `Other` so they can be skipped with a warning during parsing instead of
/// failing the whole config decode.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PingEntry {
    Role { role: Snowflake },
    User { user: Snowflake },
    Label(String),
    Other(serde_json::Value),
}

impl NotifierConfig {
    /// Structural validation, run eagerly before any state mutation. Every
    /// violation found is collected into a single error so an operator sees
    /// the full list at once; the caller keeps the prior configuration.
    pub fn validate(&self) -> Result<(), Error> {
        let mut problems = Vec::new();

        if self.user_agent.trim().is_empty() {
            problems.push("user_agent must not be empty".to_string());
        }
        if self.email.trim().is_empty() {
            problems.push("email must not be empty".to_string());
        }
        for (name, webhook) in &self.webhooks {
            if let Err(e) = Url::parse(&webhook.url) {
                problems.push(format!(
                    "webhook '{name}' has an invalid URL '{}': {e}",
                    webhook.url
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }
}
