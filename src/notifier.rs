use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use reqwest::Client;
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::caseless_key;
use crate::config::NotifierConfig;
use crate::error::Error;
use crate::picarto;
use crate::webhook::WebhookTarget;

/// Nominal liveness poll interval, and the shortened one used after a
/// failed or partially failed cycle.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3 * 60);
pub const POLL_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Nominal configuration refresh interval, and the shortened one used after
/// a failed or invalid fetch.
pub const CONFIG_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const CONFIG_RETRY_INTERVAL: Duration = Duration::from_secs(5 * 60);

const CONFIG_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The orchestrator: owns every webhook target, refreshes configuration
/// periodically, polls the platform's online list, and fans the result out
/// to each target in turn. All state lives here; there are no globals.
pub struct Notifier {
    config_url: String,
    client: Client,
    config: NotifierConfig,
    last_config_fetch: Instant,
    config_interval: Duration,
    webhooks: HashMap<String, WebhookTarget>,
    // creator key -> display name, kept only for diagnostic logging
    tracked_creators: HashMap<String, String>,
}

impl Notifier {
    /// Fetches, validates, and applies the initial configuration. Failure
    /// here is fatal: the caller exits nonzero, since no amount of retrying
    /// fixes an unreachable or invalid initial config.
    pub async fn new(config_url: String) -> Result<Self, Error> {
        let client = Client::builder().build()?;

        let config = fetch_config(&client, &config_url).await?;
        config.validate()?;

        let mut notifier = Self {
            config_url,
            client,
            config: config.clone(),
            last_config_fetch: Instant::now(),
            config_interval: CONFIG_REFRESH_INTERVAL,
            webhooks: HashMap::new(),
            tracked_creators: HashMap::new(),
        };
        notifier.apply_config(config);
        Ok(notifier)
    }

    /// Runs the poll loop until cancelled. Config refresh always completes
    /// before the liveness fan-out of the same tick, and cancellation exits
    /// between deliveries, never mid-delivery.
    pub async fn run(&mut self, token: CancellationToken) {
        info!(
            "Watching {} creator(s) across {} webhook(s)",
            self.tracked_creators.len(),
            self.webhooks.len()
        );
        info!(
            "Polling every {}s (every {}s after errors)",
            POLL_INTERVAL.as_secs(),
            POLL_RETRY_INTERVAL.as_secs()
        );

        loop {
            if token.is_cancelled() {
                info!("Shutdown requested, stopping notifier");
                break;
            }

            if self.last_config_fetch.elapsed() >= self.config_interval {
                self.refresh_config().await;
            }

            let success = self.poll_once().await;

            let interval = if success {
                POLL_INTERVAL
            } else {
                POLL_RETRY_INTERVAL
            };
            select! {
                () = sleep(interval) => {},
                () = token.cancelled() => {
                    info!("Shutdown requested during sleep");
                    break;
                }
            }
        }

        info!("Stream notifier stopped gracefully");
    }

    /// One poll cycle: fetch the online list, normalize it, and hand it to
    /// every webhook target. Returns false on any failure so the caller can
    /// shorten the next interval; state is never corrupted by a failed cycle.
    async fn poll_once(&mut self) -> bool {
        debug!("Checking for online creators...");

        let raw = match picarto::fetch_online(
            &self.client,
            &self.config.user_agent,
            &self.config.email,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to fetch online creators: {e}");
                return false;
            }
        };

        let (online, violations) = picarto::online_map(raw);
        let mut success = violations == 0;

        let now = Instant::now();
        for target in self.webhooks.values_mut() {
            if !target.notify(&self.client, &online, now).await {
                success = false;
            }
        }

        success
    }

    /// Refetches the configuration. An invalid or unfetchable document is
    /// discarded and the prior configuration stays in effect with the
    /// shortened refresh interval. The fetch instant is stamped on failure
    /// too, so retries are paced by the interval rather than every tick.
    async fn refresh_config(&mut self) {
        debug!("Refreshing configuration from '{}'", self.config_url);
        self.last_config_fetch = Instant::now();

        let fetched = match fetch_config(&self.client, &self.config_url).await {
            Ok(config) => match config.validate() {
                Ok(()) => Some(config),
                Err(e) => {
                    error!("Fetched configuration is invalid, keeping the previous one: {e}");
                    None
                }
            },
            Err(e) => {
                error!("Failed to fetch configuration from '{}': {e}", self.config_url);
                None
            }
        };

        match fetched {
            Some(config) => {
                self.apply_config(config);
                self.config_interval = CONFIG_REFRESH_INTERVAL;
            }
            None => self.config_interval = CONFIG_RETRY_INTERVAL,
        }
    }

    /// Merges a validated configuration into live state under caseless
    /// identity: existing webhook targets are updated in place (preserving
    /// their notification history), new ones created, omitted ones dropped.
    fn apply_config(&mut self, config: NotifierConfig) {
        let mut removed: HashSet<String> = self.webhooks.keys().cloned().collect();

        for (cased_name, webhook_config) in &config.webhooks {
            let key = caseless_key(cased_name);
            removed.remove(&key);
            if let Some(existing) = self.webhooks.get_mut(&key) {
                existing.update_config(webhook_config);
            } else {
                info!("Now notifying webhook '{cased_name}'");
                self.webhooks
                    .insert(key, WebhookTarget::new(cased_name, webhook_config));
            }
        }

        for key in removed {
            if let Some(target) = self.webhooks.remove(&key) {
                info!("No longer notifying webhook '{}'", target.name());
            }
        }

        self.tracked_creators.clear();
        for target in self.webhooks.values() {
            for (key, creator) in target.creators() {
                self.tracked_creators
                    .insert(key.clone(), creator.display_name().to_string());
            }
        }
        debug!(
            "Tracking: {}",
            self.tracked_creators
                .values()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.config = config;
    }
}

async fn fetch_config(client: &Client, url: &str) -> Result<NotifierConfig, Error> {
    let body = client
        .get(url)
        .timeout(CONFIG_FETCH_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier_with(config: NotifierConfig) -> Notifier {
        let mut notifier = Notifier {
            config_url: "https://config.example/notifier.json".to_string(),
            client: Client::new(),
            config: config.clone(),
            last_config_fetch: Instant::now(),
            config_interval: CONFIG_REFRESH_INTERVAL,
            webhooks: HashMap::new(),
            tracked_creators: HashMap::new(),
        };
        notifier.apply_config(config);
        notifier
    }

    fn config(json: &str) -> NotifierConfig {
        serde_json::from_str(json).unwrap()
    }

    const TWO_WEBHOOKS: &str = r#"{
        "user_agent": "test/1.0",
        "email": "a@b.c",
        "webhooks": {
            "Art Server": {
                "url": "https://discord.example/a",
                "creators": {"Foo": {"pings": []}}
            },
            "Game Server": {
                "url": "https://discord.example/b",
                "creators": {"Bar": {"pings": []}, "foo": {"pings": []}}
            }
        }
    }"#;

    #[test]
    fn test_apply_config_builds_targets_and_diagnostics() {
        let notifier = notifier_with(config(TWO_WEBHOOKS));

        assert_eq!(notifier.webhooks.len(), 2);
        assert!(notifier.webhooks.contains_key("art server"));
        assert!(notifier.webhooks.contains_key("game server"));

        // "Foo" and "foo" are the same creator across servers.
        assert_eq!(notifier.tracked_creators.len(), 2);
        assert!(notifier.tracked_creators.contains_key("foo"));
        assert!(notifier.tracked_creators.contains_key("bar"));
    }

    #[test]
    fn test_apply_config_removes_dropped_webhooks() {
        let mut notifier = notifier_with(config(TWO_WEBHOOKS));

        notifier.apply_config(config(
            r#"{
                "user_agent": "test/1.0",
                "email": "a@b.c",
                "webhooks": {
                    "ART SERVER": {
                        "url": "https://discord.example/a",
                        "creators": {"Foo": {"pings": []}}
                    }
                }
            }"#,
        ));

        // Case-only rename keeps the target; the other one is gone.
        assert_eq!(notifier.webhooks.len(), 1);
        assert!(notifier.webhooks.contains_key("art server"));
        assert_eq!(notifier.webhooks["art server"].name(), "Art Server");
        assert_eq!(notifier.tracked_creators.len(), 1);
    }

    #[test]
    fn test_apply_config_twice_is_idempotent() {
        let mut notifier = notifier_with(config(TWO_WEBHOOKS));
        let before: HashSet<String> = notifier.webhooks.keys().cloned().collect();

        notifier.apply_config(config(TWO_WEBHOOKS));

        let after: HashSet<String> = notifier.webhooks.keys().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(notifier.tracked_creators.len(), 2);
    }
}
