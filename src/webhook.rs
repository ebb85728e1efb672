use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{error, info};
use reqwest::Client;

use crate::caseless_key;
use crate::config::WebhookConfig;
use crate::creator::Creator;
use crate::discord::WebhookPayload;
use crate::error::Error;
use crate::picarto::LiveChannel;

/// Minimum elapsed time between two notifications for the same creator on
/// the same webhook.
pub const NOTIFY_COOLDOWN: Duration = Duration::from_secs(30 * 60);

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// One outbound delivery endpoint with its tracked creators and their
/// per-creator notification history.
pub struct WebhookTarget {
    name: String,
    url: String,
    creators: HashMap<String, Creator>,
    last_notified: HashMap<String, Instant>,
}

impl WebhookTarget {
    #[must_use]
    pub fn new(name: &str, config: &WebhookConfig) -> Self {
        let mut target = Self {
            name: name.to_string(),
            url: config.url.clone(),
            creators: HashMap::new(),
            last_notified: HashMap::new(),
        };
        target.update_config(config);
        target
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creators(&self) -> impl Iterator<Item = (&String, &Creator)> {
        self.creators.iter()
    }

    /// Merges a refreshed configuration into live state. Creators present in
    /// both are updated in place so their notification history survives;
    /// creators the new config omits are purged from the creator map AND the
    /// last-notified map together, so no orphaned timers accumulate.
    pub fn update_config(&mut self, config: &WebhookConfig) {
        self.url = config.url.clone();

        // Removal candidates include keys that only have a timer left, which
        // covers a creator removed while its last-notified entry lingers.
        let mut removed: HashSet<String> = self
            .creators
            .keys()
            .chain(self.last_notified.keys())
            .cloned()
            .collect();

        for (cased_name, creator_config) in &config.creators {
            let key = caseless_key(cased_name);
            removed.remove(&key);
            if let Some(existing) = self.creators.get_mut(&key) {
                existing.apply_config(&self.name, cased_name, creator_config);
            } else {
                info!(
                    "Webhook '{}': now tracking creator '{cased_name}'",
                    self.name
                );
                self.creators
                    .insert(key, Creator::new(&self.name, cased_name, creator_config));
            }
        }

        for key in removed {
            if let Some(creator) = self.creators.remove(&key) {
                info!(
                    "Webhook '{}': no longer tracking creator '{}'",
                    self.name,
                    creator.display_name()
                );
            }
            self.last_notified.remove(&key);
        }
    }

    /// A notification is due when no last-notified record exists or the full
    /// cooldown has elapsed since it.
    fn due(&self, key: &str, now: Instant) -> bool {
        self.last_notified
            .get(key)
            .is_none_or(|last| now.saturating_duration_since(*last) >= NOTIFY_COOLDOWN)
    }

    /// Decides which online creators are due a notification and builds their
    /// payloads. Untracked keys and keys inside the cooldown are skipped.
    /// Separate from delivery so a failed POST leaves the cooldown untouched.
    pub fn due_notifications(
        &mut self,
        online: &HashMap<String, LiveChannel>,
        now: Instant,
    ) -> Vec<(String, WebhookPayload)> {
        let cache_bust = unix_seconds();
        let mut due = Vec::new();

        for (key, live) in online {
            if !self.due(key, now) {
                continue;
            }
            if let Some(creator) = self.creators.get_mut(key) {
                due.push((key.clone(), creator.build_notification(live, cache_bust)));
            }
        }

        due
    }

    pub fn mark_notified(&mut self, key: &str, now: Instant) {
        self.last_notified.insert(key.to_string(), now);
    }

    /// Delivers every due notification in turn. A failed delivery is logged
    /// and leaves that creator's timestamp untouched so the next poll cycle
    /// retries it; remaining creators still get their deliveries. Returns
    /// false if any delivery failed, which the orchestrator uses only to
    /// pick its next poll interval.
    pub async fn notify(
        &mut self,
        client: &Client,
        online: &HashMap<String, LiveChannel>,
        now: Instant,
    ) -> bool {
        let mut all_delivered = true;

        for (key, payload) in self.due_notifications(online, now) {
            let display = self
                .creators
                .get(&key)
                .map_or(key.as_str(), Creator::display_name);

            match deliver(client, &self.url, &payload).await {
                Ok(()) => {
                    info!("Webhook '{}': {display} is now live, notified", self.name);
                    self.mark_notified(&key, now);
                }
                Err(e) => {
                    all_delivered = false;
                    error!(
                        "Webhook '{}': failed to deliver notification for '{display}': {e}",
                        self.name
                    );
                }
            }
        }

        all_delivered
    }
}

async fn deliver(client: &Client, url: &str, payload: &WebhookPayload) -> Result<(), Error> {
    let response = client
        .post(url)
        .timeout(DELIVERY_TIMEOUT)
        .json(payload)
        .send()
        .await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(Error::Delivery(response.status()))
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
