//! Client for the Picarto "who is live" API.

use std::collections::HashMap;
use std::time::Duration;

use log::warn;
use reqwest::Client;
use serde::Deserialize;

use crate::caseless_key;
use crate::error::Error;

pub const ONLINE_ENDPOINT: &str = "https://api.picarto.tv/api/v1/online?adult=true&gaming=true";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One record of the online list. Everything past `name` is optional;
/// missing fields degrade the notification embed, not the delivery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveChannel {
    pub name: String,
    pub title: Option<String>,
    pub viewers: Option<u64>,
    pub avatar: Option<String>,
    pub thumbnails: Option<Thumbnails>,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub gaming: bool,
    pub category: Option<String>,
    pub followers: Option<u64>,
    pub views_total: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    pub web: Option<String>,
    pub web_large: Option<String>,
}

/// Fetches the raw online list. The `User-Agent` and `From` headers identify
/// the operator to the platform, per its API usage policy. A response that
/// is not a JSON array fails the whole poll cycle; per-entry problems are
/// left to [`online_map`].
pub async fn fetch_online(
    client: &Client,
    user_agent: &str,
    email: &str,
) -> Result<Vec<serde_json::Value>, Error> {
    let body = client
        .get(ONLINE_ENDPOINT)
        .header(reqwest::header::USER_AGENT, user_agent)
        .header(reqwest::header::FROM, email)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    Ok(serde_json::from_str(&body)?)
}

/// Normalizes the raw online list into a map keyed by case-folded creator
/// name; the last entry wins if the platform ever emits duplicate
/// case-insensitive names. A malformed entry is skipped with a warning
/// naming its index and does not abort later entries; the returned count
/// lets the caller shorten its next poll interval.
#[must_use]
pub fn online_map(raw: Vec<serde_json::Value>) -> (HashMap<String, LiveChannel>, usize) {
    let mut online = HashMap::new();
    let mut violations = 0;

    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<LiveChannel>(value) {
            Ok(channel) => {
                online.insert(caseless_key(&channel.name), channel);
            }
            Err(e) => {
                violations += 1;
                warn!("Online list entry {index} is malformed, skipping: {e}");
            }
        }
    }

    (online, violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_online_map_keys_are_caseless() {
        let raw = vec![json!({"name": "FooBar", "title": "Hi"})];
        let (online, violations) = online_map(raw);

        assert_eq!(violations, 0);
        let channel = &online["foobar"];
        assert_eq!(channel.name, "FooBar");
        assert_eq!(channel.title.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_online_map_last_duplicate_wins() {
        let raw = vec![
            json!({"name": "Foo", "title": "first"}),
            json!({"name": "FOO", "title": "second"}),
        ];
        let (online, _) = online_map(raw);

        assert_eq!(online.len(), 1);
        assert_eq!(online["foo"].title.as_deref(), Some("second"));
    }

    #[test]
    fn test_online_map_skips_malformed_entries() {
        let raw = vec![
            json!({"title": "no name here"}),
            json!(42),
            json!({"name": "Survivor"}),
        ];
        let (online, violations) = online_map(raw);

        assert_eq!(violations, 2);
        assert_eq!(online.len(), 1);
        assert!(online.contains_key("survivor"));
    }

    #[test]
    fn test_live_channel_decodes_optional_fields() {
        let channel: LiveChannel = serde_json::from_value(json!({
            "name": "Foo",
            "viewers": 12,
            "avatar": "https://example.com/a.png",
            "thumbnails": {"web": "https://example.com/t.png"},
            "adult": true,
            "gaming": false,
            "category": "Illustration",
            "followers": 99,
            "views_total": 1234
        }))
        .unwrap();

        assert!(channel.adult);
        assert!(!channel.gaming);
        assert_eq!(channel.viewers, Some(12));
        assert_eq!(
            channel.thumbnails.unwrap().web.as_deref(),
            Some("https://example.com/t.png")
        );
    }

    #[ignore = "This test hits the live Picarto API"]
    #[tokio::test]
    async fn test_fetch_online_live() {
        let client = Client::new();
        let raw = fetch_online(&client, "picarto-notify test", "test@example.com")
            .await
            .unwrap();
        let (_, violations) = online_map(raw);
        assert_eq!(violations, 0);
    }
}
