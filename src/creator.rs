use crate::config::CreatorConfig;
use crate::discord::{Embed, EmbedFooter, EmbedImage, WebhookPayload};
use crate::picarto::LiveChannel;
use crate::ping::PingSet;

/// Accent color of notification embeds (Picarto green).
const EMBED_COLOR: u32 = 0x001D_A456;

const FOOTER_SEPARATOR: &str = " | ";

/// One tracked creator under one webhook: its configured mention set plus
/// the display casing last reported by the platform. The case-folded
/// identity key lives in the owning map, never here.
#[derive(Debug)]
pub struct Creator {
    name: String,
    observed_name: Option<String>,
    pings: PingSet,
}

impl Creator {
    #[must_use]
    pub fn new(webhook: &str, name: &str, config: &CreatorConfig) -> Self {
        Self {
            name: name.to_string(),
            observed_name: None,
            pings: PingSet::parse(&config.pings, webhook, name),
        }
    }

    /// Applies a refreshed configuration in place: the ping set is replaced
    /// wholesale (never merged) and the configured display casing is
    /// refreshed. Notification history is untouched by design; it lives in
    /// the owning webhook target.
    pub fn apply_config(&mut self, webhook: &str, name: &str, config: &CreatorConfig) {
        self.name = name.to_string();
        self.pings = PingSet::parse(&config.pings, webhook, name);
    }

    /// The platform's canonical casing once observed, else the configured one.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.observed_name.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn pings(&self) -> &PingSet {
        &self.pings
    }

    /// Builds the outbound webhook payload for a live channel. `cache_bust`
    /// (unix seconds, taken at render time) is appended to every image URL
    /// so repeated notifications never hit a stale CDN cache. As a side
    /// effect the platform's canonical name casing is learned for future
    /// display use; the identity key never changes.
    pub fn build_notification(&mut self, live: &LiveChannel, cache_bust: u64) -> WebhookPayload {
        let name = self.display_name();

        let mut tokens = self.pings.mention_tokens();
        tokens.push(format!("{name} is now live!"));
        let content = tokens.join(" ");

        let title = live
            .title
            .clone()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| format!("{name} is streaming"));

        let thumbnail = live
            .avatar
            .as_deref()
            .map(|url| EmbedImage { url: with_cache_bust(url, cache_bust) });

        let image = live
            .thumbnails
            .as_ref()
            .and_then(|t| t.web_large.as_deref().or(t.web.as_deref()))
            .map(|url| EmbedImage { url: with_cache_bust(url, cache_bust) });

        let embed = Embed {
            title,
            url: format!("https://picarto.tv/{name}"),
            color: EMBED_COLOR,
            thumbnail,
            image,
            footer: build_footer(live),
        };

        let payload = WebhookPayload {
            content,
            embeds: vec![embed],
            allowed_mentions: self.pings.allowed_mentions(),
        };

        self.observed_name = Some(live.name.clone());
        payload
    }
}

/// Footer text from the mature flag, the gaming flag, and the category;
/// omitted entirely when none apply.
fn build_footer(live: &LiveChannel) -> Option<EmbedFooter> {
    let mut parts = Vec::new();
    if live.adult {
        parts.push("Mature");
    }
    if live.gaming {
        parts.push("Gaming");
    }
    if let Some(category) = live.category.as_deref()
        && !category.trim().is_empty()
    {
        parts.push(category);
    }

    if parts.is_empty() {
        None
    } else {
        Some(EmbedFooter {
            text: parts.join(FOOTER_SEPARATOR),
        })
    }
}

fn with_cache_bust(url: &str, stamp: u64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}_={stamp}")
}
