//! Wire types for Discord-style webhook deliveries.

use serde::Serialize;

use crate::ping::Snowflake;

/// Body of one webhook POST.
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub content: String,
    pub embeds: Vec<Embed>,
    pub allowed_mentions: AllowedMentions,
}

/// Allow-list limiting which mentions in the message body actually trigger
/// notifications on the receiving side.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Snowflake>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<Snowflake>>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}
