use std::collections::BTreeSet;
use std::fmt;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::PingEntry;
use crate::discord::AllowedMentions;

/// Largest explicit id list Discord accepts in `allowed_mentions`; larger
/// sets must fall back to blanket role/user mention permission.
const MAX_EXPLICIT_MENTIONS: usize = 100;

/// An opaque Discord snowflake id. Only ever compared and formatted, never
/// used arithmetically. Accepted from config as either a JSON number or its
/// decimal string form; always serialized as a string, which is what the
/// webhook API expects in allowed-mentions lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(pub u64);

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(id) => Ok(Snowflake(id)),
            Raw::Text(text) => text.parse().map(Snowflake).map_err(serde::de::Error::custom),
        }
    }
}

/// The canonical, deduplicated mention model of one creator: broadcast
/// mentions are booleans, role and user ids are sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingSet {
    pub everyone: bool,
    pub here: bool,
    pub roles: BTreeSet<Snowflake>,
    pub users: BTreeSet<Snowflake>,
}

impl PingSet {
    /// Parses an ordered list of heterogeneous ping entries. First match
    /// wins; an unrecognized entry is skipped with a warning naming the
    /// webhook, creator, and index, never an error. Duplicates collapse.
    #[must_use]
    pub fn parse(entries: &[PingEntry], webhook: &str, creator: &str) -> Self {
        let mut pings = Self::default();
        for (index, entry) in entries.iter().enumerate() {
            match entry {
                PingEntry::Label(label) => match label.to_lowercase().as_str() {
                    "@everyone" | "everyone" => pings.everyone = true,
                    "@here" | "here" => pings.here = true,
                    other => warn!(
                        "Webhook '{webhook}', creator '{creator}': \
                         unknown ping label '{other}' at index {index}, ignoring"
                    ),
                },
                PingEntry::Role { role } => {
                    pings.roles.insert(*role);
                }
                PingEntry::User { user } => {
                    pings.users.insert(*user);
                }
                PingEntry::Other(value) => warn!(
                    "Webhook '{webhook}', creator '{creator}': \
                     unknown ping specification {value} at index {index}, ignoring"
                ),
            }
        }
        pings
    }

    /// Renders every mention in fixed order: everyone, here, roles, users.
    #[must_use]
    pub fn mention_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        if self.everyone {
            tokens.push("@everyone".to_string());
        }
        if self.here {
            tokens.push("@here".to_string());
        }
        for role in &self.roles {
            tokens.push(format!("<@&{role}>"));
        }
        for user in &self.users {
            tokens.push(format!("<@{user}>"));
        }
        tokens
    }

    /// Builds the allowed-mentions safety list. Role and user ids are
    /// enumerated explicitly while the set fits the platform's 100-entry
    /// limit; beyond that the payload grants blanket permission instead,
    /// since an oversized explicit list gets the whole delivery rejected.
    #[must_use]
    pub fn allowed_mentions(&self) -> AllowedMentions {
        let mut allowed = AllowedMentions::default();

        if self.everyone || self.here {
            allowed.parse.push("everyone");
        }

        if self.roles.len() > MAX_EXPLICIT_MENTIONS {
            allowed.parse.push("roles");
        } else if !self.roles.is_empty() {
            allowed.roles = Some(self.roles.iter().copied().collect());
        }

        if self.users.len() > MAX_EXPLICIT_MENTIONS {
            allowed.parse.push("users");
        } else if !self.users.is_empty() {
            allowed.users = Some(self.users.iter().copied().collect());
        }

        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_json(json: &str) -> PingSet {
        let entries: Vec<PingEntry> = serde_json::from_str(json).unwrap();
        PingSet::parse(&entries, "test-webhook", "test-creator")
    }

    #[test]
    fn test_parse_mixed_ping_list() {
        let pings = parse_json(r#"["@everyone", {"role": 42}, {"user": 7}]"#);

        assert!(pings.everyone);
        assert!(!pings.here);
        assert_eq!(pings.roles, BTreeSet::from([Snowflake(42)]));
        assert_eq!(pings.users, BTreeSet::from([Snowflake(7)]));

        let tokens = pings.mention_tokens();
        assert_eq!(tokens, vec!["@everyone", "<@&42>", "<@7>"]);
    }

    #[test]
    fn test_parse_labels_case_insensitively() {
        let pings = parse_json(r#"["Everyone", "@HERE"]"#);
        assert!(pings.everyone);
        assert!(pings.here);
    }

    #[test]
    fn test_parse_skips_unknown_entries() {
        let pings = parse_json(r#"["@someone", {"channel": 3}, 12, {"role": 5}]"#);
        assert!(!pings.everyone);
        assert!(!pings.here);
        assert_eq!(pings.roles, BTreeSet::from([Snowflake(5)]));
        assert!(pings.users.is_empty());
    }

    #[test]
    fn test_parse_collapses_duplicates() {
        let pings = parse_json(r#"["@here", "here", {"role": 9}, {"role": 9}]"#);
        assert!(pings.here);
        assert_eq!(pings.roles.len(), 1);
    }

    #[test]
    fn test_snowflake_accepts_string_form() {
        let pings = parse_json(r#"[{"user": "123456789012345678"}]"#);
        assert_eq!(pings.users, BTreeSet::from([Snowflake(123_456_789_012_345_678)]));
    }

    #[test]
    fn test_allowed_mentions_at_explicit_cap() {
        let mut pings = PingSet::default();
        for id in 0..100 {
            pings.roles.insert(Snowflake(id));
        }

        let allowed = pings.allowed_mentions();
        assert!(allowed.parse.is_empty());
        assert_eq!(allowed.roles.as_ref().map(Vec::len), Some(100));
        assert!(allowed.users.is_none());
    }

    #[test]
    fn test_allowed_mentions_beyond_explicit_cap() {
        let mut pings = PingSet::default();
        for id in 0..101 {
            pings.roles.insert(Snowflake(id));
        }

        let allowed = pings.allowed_mentions();
        assert_eq!(allowed.parse, vec!["roles"]);
        assert!(allowed.roles.is_none());
    }

    #[test]
    fn test_allowed_mentions_broadcast_and_users() {
        let mut pings = PingSet::default();
        pings.here = true;
        pings.users.insert(Snowflake(7));

        let allowed = pings.allowed_mentions();
        assert_eq!(allowed.parse, vec!["everyone"]);
        assert!(allowed.roles.is_none());
        assert_eq!(allowed.users, Some(vec![Snowflake(7)]));
    }

    #[test]
    fn test_snowflake_serializes_as_string() {
        let json = serde_json::to_string(&Snowflake(42)).unwrap();
        assert_eq!(json, "\"42\"");
    }
}
