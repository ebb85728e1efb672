pub mod config;
pub mod creator;
pub mod discord;
pub mod error;
pub mod notifier;
pub mod picarto;
pub mod ping;
pub mod webhook;

pub use error::Error;
pub use notifier::Notifier;

/// Environment variable naming the URL of the remote configuration document.
pub const CONFIG_URL_ENV: &str = "PICARTOSTREAMNOTIFIER_CONFIG_URL";

/// Derives the case-folded key under which a creator or webhook name is
/// stored. Every name-keyed map in the crate goes through this, so two names
/// differing only in case always collide to the same record; the
/// original-case string is kept in the value, never as the key.
#[must_use]
pub fn caseless_key(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caseless_key_collides_case_variants() {
        assert_eq!(caseless_key("SomeCreator"), caseless_key("somecreator"));
        assert_eq!(caseless_key("SOMECREATOR"), "somecreator");
    }

    #[test]
    fn test_caseless_key_keeps_distinct_names_distinct() {
        assert_ne!(caseless_key("alice"), caseless_key("alicia"));
    }
}
