//! Session naming services.

use std::sync::LazyLock;

use async_trait::async_trait;
use rand::Rng as _;
use regex::Regex;

use crate::service::broker::Error;

/// The shortest session name allowed.
pub const MIN_NAME_LENGTH: usize = 4;

/// The longest session name allowed.
pub const MAX_NAME_LENGTH: usize = 64;

/// The characters a session name may contain.
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: this is checked statically with tests to always unwrap.
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9._-]*[a-zA-Z0-9])?$").unwrap()
});

/// Whether a session name is well formed.
///
/// A name is between [`MIN_NAME_LENGTH`] and [`MAX_NAME_LENGTH`] characters
/// long, only contains letters, digits, `.`, `_` and `-`, and starts and ends
/// with a letter or a digit.
pub fn is_valid_name(name: &str) -> bool {
    (MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&name.len()) && NAME_PATTERN.is_match(name)
}

/// A membership check against the names of the running sessions.
#[async_trait]
pub trait NamingService: Send + Sync {
    /// Whether a session with the given name is already running.
    async fn exists(&self, name: &str) -> Result<bool, Error>;
}

/// A name generator.
pub trait Generator {
    /// Generates a new name.
    fn generate(&self) -> String;
}

/// A generator of `<prefix>-<random alphanumerics>` names.
#[derive(Clone, Debug)]
pub struct Alphanumeric {
    /// The prefix of the name.
    prefix: String,

    /// The length of the randomized portion of the name.
    length: usize,
}

impl Alphanumeric {
    /// Creates a generator.
    ///
    /// The prefix is shortened so that generated names never exceed
    /// [`MAX_NAME_LENGTH`].
    pub fn new(prefix: &str, length: usize) -> Self {
        let room = MAX_NAME_LENGTH.saturating_sub(length + 1);
        let prefix = prefix
            .char_indices()
            .nth(room)
            .map(|(index, _)| &prefix[..index])
            .unwrap_or(prefix);

        Self {
            // NOTE: a shortened prefix must still end with a letter or digit
            // for the name to stay valid.
            prefix: prefix.trim_end_matches(['.', '_', '-']).to_string(),
            length,
        }
    }
}

impl Default for Alphanumeric {
    fn default() -> Self {
        Self::new("sess", 8)
    }
}

impl Generator for Alphanumeric {
    fn generate(&self) -> String {
        let random: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();

        format!("{prefix}-{random}", prefix = self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rules() {
        assert!(is_valid_name("my-session.1"));
        assert!(!is_valid_name("abc"));
        assert!(!is_valid_name("-abcd"));
        assert!(!is_valid_name("abcd_"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name(&"a".repeat(65)));
        assert!(is_valid_name(&"a".repeat(64)));
    }

    #[test]
    fn generated_names_are_valid() {
        let name = Alphanumeric::default().generate();
        assert!(name.starts_with("sess-"));
        assert_eq!(name.len(), 13);
        assert!(is_valid_name(&name));
    }

    #[test]
    fn long_prefixes_are_shortened() {
        let prefix = format!("{}-tail", "p".repeat(58));
        let name = Alphanumeric::new(&prefix, 4).generate();

        assert_eq!(name.len(), 58 + 1 + 4);
        assert!(is_valid_name(&name));
    }
}
