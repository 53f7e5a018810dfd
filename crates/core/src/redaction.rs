//! Secret redaction for logs and task output.
//!
//! Git credential tokens and the runner shared secret must never reach a
//! log line or a terminal/task stream in the clear. Callers register the
//! live secret values they hold and pass all outbound text through
//! [`SecretRegistry::redact`] before it leaves the process.

use std::collections::HashSet;

/// Secrets shorter than this are not redacted: single characters and short
/// common substrings would make ordinary output unreadable.
pub const MIN_REDACTION_LENGTH: usize = 8;

const PLACEHOLDER: &str = "***REDACTED***";

/// Tracks the live secret values a process should never emit verbatim.
#[derive(Debug, Default)]
pub struct SecretRegistry {
    secrets: HashSet<String>,
}

impl SecretRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value for redaction. Values shorter than
    /// [`MIN_REDACTION_LENGTH`] are ignored.
    pub fn register(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value.len() >= MIN_REDACTION_LENGTH {
            self.secrets.insert(value);
        }
    }

    /// Replace every occurrence of every registered secret in `text`.
    ///
    /// Longer secrets are matched first so that one secret which happens to
    /// be a substring of another is not left partially visible.
    pub fn redact(&self, text: &str) -> String {
        if self.secrets.is_empty() {
            return text.to_string();
        }
        let mut ordered: Vec<&String> = self.secrets.iter().collect();
        ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut out = text.to_string();
        for secret in ordered {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), PLACEHOLDER);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_a_registered_secret() {
        let mut registry = SecretRegistry::new();
        registry.register("ghp_supersecrettoken");
        let redacted = registry.redact("cloning with ghp_supersecrettoken embedded");
        assert!(!redacted.contains("ghp_supersecrettoken"));
        assert!(redacted.contains(PLACEHOLDER));
    }

    #[test]
    fn ignores_short_values() {
        let mut registry = SecretRegistry::new();
        registry.register("short");
        assert_eq!(registry.redact("a short string"), "a short string");
    }

    #[test]
    fn longer_secret_is_fully_masked_even_when_it_contains_a_shorter_one() {
        let mut registry = SecretRegistry::new();
        registry.register("abcdefgh");
        registry.register("abcdefghij");
        let redacted = registry.redact("token=abcdefghij");
        assert!(!redacted.contains("abcdefghij"));
        assert!(!redacted.contains("abcdefgh"));
    }
}
