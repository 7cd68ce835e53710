//! Crate-wide error taxonomy.
//!
//! Mirrors the abstract kinds in the design notes (`InputInvalid`, `NotReady`,
//! `Conflict`, `ResourceLimit`, `Transient`, `Fatal`) as concrete variants.
//! Display text never includes filesystem paths — callers only ever see
//! digests or catalog-relative identifiers.

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no root directory has been set")]
    NoDirectorySet,

    #[error("root directory not found")]
    DirectoryNotFound,

    #[error("scan aborted: more than {max} files discovered")]
    TooManyFiles { max: usize },

    #[error("not enough eligible images to form a pair")]
    NotEnoughImages,

    #[error("round {given} is stale; current round is {current}")]
    StaleRound { given: u64, current: u64 },

    #[error("digest is not present in the catalog")]
    UnknownDigest,

    #[error("the supplied pair does not match the last pair handed out")]
    DigestMismatch,

    #[error("outcome must be one of LEFT, RIGHT, SKIP")]
    InvalidOutcome,

    #[error("malformed digest: expected 64 lowercase hex characters")]
    InvalidDigest,

    #[error("image file is missing from disk")]
    FileMissing,

    #[error("sql failure in {context}: {details}")]
    Sql { context: &'static str, details: String },

    #[error("io failure: {details}")]
    Io { details: String },

    #[error("internal lock was poisoned")]
    PoisonedLock,

    #[error("config parse failure: {details}")]
    ConfigParse { details: String },
}

impl CoreError {
    /// Stable machine-readable tag, independent of the `Display` text.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::NoDirectorySet => "NoDirectorySet",
            Self::DirectoryNotFound => "DirectoryNotFound",
            Self::TooManyFiles { .. } => "TooManyFiles",
            Self::NotEnoughImages => "NotEnoughImages",
            Self::StaleRound { .. } => "StaleRound",
            Self::UnknownDigest => "UnknownDigest",
            Self::DigestMismatch => "DigestMismatch",
            Self::InvalidOutcome => "InvalidOutcome",
            Self::InvalidDigest => "InvalidDigest",
            Self::FileMissing => "FileMissing",
            Self::Sql { .. } => "Sql",
            Self::Io { .. } => "Io",
            Self::PoisonedLock => "PoisonedLock",
            Self::ConfigParse { .. } => "ConfigParse",
        }
    }

    /// Whether `record_choice` should retry this error with backoff before
    /// surfacing it as a `Conflict` (see design notes §7).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Sql { .. } | Self::Io { .. })
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io {
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable_and_unique() {
        let errors = vec![
            CoreError::NoDirectorySet,
            CoreError::DirectoryNotFound,
            CoreError::TooManyFiles { max: 1 },
            CoreError::NotEnoughImages,
            CoreError::StaleRound { given: 1, current: 2 },
            CoreError::UnknownDigest,
            CoreError::DigestMismatch,
            CoreError::InvalidOutcome,
            CoreError::InvalidDigest,
            CoreError::FileMissing,
            CoreError::Sql { context: "x", details: String::new() },
            CoreError::Io { details: String::new() },
            CoreError::PoisonedLock,
            CoreError::ConfigParse { details: String::new() },
        ];
        let tags: Vec<&str> = errors.iter().map(CoreError::tag).collect();
        let unique: std::collections::HashSet<&&str> = tags.iter().collect();
        assert_eq!(tags.len(), unique.len());
    }

    #[test]
    fn display_never_contains_a_path() {
        let err = CoreError::FileMissing;
        assert!(!err.to_string().contains('/'));
    }

    #[test]
    fn retryable_kinds() {
        assert!(CoreError::Sql { context: "x", details: String::new() }.is_retryable());
        assert!(CoreError::Io { details: String::new() }.is_retryable());
        assert!(!CoreError::NotEnoughImages.is_retryable());
    }
}
