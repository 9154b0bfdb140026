//! Validation errors for identifiers and selectors

use thiserror::Error;

/// Rejection of a malformed name, version number, or selector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} exceeds {max} characters")]
    TooLong { kind: &'static str, max: usize },

    #[error("{kind} '{value}' must not start with '.'")]
    LeadingDot { kind: &'static str, value: String },

    #[error("{kind} '{value}' contains invalid character '{found}'")]
    InvalidChar {
        kind: &'static str,
        value: String,
        found: char,
    },

    #[error("alias '{0}' is reserved")]
    ReservedAlias(String),

    #[error("invalid version number '{0}': expected a positive integer")]
    InvalidVersion(String),

    #[error("invalid version selector '{0}': expected a number, '@alias' or 'latest'")]
    InvalidSelector(String),
}
