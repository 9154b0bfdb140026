//! Strongly-typed identifiers for registry entities
//!
//! Names are validated on construction, so any `ModelName`, `AliasName` or
//! `RunId` that exists is safe to use as a storage key or file name.

use crate::error::NameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_NAME_LEN: usize = 128;

fn validate_name(kind: &'static str, value: &str) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty { kind });
    }
    if value.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong {
            kind,
            max: MAX_NAME_LEN,
        });
    }
    if value.starts_with('.') {
        return Err(NameError::LeadingDot {
            kind,
            value: value.to_string(),
        });
    }
    if let Some(found) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(NameError::InvalidChar {
            kind,
            value: value.to_string(),
            found,
        });
    }
    Ok(())
}

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident, $check:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, NameError> {
                let value = value.into();
                $check(&value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = NameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

fn check_model_name(value: &str) -> Result<(), NameError> {
    validate_name("model name", value)
}

fn check_run_id(value: &str) -> Result<(), NameError> {
    validate_name("run id", value)
}

/// `latest` and `v<digits>` would be ambiguous with version selectors.
fn check_alias_name(value: &str) -> Result<(), NameError> {
    validate_name("alias name", value)?;
    let lower = value.to_ascii_lowercase();
    let version_like = lower.len() > 1
        && lower.starts_with('v')
        && lower[1..].chars().all(|c| c.is_ascii_digit());
    if lower == "latest" || version_like {
        return Err(NameError::ReservedAlias(value.to_string()));
    }
    Ok(())
}

name_type!(
    /// Name of a registered model; the partition key for all registry state
    ModelName,
    check_model_name
);

name_type!(
    /// Name of a mutable alias (`champion`, `staging`, or any custom name)
    AliasName,
    check_alias_name
);

name_type!(
    /// Identifier of an experiment-tracker run
    RunId,
    check_run_id
);

impl AliasName {
    pub fn champion() -> Self {
        Self(crate::alias::CHAMPION.to_string())
    }

    pub fn staging() -> Self {
        Self(crate::alias::STAGING.to_string())
    }

    pub fn production() -> Self {
        Self(crate::alias::PRODUCTION.to_string())
    }
}

/// Version number of a model; always >= 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct VersionNumber(u64);

impl VersionNumber {
    pub const FIRST: VersionNumber = VersionNumber(1);

    /// Returns `None` for zero.
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl TryFrom<u64> for VersionNumber {
    type Error = NameError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| NameError::InvalidVersion(value.to_string()))
    }
}

impl From<VersionNumber> for u64 {
    fn from(value: VersionNumber) -> Self {
        value.0
    }
}

/// Accepts `3` and `v3`.
impl FromStr for VersionNumber {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| NameError::InvalidVersion(s.to_string()))
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
