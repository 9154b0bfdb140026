//! Version selectors: a number, `@alias`, or `latest`

use crate::error::NameError;
use crate::{AliasName, VersionNumber};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a caller names a version of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSelector {
    Number(VersionNumber),
    Alias(AliasName),
    Latest,
}

impl FromStr for VersionSelector {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(VersionSelector::Latest);
        }
        if let Some(alias) = s.strip_prefix('@') {
            return AliasName::new(alias).map(VersionSelector::Alias);
        }
        s.parse::<VersionNumber>()
            .map(VersionSelector::Number)
            .map_err(|_| NameError::InvalidSelector(s.to_string()))
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Number(v) => write!(f, "{}", v),
            VersionSelector::Alias(a) => write!(f, "@{}", a),
            VersionSelector::Latest => f.write_str("latest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parsing() {
        assert_eq!(
            "4".parse::<VersionSelector>().unwrap(),
            VersionSelector::Number(VersionNumber::new(4).unwrap())
        );
        assert_eq!(
            "@champion".parse::<VersionSelector>().unwrap(),
            VersionSelector::Alias(AliasName::champion())
        );
        assert_eq!(
            "LATEST".parse::<VersionSelector>().unwrap(),
            VersionSelector::Latest
        );
        assert!(matches!(
            "champion".parse::<VersionSelector>(),
            Err(NameError::InvalidSelector(_))
        ));
        assert!(matches!(
            "@latest".parse::<VersionSelector>(),
            Err(NameError::ReservedAlias(_))
        ));
    }

    #[test]
    fn test_selector_display() {
        assert_eq!(VersionSelector::Alias(AliasName::staging()).to_string(), "@staging");
        assert_eq!(VersionSelector::Latest.to_string(), "latest");
    }
}
