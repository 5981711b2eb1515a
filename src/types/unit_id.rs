// ABOUTME: Stable identifier for a deployable unit.
// ABOUTME: Restricted to lowercase alphanumerics, hyphens and underscores.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitIdError {
    #[error("unit id cannot be empty")]
    Empty,

    #[error("unit id exceeds maximum length of 63 characters")]
    TooLong,

    #[error("unit id must start and end with a letter or digit")]
    BadBoundary,

    #[error("unit id must be lowercase")]
    NotLowercase,

    #[error("invalid character in unit id: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(value: &str) -> Result<Self, UnitIdError> {
        if value.is_empty() {
            return Err(UnitIdError::Empty);
        }

        if value.len() > 63 {
            return Err(UnitIdError::TooLong);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(UnitIdError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
                return Err(UnitIdError::InvalidChar(c));
            }
        }

        let boundary_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !boundary_ok(value.chars().next()) || !boundary_ok(value.chars().last()) {
            return Err(UnitIdError::BadBoundary);
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Serialize for UnitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        UnitId::new(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_stack_style_ids() {
        assert!(UnitId::new("api").is_ok());
        assert!(UnitId::new("shared-network").is_ok());
        assert!(UnitId::new("worker_2").is_ok());
    }

    #[test]
    fn rejects_bad_ids() {
        assert_eq!(UnitId::new(""), Err(UnitIdError::Empty));
        assert_eq!(UnitId::new("Api"), Err(UnitIdError::NotLowercase));
        assert_eq!(UnitId::new("-api"), Err(UnitIdError::BadBoundary));
        assert_eq!(UnitId::new("api_"), Err(UnitIdError::BadBoundary));
        assert_eq!(UnitId::new("api.v2"), Err(UnitIdError::InvalidChar('.')));
        assert_eq!(UnitId::new(&"a".repeat(64)), Err(UnitIdError::TooLong));
    }

    #[test]
    fn deserializes_with_validation() {
        let id: UnitId = serde_yaml::from_str("billing").unwrap();
        assert_eq!(id.as_str(), "billing");
        assert!(serde_yaml::from_str::<UnitId>("Billing").is_err());
    }
}
