//! # Identity Newtype
//!
//! An [`Identity`] is the unique string key that owns a pair of embedding
//! variants. It is validated at construction: empty or whitespace-only keys
//! are rejected so that a blank form field can never alias a real user.

use serde::{Deserialize, Serialize};

use crate::error::{DeepAuditError, Result};

/// Unique identity key for an enrolled subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Create a validated identity.
    ///
    /// Leading and trailing whitespace is trimmed; the remainder must be
    /// non-empty.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DeepAuditError::invalid_parameter(
                "identity",
                "must be non-empty",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The UTF-8 bytes hashed to derive this identity's watermark.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = DeepAuditError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace() {
        let id = Identity::new("  alice ").unwrap();
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn rejects_blank() {
        assert!(Identity::new("").is_err());
        assert!(Identity::new("   ").is_err());
    }

    #[test]
    fn deserialization_validates() {
        let id: Identity = serde_yaml::from_str("bob").unwrap();
        assert_eq!(id.as_str(), "bob");
        assert!(serde_yaml::from_str::<Identity>("''").is_err());
    }
}
