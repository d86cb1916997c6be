use crate::errors::ValidationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const HYPHENATED_LEN: usize = 36;

/// Orchestrator-minted UUIDv7 identifying one acquisition attempt.
///
/// The input string is kept verbatim so that keys rebuilt from the same
/// input render byte-for-byte identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::EmptyRunId);
        }
        // Uuid::parse_str also accepts braced, urn and simple encodings.
        if raw.len() != HYPHENATED_LEN {
            return Err(ValidationError::MalformedRunId {
                value: raw.to_string(),
                reason: "expected the hyphenated 8-4-4-4-12 form".to_string(),
            });
        }
        let id = Uuid::parse_str(raw).map_err(|e| ValidationError::MalformedRunId {
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
        let version = id.get_version_num();
        if version != 7 {
            return Err(ValidationError::WrongRunIdVersion {
                value: raw.to_string(),
                version,
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
