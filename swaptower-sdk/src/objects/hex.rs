//! Hex-encoded byte strings (hashed secrets, secrets).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A lowercase hex string.
///
/// Used as the swap identity (hashed secret) and for revealed secrets.
/// The value is kept as text because it is only ever compared, logged and
/// forwarded into contract parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hex(String);

impl Hex {
    /// Wrap a hex string, normalizing it to lowercase.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_ascii_lowercase())
    }

    /// Normalize a contract parameter value carrying bytes.
    ///
    /// Indexers render `bytes` parameters either as a JSON string
    /// (`"aabbcc"`, quotes included) or as the raw text `aabbcc`. Both
    /// normalize to the same value.
    pub fn from_parameter(raw: &str) -> Self {
        Self::new(raw.trim().trim_matches('"'))
    }

    /// Same as [`from_parameter`](Self::from_parameter) for an already
    /// parsed JSON value.
    pub fn from_parameter_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::from_parameter(s),
            other => Self::from_parameter(&other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Hex {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Hex {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Hex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
