use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

const MAX_ASSET_KEY_LEN: usize = 128;

/// Identifier of a protected asset (an agent or a share).
///
/// Keys double as dataset and VM names, so they are restricted to ASCII
/// alphanumerics plus `-`, `_` and `.`, and must not start with `.` or `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetKey(String);

impl AssetKey {
    /// # Errors
    ///
    /// Returns `CoreError::InvalidAssetKey` if the key is empty, too long or
    /// contains characters that are not allowed in dataset names.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let invalid = |reason| CoreError::InvalidAssetKey {
            key: key.clone(),
            reason,
        };

        if key.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if key.len() > MAX_ASSET_KEY_LEN {
            return Err(invalid("longer than 128 characters"));
        }
        if key.starts_with(['.', '-']) {
            return Err(invalid("must not start with '.' or '-'"));
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid("only ASCII letters, digits, '-', '_' and '.' are allowed"));
        }

        Ok(Self(key))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the rescue asset booted from `snapshot` of this asset.
    #[must_use]
    pub fn rescue_key(&self, snapshot: SnapshotEpoch) -> Self {
        Self(format!("{}-rescue-{}", self.0, snapshot.as_secs()))
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for AssetKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AssetKey> for String {
    fn from(key: AssetKey) -> Self {
        key.0
    }
}

/// A point-in-time snapshot, identified by its Unix timestamp in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotEpoch(i64);

impl SnapshotEpoch {
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSnapshot` for non-positive timestamps.
    pub fn new(secs: i64) -> Result<Self> {
        if secs <= 0 {
            return Err(CoreError::InvalidSnapshot(secs.to_string()));
        }
        Ok(Self(secs))
    }

    #[must_use]
    pub fn as_secs(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }
}

impl fmt::Display for SnapshotEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnapshotEpoch {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let secs = s
            .trim()
            .parse::<i64>()
            .map_err(|_| CoreError::InvalidSnapshot(s.to_string()))?;
        Self::new(secs)
    }
}
