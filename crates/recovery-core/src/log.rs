use std::fmt;

use crate::asset::{AssetKey, SnapshotEpoch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    RescueCreate,
    ImageExport,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RescueCreate => f.write_str("rescue-create"),
            Self::ImageExport => f.write_str("image-export"),
        }
    }
}

/// Structured logging fields for one pipeline run.
///
/// Carried on the pipeline context and passed explicitly to each log call,
/// so no stage has to set or reset process-wide logging state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    asset: AssetKey,
    snapshot: SnapshotEpoch,
    operation: Operation,
}

impl LogContext {
    #[must_use]
    pub fn new(asset: AssetKey, snapshot: SnapshotEpoch, operation: Operation) -> Self {
        Self {
            asset,
            snapshot,
            operation,
        }
    }

    /// Same fields, attributed to a different asset.
    #[must_use]
    pub fn for_asset(&self, asset: AssetKey) -> Self {
        Self {
            asset,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn asset(&self) -> &AssetKey {
        &self.asset
    }

    #[must_use]
    pub fn snapshot(&self) -> SnapshotEpoch {
        self.snapshot
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} [{}]", self.asset, self.snapshot, self.operation)
    }
}
