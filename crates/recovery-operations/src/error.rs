use std::path::PathBuf;

use recovery_core::{AssetKey, SnapshotEpoch};
use recovery_transaction::TransactionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Core(#[from] recovery_core::CoreError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("failed to run '{command}'")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with status {}: {stderr}", status.map_or_else(|| "signal".to_string(), |s| s.to_string()))]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("unexpected output from '{command}': {reason}")]
    UnexpectedOutput { command: String, reason: String },

    #[error("failed to read configuration file '{path}'")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file '{path}'")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read state file '{path}'")]
    StateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write state file '{path}'")]
    StateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state file '{path}'")]
    StateParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize state for '{path}'")]
    StateSerialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    #[error("asset '{0}' not found")]
    AssetNotFound(AssetKey),

    #[error("asset '{0}' already exists")]
    AssetExists(AssetKey),

    #[error("a restore of '{asset}' at snapshot {snapshot} already exists")]
    RestoreExists {
        asset: AssetKey,
        snapshot: SnapshotEpoch,
    },

    #[error("no restore of '{asset}' at snapshot {snapshot} exists")]
    RestoreNotFound {
        asset: AssetKey,
        snapshot: SnapshotEpoch,
    },

    #[error("an export of '{asset}' at snapshot {snapshot} is already running")]
    ExportLocked {
        asset: AssetKey,
        snapshot: SnapshotEpoch,
    },

    #[error("no removable drive attached")]
    NoUsbDrive,

    #[error("more than one removable drive attached: {}", devices.join(", "))]
    AmbiguousUsbDrive { devices: Vec<String> },

    #[error("no disk images found under '{0}'")]
    NoDiskImages(PathBuf),

    #[error("stage prerequisite missing: {0}")]
    MissingStageOutput(&'static str),

    #[error("operation cancelled before '{stage}'")]
    Cancelled { stage: String },

    #[error("operation failed at stage '{stage}'")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<OperationError>,
    },
}

pub type Result<T> = std::result::Result<T, OperationError>;

impl OperationError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<TransactionError<OperationError>> for OperationError {
    fn from(err: TransactionError<OperationError>) -> Self {
        match err {
            TransactionError::StageFailed { stage, source, .. } => Self::StageFailed {
                stage,
                source: Box::new(source),
            },
            TransactionError::Cancelled { stage, .. } => Self::Cancelled { stage },
            _ => Self::StageFailed {
                stage: "unknown".to_string(),
                source: Box::new(Self::MissingStageOutput("transaction outcome")),
            },
        }
    }
}
