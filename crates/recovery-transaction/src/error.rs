use std::fmt::Debug;

use thiserror::Error;

/// Error from a transaction that did not commit.
///
/// Returned only after the rollback and cleanup passes have both finished.
/// Rollback and cleanup failures never appear here; they are logged and
/// recorded in the [`TransactionAuditLog`](crate::TransactionAuditLog).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransactionError<E: Debug> {
    /// A stage's forward action failed.
    #[error("stage '{stage}' failed")]
    StageFailed {
        /// Status message of the stage that failed.
        stage: String,
        /// Position of the failed stage in the pipeline.
        index: usize,
        /// The error returned by the stage.
        #[source]
        source: E,
    },

    /// Cancellation was requested before a stage started.
    #[error("transaction cancelled before stage '{stage}'")]
    Cancelled {
        /// Status message of the stage that was not started.
        stage: String,
        /// Position of the stage that was not started.
        index: usize,
    },
}

impl<E: Debug> TransactionError<E> {
    /// Whether the transaction stopped because cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Status message of the stage at which the transaction stopped.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::StageFailed { stage, .. } | Self::Cancelled { stage, .. } => stage,
        }
    }

    /// Position of the stage at which the transaction stopped.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::StageFailed { index, .. } | Self::Cancelled { index, .. } => *index,
        }
    }

    /// The original stage error, if the transaction failed rather than
    /// being cancelled.
    #[must_use]
    pub fn into_stage_error(self) -> Option<E> {
        match self {
            Self::StageFailed { source, .. } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }
}
