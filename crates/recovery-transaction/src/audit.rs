use std::time::Instant;

use crate::state::TransactionState;

/// Status of a stage in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StageStatus {
    /// The stage's commit never ran.
    Pending,
    /// The stage committed successfully.
    Committed,
    /// The stage's commit failed.
    Failed,
    /// The stage committed and was rolled back successfully.
    RolledBack,
    /// The stage committed and its rollback failed.
    RollbackFailed,
}

/// Outcome of a stage's cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CleanupStatus {
    /// The stage has no cleanup, or the run never reached cleanup.
    NotRun,
    /// Cleanup completed.
    Done,
    /// Cleanup returned an error, which was logged and recorded.
    Failed,
}

/// Record of one stage's part in a transaction run.
#[derive(Debug)]
pub struct StageRecord {
    /// Position of the stage in the pipeline.
    pub index: usize,
    /// The stage's status message.
    pub name: String,
    /// Current status.
    pub status: StageStatus,
    /// Cleanup outcome.
    pub cleanup: CleanupStatus,
    /// When the stage's commit started.
    pub started_at: Option<Instant>,
    /// When the stage last finished a commit or rollback.
    pub completed_at: Option<Instant>,
    /// Rendered error from a failed commit, rollback or cleanup.
    pub error: Option<String>,
}

/// Audit log tracking every stage of a transaction run.
#[derive(Debug)]
pub struct TransactionAuditLog {
    records: Vec<StageRecord>,
    state: TransactionState,
    cancelled: bool,
}

impl Default for TransactionAuditLog {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            state: TransactionState::Idle,
            cancelled: false,
        }
    }
}

impl TransactionAuditLog {
    /// Create a new empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_stages<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let records = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| StageRecord {
                index,
                name: name.to_string(),
                status: StageStatus::Pending,
                cleanup: CleanupStatus::NotRun,
                started_at: None,
                completed_at: None,
                error: None,
            })
            .collect();
        Self {
            records,
            ..Self::default()
        }
    }

    pub(crate) fn set_state(&mut self, state: TransactionState) {
        if state == TransactionState::Cancelling {
            self.cancelled = true;
        }
        self.state = state;
    }

    pub(crate) fn record_start(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.started_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_committed(&mut self, index: usize) {
        self.update(index, StageStatus::Committed, None);
    }

    pub(crate) fn record_failure(&mut self, index: usize, error: String) {
        self.update(index, StageStatus::Failed, Some(error));
    }

    pub(crate) fn record_rolled_back(&mut self, index: usize) {
        self.update(index, StageStatus::RolledBack, None);
    }

    pub(crate) fn record_rollback_failed(&mut self, index: usize, error: String) {
        self.update(index, StageStatus::RollbackFailed, Some(error));
    }

    pub(crate) fn record_cleanup(&mut self, index: usize, error: Option<String>) {
        if let Some(record) = self.records.get_mut(index) {
            if let Some(error) = error {
                record.cleanup = CleanupStatus::Failed;
                record.error.get_or_insert(error);
            } else {
                record.cleanup = CleanupStatus::Done;
            }
        }
    }

    fn update(&mut self, index: usize, status: StageStatus, error: Option<String>) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = status;
            record.completed_at = Some(Instant::now());
            if error.is_some() {
                record.error = error;
            }
        }
    }

    /// Get all records in the audit log, in pipeline order.
    #[must_use]
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// The state the transaction ended in.
    #[must_use]
    pub fn final_state(&self) -> TransactionState {
        self.state
    }

    /// Whether the run observed a cancellation request.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Records of stages whose rollback failed.
    pub fn rollback_failures(&self) -> impl Iterator<Item = &StageRecord> {
        self.records
            .iter()
            .filter(|r| r.status == StageStatus::RollbackFailed)
    }

    /// Get a summary of the transaction run for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status {
                StageStatus::Pending => "·",
                StageStatus::Committed => "✓",
                StageStatus::Failed => "✗",
                StageStatus::RolledBack => "↩",
                StageStatus::RollbackFailed => "⚠",
            };
            lines.push(format!("{status} {}", record.name));
        }
        lines.join("\n")
    }
}
