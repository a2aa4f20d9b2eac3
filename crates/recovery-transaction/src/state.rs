use std::fmt;

/// Lifecycle of a transaction run.
///
/// ```text
/// Idle -> Committing -> Committed
///                    -> RollingBack -> RolledBack
///                    -> Cancelling -> RollingBack -> RolledBack
/// ```
///
/// Cleanup runs on the way into `Committed` or `RolledBack` and has no state
/// of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Built but not yet run.
    Idle,
    /// Committing stages in order.
    Committing,
    /// Every stage committed.
    Committed,
    /// The cancel hook fired between stages.
    Cancelling,
    /// Undoing committed stages in reverse order.
    RollingBack,
    /// Rollback finished after a failure or cancellation.
    RolledBack,
}

impl TransactionState {
    /// Whether the run has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Committing)
                | (
                    Self::Committing,
                    Self::Committed | Self::RollingBack | Self::Cancelling
                )
                | (Self::Cancelling, Self::RollingBack)
                | (Self::RollingBack, Self::RolledBack)
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Cancelling => "cancelling",
            Self::RollingBack => "rolling back",
            Self::RolledBack => "rolled back",
        };
        write!(f, "{s}")
    }
}
