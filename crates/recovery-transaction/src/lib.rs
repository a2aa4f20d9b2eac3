//! Staged transactions for irreversible, multi-step operations.
//!
//! A [`Transaction`] runs an ordered list of [`Stage`]s against a shared,
//! operation-scoped context. If a stage fails, or cancellation is requested
//! between stages, every committed stage is compensated in reverse order.
//! Cleanup runs on every added stage regardless of the outcome.

mod audit;
mod cancel;
mod entry;
mod error;
mod progress;
mod stage;
mod state;
mod transaction;

pub use audit::{CleanupStatus, StageRecord, StageStatus, TransactionAuditLog};
pub use error::TransactionError;
pub use progress::StageProgress;
pub use stage::Stage;
pub use state::TransactionState;
pub use transaction::Transaction;
