pub mod export;
pub mod rescue;

pub use export::{ExportInput, ExportOperation, ExportOutput};
pub use rescue::{RescueInput, RescueOperation, RescueOutput};

use crate::error::OperationError;

/// Output of an earlier stage that a later stage depends on.
pub(crate) fn require<'a, T>(value: &'a Option<T>, what: &'static str) -> Result<&'a T, OperationError> {
    value.as_ref().ok_or(OperationError::MissingStageOutput(what))
}
