use recovery_operations::OperationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load configuration")]
    Config(#[source] OperationError),

    #[error("rescue VM creation failed")]
    Rescue(#[source] OperationError),

    #[error("export cancelled")]
    ExportCancelled(#[source] OperationError),

    #[error("image export failed")]
    Export(#[source] OperationError),

    #[error("operation failed")]
    Operation(#[from] OperationError),
}

impl CliError {
    pub(crate) fn from_export(error: OperationError) -> Self {
        if error.is_cancelled() {
            Self::ExportCancelled(error)
        } else {
            Self::Export(error)
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
