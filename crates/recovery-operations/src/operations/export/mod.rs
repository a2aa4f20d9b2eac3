mod context;
mod operation;
mod stages;

pub use context::ExportContext;
pub use operation::{ExportInput, ExportOperation, ExportOutput};
