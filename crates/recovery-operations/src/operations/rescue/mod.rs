mod context;
mod operation;
mod stages;

pub use context::RescueContext;
pub use operation::{RescueInput, RescueOperation, RescueOutput};
