/// Progress notification emitted before a stage commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageProgress<'a> {
    /// Zero-based position of the stage about to run.
    pub index: usize,
    /// Number of stages in the transaction.
    pub total: usize,
    /// The stage's status message.
    pub message: &'a str,
}

impl StageProgress<'_> {
    /// One-based step number, for display.
    #[must_use]
    pub fn step(&self) -> usize {
        self.index + 1
    }
}

pub(crate) type ProgressListener = Box<dyn FnMut(&StageProgress<'_>)>;
