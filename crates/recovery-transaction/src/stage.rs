/// One unit of work inside a [`Transaction`](crate::Transaction).
///
/// A stage performs a forward action in [`commit`](Stage::commit) and may
/// undo it in [`rollback`](Stage::rollback) if a later stage fails or the
/// transaction is cancelled. [`cleanup`](Stage::cleanup) runs on every stage
/// that was added, whatever the outcome.
///
/// # Type Parameters
///
/// - `Context`: Operation-scoped state shared by all stages of one run
/// - `Error`: The error type for stage failures
pub trait Stage {
    /// Mutable state threaded through every stage of the pipeline.
    type Context;

    /// Error type for stage failures.
    type Error;

    /// Human-readable label used for progress reporting and logs.
    fn status_message(&self) -> &'static str;

    /// Perform the forward action.
    ///
    /// Errors the stage considers non-critical must be handled here and not
    /// returned; every returned error aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage fails to complete.
    fn commit(&mut self, ctx: &mut Self::Context) -> Result<(), Self::Error>;

    /// Undo the effects of a successful [`commit`](Stage::commit).
    ///
    /// Called at most once, and only after `commit` returned `Ok`. Earlier
    /// stages may already have been rolled back, so implementations must not
    /// rely on their state being intact.
    ///
    /// The default implementation is a no-op, suitable for read-only stages.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails. The transaction logs it and
    /// continues with the remaining rollbacks.
    fn rollback(&mut self, ctx: &mut Self::Context) -> Result<(), Self::Error> {
        let _ = ctx;
        Ok(())
    }

    /// Housekeeping that runs whether or not the transaction succeeded.
    ///
    /// Called exactly once per added stage, even if `commit` never ran.
    /// Must be safe to call in any state.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails. The transaction logs it and never
    /// propagates it.
    fn cleanup(&mut self, ctx: &mut Self::Context) -> Result<(), Self::Error> {
        let _ = ctx;
        Ok(())
    }
}
