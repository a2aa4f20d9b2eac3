use std::fmt::{Debug, Display};

use tracing::{debug, info, info_span, warn};

use crate::audit::TransactionAuditLog;
use crate::cancel::CancelHook;
use crate::entry::StageEntry;
use crate::error::TransactionError;
use crate::progress::{ProgressListener, StageProgress};
use crate::stage::Stage;
use crate::state::TransactionState;

/// An ordered pipeline of stages with all-or-nothing semantics approximated
/// through compensating rollback.
///
/// The transaction owns its context for the duration of the run. Stages
/// execute strictly in the order they were added. If a stage fails, or
/// cancellation is requested between stages, every committed stage is
/// rolled back in reverse order. Cleanup then runs on every added stage in
/// add order, whatever happened.
///
/// # Example
///
/// ```
/// use recovery_transaction::{Stage, Transaction};
///
/// struct Push(&'static str);
///
/// impl Stage for Push {
///     type Context = Vec<&'static str>;
///     type Error = String;
///
///     fn status_message(&self) -> &'static str {
///         self.0
///     }
///
///     fn commit(&mut self, ctx: &mut Self::Context) -> Result<(), Self::Error> {
///         ctx.push(self.0);
///         Ok(())
///     }
/// }
///
/// let ctx = Transaction::new(Vec::new())
///     .add(Push("first"))
///     .add_if(false, Push("skipped"))
///     .add_if_else(true, Push("second"), Push("other"))
///     .commit()
///     .expect("all stages succeed");
///
/// assert_eq!(ctx, vec!["first", "second"]);
/// ```
pub struct Transaction<Ctx, Err> {
    name: String,
    context: Ctx,
    entries: Vec<StageEntry<Ctx, Err>>,
    cancel_hook: Option<CancelHook>,
    progress: Option<ProgressListener>,
}

impl<Ctx, Err> Debug for Transaction<Ctx, Err> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("name", &self.name)
            .field(
                "stages",
                &self
                    .entries
                    .iter()
                    .map(StageEntry::status_message)
                    .collect::<Vec<_>>(),
            )
            .field("cancel_hook", &self.cancel_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl<Ctx, Err> Transaction<Ctx, Err>
where
    Err: Debug + Display,
{
    /// Create an empty transaction that owns `context`.
    #[must_use]
    pub fn new(context: Ctx) -> Self {
        Self {
            name: String::from("transaction"),
            context,
            entries: Vec::new(),
            cancel_hook: None,
            progress: None,
        }
    }

    /// Name used for the tracing span around [`commit`](Self::commit).
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a stage to the end of the pipeline.
    #[must_use]
    pub fn add<S>(mut self, stage: S) -> Self
    where
        S: Stage<Context = Ctx, Error = Err> + 'static,
    {
        self.entries.push(StageEntry::new(Box::new(stage)));
        self
    }

    /// Append `stage` only if `condition` holds.
    ///
    /// The condition is evaluated now, while the pipeline is being built.
    /// An unselected stage is dropped without any of its methods being
    /// called.
    #[must_use]
    pub fn add_if<S>(self, condition: bool, stage: S) -> Self
    where
        S: Stage<Context = Ctx, Error = Err> + 'static,
    {
        if condition { self.add(stage) } else { self }
    }

    /// Append `if_true` when `condition` holds, otherwise `if_false`.
    ///
    /// Exactly one stage is inserted at this position.
    #[must_use]
    pub fn add_if_else<A, B>(self, condition: bool, if_true: A, if_false: B) -> Self
    where
        A: Stage<Context = Ctx, Error = Err> + 'static,
        B: Stage<Context = Ctx, Error = Err> + 'static,
    {
        if condition {
            self.add(if_true)
        } else {
            self.add(if_false)
        }
    }

    /// Register the cancellation hook, chaining form of
    /// [`set_on_cancel_callback`](Self::set_on_cancel_callback).
    #[must_use]
    pub fn on_cancel<P, F>(mut self, should_cancel: P, on_cancel: F) -> Self
    where
        P: FnMut() -> bool + 'static,
        F: FnOnce() + 'static,
    {
        self.set_on_cancel_callback(should_cancel, on_cancel);
        self
    }

    /// Register a cancellation predicate and the action to run once if it
    /// fires.
    ///
    /// The predicate is polled before each stage starts, never while a stage
    /// is running. A transaction has at most one hook; registering again
    /// replaces the previous one.
    pub fn set_on_cancel_callback<P, F>(&mut self, should_cancel: P, on_cancel: F)
    where
        P: FnMut() -> bool + 'static,
        F: FnOnce() + 'static,
    {
        if self.cancel_hook.is_some() {
            warn!(transaction = %self.name, "replacing previously registered cancel callback");
        }
        self.cancel_hook = Some(CancelHook::new(should_cancel, on_cancel));
    }

    /// Register a listener notified before each stage commits.
    #[must_use]
    pub fn on_progress<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&StageProgress<'_>) + 'static,
    {
        self.progress = Some(Box::new(listener));
        self
    }

    /// Number of stages in the pipeline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no stage has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Status messages of all stages, in pipeline order.
    #[must_use]
    pub fn status_messages(&self) -> Vec<&'static str> {
        self.entries.iter().map(StageEntry::status_message).collect()
    }

    /// The context the stages will operate on.
    #[must_use]
    pub fn context(&self) -> &Ctx {
        &self.context
    }

    /// Run the pipeline, returning the context on success.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::StageFailed` with the original stage error
    /// if a stage's commit failed, or `TransactionError::Cancelled` if
    /// cancellation was observed between stages. In both cases rollback and
    /// cleanup have completed before the error is returned.
    pub fn commit(self) -> Result<Ctx, TransactionError<Err>> {
        let (result, _audit_log) = self.run();
        result
    }

    /// Run the pipeline and return both the result and an audit log of
    /// every stage's commit, rollback and cleanup.
    pub fn commit_with_audit(self) -> (Result<Ctx, TransactionError<Err>>, TransactionAuditLog) {
        self.run()
    }

    fn run(self) -> (Result<Ctx, TransactionError<Err>>, TransactionAuditLog) {
        let Self {
            name,
            mut context,
            mut entries,
            mut cancel_hook,
            mut progress,
        } = self;

        let total = entries.len();
        let span = info_span!("transaction", name = %name, stages = total);
        let _guard = span.enter();

        let mut audit_log =
            TransactionAuditLog::with_stages(entries.iter().map(StageEntry::status_message));
        transition(&mut audit_log, TransactionState::Committing);

        let mut committed: Vec<usize> = Vec::with_capacity(total);
        let mut failure: Option<TransactionError<Err>> = None;

        for (index, entry) in entries.iter_mut().enumerate() {
            let message = entry.status_message();

            if let Some(hook) = cancel_hook.as_mut() {
                if hook.is_requested() {
                    info!(stage = message, index, "cancellation requested");
                    transition(&mut audit_log, TransactionState::Cancelling);
                    hook.run_cleanup();
                    failure = Some(TransactionError::Cancelled {
                        stage: message.to_string(),
                        index,
                    });
                    break;
                }
            }

            if let Some(listener) = progress.as_mut() {
                listener(&StageProgress {
                    index,
                    total,
                    message,
                });
            }

            info!(stage = message, step = index + 1, total, "committing stage");
            audit_log.record_start(index);

            match entry.commit(&mut context) {
                Ok(()) => {
                    audit_log.record_committed(index);
                    committed.push(index);
                }
                Err(error) => {
                    warn!(stage = message, index, error = %error, "stage failed");
                    audit_log.record_failure(index, error.to_string());
                    failure = Some(TransactionError::StageFailed {
                        stage: message.to_string(),
                        index,
                        source: error,
                    });
                    break;
                }
            }
        }

        if failure.is_some() {
            transition(&mut audit_log, TransactionState::RollingBack);
            roll_back(&mut entries, &mut committed, &mut context, &mut audit_log);
        }

        clean_up(&mut entries, &mut context, &mut audit_log);

        match failure {
            None => {
                transition(&mut audit_log, TransactionState::Committed);
                info!("transaction committed");
                (Ok(context), audit_log)
            }
            Some(error) => {
                transition(&mut audit_log, TransactionState::RolledBack);
                info!(stage = error.stage(), cancelled = error.is_cancelled(), "transaction rolled back");
                (Err(error), audit_log)
            }
        }
    }
}

fn transition(audit_log: &mut TransactionAuditLog, next: TransactionState) {
    debug_assert!(
        audit_log.final_state().can_transition_to(next),
        "illegal transition {} -> {next}",
        audit_log.final_state()
    );
    audit_log.set_state(next);
}

fn roll_back<Ctx, Err: Display>(
    entries: &mut [StageEntry<Ctx, Err>],
    committed: &mut Vec<usize>,
    context: &mut Ctx,
    audit_log: &mut TransactionAuditLog,
) {
    while let Some(index) = committed.pop() {
        let entry = &mut entries[index];
        let message = entry.status_message();
        debug!(stage = message, index, "rolling back stage");

        match entry.rollback(context) {
            Some(Ok(())) => audit_log.record_rolled_back(index),
            Some(Err(error)) => {
                warn!(stage = message, index, error = %error, "rollback failed, continuing");
                audit_log.record_rollback_failed(index, error.to_string());
            }
            None => {}
        }
    }
}

fn clean_up<Ctx, Err: Display>(
    entries: &mut [StageEntry<Ctx, Err>],
    context: &mut Ctx,
    audit_log: &mut TransactionAuditLog,
) {
    for (index, entry) in entries.iter_mut().enumerate() {
        let message = entry.status_message();
        match entry.cleanup(context) {
            Some(Ok(())) => audit_log.record_cleanup(index, None),
            Some(Err(error)) => {
                warn!(stage = message, index, error = %error, "cleanup failed");
                audit_log.record_cleanup(index, Some(error.to_string()));
            }
            None => {}
        }
    }
}
