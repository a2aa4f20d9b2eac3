use crate::stage::Stage;

pub(crate) type BoxedStage<Ctx, Err> = Box<dyn Stage<Context = Ctx, Error = Err>>;

/// A stage plus the bookkeeping that guarantees each of its hooks runs at
/// most once per transaction.
pub(crate) struct StageEntry<Ctx, Err> {
    stage: BoxedStage<Ctx, Err>,
    committed: bool,
    rolled_back: bool,
    cleaned_up: bool,
}

impl<Ctx, Err> StageEntry<Ctx, Err> {
    pub(crate) fn new(stage: BoxedStage<Ctx, Err>) -> Self {
        Self {
            stage,
            committed: false,
            rolled_back: false,
            cleaned_up: false,
        }
    }

    pub(crate) fn status_message(&self) -> &'static str {
        self.stage.status_message()
    }

    pub(crate) fn commit(&mut self, ctx: &mut Ctx) -> Result<(), Err> {
        self.stage.commit(ctx)?;
        self.committed = true;
        Ok(())
    }

    /// Returns `None` when the stage never committed or was already rolled
    /// back; the stage is not called in that case.
    pub(crate) fn rollback(&mut self, ctx: &mut Ctx) -> Option<Result<(), Err>> {
        if !self.committed || self.rolled_back {
            return None;
        }
        self.rolled_back = true;
        Some(self.stage.rollback(ctx))
    }

    /// Returns `None` when cleanup already ran.
    pub(crate) fn cleanup(&mut self, ctx: &mut Ctx) -> Option<Result<(), Err>> {
        if self.cleaned_up {
            return None;
        }
        self.cleaned_up = true;
        Some(self.stage.cleanup(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Calls {
        log: Vec<&'static str>,
    }

    #[derive(Debug, PartialEq)]
    struct TestError;

    struct RecordingStage {
        fail_commit: bool,
    }

    impl Stage for RecordingStage {
        type Context = Calls;
        type Error = TestError;

        fn status_message(&self) -> &'static str {
            "recording"
        }

        fn commit(&mut self, ctx: &mut Self::Context) -> Result<(), Self::Error> {
            ctx.log.push("commit");
            if self.fail_commit {
                return Err(TestError);
            }
            Ok(())
        }

        fn rollback(&mut self, ctx: &mut Self::Context) -> Result<(), Self::Error> {
            ctx.log.push("rollback");
            Ok(())
        }

        fn cleanup(&mut self, ctx: &mut Self::Context) -> Result<(), Self::Error> {
            ctx.log.push("cleanup");
            Ok(())
        }
    }

    fn entry(fail_commit: bool) -> StageEntry<Calls, TestError> {
        StageEntry::new(Box::new(RecordingStage { fail_commit }))
    }

    #[test]
    fn entry_delegates_status_message() {
        assert_eq!(entry(false).status_message(), "recording");
    }

    #[test]
    fn rollback_is_skipped_without_successful_commit() {
        let mut ctx = Calls::default();
        let mut entry = entry(true);

        assert_eq!(entry.commit(&mut ctx), Err(TestError));
        assert!(entry.rollback(&mut ctx).is_none());
        assert_eq!(ctx.log, vec!["commit"]);
    }

    #[test]
    fn rollback_runs_at_most_once() {
        let mut ctx = Calls::default();
        let mut entry = entry(false);

        assert_eq!(entry.commit(&mut ctx), Ok(()));
        assert_eq!(entry.rollback(&mut ctx), Some(Ok(())));
        assert!(entry.rollback(&mut ctx).is_none());
        assert_eq!(ctx.log, vec!["commit", "rollback"]);
    }

    #[test]
    fn cleanup_runs_once_even_without_commit() {
        let mut ctx = Calls::default();
        let mut entry = entry(false);

        assert_eq!(entry.cleanup(&mut ctx), Some(Ok(())));
        assert!(entry.cleanup(&mut ctx).is_none());
        assert_eq!(ctx.log, vec!["cleanup"]);
    }
}
