/// Cooperative cancellation registered on a transaction.
///
/// The predicate is polled only between stages. The cleanup action runs at
/// most once, the first time the predicate reports a cancellation request.
pub(crate) struct CancelHook {
    should_cancel: Box<dyn FnMut() -> bool>,
    on_cancel: Option<Box<dyn FnOnce()>>,
}

impl CancelHook {
    pub(crate) fn new<P, F>(should_cancel: P, on_cancel: F) -> Self
    where
        P: FnMut() -> bool + 'static,
        F: FnOnce() + 'static,
    {
        Self {
            should_cancel: Box::new(should_cancel),
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    pub(crate) fn is_requested(&mut self) -> bool {
        (self.should_cancel)()
    }

    pub(crate) fn run_cleanup(&mut self) {
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}
