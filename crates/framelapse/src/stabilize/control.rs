use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::result::StabilizationProgress;

/// Cooperative cancellation flag, checked between passes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-run hooks: a progress observer and a cancellation token.
#[derive(Default)]
pub struct RunControl<'a> {
    progress: Option<&'a mut dyn FnMut(&StabilizationProgress)>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> RunControl<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: &'a mut dyn FnMut(&StabilizationProgress)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn emit(&mut self, progress: StabilizationProgress) {
        if let Some(cb) = self.progress.as_mut() {
            cb(&progress);
        }
    }
}

impl std::fmt::Debug for RunControl<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunControl")
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}
