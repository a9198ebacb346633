//! Cancellation scope for background workers.
//!
//! Host applications hand an [`ExecutionContext`] to every component that
//! spawns a worker. Terminating the context delivers a stop signal to each
//! registered worker and blocks until all of them have finished their final
//! work.
use std::sync::{Arc, Condvar, Mutex};

struct ContextState {
    state: Mutex<State>,
    idle: Condvar,
}

struct State {
    canceled: bool,
    cancel_fns: Vec<Box<dyn Fn() + Send>>,
    active: usize,
}

/// A cancelable execution scope. Cheap to clone; clones share the same
/// cancellation state.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextState>,
}

impl Default for ExecutionContext {
    fn default() -> ExecutionContext {
        ExecutionContext::new()
    }
}

impl ExecutionContext {
    pub fn new() -> ExecutionContext {
        ExecutionContext {
            inner: Arc::new(ContextState {
                state: Mutex::new(State {
                    canceled: false,
                    cancel_fns: Vec::new(),
                    active: 0,
                }),
                idle: Condvar::new(),
            }),
        }
    }

    /// Register a worker with this context.
    ///
    /// `on_cancel` is invoked when the context terminates (immediately, if it
    /// already has). The returned guard must be held by the worker and
    /// dropped only after its final work completes;
    /// [`ExecutionContext::terminate_and_wait`] blocks until every guard is
    /// gone.
    pub fn register<F: Fn() + Send + 'static>(&self, on_cancel: F) -> WorkerGuard {
        let mut state = self
            .inner
            .state
            .lock()
            .expect("thread holding execution context lock should not panic");
        state.active += 1;
        if state.canceled {
            // Deliver the signal outside the lock so the callback may block.
            drop(state);
            on_cancel();
        } else {
            state.cancel_fns.push(Box::new(on_cancel));
        }

        WorkerGuard {
            inner: self.inner.clone(),
        }
    }

    /// Cancel every registered worker and block until all of them have
    /// finished. Returns immediately when called again after completion.
    pub fn terminate_and_wait(&self) {
        let cancel_fns = {
            let mut state = self
                .inner
                .state
                .lock()
                .expect("thread holding execution context lock should not panic");
            state.canceled = true;
            std::mem::take(&mut state.cancel_fns)
        };

        for cancel in &cancel_fns {
            cancel();
        }

        let mut state = self
            .inner
            .state
            .lock()
            .expect("thread holding execution context lock should not panic");
        while state.active > 0 {
            state = self
                .inner
                .idle
                .wait(state)
                .expect("thread holding execution context lock should not panic");
        }
    }
}

/// Keeps a worker registered with its [`ExecutionContext`]. Dropping the
/// guard marks the worker as finished.
pub struct WorkerGuard {
    inner: Arc<ContextState>,
}

impl WorkerGuard {
    /// Explicitly mark the worker as finished. Equivalent to dropping.
    pub fn done(self) {}
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let mut state = self
            .inner
            .state
            .lock()
            .expect("thread holding execution context lock should not panic");
        state.active -= 1;
        if state.active == 0 {
            self.inner.idle.notify_all();
        }
    }
}
