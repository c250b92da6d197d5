//! Asynchronous result handles
//!
//! A [`TaskHandle`] represents a computation that completes later. It is
//! resolved exactly once; continuations registered before resolution run on
//! the resolving call stack, continuations registered afterwards run
//! immediately. Interception chains for `task<T>`-returning members resume
//! result post-processing on continuation rather than on the original call
//! stack.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::InvokeError;
use crate::value::Value;

/// Outcome of an asynchronous computation.
pub type TaskResult = Result<Value, InvokeError>;

type Continuation = Box<dyn FnOnce(&TaskResult) + Send>;

enum TaskState {
    Pending(Vec<Continuation>),
    Done(TaskResult),
}

struct TaskInner {
    state: Mutex<TaskState>,
    done: Condvar,
}

/// Shared handle to an asynchronous result.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskInner>,
}

impl TaskHandle {
    /// Create a handle that has not completed yet.
    pub fn pending() -> Self {
        TaskHandle {
            inner: Arc::new(TaskInner {
                state: Mutex::new(TaskState::Pending(Vec::new())),
                done: Condvar::new(),
            }),
        }
    }

    /// Create a handle already completed with `value`.
    pub fn resolved(value: Value) -> Self {
        Self::completed(Ok(value))
    }

    /// Create a handle already completed with an error.
    pub fn failed(error: InvokeError) -> Self {
        Self::completed(Err(error))
    }

    fn completed(result: TaskResult) -> Self {
        TaskHandle {
            inner: Arc::new(TaskInner {
                state: Mutex::new(TaskState::Done(result)),
                done: Condvar::new(),
            }),
        }
    }

    /// Check whether the handle has completed.
    pub fn is_done(&self) -> bool {
        matches!(*self.inner.state.lock(), TaskState::Done(_))
    }

    /// Complete the handle and run every registered continuation.
    ///
    /// A second resolution is ignored; the first result wins.
    pub fn resolve(&self, result: TaskResult) {
        let continuations = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                TaskState::Done(_) => return,
                TaskState::Pending(waiting) => {
                    let waiting = std::mem::take(waiting);
                    *state = TaskState::Done(result.clone());
                    waiting
                }
            }
        };
        self.inner.done.notify_all();
        for continuation in continuations {
            continuation(&result);
        }
    }

    /// Register a continuation; runs immediately if already completed.
    pub fn on_complete(&self, continuation: impl FnOnce(&TaskResult) + Send + 'static) {
        let result = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                TaskState::Pending(waiting) => {
                    waiting.push(Box::new(continuation));
                    return;
                }
                TaskState::Done(result) => result.clone(),
            }
        };
        continuation(&result);
    }

    /// Derive a new handle whose result is `f` applied to this one's.
    pub fn then(
        &self,
        f: impl FnOnce(TaskResult) -> TaskResult + Send + 'static,
    ) -> TaskHandle {
        let derived = TaskHandle::pending();
        let sink = derived.clone();
        self.on_complete(move |result| sink.resolve(f(result.clone())));
        derived
    }

    /// Block the calling thread until the handle completes.
    pub fn wait(&self) -> TaskResult {
        let mut state = self.inner.state.lock();
        loop {
            if let TaskState::Done(result) = &*state {
                return result.clone();
            }
            self.inner.done.wait(&mut state);
        }
    }

    /// Identity comparison; two clones of one handle are the same task.
    pub fn same_task(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.state.lock() {
            TaskState::Pending(waiting) => f
                .debug_struct("TaskHandle")
                .field("state", &"pending")
                .field("continuations", &waiting.len())
                .finish(),
            TaskState::Done(result) => f
                .debug_struct("TaskHandle")
                .field("state", &"done")
                .field("result", result)
                .finish(),
        }
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_task(other)
    }
}
