//! Fan-out executor.
//!
//! # Design
//! - Every task is spawned onto the runtime up front; nothing waits for a
//!   sibling before being dispatched.
//! - A single collector drains the `JoinSet` and feeds each outcome to the
//!   per-task handler in completion order.
//! - The completion continuation fires exactly once, after the last outcome has
//!   been handled. An empty batch completes immediately.
//! - Task failures (including panics) never cancel siblings.

use std::any::Any;
use std::future::Future;

use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Outcome delivered to the per-task handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    /// Task ran to completion and produced a value.
    Completed(T),
    /// Task panicked before producing a value.
    Panicked {
        /// Panic payload rendered as text when possible.
        message: String,
    },
    /// Task was cancelled by the runtime (for example during shutdown).
    Cancelled,
}

impl<T> TaskOutcome<T> {
    /// Returns the produced value, if the task completed.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Panicked { .. } | Self::Cancelled => None,
        }
    }

    fn from_join_error(err: JoinError) -> Self {
        if err.is_panic() {
            Self::Panicked {
                message: panic_message(err.into_panic()),
            }
        } else {
            Self::Cancelled
        }
    }
}

/// Counts reported once a batch has fully drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of tasks handed to the runtime.
    pub dispatched: usize,
    /// Number of outcomes delivered to the per-task handler.
    pub delivered: usize,
}

impl BatchReport {
    /// Whether every dispatched task has been delivered exactly once.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.dispatched == self.delivered
    }
}

/// Ordered batch of independent asynchronous tasks.
///
/// The order only determines the index passed to the handler; tasks complete
/// and are handled in whatever order the runtime finishes them.
pub struct FanOut<F> {
    tasks: Vec<F>,
}

impl<F> FanOut<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    /// Build a batch from the supplied tasks.
    #[must_use]
    pub fn new(tasks: impl IntoIterator<Item = F>) -> Self {
        Self {
            tasks: tasks.into_iter().collect(),
        }
    }

    /// Number of tasks in the batch.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the batch holds no tasks.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Dispatch every task and hand each outcome to `on_completed` as it lands.
    ///
    /// `on_completed` receives the task's position in the original batch along
    /// with its outcome. The returned future resolves once every task has been
    /// delivered. Dispatched tasks are detached from the collector: dropping the
    /// returned future stops delivery but never cancels work already in flight.
    pub async fn run_all<H>(self, mut on_completed: H) -> BatchReport
    where
        H: FnMut(usize, TaskOutcome<F::Output>),
    {
        let mut report = BatchReport {
            dispatched: self.tasks.len(),
            delivered: 0,
        };
        if report.dispatched == 0 {
            return report;
        }

        let mut set = JoinSet::new();
        for (index, task) in self.tasks.into_iter().enumerate() {
            let handle = tokio::spawn(task);
            set.spawn(async move { (index, handle.await) });
        }
        debug!(tasks = report.dispatched, "fan-out batch dispatched");

        let mut pending = vec![true; report.dispatched];
        while let Some(joined) = set.join_next().await {
            let (index, result) = match joined {
                Ok(slot) => slot,
                Err(err) => {
                    warn!(error = %err, "fan-out collector lost a task slot");
                    continue;
                }
            };
            let outcome = match result {
                Ok(value) => TaskOutcome::Completed(value),
                Err(err) => {
                    let outcome = TaskOutcome::from_join_error(err);
                    if let TaskOutcome::Panicked { message } = &outcome {
                        warn!(task = index, panic = %message, "fan-out task panicked");
                    }
                    outcome
                }
            };
            pending[index] = false;
            on_completed(index, outcome);
            report.delivered += 1;
        }

        // Slots whose collector was cancelled still owe the handler an outcome.
        for (index, _) in pending.iter().enumerate().filter(|(_, open)| **open) {
            on_completed(index, TaskOutcome::Cancelled);
            report.delivered += 1;
        }

        debug_assert!(report.is_balanced(), "fan-out delivered {report:?}");
        report
    }

    /// Dispatch the batch in the background and return immediately.
    ///
    /// `on_all_done` runs exactly once, after `on_completed` has returned for
    /// the final task. For an empty batch it runs without dispatching anything.
    pub fn spawn_all<H, D>(self, on_completed: H, on_all_done: D) -> JoinHandle<()>
    where
        H: FnMut(usize, TaskOutcome<F::Output>) + Send + 'static,
        D: FnOnce(BatchReport) + Send + 'static,
    {
        tokio::spawn(async move {
            let report = self.run_all(on_completed).await;
            on_all_done(report);
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload.downcast_ref::<&'static str>().map_or_else(
            || "task panicked with a non-string payload".to_string(),
            |message| (*message).to_string(),
        ),
    }
}
