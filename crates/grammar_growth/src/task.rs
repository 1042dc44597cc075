//! Time-sliced execution of resumable computations.
//!
//! A [`Stepwise`] computation advances in small, bounded steps. A [`Task`]
//! drives one in bursts: each call to [`Task::run_burst`] runs at least one
//! step and keeps stepping until the burst budget elapses or the computation
//! finishes. This lets a frame loop spend a fixed slice of time per frame on a
//! long generation without blocking.
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    /// More work remains.
    Pending,
    /// The computation finished with this output.
    Done(T),
}

/// A computation that can be advanced one bounded step at a time.
pub trait Stepwise {
    type Output;

    /// Performs one unit of work. Must not be called again after returning
    /// [`Step::Done`] or an error.
    fn step(&mut self) -> Result<Step<Self::Output>>;
}

/// Outcome of one burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Burst {
    /// Budget exhausted before the computation finished.
    Pending,
    /// The computation has finished; its output is available.
    Completed,
    /// The task was cancelled and will never complete.
    Cancelled,
}

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Timing and work counters of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskStats {
    /// Wall-clock time from the first burst to completion (or the latest burst).
    pub elapsed: Duration,
    /// Time spent inside bursts.
    pub busy: Duration,
    /// Number of bursts run.
    pub bursts: usize,
    /// Number of steps run.
    pub steps: usize,
}

/// Shared flag used to cancel a [`Task`] from elsewhere, e.g. another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

type Callback<T> = Box<dyn FnOnce(&T, &TaskStats) + Send>;

/// Drives a [`Stepwise`] computation in time-budgeted bursts.
pub struct Task<S: Stepwise> {
    computation: S,
    budget: Duration,
    cancel: CancelHandle,
    state: TaskState,
    output: Option<S::Output>,
    started: Option<Instant>,
    stats: TaskStats,
    callbacks: Vec<Callback<S::Output>>,
}

impl<S: Stepwise> Task<S> {
    /// Wraps `computation`, giving each burst roughly `budget` of wall-clock time.
    pub fn new(computation: S, budget: Duration) -> Self {
        Self {
            computation,
            budget,
            cancel: CancelHandle::new(),
            state: TaskState::Running,
            output: None,
            started: None,
            stats: TaskStats::default(),
            callbacks: Vec::new(),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn set_budget(&mut self, budget: Duration) {
        self.budget = budget;
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Whether the task reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.state != TaskState::Running
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    /// The wrapped computation, for progress inspection.
    pub fn computation(&self) -> &S {
        &self.computation
    }

    /// Output of a completed task, unless it was taken.
    pub fn output(&self) -> Option<&S::Output> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<S::Output> {
        self.output.take()
    }

    /// Requests cancellation.
    ///
    /// Takes effect at the start of the next burst. A burst that finishes the
    /// computation after the request still ends cancelled: its output is
    /// dropped and no callback runs.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Registers `callback` to run once with the output when the task completes.
    ///
    /// On an already completed task the callback runs immediately, unless the
    /// output was taken with [`Task::take_output`]; then it is dropped. Callbacks
    /// of cancelled or failed tasks never run.
    pub fn then<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&S::Output, &TaskStats) + Send + 'static,
    {
        match (self.state, &self.output) {
            (TaskState::Completed, Some(output)) => callback(output, &self.stats),
            (TaskState::Completed, None) => {
                debug!("task output already taken, callback dropped");
            }
            (TaskState::Running, _) => self.callbacks.push(Box::new(callback)),
            _ => {}
        }
        self
    }

    /// Runs one burst: at least one step, then more until the budget elapses or
    /// the computation finishes.
    ///
    /// A step error fails the task; the error is returned now and on every
    /// later call.
    pub fn run_burst(&mut self) -> Result<Burst> {
        match self.state {
            TaskState::Completed => return Ok(Burst::Completed),
            TaskState::Cancelled => return Ok(Burst::Cancelled),
            TaskState::Failed => {
                return Err(Error::Other("task failed in an earlier burst".into()))
            }
            TaskState::Running => {}
        }

        if self.cancel.is_cancelled() {
            debug!(steps = self.stats.steps, "task cancelled");
            self.state = TaskState::Cancelled;
            self.callbacks.clear();
            return Ok(Burst::Cancelled);
        }

        let burst_start = Instant::now();
        let started = *self.started.get_or_insert(burst_start);
        self.stats.bursts += 1;

        loop {
            let step = match self.computation.step() {
                Ok(step) => step,
                Err(e) => {
                    self.finish_burst(burst_start, started);
                    self.state = TaskState::Failed;
                    self.callbacks.clear();
                    return Err(e);
                }
            };
            self.stats.steps += 1;

            match step {
                Step::Done(output) => {
                    self.finish_burst(burst_start, started);
                    if self.cancel.is_cancelled() {
                        debug!(steps = self.stats.steps, "task cancelled on completion");
                        self.state = TaskState::Cancelled;
                        self.callbacks.clear();
                        return Ok(Burst::Cancelled);
                    }
                    self.state = TaskState::Completed;
                    debug!(
                        bursts = self.stats.bursts,
                        steps = self.stats.steps,
                        elapsed_ms = self.stats.elapsed.as_secs_f64() * 1000.0,
                        "task completed"
                    );
                    for callback in self.callbacks.drain(..) {
                        callback(&output, &self.stats);
                    }
                    self.output = Some(output);
                    return Ok(Burst::Completed);
                }
                Step::Pending => {
                    if burst_start.elapsed() >= self.budget {
                        self.finish_burst(burst_start, started);
                        trace!(steps = self.stats.steps, "burst budget exhausted");
                        return Ok(Burst::Pending);
                    }
                }
            }
        }
    }

    fn finish_burst(&mut self, burst_start: Instant, started: Instant) {
        self.stats.busy += burst_start.elapsed();
        self.stats.elapsed = started.elapsed();
    }

    /// Runs bursts back to back, yielding the thread between them, and returns
    /// the output with the final statistics.
    pub fn run_to_completion(mut self) -> Result<(S::Output, TaskStats)> {
        loop {
            match self.run_burst()? {
                Burst::Pending => std::thread::yield_now(),
                Burst::Completed => {
                    let stats = self.stats;
                    return self
                        .output
                        .take()
                        .map(|output| (output, stats))
                        .ok_or_else(|| Error::Other("task output was already taken".into()));
                }
                Burst::Cancelled => return Err(Error::Cancelled),
            }
        }
    }
}

impl<S: Stepwise> fmt::Debug for Task<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state)
            .field("budget", &self.budget)
            .field("stats", &self.stats)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
