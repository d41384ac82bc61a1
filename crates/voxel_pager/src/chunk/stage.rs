//! One pipeline stage: a dedup queue, an optional worker pool, and a
//! result channel drained by the driver thread.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::TaskError;
use super::location::Location;
use super::queue::UniqueQueue;

/// The three stages of the chunk pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Load,
    Generate,
    Mesh,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Load => "load",
            StageKind::Generate => "generate",
            StageKind::Mesh => "mesh",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) type TaskOutcome<O> = (Location, Result<O, TaskError>);

/// Queue, pool and harvest channel for one stage.
///
/// Only the driver thread touches the queue and the in-flight set. Workers
/// see nothing but their task closure and the sending half of the channel.
pub(crate) struct Stage<O> {
    kind: StageKind,
    queue: UniqueQueue,
    pool: Option<ThreadPool>,
    in_flight: HashSet<Location>,
    /// In-flight locations to queue again once their result is harvested.
    requeue: HashSet<Location>,
    tx: Sender<TaskOutcome<O>>,
    rx: Receiver<TaskOutcome<O>>,
    cancel: Arc<AtomicBool>,
}

impl<O: Send + 'static> Stage<O> {
    /// Create a stage with `threads` workers; zero runs every task inline.
    pub fn new(kind: StageKind, threads: usize, cancel: Arc<AtomicBool>) -> Self {
        let pool = if threads == 0 {
            None
        } else {
            match ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(move |i| format!("chunk-{}-{}", kind, i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    log::error!("failed to build {} pool, running inline: {}", kind, err);
                    None
                }
            }
        };
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            kind,
            queue: UniqueQueue::new(),
            pool,
            in_flight: HashSet::new(),
            requeue: HashSet::new(),
            tx,
            rx,
            cancel,
        }
    }

    /// Queue a location unless it is already queued.
    ///
    /// A location running here is not submitted twice; it is queued again
    /// when its current result is harvested.
    pub fn enqueue(&mut self, location: Location) -> bool {
        if self.in_flight.contains(&location) {
            return self.requeue.insert(location);
        }
        self.queue.push(location)
    }

    pub fn dequeue(&mut self) -> Option<Location> {
        self.queue.pop()
    }

    /// Drop a queued location, including a pending requeue. Work already
    /// running is not affected.
    pub fn unqueue(&mut self, location: Location) -> bool {
        let requeued = self.requeue.remove(&location);
        self.queue.remove(location) || requeued
    }

    pub fn is_queued(&self, location: Location) -> bool {
        self.queue.contains(location)
    }

    pub fn is_in_flight(&self, location: Location) -> bool {
        self.in_flight.contains(&location)
    }

    pub fn contains(&self, location: Location) -> bool {
        self.is_queued(location) || self.is_in_flight(location)
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Run a task on the pool, or inline when the stage has none.
    pub fn submit<F>(&mut self, location: Location, task: F)
    where
        F: FnOnce() -> Result<O, TaskError> + Send + 'static,
    {
        let inline = self.pool.is_none();
        self.dispatch(location, task, inline);
    }

    /// Run a task on the driver thread. Its result is harvested like any other.
    pub fn run_inline<F>(&mut self, location: Location, task: F)
    where
        F: FnOnce() -> Result<O, TaskError> + Send + 'static,
    {
        self.dispatch(location, task, true);
    }

    fn dispatch<F>(&mut self, location: Location, task: F, inline: bool)
    where
        F: FnOnce() -> Result<O, TaskError> + Send + 'static,
    {
        self.in_flight.insert(location);
        let kind = self.kind;
        let cancel = Arc::clone(&self.cancel);
        let tx = self.tx.clone();
        let job = move || {
            let result = if cancel.load(Ordering::Acquire) {
                Err(TaskError::Cancelled { stage: kind, location })
            } else {
                catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
                    Err(TaskError::Panicked {
                        stage: kind,
                        location,
                        message: panic_message(payload.as_ref()),
                    })
                })
            };
            // Receiver is gone only after shutdown.
            let _ = tx.send((location, result));
        };
        log::debug!("{} task submitted for {}", kind, location);
        match (&self.pool, inline) {
            (Some(pool), false) => pool.spawn(job),
            _ => job(),
        }
    }

    /// Take at most one completed result.
    pub fn harvest(&mut self) -> Option<TaskOutcome<O>> {
        let (location, result) = self.rx.try_recv().ok()?;
        self.in_flight.remove(&location);
        if self.requeue.remove(&location) {
            self.queue.push(location);
        }
        log::debug!("{} task harvested for {}", self.kind, location);
        Some((location, result))
    }

    /// Discard queued and in-flight work and release the pool.
    ///
    /// The shared cancel flag must already be set so queued pool jobs exit
    /// without running their task.
    pub fn shutdown(&mut self) {
        self.pool = None;
        self.queue.clear();
        self.in_flight.clear();
        self.requeue.clear();
        while self.rx.try_recv().is_ok() {}
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
