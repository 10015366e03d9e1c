//! Background worker pool
//!
//! Compile jobs and cache I/O run on a small pool of named threads fed by a
//! crossbeam channel. Jobs are boxed closures; a job never blocks on the
//! game thread.
//!
//! The pool tracks queued + running jobs so callers (tests, shutdown paths)
//! can wait until all background work has drained.

use crate::error::{ComputeGraphError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PendingJobs {
    count: Mutex<usize>,
    idle: Condvar,
}

impl PendingJobs {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    name: String,
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    pending: Arc<PendingJobs>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one).
    pub fn new(name: impl Into<String>, threads: usize) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = unbounded::<Job>();
        let running = Arc::new(AtomicBool::new(true));
        let pending = Arc::new(PendingJobs::default());

        let mut handles = Vec::with_capacity(threads.max(1));
        for index in 0..threads.max(1) {
            let receiver = receiver.clone();
            let running = running.clone();
            let pending = pending.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || Self::run(receiver, running, pending))?;
            handles.push(handle);
        }

        tracing::info!("Started worker pool '{}' with {} threads", name, handles.len());

        Ok(Self {
            name,
            sender: Some(sender),
            handles,
            running,
            pending,
        })
    }

    fn run(receiver: Receiver<Job>, running: Arc<AtomicBool>, pending: Arc<PendingJobs>) {
        while let Ok(job) = receiver.recv() {
            if running.load(Ordering::SeqCst) {
                job();
            }
            pending.decrement();
        }
    }

    /// Queue a job.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ComputeGraphError::Channel(format!("worker pool '{}' is shut down", self.name)))?;
        self.pending.increment();
        sender.send(Box::new(job)).map_err(|_| {
            self.pending.decrement();
            ComputeGraphError::Channel(format!("worker pool '{}' is shut down", self.name))
        })
    }

    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }

    /// Jobs queued or running
    pub fn pending_jobs(&self) -> usize {
        *self.pending.count.lock()
    }

    /// Block until no job is queued or running, or the timeout elapses.
    /// Returns true if the pool drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.pending.count.lock();
        while *count > 0 {
            if self.pending.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Queued jobs are drained without running
        self.running.store(false, Ordering::SeqCst);
        self.sender.take();

        let current = std::thread::current().id();
        for handle in self.handles.drain(..) {
            // The last reference may be released from inside a job
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
        tracing::debug!("Worker pool '{}' stopped", self.name);
    }
}
