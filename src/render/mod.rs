//! Render thread and render proxies
//!
//! The render thread is a dedicated named thread draining a bounded command
//! channel. The game thread talks to it through a cloneable [`RenderQueue`].
//!
//! Render proxies are published by pointer swap on the game thread. The
//! previous proxy is moved into a render command and dropped there, so it
//! outlives every command queued before the swap that may still read it.

pub mod proxy;

pub use proxy::{GraphRenderProxy, KernelInvocation, RenderProxyBuilder};

use crate::error::{ComputeGraphError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default capacity of the render command channel
pub const RENDER_QUEUE_CAPACITY: usize = 1024;

type RenderTask = Box<dyn FnOnce() + Send + 'static>;

/// Commands executed on the render thread.
pub enum RenderCommand {
    /// Run a closure on the render thread.
    Execute(RenderTask),
    /// Reply once every previously queued command has run.
    Flush(Sender<()>),
    Shutdown,
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderCommand::Execute(_) => f.write_str("Execute(..)"),
            RenderCommand::Flush(_) => f.write_str("Flush"),
            RenderCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Game-thread handle for queueing render commands.
#[derive(Clone)]
pub struct RenderQueue {
    sender: Sender<RenderCommand>,
}

impl RenderQueue {
    /// Queue a closure to run on the render thread.
    pub fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(RenderCommand::Execute(Box::new(task)))
            .map_err(|_| ComputeGraphError::Channel("render thread is shut down".to_string()))
    }

    /// Block until every command queued before this call has run.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.sender
            .send(RenderCommand::Flush(tx))
            .map_err(|_| ComputeGraphError::Channel("render thread is shut down".to_string()))?;
        rx.recv_timeout(timeout)
            .map_err(|e| ComputeGraphError::Channel(format!("render thread flush failed: {}", e)))
    }

    /// Drop `value` on the render thread.
    pub fn release_on_render_thread<T: Send + 'static>(&self, value: T) {
        if let Err(e) = self.enqueue(move || drop(value)) {
            // Thread is gone, nothing can still be reading it
            tracing::debug!("Releasing on the calling thread: {}", e);
        }
    }
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderQueue")
            .field("queued", &self.sender.len())
            .finish()
    }
}

/// The dedicated render thread.
pub struct RenderThread {
    queue: RenderQueue,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl RenderThread {
    pub fn spawn() -> Result<Self> {
        Self::spawn_with_capacity(RENDER_QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(capacity: usize) -> Result<Self> {
        let (sender, receiver) = bounded(capacity.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = std::thread::Builder::new()
            .name("render".to_string())
            .spawn(move || Self::run(receiver, thread_running))?;

        tracing::info!("Render thread started");

        Ok(Self {
            queue: RenderQueue { sender },
            handle: Some(handle),
            running,
        })
    }

    fn run(receiver: Receiver<RenderCommand>, running: Arc<AtomicBool>) {
        while let Ok(command) = receiver.recv() {
            match command {
                RenderCommand::Execute(task) => task(),
                RenderCommand::Flush(reply) => {
                    let _ = reply.send(());
                }
                RenderCommand::Shutdown => break,
            }
        }
        running.store(false, Ordering::SeqCst);
        tracing::debug!("Render thread exiting");
    }

    pub fn queue(&self) -> RenderQueue {
        self.queue.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        let _ = self.queue.sender.send(RenderCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl fmt::Debug for RenderThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderThread")
            .field("running", &self.is_running())
            .finish()
    }
}
