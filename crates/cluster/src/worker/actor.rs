//! Worker actors
//!
//! Each `WorkerNode` lives on a dedicated OS thread and is driven by an
//! unbounded command channel. Callers only ever hold a `WorkerHandle`.

use std::thread::{self, JoinHandle};

use num_bigint::BigUint;
use primebench_math::Factorization;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::node::{WorkerId, WorkerNode, WorkerSettings, WorkerStats};

/// Worker communication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Worker {0} is not accepting commands")]
    Unavailable(WorkerId),

    #[error("Worker {0} dropped the reply")]
    ReplyDropped(WorkerId),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Commands understood by a worker thread
#[derive(Debug)]
pub enum WorkerCommand {
    FindPrime {
        bits: u64,
        max_attempts: u32,
        reply: oneshot::Sender<Option<BigUint>>,
    },
    Factor {
        number: BigUint,
        max_retries: u32,
        reply: oneshot::Sender<Factorization>,
    },
    Stats {
        reply: oneshot::Sender<WorkerStats>,
    },
    Shutdown,
}

/// A submitted task whose result has not been collected yet
#[derive(Debug)]
pub struct Pending<T> {
    worker_id: WorkerId,
    receiver: oneshot::Receiver<T>,
}

impl<T> Pending<T> {
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Wait for the worker to answer
    pub async fn wait(self) -> Result<T, WorkerError> {
        self.receiver
            .await
            .map_err(|_| WorkerError::ReplyDropped(self.worker_id))
    }
}

/// Cloneable address of a worker thread
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    worker_id: WorkerId,
    sender: mpsc::UnboundedSender<WorkerCommand>,
}

impl WorkerHandle {
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Queue a prime search without waiting for it
    pub fn submit_find_prime(
        &self,
        bits: u64,
        max_attempts: u32,
    ) -> Result<Pending<Option<BigUint>>, WorkerError> {
        let (reply, receiver) = oneshot::channel();
        self.send(WorkerCommand::FindPrime {
            bits,
            max_attempts,
            reply,
        })?;
        Ok(self.pending(receiver))
    }

    /// Queue a factorization without waiting for it
    pub fn submit_factor(
        &self,
        number: BigUint,
        max_retries: u32,
    ) -> Result<Pending<Factorization>, WorkerError> {
        let (reply, receiver) = oneshot::channel();
        self.send(WorkerCommand::Factor {
            number,
            max_retries,
            reply,
        })?;
        Ok(self.pending(receiver))
    }

    pub async fn find_prime(
        &self,
        bits: u64,
        max_attempts: u32,
    ) -> Result<Option<BigUint>, WorkerError> {
        self.submit_find_prime(bits, max_attempts)?.wait().await
    }

    pub async fn factor(
        &self,
        number: BigUint,
        max_retries: u32,
    ) -> Result<Factorization, WorkerError> {
        self.submit_factor(number, max_retries)?.wait().await
    }

    /// Snapshot the worker's counters
    pub async fn stats(&self) -> Result<WorkerStats, WorkerError> {
        let (reply, receiver) = oneshot::channel();
        self.send(WorkerCommand::Stats { reply })?;
        self.pending(receiver).wait().await
    }

    fn send(&self, command: WorkerCommand) -> Result<(), WorkerError> {
        self.sender
            .send(command)
            .map_err(|_| WorkerError::Unavailable(self.worker_id))
    }

    fn pending<T>(&self, receiver: oneshot::Receiver<T>) -> Pending<T> {
        Pending {
            worker_id: self.worker_id,
            receiver,
        }
    }

    /// Handle whose worker is already gone
    #[cfg(test)]
    pub(crate) fn disconnected(worker_id: WorkerId) -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self { worker_id, sender }
    }
}

fn run_worker(mut node: WorkerNode, mut commands: mpsc::UnboundedReceiver<WorkerCommand>) {
    let worker_id = node.worker_id();
    debug!(worker_id, "worker thread started");

    while let Some(command) = commands.blocking_recv() {
        match command {
            WorkerCommand::FindPrime {
                bits,
                max_attempts,
                reply,
            } => {
                let _ = reply.send(node.find_prime(bits, max_attempts));
            }
            WorkerCommand::Factor {
                number,
                max_retries,
                reply,
            } => {
                let _ = reply.send(node.factor(&number, max_retries));
            }
            WorkerCommand::Stats { reply } => {
                let _ = reply.send(node.stats());
            }
            WorkerCommand::Shutdown => break,
        }
    }

    debug!(worker_id, "worker thread stopped");
}

/// A fixed set of worker threads
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<WorkerHandle>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers sharing `node_id` and `settings`
    pub fn spawn(
        size: usize,
        node_id: &str,
        settings: WorkerSettings,
    ) -> Result<Self, WorkerError> {
        let mut handles = Vec::with_capacity(size);
        let mut threads = Vec::with_capacity(size);

        for worker_id in 0..size {
            let (sender, receiver) = mpsc::unbounded_channel();
            let node = WorkerNode::new(worker_id, node_id, settings);

            let thread = thread::Builder::new()
                .name(format!("primebench-worker-{worker_id}"))
                .spawn(move || run_worker(node, receiver))
                .map_err(|e| WorkerError::Spawn(e.to_string()))?;

            handles.push(WorkerHandle { worker_id, sender });
            threads.push(thread);
        }

        info!(size, node_id, "worker pool started");
        Ok(Self { handles, threads })
    }

    pub fn handles(&self) -> &[WorkerHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every worker and join its thread.
    ///
    /// Blocks until queued commands are drained, so call it from a blocking
    /// context when running inside the runtime.
    pub fn shutdown(self) {
        for handle in &self.handles {
            let _ = handle.sender.send(WorkerCommand::Shutdown);
        }
        drop(self.handles);

        for thread in self.threads {
            let name = thread.thread().name().unwrap_or("worker").to_string();
            if thread.join().is_err() {
                warn!(thread = %name, "worker thread panicked");
            }
        }
        info!("worker pool stopped");
    }
}
