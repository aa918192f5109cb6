use crossbeam::channel::{Receiver, Sender, bounded, unbounded};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a submitted job did not hand back a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The job panicked; carries the panic payload rendered as text
    Panicked(String),
    /// The job was dropped without running (pool shut down before it was picked up)
    Lost,
}

/// One-shot handle to the eventual value of a submitted job
pub struct TaskHandle<T> {
    slot: Receiver<Result<T, String>>,
}

impl<T> TaskHandle<T> {
    /// Block until the job has finished
    pub fn wait(self) -> Result<T, TaskFailure> {
        match self.slot.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(TaskFailure::Panicked(message)),
            Err(_) => Err(TaskFailure::Lost),
        }
    }
}

/// Fixed-size pool of OS threads draining a shared work queue
///
/// Each worker runs the bootstrap routine once when it starts and keeps whatever
/// the routine returns alive until the worker exits. That is how per-worker state
/// such as a thread-local log subscriber is scoped to the worker's lifetime.
pub struct WorkerPool {
    work_tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new<B, G>(size: usize, bootstrap: B) -> io::Result<Self>
    where
        B: Fn(usize) -> G + Send + Sync + 'static,
        G: 'static,
    {
        let size = size.max(1);
        let (work_tx, work_rx): (Sender<Job>, Receiver<Job>) = unbounded();
        let bootstrap = std::sync::Arc::new(bootstrap);

        // Partially built pools are torn down by Drop if a spawn fails
        let mut pool = Self {
            work_tx: Some(work_tx),
            workers: Vec::with_capacity(size),
        };

        for worker_id in 0..size {
            let work_rx = work_rx.clone();
            let bootstrap = bootstrap.clone();

            let handle = thread::Builder::new()
                .name(format!("basictools-worker-{worker_id}"))
                .spawn(move || {
                    let _worker_state = bootstrap(worker_id);
                    while let Ok(job) = work_rx.recv() {
                        job();
                    }
                })?;
            pool.workers.push(handle);
        }

        tracing::debug!("Started worker pool with {} threads", pool.workers.len());
        Ok(pool)
    }

    /// Number of worker threads still owned by the pool
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job and get a handle to its result
    pub fn submit<T, F>(&self, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (slot_tx, slot_rx) = bounded(1);
        let wrapped: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| panic_message(payload.as_ref()));
            // The handle may already be gone; nothing left to report to
            let _ = slot_tx.send(outcome);
        });

        if let Some(work_tx) = &self.work_tx {
            // A failed send drops the job and its slot, which the handle sees as Lost
            let _ = work_tx.send(wrapped);
        }

        TaskHandle { slot: slot_rx }
    }

    /// Wait for every handle, keeping the handles' order
    pub fn join_all<T>(handles: Vec<TaskHandle<T>>) -> Vec<Result<T, TaskFailure>> {
        handles.into_iter().map(TaskHandle::wait).collect()
    }

    /// Close the queue and join every worker. Queued jobs still run first.
    pub fn shutdown(&mut self) {
        drop(self.work_tx.take());

        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::warn!("Worker thread {} exited abnormally", name);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
