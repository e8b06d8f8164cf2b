//! Fixed-size worker pool for cascade jobs
//!
//! Jobs are boxed closures sent over a crossbeam channel to named worker
//! threads. [`CascadeWorkerPool::run_indexed`] fans a job out over indices
//! and joins on a bounded result channel. A panicking job is caught so the
//! worker stays alive, and the job's result sender is dropped, which the
//! join sees as a missing result.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{Result, ShadowError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker threads shared by all cascades
pub struct CascadeWorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl CascadeWorkerPool {
    /// Spawn `size` workers (at least one)
    pub fn new(size: usize) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size.max(1));

        for index in 0..size.max(1) {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("shadow-cascade-{index}"))
                .spawn(move || worker_loop(index, receiver))
                .map_err(ShadowError::WorkerSpawn)?;
            workers.push(handle);
        }

        log::debug!("Cascade worker pool started with {} threads", workers.len());
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(ShadowError::PoolClosed)?;
        sender.send(Box::new(job)).map_err(|_| ShadowError::PoolClosed)
    }

    /// Run `job(index)` for every index in `0..count` and wait for all of them
    ///
    /// Slot `i` holds the result of `job(i)`, or `None` if that job panicked
    /// or could not be queued.
    pub fn run_indexed<T, F>(&self, count: usize, job: F) -> Vec<Option<T>>
    where
        T: Send + 'static,
        F: Fn(usize) -> T + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let (sender, receiver) = crossbeam_channel::bounded::<(usize, T)>(count);

        let mut dispatched = 0;
        for index in 0..count {
            let job = Arc::clone(&job);
            let sender = sender.clone();
            let queued = self.execute(move || {
                let result = job(index);
                // The receiver outlives every job of this batch
                let _ = sender.send((index, result));
            });
            match queued {
                Ok(()) => dispatched += 1,
                Err(err) => log::error!("Job {index} not scheduled: {err}"),
            }
        }
        drop(sender);

        // One result per queued job, or disconnect once every remaining job
        // has dropped its sender
        let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
        for _ in 0..dispatched {
            match receiver.recv() {
                Ok((index, result)) => results[index] = Some(result),
                Err(_) => break,
            }
        }
        results
    }
}

fn worker_loop(index: usize, jobs: Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!("Cascade worker {index} job panicked");
        }
    }
    log::trace!("Cascade worker {index} exiting");
}

impl Drop for CascadeWorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("Cascade worker thread panicked during shutdown");
            }
        }
    }
}

impl std::fmt::Debug for CascadeWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeWorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}
