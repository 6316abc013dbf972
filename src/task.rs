/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Execution-context primitives: the host-side task queue and the worker
//! thread loop.
//!
//! Correctness in this crate relies on confinement, not locking. Each context
//! is a single-threaded FIFO loop over a closure channel; state owned by a
//! loop is touched only by tasks running on that loop. The host loop is
//! pumped by the embedder ([`HostQueue::pump`], non-blocking); the worker
//! loop is a dedicated OS thread owned by [`WorkerThread`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::warn;
use parking_lot::Mutex;

type HostTask = Box<dyn FnOnce() + Send + 'static>;

/// The host thread's task queue. Completion callbacks from the worker thread
/// land here and run when the embedder pumps the queue.
pub struct HostQueue {
    tx: Sender<HostTask>,
    rx: Receiver<HostTask>,
}

impl HostQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// A cloneable posting handle for delivering tasks onto this queue from
    /// other threads.
    pub fn poster(&self) -> HostPoster {
        HostPoster {
            tx: self.tx.clone(),
        }
    }

    /// Drain and run every task currently queued, without blocking. Returns
    /// the number of tasks that ran.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}

impl Default for HostQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Posts tasks onto a [`HostQueue`] from any thread.
#[derive(Clone)]
pub struct HostPoster {
    tx: Sender<HostTask>,
}

impl HostPoster {
    /// Returns `false` if the queue has been dropped.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(task)).is_ok()
    }
}

enum WorkerTask<S> {
    Run(Box<dyn FnOnce(&mut S) + Send + 'static>),
    Quit,
}

/// A dedicated worker thread that exclusively owns a piece of state and
/// serializes every access to it through its FIFO task queue.
///
/// Dropping the `WorkerThread` posts a quit marker and joins; tasks already
/// queued still run first.
pub(crate) struct WorkerThread<S> {
    tx: Sender<WorkerTask<S>>,
    join: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> WorkerThread<S> {
    /// Spawn the loop. `init` runs on the worker thread before the first task
    /// so the owned state never exists on any other thread.
    pub(crate) fn spawn(name: &str, init: impl FnOnce() -> S + Send + 'static) -> Self {
        let (tx, rx) = unbounded::<WorkerTask<S>>();
        let thread_name = name.to_owned();
        let join = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let mut state = init();
                while let Ok(task) = rx.recv() {
                    match task {
                        WorkerTask::Run(run) => run(&mut state),
                        WorkerTask::Quit => break,
                    }
                }
            })
            .expect("worker thread should spawn");
        Self {
            tx,
            join: Some(join),
        }
    }

    pub(crate) fn poster(&self) -> WorkerPoster<S> {
        WorkerPoster {
            tx: self.tx.clone(),
        }
    }
}

impl<S> Drop for WorkerThread<S> {
    fn drop(&mut self) {
        if self.tx.send(WorkerTask::Quit).is_err() {
            warn!("worker queue already disconnected at teardown");
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Posts tasks onto a [`WorkerThread`]'s queue from any thread.
pub(crate) struct WorkerPoster<S> {
    tx: Sender<WorkerTask<S>>,
}

impl<S> WorkerPoster<S> {
    /// Returns `false` if the worker loop is gone; the task is dropped.
    pub(crate) fn post(&self, task: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.tx.send(WorkerTask::Run(Box::new(task))).is_ok()
    }
}

impl<S> Clone for WorkerPoster<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// A one-shot completion callback that can be resolved from whichever path
/// wins: the normal worker → host round trip, or a synchronous fallback when
/// one of the loops is already gone. Resolving twice is a no-op.
pub(crate) struct Completion<T> {
    slot: Arc<Mutex<Option<Box<dyn FnOnce(T) + Send + 'static>>>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(done: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(Box::new(done)))),
        }
    }

    pub(crate) fn resolve(&self, value: T) {
        if let Some(done) = self.slot.lock().take() {
            done(value);
        }
    }
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}
