/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The caller-facing protocol registry: a thin, thread-hopping façade over
//! the worker-owned dispatch table.
//!
//! Every operation returns immediately on the host thread; the mutation runs
//! on the worker thread and the result comes back through a callback posted
//! onto the host queue. Mutations take effect for dispatch the moment the
//! worker-side task completes, not when the host-side call returns.
//!
//! Ordering caveat: each queue is FIFO, but two overlapping mutations on the
//! same scheme still race with each other. Callers that need a dependent
//! mutation must wait for the first operation's completion callback before
//! issuing the second.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::context::{CoreState, RequestContextCore};
use crate::dispatch::SchemeDispatchTable;
use crate::error::RegistryError;
use crate::handler::SchemeHandler;
use crate::task::{Completion, HostPoster, WorkerPoster};

/// One registry call in flight: created when the caller invokes an operation,
/// applied on the worker thread, dropped once the host-side callback has run.
struct PendingMutation {
    scheme: String,
    op: MutationOp,
    handler: Option<Box<dyn SchemeHandler>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationOp {
    Register,
    Unregister,
    Intercept,
    Unintercept,
}

impl PendingMutation {
    fn apply(self, table: &mut SchemeDispatchTable) -> Result<(), RegistryError> {
        match (self.op, self.handler) {
            (MutationOp::Register, Some(handler)) => table.register(&self.scheme, handler),
            (MutationOp::Unregister, None) => table.unregister(&self.scheme),
            (MutationOp::Intercept, Some(handler)) => table.intercept(&self.scheme, handler),
            (MutationOp::Unintercept, None) => table.unintercept(&self.scheme),
            // A handler present/absent where the operation says otherwise is
            // a bug in this façade, not a caller condition.
            _ => Err(RegistryError::OperationFailed),
        }
    }
}

/// Host-thread façade for mutating a core's scheme dispatch table. Owns no
/// table state, only the posting handles and in-flight bookkeeping.
#[derive(Clone)]
pub struct ProtocolRegistry {
    worker: WorkerPoster<RequestContextCore>,
    host: HostPoster,
    in_flight: Arc<AtomicUsize>,
}

impl ProtocolRegistry {
    pub(crate) fn new(worker: WorkerPoster<RequestContextCore>, host: HostPoster) -> Self {
        Self {
            worker,
            host,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Install a handler for `scheme`. Fails with `AlreadyRegistered` if a
    /// live entry exists.
    pub fn register(
        &self,
        scheme: &str,
        handler: impl SchemeHandler + 'static,
        done: impl FnOnce(Result<(), RegistryError>) + Send + 'static,
    ) {
        self.mutate(scheme, MutationOp::Register, Some(Box::new(handler)), done);
    }

    /// Remove the handler for `scheme`. Fails with `NotRegistered` if no
    /// entry exists.
    pub fn unregister(
        &self,
        scheme: &str,
        done: impl FnOnce(Result<(), RegistryError>) + Send + 'static,
    ) {
        self.mutate(scheme, MutationOp::Unregister, None, done);
    }

    /// Replace the live handler for `scheme`, shelving the original for a
    /// later [`Self::unintercept`]. Fails with `NotRegistered` when nothing
    /// is registered and `InterceptFailed` when the scheme is handled but not
    /// replaceable.
    pub fn intercept(
        &self,
        scheme: &str,
        handler: impl SchemeHandler + 'static,
        done: impl FnOnce(Result<(), RegistryError>) + Send + 'static,
    ) {
        self.mutate(scheme, MutationOp::Intercept, Some(Box::new(handler)), done);
    }

    /// Restore the shelved original for `scheme`. Fails with `NotIntercepted`
    /// if nothing is shelved.
    pub fn unintercept(
        &self,
        scheme: &str,
        done: impl FnOnce(Result<(), RegistryError>) + Send + 'static,
    ) {
        self.mutate(scheme, MutationOp::Unintercept, None, done);
    }

    /// Whether any entry (registered or intercepted or built-in) currently
    /// services `scheme`. Never fails; reports `false` once shutdown has been
    /// signaled, since the table no longer serves dispatch.
    pub fn is_handled(&self, scheme: &str, done: impl FnOnce(bool) + Send + 'static) {
        let scheme = scheme.to_ascii_lowercase();
        self.query(move |table| table.is_handled(&scheme), false, done);
    }

    /// Every scheme the live table currently services, for diagnostics.
    pub fn scheme_ids(&self, done: impl FnOnce(Vec<String>) + Send + 'static) {
        self.query(|table| table.scheme_ids(), Vec::new(), done);
    }

    /// Read-only table query; `fallback` answers once shutdown has been
    /// signaled or a loop is gone.
    fn query<T: Clone + Send + 'static>(
        &self,
        read: impl FnOnce(&SchemeDispatchTable) -> T + Send + 'static,
        fallback: T,
        done: impl FnOnce(T) + Send + 'static,
    ) {
        let completion = Completion::new(done);
        let host = self.host.clone();
        let worker_completion = completion.clone();
        let worker_fallback = fallback.clone();
        let posted = self.worker.post(move |core| {
            let value = match core.get() {
                CoreState::Ready(context) => read(context.table()),
                CoreState::ShuttingDown => worker_fallback,
            };
            if !host.post(move || worker_completion.resolve(value)) {
                debug!("host queue gone; query result dropped");
            }
        });
        if !posted {
            completion.resolve(fallback);
        }
    }

    /// Number of mutations posted but not yet resolved on the host side.
    pub fn pending_mutations(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn mutate(
        &self,
        scheme: &str,
        op: MutationOp,
        handler: Option<Box<dyn SchemeHandler>>,
        done: impl FnOnce(Result<(), RegistryError>) + Send + 'static,
    ) {
        let pending = PendingMutation {
            scheme: scheme.to_ascii_lowercase(),
            op,
            handler,
        };
        debug!("posting {:?} for {}", pending.op, pending.scheme);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let completion = {
            let in_flight = Arc::clone(&self.in_flight);
            Completion::new(move |result| {
                in_flight.fetch_sub(1, Ordering::SeqCst);
                done(result);
            })
        };
        let host = self.host.clone();
        let worker_completion = completion.clone();
        let posted = self.worker.post(move |core| {
            let result = match core.get() {
                CoreState::Ready(context) => pending.apply(context.table_mut()),
                CoreState::ShuttingDown => Err(RegistryError::ShuttingDown),
            };
            if !host.post(move || worker_completion.resolve(result)) {
                debug!("host queue gone; mutation result dropped");
            }
        });
        if !posted {
            // Worker thread already gone: resolve without touching any table.
            completion.resolve(Err(RegistryError::ShuttingDown));
        }
    }
}
