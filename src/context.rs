/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Request-context lifecycle: the host-thread handle and the worker-thread
//! core.
//!
//! The handle is cheap and created when a browsing session is created; it
//! holds pending network parameters until first real use and drives two-phase
//! shutdown. The core is expensive and constructed lazily, exactly once, on
//! the worker thread that exclusively owns it; no locking guards its
//! initialization flag because that thread serializes every access.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::builtins;
use crate::dispatch::{HandlerChainBuilder, SchemeDispatchTable};
use crate::handler::{FetchJob, JobOutcome, ResourceRequest};
use crate::registry::ProtocolRegistry;
use crate::session::{self, SessionRecord, SessionToken};
use crate::task::{Completion, HostPoster, WorkerPoster, WorkerThread};

const DEFAULT_USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; embednet/", env!("CARGO_PKG_VERSION"), ")");

/// Cache behavior requested for a network context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CachePolicy {
    Disabled,
    #[default]
    InMemory,
    OnDisk,
}

/// Network parameters captured on the host thread before the core exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetParams {
    /// Empty means "fill in the default at first-use initialization".
    pub user_agent: String,
    pub cache_policy: CachePolicy,
    pub proxy: Option<String>,
    pub storage_path: Option<PathBuf>,
    pub enable_ftp: bool,
}

impl Default for NetParams {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            cache_policy: CachePolicy::default(),
            proxy: None,
            storage_path: None,
            enable_ftp: false,
        }
    }
}

/// The browsing session that owns a request context. The handle keeps only a
/// weak back-reference for lookup; ownership stays with the embedder.
#[derive(Debug)]
pub struct BrowsingSession {
    label: String,
}

impl BrowsingSession {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// The live network-context object: parameters plus the scheme dispatch
/// table. Exists only on the worker thread, inside [`RequestContextCore`].
pub struct NetworkContext {
    params: NetParams,
    table: SchemeDispatchTable,
}

impl NetworkContext {
    fn new(params: NetParams, chain: HandlerChainBuilder) -> Self {
        let table = chain.build(builtins::builtin_table(&params));
        Self { params, table }
    }

    pub fn params(&self) -> &NetParams {
        &self.params
    }

    pub fn dispatch(&self, request: &ResourceRequest) -> Box<dyn FetchJob> {
        self.table.dispatch(request)
    }

    pub(crate) fn table(&self) -> &SchemeDispatchTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut SchemeDispatchTable {
        &mut self.table
    }
}

/// What [`RequestContextCore::get`] yields: either the live context or the
/// shutting-down sentinel.
pub(crate) enum CoreState<'a> {
    Ready(&'a mut NetworkContext),
    ShuttingDown,
}

/// Worker-thread owner of the network context. Constructed cheaply on the
/// host and moved onto the worker thread before first use; every field is
/// thereafter confined to that thread.
pub struct RequestContextCore {
    params: NetParams,
    chain: Option<HandlerChainBuilder>,
    context: Option<NetworkContext>,
    /// Read and written only on the worker thread; the single-threaded loop
    /// cannot reenter itself, so no lock is needed.
    initialized: bool,
    shutting_down: bool,
    construction_count: u32,
}

impl RequestContextCore {
    fn new(params: NetParams, chain: HandlerChainBuilder) -> Self {
        Self {
            params,
            chain: Some(chain),
            context: None,
            initialized: false,
            shutting_down: false,
            construction_count: 0,
        }
    }

    /// Construct the network context on first call, return the cached object
    /// on every later call, and refuse to construct anything once shutdown
    /// has been signaled.
    pub(crate) fn get(&mut self) -> CoreState<'_> {
        if self.shutting_down {
            return CoreState::ShuttingDown;
        }
        if !self.initialized {
            self.initialized = true;
            self.construction_count += 1;
            let chain = self.chain.take().unwrap_or_default();
            self.context = Some(NetworkContext::new(self.params.clone(), chain));
            info!(
                "network context constructed (build #{}, {} schemes serviced)",
                self.construction_count,
                self.context
                    .as_ref()
                    .map(|ctx| ctx.table().scheme_count())
                    .unwrap_or(0)
            );
        }
        match self.context.as_mut() {
            Some(context) => CoreState::Ready(context),
            // Initialized but torn down: only reachable mid-shutdown.
            None => CoreState::ShuttingDown,
        }
    }

    /// First phase of teardown, run on the worker thread. After this, every
    /// `get()` resolves to the sentinel and the table stops existing.
    pub(crate) fn signal_shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;
        if let Some(context) = self.context.take() {
            info!(
                "network context shutting down; releasing dispatch table with {} schemes",
                context.table().scheme_count()
            );
        } else {
            info!("network context shutting down before first use");
        }
    }

    #[cfg(test)]
    pub(crate) fn construction_count(&self) -> u32 {
        self.construction_count
    }
}

/// Host-thread handle for one request context.
///
/// Not for cross-thread use: interior state is `Cell`/`RefCell` and every
/// method must be called from the host thread that created the handle.
pub struct RequestContextHandle {
    token: SessionToken,
    owner: Weak<BrowsingSession>,
    params: RefCell<NetParams>,
    host: HostPoster,
    initialized: Cell<bool>,
    core_created: Cell<bool>,
    shut_down: Cell<bool>,
    worker: RefCell<Option<WorkerThread<RequestContextCore>>>,
}

impl RequestContextHandle {
    /// Create the handle when its browsing session is created. Cheap; the
    /// expensive core is not built until [`Self::create_core`].
    pub fn new(params: NetParams, host: HostPoster, owner: Weak<BrowsingSession>) -> Self {
        Self {
            token: SessionToken::next(),
            owner,
            params: RefCell::new(params),
            host,
            initialized: Cell::new(false),
            core_created: Cell::new(false),
            shut_down: Cell::new(false),
            worker: RefCell::new(None),
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Look up the owning browsing session. Lookup only; the handle never
    /// keeps the session alive.
    pub fn resource_lookup(&self) -> Option<Arc<BrowsingSession>> {
        self.owner.upgrade()
    }

    /// Update pending configuration. Ignored with a warning once the core
    /// exists, since the captured parameters have already been consumed.
    pub fn set_params(&self, params: NetParams) {
        if self.core_created.get() {
            warn!("ignoring parameter update after core creation");
            return;
        }
        *self.params.borrow_mut() = params;
    }

    pub fn params(&self) -> NetParams {
        self.params.borrow().clone()
    }

    /// One-time lazy initialization: derive default parameters and announce
    /// the session to the process-wide map. Idempotent; later calls no-op.
    pub(crate) fn prepare(&self) {
        if self.initialized.get() {
            return;
        }
        self.initialized.set(true);

        let mut params = self.params.borrow_mut();
        if params.user_agent.is_empty() {
            params.user_agent = DEFAULT_USER_AGENT.to_owned();
        }
        let label = self
            .resource_lookup()
            .map(|session| session.label().to_owned())
            .unwrap_or_else(|| "detached".to_owned());
        session::insert(
            self.token,
            SessionRecord {
                label: label.clone(),
                storage_path: params.storage_path.clone(),
            },
        );
        info!("request context {:?} initialized for session {label:?}", self.token);
    }

    /// Spawn the worker thread and hand it the chain to build at first use.
    ///
    /// May be called at most once per handle; a second call is a caller bug
    /// and panics. Calling after [`Self::shutdown`] likewise panics.
    pub fn create_core(&self, chain: HandlerChainBuilder) -> CoreHandle {
        assert!(
            !self.core_created.get(),
            "create_core may only be called once per request context handle"
        );
        assert!(
            !self.shut_down.get(),
            "create_core called on a shut-down request context handle"
        );
        self.core_created.set(true);
        self.prepare();

        let params = self.params.borrow().clone();
        let worker = WorkerThread::spawn("embednet-net", move || {
            RequestContextCore::new(params, chain)
        });
        let poster = worker.poster();
        *self.worker.borrow_mut() = Some(worker);
        info!("request context {:?} core thread started", self.token);

        CoreHandle {
            worker: poster,
            host: self.host.clone(),
        }
    }

    /// Two-phase teardown. Posts the shutdown notice to the worker thread
    /// before returning (so it is scheduled ahead of handle destruction) and
    /// delivers `on_ack` on the host queue once the worker has acknowledged.
    /// If the worker thread is already gone, tears down synchronously and
    /// acknowledges inline.
    ///
    /// Must be called exactly once; a second call is a caller bug and panics.
    pub fn shutdown(&self, on_ack: impl FnOnce() + Send + 'static) {
        assert!(
            !self.shut_down.get(),
            "shutdown may only be called once per request context handle"
        );
        self.shut_down.set(true);
        session::remove(self.token);

        let worker_slot = self.worker.borrow();
        let Some(worker) = worker_slot.as_ref() else {
            info!("request context {:?} shut down before core creation", self.token);
            on_ack();
            return;
        };

        let ack = Completion::new(move |()| on_ack());
        let host = self.host.clone();
        let worker_ack = ack.clone();
        let posted = worker.poster().post(move |core| {
            core.signal_shutdown();
            if !host.post(move || worker_ack.resolve(())) {
                warn!("host queue gone before shutdown acknowledgement");
            }
        });
        if posted {
            info!("request context {:?} shutdown notice posted", self.token);
        } else {
            // Worker loop already exited; nothing left to notify, so tear
            // down synchronously and acknowledge inline.
            warn!(
                "request context {:?} worker gone at shutdown; tearing down synchronously",
                self.token
            );
            ack.resolve(());
        }
    }
}

impl Drop for RequestContextHandle {
    fn drop(&mut self) {
        if !self.shut_down.get() && self.core_created.get() {
            warn!(
                "request context {:?} dropped without shutdown; worker torn down implicitly",
                self.token
            );
        }
    }
}

/// Cross-thread reference to a live core: the value returned by
/// [`RequestContextHandle::create_core`]. Cheap to clone; every clone posts
/// onto the same worker queue.
#[derive(Clone)]
pub struct CoreHandle {
    worker: WorkerPoster<RequestContextCore>,
    host: HostPoster,
}

impl CoreHandle {
    /// The mutation façade for this core's dispatch table.
    pub fn registry(&self) -> ProtocolRegistry {
        ProtocolRegistry::new(self.worker.clone(), self.host.clone())
    }

    /// Route one request through the live dispatch table. The outcome is
    /// delivered on the host queue; requests issued after shutdown fail with
    /// a shutting-down outcome and touch nothing.
    pub fn fetch(&self, request: ResourceRequest, done: impl FnOnce(JobOutcome) + Send + 'static) {
        let completion = Completion::new(done);
        let host = self.host.clone();
        let worker_completion = completion.clone();
        let posted = self.worker.post(move |core| {
            match core.get() {
                CoreState::ShuttingDown => {
                    let _ = host.post(move || {
                        worker_completion
                            .resolve(JobOutcome::Failed("request context is shutting down".to_owned()))
                    });
                }
                CoreState::Ready(context) => {
                    let mut job = context.dispatch(&request);
                    let completion_host = host.clone();
                    job.start(Box::new(move |outcome| {
                        let _ = completion_host.post(move || worker_completion.resolve(outcome));
                    }));
                }
            }
        });
        if !posted {
            completion.resolve(JobOutcome::Failed("request context is shutting down".to_owned()));
        }
    }
}
