//! Shared scaffolding for the registry/lifecycle scenarios: a real host
//! queue, a real worker thread, and helpers that issue one operation and
//! pump the host loop until its completion callback lands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use embednet::{
    BrowsingSession, CoreHandle, FetchJob, HandlerChainBuilder, HostQueue, InlineJob, JobOutcome,
    NetParams, ProtocolRegistry, RegistryError, RequestContextHandle, ResourceRequest,
    SchemeHandler,
};
use parking_lot::Mutex;
use url::Url;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler serving a fixed tag as its body, for observing which handler a
/// request was routed to.
pub fn tag_handler(tag: &'static str) -> impl SchemeHandler + 'static {
    move |_req: &ResourceRequest| -> Option<Box<dyn FetchJob>> {
        Some(InlineJob::delivered(Some("text/plain"), tag.as_bytes().to_vec()))
    }
}

pub struct NetHarness {
    pub host: HostQueue,
    pub session: Arc<BrowsingSession>,
    pub handle: RequestContextHandle,
    pub core: CoreHandle,
    pub registry: ProtocolRegistry,
}

impl NetHarness {
    pub fn new() -> Self {
        Self::with_chain(HandlerChainBuilder::new())
    }

    pub fn with_chain(chain: HandlerChainBuilder) -> Self {
        let host = HostQueue::new();
        let session = Arc::new(BrowsingSession::new("scenario"));
        let handle = RequestContextHandle::new(
            NetParams::default(),
            host.poster(),
            Arc::downgrade(&session),
        );
        let core = handle.create_core(chain);
        let registry = core.registry();
        Self {
            host,
            session,
            handle,
            core,
            registry,
        }
    }

    /// Pump the host loop until the slot fills, failing the test on timeout.
    pub fn wait<T>(&self, slot: &Arc<Mutex<Option<T>>>) -> T {
        let deadline = Instant::now() + CALLBACK_TIMEOUT;
        loop {
            self.host.pump();
            if let Some(value) = slot.lock().take() {
                return value;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for a completion callback"
            );
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn register_tag(&self, scheme: &str, tag: &'static str) -> Result<(), RegistryError> {
        let slot = Arc::new(Mutex::new(None));
        let done = Arc::clone(&slot);
        self.registry
            .register(scheme, tag_handler(tag), move |result| {
                *done.lock() = Some(result)
            });
        self.wait(&slot)
    }

    pub fn unregister(&self, scheme: &str) -> Result<(), RegistryError> {
        let slot = Arc::new(Mutex::new(None));
        let done = Arc::clone(&slot);
        self.registry
            .unregister(scheme, move |result| *done.lock() = Some(result));
        self.wait(&slot)
    }

    pub fn intercept_tag(&self, scheme: &str, tag: &'static str) -> Result<(), RegistryError> {
        let slot = Arc::new(Mutex::new(None));
        let done = Arc::clone(&slot);
        self.registry
            .intercept(scheme, tag_handler(tag), move |result| {
                *done.lock() = Some(result)
            });
        self.wait(&slot)
    }

    pub fn unintercept(&self, scheme: &str) -> Result<(), RegistryError> {
        let slot = Arc::new(Mutex::new(None));
        let done = Arc::clone(&slot);
        self.registry
            .unintercept(scheme, move |result| *done.lock() = Some(result));
        self.wait(&slot)
    }

    pub fn is_handled(&self, scheme: &str) -> bool {
        let slot = Arc::new(Mutex::new(None));
        let done = Arc::clone(&slot);
        self.registry
            .is_handled(scheme, move |handled| *done.lock() = Some(handled));
        self.wait(&slot)
    }

    pub fn scheme_ids(&self) -> Vec<String> {
        let slot = Arc::new(Mutex::new(None));
        let done = Arc::clone(&slot);
        self.registry
            .scheme_ids(move |schemes| *done.lock() = Some(schemes));
        self.wait(&slot)
    }

    pub fn fetch(&self, url: &str) -> JobOutcome {
        let slot = Arc::new(Mutex::new(None));
        let done = Arc::clone(&slot);
        let request = ResourceRequest::get(Url::parse(url).expect("scenario url should parse"));
        self.core
            .fetch(request, move |outcome| *done.lock() = Some(outcome));
        self.wait(&slot)
    }

    /// Fetch and unwrap the delivered body as text, failing on job failure.
    pub fn fetch_body(&self, url: &str) -> String {
        match self.fetch(url) {
            JobOutcome::Delivered(payload) => String::from_utf8_lossy(&payload.body).into_owned(),
            JobOutcome::Failed(reason) => panic!("fetch of {url} failed: {reason}"),
        }
    }

    /// Drive shutdown to its acknowledgement callback.
    pub fn shutdown(&self) {
        let slot = Arc::new(Mutex::new(None));
        let done = Arc::clone(&slot);
        self.handle.shutdown(move || *done.lock() = Some(()));
        self.wait(&slot);
    }
}
