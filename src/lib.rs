/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Pluggable URL-scheme protocol registry and request-context lifecycle for
//! embedded browser runtimes.
//!
//! Two single-threaded execution contexts are involved: the **host thread**,
//! where the embedder calls [`ProtocolRegistry`] and receives completion
//! callbacks, and the **worker thread**, which exclusively owns the live
//! dispatch table inside [`context::RequestContextCore`]. All cross-thread
//! communication is post-and-callback over FIFO queues; the dispatch table is
//! never shared by reference across threads.
//!
//! The embedder owns the host loop: create a [`HostQueue`], hand its poster to
//! a [`RequestContextHandle`], call [`RequestContextHandle::create_core`] with
//! a [`HandlerChainBuilder`], and pump the queue to deliver results.

pub mod builtins;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod registry;
pub mod session;
pub mod task;

pub use context::{
    BrowsingSession, CachePolicy, CoreHandle, NetParams, RequestContextHandle,
};
pub use dispatch::HandlerChainBuilder;
pub use error::RegistryError;
pub use handler::{
    FetchJob, InlineJob, Interceptor, JobOutcome, JobSink, RequestDispatcher, ResourceRequest,
    ResponsePayload, SchemeHandler,
};
pub use registry::ProtocolRegistry;
pub use session::{SessionRecord, SessionToken};
pub use task::{HostPoster, HostQueue};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
