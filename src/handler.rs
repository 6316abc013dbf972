/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Capability traits at the registry's seams: scheme handlers, the jobs they
//! produce, and interceptors that wrap a fallback dispatcher.
//!
//! A handler is an opaque callable capability: given a request descriptor it
//! produces a job that can be started and cancelled. The job protocol beyond
//! start/cancel/complete is deliberately out of scope here.

use url::Url;

/// Descriptor for one resource request entering the dispatch table.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub url: Url,
    pub method: String,
    /// Referrer of the initiating document, used by handlers that gate loads
    /// (the file handler refuses requests referred by web content).
    pub referrer: Option<Url>,
}

impl ResourceRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_owned(),
            referrer: None,
        }
    }

    /// Scheme of the request URL, already lowercased by URL normalization.
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }
}

/// Response payload delivered by a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePayload {
    pub mime: Option<String>,
    pub body: Vec<u8>,
}

/// Terminal outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Delivered(ResponsePayload),
    Failed(String),
}

/// Completion callback handed to [`FetchJob::start`]. Invoked at most once.
pub type JobSink = Box<dyn FnOnce(JobOutcome) + Send + 'static>;

/// A response-producing job minted by a handler for one request.
pub trait FetchJob: Send {
    /// Begin servicing the request. The sink may be invoked from any thread;
    /// the caller is responsible for hopping the outcome back to where it is
    /// consumed.
    fn start(&mut self, sink: JobSink);

    /// Best-effort cancellation. A cancelled job must not invoke its sink.
    fn cancel(&mut self);
}

/// Capability that turns a request for a given scheme into a servicing job.
/// Returning `None` declines the request, letting dispatch fall through to
/// the next layer of the chain.
pub trait SchemeHandler: Send {
    fn create_job(&self, request: &ResourceRequest) -> Option<Box<dyn FetchJob>>;
}

impl<F> SchemeHandler for F
where
    F: Fn(&ResourceRequest) -> Option<Box<dyn FetchJob>> + Send,
{
    fn create_job(&self, request: &ResourceRequest) -> Option<Box<dyn FetchJob>> {
        self(request)
    }
}

/// Anything that can route a request to a job. Interceptors receive the rest
/// of the chain behind this trait so they can decline and defer.
pub trait RequestDispatcher {
    fn dispatch(&self, request: &ResourceRequest) -> Box<dyn FetchJob>;
}

/// A handler-like wrapper around a fallback dispatcher. An interceptor may
/// serve the request itself or call `fallback.dispatch(request)` to defer.
pub trait Interceptor: Send {
    fn intercept(
        &self,
        request: &ResourceRequest,
        fallback: &dyn RequestDispatcher,
    ) -> Box<dyn FetchJob>;
}

/// A job whose outcome is fully known at creation time. Used by the terminal
/// dispatcher and the synchronous built-ins.
pub struct InlineJob {
    outcome: Option<JobOutcome>,
}

impl InlineJob {
    pub fn boxed(outcome: JobOutcome) -> Box<dyn FetchJob> {
        Box::new(Self {
            outcome: Some(outcome),
        })
    }

    pub fn delivered(mime: Option<&str>, body: Vec<u8>) -> Box<dyn FetchJob> {
        Self::boxed(JobOutcome::Delivered(ResponsePayload {
            mime: mime.map(str::to_owned),
            body,
        }))
    }

    pub fn failed(reason: impl Into<String>) -> Box<dyn FetchJob> {
        Self::boxed(JobOutcome::Failed(reason.into()))
    }
}

impl FetchJob for InlineJob {
    fn start(&mut self, sink: JobSink) {
        if let Some(outcome) = self.outcome.take() {
            sink(outcome);
        }
    }

    fn cancel(&mut self) {
        self.outcome = None;
    }
}
