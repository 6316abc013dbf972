//! Handler-chain scenarios: construction precedence, interceptor ordering,
//! intercept/unintercept symmetry, and the synthesized built-ins, observed
//! through real dispatch on the worker thread.

use std::sync::Arc;

use embednet::{
    FetchJob, HandlerChainBuilder, InlineJob, Interceptor, JobOutcome, RequestDispatcher,
    ResourceRequest,
};
use parking_lot::Mutex;

use super::harness::{NetHarness, tag_handler};

struct TraceInterceptor {
    tag: &'static str,
    trace: Arc<Mutex<Vec<&'static str>>>,
}

impl Interceptor for TraceInterceptor {
    fn intercept(
        &self,
        request: &ResourceRequest,
        fallback: &dyn RequestDispatcher,
    ) -> Box<dyn FetchJob> {
        self.trace.lock().push(self.tag);
        fallback.dispatch(request)
    }
}

#[test]
fn construction_override_takes_precedence_over_the_builtin() {
    let harness = NetHarness::with_chain(
        HandlerChainBuilder::new().with_handler("https", tag_handler("override")),
    );
    assert_eq!(harness.fetch_body("https://example.com/page"), "override");
}

#[test]
fn interceptors_see_requests_in_reverse_supplied_order() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let harness = NetHarness::with_chain(
        HandlerChainBuilder::new()
            .with_handler("acme", tag_handler("terminal"))
            .with_interceptor(TraceInterceptor {
                tag: "A",
                trace: Arc::clone(&trace),
            })
            .with_interceptor(TraceInterceptor {
                tag: "B",
                trace: Arc::clone(&trace),
            }),
    );

    assert_eq!(harness.fetch_body("acme://panel"), "terminal");
    assert_eq!(*trace.lock(), vec!["B", "A"]);
}

#[test]
fn interceptor_may_short_circuit_the_whole_table() {
    struct ShortCircuit;
    impl Interceptor for ShortCircuit {
        fn intercept(
            &self,
            _request: &ResourceRequest,
            _fallback: &dyn RequestDispatcher,
        ) -> Box<dyn FetchJob> {
            InlineJob::delivered(None, b"intercepted".to_vec())
        }
    }

    let harness = NetHarness::with_chain(
        HandlerChainBuilder::new()
            .with_handler("acme", tag_handler("never"))
            .with_interceptor(ShortCircuit),
    );
    assert_eq!(harness.fetch_body("acme://panel"), "intercepted");
    // The interceptor is outermost, so even built-ins are shadowed.
    assert_eq!(harness.fetch_body("about:blank"), "intercepted");
}

#[test]
fn intercept_then_unintercept_restores_dispatch_to_the_original() {
    let harness = NetHarness::new();
    assert_eq!(harness.register_tag("acme", "h1"), Ok(()));
    assert_eq!(harness.fetch_body("acme://panel"), "h1");

    assert_eq!(harness.intercept_tag("acme", "h2"), Ok(()));
    assert_eq!(harness.fetch_body("acme://panel"), "h2");

    assert_eq!(harness.unintercept("acme"), Ok(()));
    assert_eq!(harness.fetch_body("acme://panel"), "h1");
}

#[test]
fn about_version_is_synthesized_in_process() {
    let harness = NetHarness::new();
    let body = harness.fetch_body("about:version");
    assert!(body.contains(embednet::VERSION));
}

#[test]
fn data_urls_are_served_by_the_builtin() {
    let harness = NetHarness::new();
    match harness.fetch("data:text/csv,foo,bar") {
        JobOutcome::Delivered(payload) => {
            assert_eq!(payload.mime.as_deref(), Some("text/csv"));
            assert_eq!(payload.body, b"foo,bar");
        }
        JobOutcome::Failed(reason) => panic!("data fetch failed: {reason}"),
    }
}

#[test]
fn unhandled_schemes_reach_the_terminal_dispatcher() {
    let harness = NetHarness::new();
    assert_eq!(
        harness.fetch("gopher://hole"),
        JobOutcome::Failed("no handler for scheme: gopher".to_owned())
    );
}
