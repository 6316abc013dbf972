//! Registry mutation scenarios: the literal error cases, round trips, and
//! in-flight bookkeeping, each driven through the real host/worker loops.

use embednet::RegistryError;

use super::harness::NetHarness;

#[test]
fn unregister_on_an_empty_table_reports_not_registered() {
    let harness = NetHarness::new();
    assert_eq!(harness.unregister("foo"), Err(RegistryError::NotRegistered));
}

#[test]
fn second_register_after_first_completes_reports_already_registered() {
    let harness = NetHarness::new();
    assert_eq!(harness.register_tag("foo", "h1"), Ok(()));
    assert_eq!(
        harness.register_tag("foo", "h2"),
        Err(RegistryError::AlreadyRegistered)
    );
}

#[test]
fn intercept_before_any_register_reports_not_registered() {
    let harness = NetHarness::new();
    assert_eq!(
        harness.intercept_tag("foo", "h2"),
        Err(RegistryError::NotRegistered)
    );
}

#[test]
fn unintercept_without_prior_intercept_reports_not_intercepted() {
    let harness = NetHarness::new();
    assert_eq!(harness.unintercept("foo"), Err(RegistryError::NotIntercepted));
}

#[test]
fn register_then_unregister_round_trips_to_the_prior_state() {
    let harness = NetHarness::new();
    assert!(!harness.is_handled("acme"));

    assert_eq!(harness.register_tag("acme", "h1"), Ok(()));
    assert!(harness.is_handled("acme"));

    assert_eq!(harness.unregister("acme"), Ok(()));
    assert!(!harness.is_handled("acme"));

    // Re-registering succeeds, so the table really is back where it started.
    assert_eq!(harness.register_tag("acme", "h1"), Ok(()));
}

#[test]
fn registered_scheme_is_observed_by_dispatch() {
    let harness = NetHarness::new();
    assert_eq!(harness.register_tag("acme", "h1"), Ok(()));
    assert_eq!(harness.fetch_body("acme://panel"), "h1");
}

#[test]
fn builtin_schemes_report_as_handled() {
    let harness = NetHarness::new();
    for scheme in ["about", "data", "file", "http", "https", "ws", "wss"] {
        assert!(harness.is_handled(scheme), "{scheme} should be handled");
    }
    assert!(!harness.is_handled("gopher"));
}

#[test]
fn intercept_of_a_builtin_only_scheme_reports_intercept_failed() {
    let harness = NetHarness::new();
    assert_eq!(
        harness.intercept_tag("data", "h2"),
        Err(RegistryError::InterceptFailed)
    );
}

#[test]
fn runtime_register_may_shadow_a_builtin_scheme() {
    let harness = NetHarness::new();
    assert_eq!(harness.register_tag("https", "override"), Ok(()));
    assert_eq!(harness.fetch_body("https://example.com/"), "override");

    // Removing the override leaves the built-in behind.
    assert_eq!(harness.unregister("https"), Ok(()));
    assert!(harness.is_handled("https"));
}

#[test]
fn scheme_ids_reports_builtins_and_runtime_registrations() {
    let harness = NetHarness::new();
    assert_eq!(harness.register_tag("acme", "h1"), Ok(()));
    let schemes = harness.scheme_ids();
    assert!(schemes.contains(&"acme".to_owned()));
    assert!(schemes.contains(&"https".to_owned()));
    assert!(schemes.windows(2).all(|pair| pair[0] < pair[1]), "sorted, deduped");
}

#[test]
fn scheme_names_are_case_insensitive_at_the_api_boundary() {
    let harness = NetHarness::new();
    assert_eq!(harness.register_tag("AcMe", "h1"), Ok(()));
    assert!(harness.is_handled("ACME"));
    assert_eq!(
        harness.register_tag("acme", "h2"),
        Err(RegistryError::AlreadyRegistered)
    );
}

#[test]
fn pending_mutation_count_returns_to_zero_after_completion() {
    let harness = NetHarness::new();
    assert_eq!(harness.register_tag("acme", "h1"), Ok(()));
    assert_eq!(harness.registry.pending_mutations(), 0);
}

#[test]
fn serialized_same_scheme_mutations_apply_in_issue_order() {
    let harness = NetHarness::new();
    // Each call waits for its completion callback, the contract under which
    // same-scheme ordering is guaranteed.
    assert_eq!(harness.register_tag("acme", "h1"), Ok(()));
    assert_eq!(harness.unregister("acme"), Ok(()));
    assert_eq!(harness.register_tag("acme", "h2"), Ok(()));
    assert_eq!(harness.fetch_body("acme://panel"), "h2");
}
