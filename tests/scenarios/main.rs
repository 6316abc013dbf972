use embednet::VERSION;

mod chaining;
mod harness;
mod registry_ops;

#[test]
fn scenarios_binary_smoke_runs() {
    assert!(!VERSION.is_empty());
}
