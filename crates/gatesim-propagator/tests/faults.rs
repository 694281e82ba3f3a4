//! Integration test: component faults are contained and recorded.

use std::sync::Arc;

use gatesim_core::{ComponentError, ComponentId, Location, Value};
use gatesim_propagator::{FaultReason, Propagator, PropagatorConfig};
use gatesim_test_utils::build_circuit;
use gatesim_test_utils::fixtures::{FailingComponent, NotGate, PanickingComponent};

fn loc(x: i32, y: i32) -> Location {
    Location::new(x, y)
}

#[test]
fn failing_component_does_not_stop_the_round() {
    let failing = Arc::new(FailingComponent::new(0));
    let circuit = build_circuit("c", |c| {
        c.add_component(failing.clone(), loc(0, 0)).unwrap();
        c.add_component(Arc::new(NotGate::new(1)), loc(0, 10)).unwrap();
    });
    let mut p = Propagator::new(circuit, PropagatorConfig::default()).unwrap();
    let root = p.root_state();
    p.set_value(root, loc(0, 10), Value::TRUE, ComponentId::next(), 1);
    let metrics = p.propagate();

    assert_eq!(p.value_at(root, loc(2, 10)), Value::FALSE);
    assert!(metrics.faults >= 1);
    assert!(failing.calls() >= 1);
    let fault = &p.faults()[0];
    assert_eq!(fault.name, "failing");
    assert!(matches!(
        fault.reason,
        FaultReason::Error(ComponentError::ExecutionFailed { .. })
    ));
    // A faulting component drives nothing.
    assert!(p.value_at(root, loc(2, 0)).is_unknown());
}

#[test]
fn panicking_component_is_caught() {
    let circuit = build_circuit("c", |c| {
        c.add_component(Arc::new(PanickingComponent), loc(0, 0)).unwrap();
        c.add_component(Arc::new(NotGate::new(1)), loc(0, 10)).unwrap();
    });
    let mut p = Propagator::new(circuit, PropagatorConfig::default()).unwrap();
    let root = p.root_state();
    p.set_value(root, loc(0, 10), Value::FALSE, ComponentId::next(), 1);
    p.propagate();

    assert_eq!(p.value_at(root, loc(2, 10)), Value::TRUE);
    let FaultReason::Panic(message) = &p.faults()[0].reason else {
        panic!("expected a panic fault, got {:?}", p.faults()[0].reason);
    };
    assert!(message.contains("deliberate panic"));

    p.reset();
    assert!(p.faults().is_empty());
}
