//! Integration test: clock ticks re-evaluate clocked components.

use std::sync::Arc;

use gatesim_core::{Location, Value};
use gatesim_propagator::{Propagator, PropagatorConfig};
use gatesim_test_utils::build_circuit;
use gatesim_test_utils::fixtures::{ClockSource, Constant, DFlipFlop};

fn loc(x: i32, y: i32) -> Location {
    Location::new(x, y)
}

#[test]
fn clock_source_toggles_per_tick() {
    let circuit = build_circuit("clock", |c| {
        c.add_component(Arc::new(ClockSource), loc(0, 0)).unwrap();
    });
    let mut p = Propagator::new(circuit, PropagatorConfig::default()).unwrap();
    let root = p.root_state();
    p.propagate();
    assert_eq!(p.value_at(root, loc(0, 0)), Value::FALSE);

    p.tick();
    assert_eq!(p.tick_count(), 1);
    p.propagate();
    assert_eq!(p.value_at(root, loc(0, 0)), Value::TRUE);

    p.tick();
    p.propagate();
    assert_eq!(p.value_at(root, loc(0, 0)), Value::FALSE);
}

#[test]
fn flip_flop_latches_on_tick() {
    let circuit = build_circuit("latch", |c| {
        c.add_component(Arc::new(Constant::new(Value::TRUE)), loc(0, 0))
            .unwrap();
        c.add_component(Arc::new(DFlipFlop), loc(4, 0)).unwrap();
        c.add_wire(loc(0, 0), loc(4, 0)).unwrap();
    });
    let mut p = Propagator::new(circuit, PropagatorConfig::default()).unwrap();
    let root = p.root_state();
    p.propagate();
    assert_eq!(p.value_at(root, loc(4, 0)), Value::TRUE);
    assert!(p.value_at(root, loc(6, 0)).is_unknown());

    p.tick();
    p.propagate();
    assert_eq!(p.value_at(root, loc(6, 0)), Value::TRUE);

    // Reset clears component memory and the tick count.
    p.reset();
    p.propagate();
    assert_eq!(p.tick_count(), 0);
    assert!(p.value_at(root, loc(6, 0)).is_unknown());
}
