//! Integration test: hierarchical circuits get one state per instance.

use std::sync::Arc;

use gatesim_circuit::Circuit;
use gatesim_core::{BitWidth, ComponentId, Direction, Location, Value};
use gatesim_propagator::{Propagator, PropagatorConfig};
use gatesim_test_utils::fixtures::NotGate;
use gatesim_test_utils::{build_circuit, edit};

fn loc(x: i32, y: i32) -> Location {
    Location::new(x, y)
}

/// An inverter exposed through pins `in` at (0,0) and `out` at (2,0).
fn inverter_cell() -> Arc<Circuit> {
    build_circuit("inverter-cell", |c| {
        c.add_pin("in", loc(0, 0), Direction::Input, BitWidth::ONE).unwrap();
        c.add_pin("out", loc(2, 0), Direction::Output, BitWidth::ONE).unwrap();
        c.add_component(Arc::new(NotGate::new(1)), loc(0, 0)).unwrap();
    })
}

#[test]
fn instances_are_simulated_independently() {
    let cell = inverter_cell();
    let mut ids = Vec::new();
    let top = build_circuit("top", |c| {
        ids.push(c.add_subcircuit(cell.clone(), loc(0, 0)).unwrap());
        ids.push(c.add_subcircuit(cell.clone(), loc(0, 10)).unwrap());
    });
    let mut p = Propagator::new(top, PropagatorConfig::default()).unwrap();
    let root = p.root_state();
    let stimulus = ComponentId::next();
    p.set_value(root, loc(0, 0), Value::TRUE, stimulus, 1);
    p.set_value(root, loc(0, 10), Value::FALSE, stimulus, 1);
    p.propagate();

    assert_eq!(p.value_at(root, loc(2, 0)), Value::FALSE);
    assert_eq!(p.value_at(root, loc(2, 10)), Value::TRUE);

    let first = p.child_state(root, ids[0]).unwrap();
    let second = p.child_state(root, ids[1]).unwrap();
    assert_ne!(first, second);
    assert_eq!(p.value_at(first, loc(2, 0)), Value::FALSE);
    assert_eq!(p.value_at(second, loc(2, 0)), Value::TRUE);
    assert_eq!(p.state(first).unwrap().parent(), Some((root, ids[0])));
    assert_eq!(p.circuits().len(), 2);
}

#[test]
fn nested_instances_propagate_through_two_levels() {
    let cell = inverter_cell();
    let pair = build_circuit("pair", |c| {
        c.add_pin("in", loc(0, 0), Direction::Input, BitWidth::ONE).unwrap();
        c.add_pin("out", loc(6, 0), Direction::Output, BitWidth::ONE).unwrap();
        c.add_subcircuit(cell.clone(), loc(0, 0)).unwrap();
        c.add_subcircuit(cell.clone(), loc(4, 0)).unwrap();
        c.add_wire(loc(2, 0), loc(4, 0)).unwrap();
    });
    let top = build_circuit("top", |c| {
        c.add_subcircuit(pair.clone(), loc(100, 100)).unwrap();
    });
    let mut p = Propagator::new(top, PropagatorConfig::default()).unwrap();
    let root = p.root_state();
    p.set_value(root, loc(100, 100), Value::TRUE, ComponentId::next(), 1);
    p.propagate();

    // Two inversions cancel out.
    assert_eq!(p.value_at(root, loc(106, 100)), Value::TRUE);
    // root + pair + two cells
    assert_eq!(p.states().count(), 4);
}

#[test]
fn removing_an_instance_drops_its_state() {
    let cell = inverter_cell();
    let mut instance = None;
    let top = build_circuit("top", |c| {
        instance = Some(c.add_subcircuit(cell.clone(), loc(0, 0)).unwrap());
    });
    let mut p = Propagator::new(top.clone(), PropagatorConfig::default()).unwrap();
    let root = p.root_state();
    p.set_value(root, loc(0, 0), Value::TRUE, ComponentId::next(), 1);
    p.propagate();
    let child = p.child_state(root, instance.unwrap()).unwrap();
    assert_eq!(p.value_at(root, loc(2, 0)), Value::FALSE);

    edit(&top, |c| c.remove_component(instance.unwrap())).unwrap();
    p.propagate();
    assert!(p.state(child).is_none());
    assert!(p.child_state(root, instance.unwrap()).is_none());
    // The output point is no longer on the grid and nothing drives it.
    assert!(p.value_at(root, loc(2, 0)).is_nil());
    assert_eq!(p.states().count(), 1);
}

#[test]
fn edits_inside_a_child_reach_every_instance() {
    let cell = build_circuit("cell", |c| {
        c.add_pin("in", loc(0, 0), Direction::Input, BitWidth::ONE).unwrap();
        c.add_pin("out", loc(2, 0), Direction::Output, BitWidth::ONE).unwrap();
    });
    let top = build_circuit("top", |c| {
        c.add_subcircuit(cell.clone(), loc(0, 0)).unwrap();
    });
    let mut p = Propagator::new(top, PropagatorConfig::default()).unwrap();
    let root = p.root_state();
    p.set_value(root, loc(0, 0), Value::FALSE, ComponentId::next(), 1);
    p.propagate();
    assert!(p.value_at(root, loc(2, 0)).is_unknown());

    edit(&cell, |c| c.add_component(Arc::new(NotGate::new(1)), loc(0, 0))).unwrap();
    assert!(p.is_pending());
    p.propagate();
    assert_eq!(p.value_at(root, loc(2, 0)), Value::TRUE);
}
