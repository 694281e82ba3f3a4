//! Integration test: topology edits, nets, and sub-circuit instances.

use std::sync::Arc;

use gatesim_circuit::{CircuitError, Topology};
use gatesim_core::{BitWidth, Direction, Location};
use gatesim_test_utils::fixtures::{AndGate, NotGate};
use gatesim_test_utils::{build_circuit, edit};

fn loc(x: i32, y: i32) -> Location {
    Location::new(x, y)
}

#[test]
fn ports_are_placed_relative_to_anchor() {
    let mut id = None;
    let c = build_circuit("c", |c| {
        id = Some(c.add_component(Arc::new(AndGate::new(1)), loc(10, 10)).unwrap());
    });
    let t = c.topology();
    let placement = t.component(id.unwrap()).unwrap();
    let points: Vec<_> = placement.ports.iter().map(|p| p.location).collect();
    assert_eq!(points, vec![loc(10, 10), loc(10, 12), loc(12, 11)]);
    assert_eq!(t.attached(loc(12, 11)), &[id.unwrap()]);
    assert!(t.readers(loc(12, 11)).is_empty());
    assert_eq!(t.readers(loc(10, 12)), &[id.unwrap()]);
    assert!(t.attached(loc(0, 0)).is_empty());
}

#[test]
fn wires_join_ports_into_nets() {
    let c = build_circuit("c", |c| {
        c.add_component(Arc::new(NotGate::new(1)), loc(0, 0)).unwrap();
        c.add_component(Arc::new(NotGate::new(1)), loc(10, 0)).unwrap();
        c.add_wire(loc(2, 0), loc(6, 0)).unwrap();
        c.add_wire(loc(6, 0), loc(10, 0)).unwrap();
    });
    let t = c.topology();
    let net = t.net_at(loc(10, 0)).unwrap();
    assert!(net.points.contains(&loc(2, 0)));
    assert!(net.points.contains(&loc(6, 0)));
    // Unwired input and output each form their own net.
    assert_eq!(t.net_at(loc(0, 0)).unwrap().points.len(), 1);
    assert_eq!(t.nets().len(), 3);
}

#[test]
fn removing_a_wire_splits_the_net() {
    let mut wire = None;
    let c = build_circuit("c", |c| {
        wire = Some(c.add_wire(loc(0, 0), loc(4, 0)).unwrap());
    });
    assert_eq!(c.topology().nets().len(), 1);
    edit(&c, |c| c.remove_wire(wire.unwrap())).unwrap();
    let t: Arc<Topology> = c.topology();
    assert!(t.nets().is_empty());
    assert_eq!(
        edit(&c, |c| c.remove_wire(wire.unwrap())),
        Err(CircuitError::NoSuchWire(wire.unwrap()))
    );
}

#[test]
fn subcircuit_ports_mirror_child_pins() {
    let child = build_circuit("half", |c| {
        c.add_pin("in", loc(0, 0), Direction::Input, BitWidth::ONE).unwrap();
        c.add_pin("out", loc(4, 0), Direction::Output, BitWidth::ONE).unwrap();
    });
    let mut id = None;
    let parent = build_circuit("top", |c| {
        id = Some(c.add_subcircuit(child.clone(), loc(20, 5)).unwrap());
    });
    let t = parent.topology();
    let instance = t.component(id.unwrap()).unwrap();
    assert!(instance.subcircuit().is_some());
    assert_eq!(instance.ports[0].location, loc(20, 5));
    assert_eq!(instance.ports[1].location, loc(24, 5));
    assert_eq!(instance.ports[1].direction, Direction::Output);
    assert_eq!(instance.to_inner(loc(24, 5)), loc(4, 0));
    assert!(parent.contains(&child));
    assert!(!child.contains(&parent));
}

#[test]
fn indirect_recursive_nesting_is_rejected() {
    let inner = build_circuit("inner", |_| {});
    let outer = build_circuit("outer", |c| {
        c.add_subcircuit(inner.clone(), loc(0, 0)).unwrap();
    });
    let err = edit(&inner, |c| c.add_subcircuit(outer.clone(), loc(0, 0)));
    assert!(matches!(err, Err(CircuitError::RecursiveNesting { .. })));
    assert_eq!(inner.revision(), 0);
}

#[test]
fn duplicate_pins_are_rejected() {
    let c = build_circuit("c", |c| {
        c.add_pin("a", loc(1, 1), Direction::Input, BitWidth::ONE).unwrap();
    });
    let err = edit(&c, |c| c.add_pin("b", loc(1, 1), Direction::Output, BitWidth::ONE));
    assert_eq!(err, Err(CircuitError::DuplicatePin(loc(1, 1))));
    edit(&c, |c| c.remove_pin(loc(1, 1))).unwrap();
    assert!(c.topology().pins().is_empty());
}
