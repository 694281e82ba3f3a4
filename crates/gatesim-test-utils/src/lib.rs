//! Test fixtures and circuit builders for gatesim development.
//!
//! [`fixtures`] holds a small gate library (the simulator core ships
//! none) plus deliberately misbehaving components. The builders below
//! wrap circuit construction in the write transaction every edit needs.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::Arc;

use gatesim_circuit::{Circuit, Transaction};
use gatesim_core::Location;

use fixtures::{AndGate, NotGate};

/// Create a circuit and populate it inside a write transaction.
pub fn build_circuit(name: &str, f: impl FnOnce(&Circuit)) -> Arc<Circuit> {
    let circuit = Circuit::new(name);
    edit(&circuit, f);
    circuit
}

/// Run `f` against `circuit` while holding its write lock.
pub fn edit<R>(circuit: &Arc<Circuit>, f: impl FnOnce(&Circuit) -> R) -> R {
    Transaction::new()
        .write(circuit)
        .execute(|_| f(circuit))
        .expect("write transaction on an uncontended circuit")
}

/// An AND gate feeding an inverter whose output loops back to the AND.
///
/// Returns the circuit and the AND's free input. Driving that input low
/// settles the loop; driving it high afterwards makes it oscillate.
///
/// Layout: AND at `(0,0)` (inputs `(0,0)` and `(0,2)`, output `(2,1)`),
/// NOT at `(4,1)` (output `(6,1)`), wires `(2,1)-(4,1)` and `(6,1)-(0,2)`.
pub fn ring_oscillator(delay: u32) -> (Arc<Circuit>, Location) {
    let enable = Location::new(0, 0);
    let circuit = build_circuit("ring-oscillator", |c| {
        c.add_component(Arc::new(AndGate::new(delay)), enable)
            .expect("place and");
        c.add_component(Arc::new(NotGate::new(delay)), Location::new(4, 1))
            .expect("place inverter");
        c.add_wire(Location::new(2, 1), Location::new(4, 1))
            .expect("forward wire");
        c.add_wire(Location::new(6, 1), Location::new(0, 2))
            .expect("feedback wire");
    });
    (circuit, enable)
}

/// `n` inverters in series along the x axis, joined by wires.
///
/// Returns the circuit, the chain input point, and the chain output point.
pub fn not_chain(n: usize, delay: u32) -> (Arc<Circuit>, Location, Location) {
    let input = Location::new(0, 0);
    let mut output = input;
    let circuit = build_circuit("not-chain", |c| {
        for i in 0..n {
            let anchor = Location::new(i as i32 * 4, 0);
            c.add_component(Arc::new(NotGate::new(delay)), anchor)
                .expect("place inverter");
            if i > 0 {
                c.add_wire(output, anchor).expect("chain wire");
            }
            output = Location::new(anchor.x + 2, 0);
        }
    });
    (circuit, input, output)
}
