//! Property test: the settled result of an acyclic circuit does not depend
//! on the order or timing in which its inputs are driven.

use std::sync::Arc;

use gatesim_core::{ComponentId, Location, Value};
use gatesim_propagator::{Propagator, PropagatorConfig};
use gatesim_test_utils::build_circuit;
use gatesim_test_utils::fixtures::{AndGate, NotGate};
use proptest::prelude::*;

fn loc(x: i32, y: i32) -> Location {
    Location::new(x, y)
}

/// `(a AND b)` inverted, then ANDed with `c`.
///
/// Inputs `a (0,0)`, `b (0,2)`, `c (8,2)`; output `(10,1)`.
fn nand_and() -> Arc<gatesim_circuit::Circuit> {
    build_circuit("nand-and", |c| {
        c.add_component(Arc::new(AndGate::new(2)), loc(0, 0)).unwrap();
        c.add_component(Arc::new(NotGate::new(1)), loc(4, 1)).unwrap();
        c.add_component(Arc::new(AndGate::new(3)), loc(8, 0)).unwrap();
        c.add_wire(loc(2, 1), loc(4, 1)).unwrap();
        c.add_wire(loc(6, 1), loc(8, 0)).unwrap();
    })
}

fn arb_level() -> impl Strategy<Value = Value> {
    prop_oneof![Just(Value::FALSE), Just(Value::TRUE), Just(Value::UNKNOWN)]
}

proptest! {
    #[test]
    fn settled_output_matches_direct_evaluation(
        levels in [arb_level(), arb_level(), arb_level()],
        delays in [1u32..5, 1u32..5, 1u32..5],
        order in Just(vec![0usize, 1, 2]).prop_shuffle(),
    ) {
        let inputs = [loc(0, 0), loc(0, 2), loc(8, 2)];
        let mut p = Propagator::new(nand_and(), PropagatorConfig::default()).unwrap();
        let root = p.root_state();
        let stimulus = ComponentId::next();
        for i in order {
            p.set_value(root, inputs[i], levels[i], stimulus, delays[i]);
        }
        let metrics = p.propagate();
        prop_assert!(!metrics.oscillating);

        let expected = levels[0].and(&levels[1]).not().and(&levels[2]);
        prop_assert_eq!(p.value_at(root, loc(10, 1)), expected);
    }
}
