//! Reusable component fixtures.
//!
//! Port offsets are fixed so tests can wire fixtures by coordinates:
//!
//! - [`NotGate`] and [`Buffer`]: input `(0,0)`, output `(2,0)`.
//! - [`AndGate`]: inputs `(0,0)` and `(0,2)`, output `(2,1)`.
//! - [`Constant`] and [`ClockSource`]: output `(0,0)`.
//! - [`DFlipFlop`]: data `(0,0)`, output `(2,0)`.
//! - [`FailingComponent`] and [`PanickingComponent`]: input `(0,0)`,
//!   output `(2,0)`.

use std::sync::atomic::{AtomicUsize, Ordering};

use gatesim_core::{BitWidth, Component, ComponentError, EvalContext, Port, Value};

fn unary_ports(width: BitWidth) -> Vec<Port> {
    vec![Port::input(0, 0, width), Port::output(2, 0, width)]
}

/// Single-bit inverter.
pub struct NotGate {
    pub delay: u32,
    evaluations: AtomicUsize,
}

impl NotGate {
    pub fn new(delay: u32) -> Self {
        Self {
            delay,
            evaluations: AtomicUsize::new(0),
        }
    }

    /// How many times `evaluate()` has been called.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl Component for NotGate {
    fn name(&self) -> &str {
        "not"
    }

    fn ports(&self) -> Vec<Port> {
        unary_ports(BitWidth::ONE)
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let out = ctx.input(0).not();
        ctx.set_output(1, out, self.delay)
    }
}

/// Two-input AND gate.
pub struct AndGate {
    pub delay: u32,
}

impl AndGate {
    pub fn new(delay: u32) -> Self {
        Self { delay }
    }
}

impl Component for AndGate {
    fn name(&self) -> &str {
        "and"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input(0, 0, BitWidth::ONE),
            Port::input(0, 2, BitWidth::ONE),
            Port::output(2, 1, BitWidth::ONE),
        ]
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
        let out = ctx.input(0).and(&ctx.input(1));
        ctx.set_output(2, out, self.delay)
    }
}

/// Copies its input to its output, at any width.
pub struct Buffer {
    pub width: BitWidth,
    pub delay: u32,
}

impl Buffer {
    pub fn new(width: BitWidth, delay: u32) -> Self {
        Self { width, delay }
    }
}

impl Component for Buffer {
    fn name(&self) -> &str {
        "buffer"
    }

    fn ports(&self) -> Vec<Port> {
        unary_ports(self.width)
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
        let out = ctx.input(0);
        ctx.set_output(1, out, self.delay)
    }
}

/// Drives a fixed value.
pub struct Constant {
    pub value: Value,
}

impl Constant {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Component for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::output(0, 0, self.value.width())]
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
        ctx.set_output(0, self.value, 1)
    }
}

/// Outputs `1` on odd ticks and `0` on even ticks.
pub struct ClockSource;

impl Component for ClockSource {
    fn name(&self) -> &str {
        "clock"
    }

    fn ports(&self) -> Vec<Port> {
        vec![Port::output(0, 0, BitWidth::ONE)]
    }

    fn is_clocked(&self) -> bool {
        true
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
        let level = Value::from(ctx.tick_count() % 2 == 1);
        ctx.set_output(0, level, 1)
    }
}

#[derive(Default)]
struct FlipFlopMemory {
    latched_at: Option<u64>,
    q: Option<Value>,
}

/// Latches its data input once per clock tick.
///
/// Between ticks the output holds; before the first tick it is unknown.
pub struct DFlipFlop;

impl Component for DFlipFlop {
    fn name(&self) -> &str {
        "d-flip-flop"
    }

    fn ports(&self) -> Vec<Port> {
        unary_ports(BitWidth::ONE)
    }

    fn is_clocked(&self) -> bool {
        true
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
        let tick = ctx.tick_count();
        let d = ctx.input(0);
        let memory = ctx.memory::<FlipFlopMemory>()?;
        if tick > 0 && memory.latched_at != Some(tick) {
            memory.latched_at = Some(tick);
            memory.q = Some(d);
        }
        let q = memory.q.unwrap_or(Value::UNKNOWN);
        ctx.set_output(1, q, 1)
    }
}

/// Fails deterministically after a configurable number of successful calls.
///
/// While succeeding it behaves as a buffer.
pub struct FailingComponent {
    pub succeed_count: usize,
    call_count: AtomicUsize,
}

impl FailingComponent {
    /// Create a component that succeeds `succeed_count` times then fails.
    pub fn new(succeed_count: usize) -> Self {
        Self {
            succeed_count,
            call_count: AtomicUsize::new(0),
        }
    }

    /// How many times `evaluate()` has been called.
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Component for FailingComponent {
    fn name(&self) -> &str {
        "failing"
    }

    fn ports(&self) -> Vec<Port> {
        unary_ports(BitWidth::ONE)
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
        let n = self.call_count.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(ComponentError::ExecutionFailed {
                reason: format!(
                    "deliberate failure after {} successful calls",
                    self.succeed_count
                ),
            });
        }
        let out = ctx.input(0);
        ctx.set_output(1, out, 1)
    }
}

/// Panics on every evaluation.
pub struct PanickingComponent;

impl Component for PanickingComponent {
    fn name(&self) -> &str {
        "panicking"
    }

    fn ports(&self) -> Vec<Port> {
        unary_ports(BitWidth::ONE)
    }

    fn evaluate(&self, _ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
        panic!("deliberate panic in component evaluation");
    }
}
