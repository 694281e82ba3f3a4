//! The [`Component`] contract.
//!
//! The propagation engine treats component behaviour as a black box: it
//! hands a component the current values at its ports and collects the
//! values and delays it wants to drive on its outputs.

use crate::context::EvalContext;
use crate::error::ComponentError;
use crate::port::Port;

/// A circuit element evaluated by the propagator.
///
/// # Contract
///
/// - `evaluate()` should be a function of its inputs, the tick count, and
///   its own memory slot. It is called whenever a point it touches changes.
/// - `ports()` is read once when the component is placed; it must not
///   change afterwards.
/// - Errors and panics are caught per component; the rest of the circuit
///   keeps settling.
///
/// # Examples
///
/// ```
/// use gatesim_core::{BitWidth, Component, ComponentError, EvalContext, Port};
///
/// struct Inverter;
///
/// impl Component for Inverter {
///     fn name(&self) -> &str { "not" }
///
///     fn ports(&self) -> Vec<Port> {
///         vec![Port::input(0, 0, BitWidth::ONE), Port::output(2, 0, BitWidth::ONE)]
///     }
///
///     fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
///         let out = ctx.input(0).not();
///         ctx.set_output(1, out, 1)
///     }
/// }
///
/// assert_eq!(Inverter.ports().len(), 2);
/// ```
pub trait Component: Send + Sync + 'static {
    /// Human-readable name for diagnostics.
    fn name(&self) -> &str;

    /// Connection points, relative to the component's anchor.
    fn ports(&self) -> Vec<Port>;

    /// Whether the component must be re-evaluated on every clock tick.
    ///
    /// Default: `false`.
    fn is_clocked(&self) -> bool {
        false
    }

    /// Compute outputs from the values currently at the ports.
    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError>;
}
