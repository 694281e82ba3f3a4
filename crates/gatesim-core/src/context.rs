//! Evaluation context passed to components.
//!
//! [`EvalContext`] gives a component read access to the values at its
//! ports, the current tick count, and a private memory slot, and collects
//! the [`Emission`]s it wants to drive on its outputs.

use std::any::Any;

use smallvec::SmallVec;

use crate::error::ComponentError;
use crate::port::Port;
use crate::value::Value;

/// A value a component drives on one of its outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Emission {
    /// Index into the component's port list.
    pub port: usize,
    /// Value to drive.
    pub value: Value,
    /// Propagation delay in simulation time units (clamped to at least 1).
    pub delay: u32,
}

/// Per-evaluation view of a component's surroundings.
///
/// Constructed by the propagator for each dirty component. For testing a
/// component in isolation, build one directly with [`EvalContext::new`].
pub struct EvalContext<'a> {
    ports: &'a [Port],
    values: &'a [Value],
    memory: &'a mut Option<Box<dyn Any + Send>>,
    tick_count: u64,
    emissions: SmallVec<[Emission; 4]>,
}

impl<'a> EvalContext<'a> {
    /// Construct a context.
    ///
    /// `values[i]` is the value currently resolved at `ports[i]`; missing
    /// entries read as unknown.
    pub fn new(
        ports: &'a [Port],
        values: &'a [Value],
        memory: &'a mut Option<Box<dyn Any + Send>>,
        tick_count: u64,
    ) -> Self {
        Self {
            ports,
            values,
            memory,
            tick_count,
            emissions: SmallVec::new(),
        }
    }

    /// Number of ports.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Value at port `port`, sized to the port width.
    ///
    /// Undriven points and out-of-range indices read as unknown.
    pub fn input(&self, port: usize) -> Value {
        let Some(spec) = self.ports.get(port) else {
            return Value::UNKNOWN;
        };
        match self.values.get(port) {
            Some(v) if !v.is_nil() => v.extend_to(spec.width),
            _ => Value::unknown(spec.width),
        }
    }

    /// Clock ticks elapsed since the last reset.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Drive `value` on output `port` after `delay` time units.
    pub fn set_output(&mut self, port: usize, value: Value, delay: u32) -> Result<(), ComponentError> {
        let spec = self
            .ports
            .get(port)
            .ok_or(ComponentError::NoSuchPort { port })?;
        if !spec.is_output() {
            return Err(ComponentError::NotAnOutput { port });
        }
        if value.width() != spec.width {
            return Err(ComponentError::WidthMismatch {
                port,
                expected: spec.width,
                actual: value.width(),
            });
        }
        self.emissions.push(Emission { port, value, delay });
        Ok(())
    }

    /// The component's private memory, created with `T::default()` on
    /// first use or when the slot holds another type.
    ///
    /// Memory belongs to one circuit instantiation and is cleared on reset.
    pub fn memory<T: Default + Send + 'static>(&mut self) -> Result<&mut T, ComponentError> {
        let fresh: Box<T> = match self.memory.take() {
            Some(existing) => existing.downcast::<T>().unwrap_or_default(),
            None => Box::default(),
        };
        self.memory
            .insert(fresh)
            .downcast_mut::<T>()
            .ok_or(ComponentError::MemoryType)
    }

    /// Emissions collected so far.
    pub fn emissions(&self) -> &[Emission] {
        &self.emissions
    }

    /// Consume the context, returning the collected emissions.
    pub fn into_emissions(self) -> SmallVec<[Emission; 4]> {
        self.emissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BitWidth;

    fn ports() -> Vec<Port> {
        vec![
            Port::input(0, 0, BitWidth::ONE),
            Port::output(1, 0, BitWidth::ONE),
        ]
    }

    #[test]
    fn missing_values_read_as_unknown() {
        let ports = ports();
        let mut memory = None;
        let ctx = EvalContext::new(&ports, &[], &mut memory, 0);
        assert_eq!(ctx.input(0), Value::UNKNOWN);
        assert_eq!(ctx.input(7), Value::UNKNOWN);
    }

    #[test]
    fn nil_input_reads_as_unknown_of_port_width() {
        let ports = vec![Port::input(0, 0, BitWidth::new(4).unwrap())];
        let values = [Value::NIL];
        let mut memory = None;
        let ctx = EvalContext::new(&ports, &values, &mut memory, 0);
        assert!(ctx.input(0).is_unknown());
        assert_eq!(ctx.input(0).width().bits(), 4);
    }

    #[test]
    fn set_output_validates_port() {
        let ports = ports();
        let mut memory = None;
        let mut ctx = EvalContext::new(&ports, &[], &mut memory, 0);
        assert_eq!(
            ctx.set_output(0, Value::TRUE, 1),
            Err(ComponentError::NotAnOutput { port: 0 })
        );
        assert_eq!(
            ctx.set_output(5, Value::TRUE, 1),
            Err(ComponentError::NoSuchPort { port: 5 })
        );
        assert!(matches!(
            ctx.set_output(1, Value::unknown(BitWidth::new(2).unwrap()), 1),
            Err(ComponentError::WidthMismatch { port: 1, .. })
        ));
        ctx.set_output(1, Value::TRUE, 3).unwrap();
        assert_eq!(
            ctx.emissions(),
            &[Emission {
                port: 1,
                value: Value::TRUE,
                delay: 3
            }]
        );
    }

    #[test]
    fn memory_persists_across_contexts() {
        let ports = ports();
        let mut memory = None;
        {
            let mut ctx = EvalContext::new(&ports, &[], &mut memory, 0);
            *ctx.memory::<u32>().unwrap() += 5;
        }
        let mut ctx = EvalContext::new(&ports, &[], &mut memory, 1);
        assert_eq!(*ctx.memory::<u32>().unwrap(), 5);
        // Asking for another type replaces the slot.
        assert_eq!(*ctx.memory::<bool>().unwrap(), false);
    }
}
