//! The discrete-event propagation engine.
//!
//! # Algorithm
//!
//! The [`Propagator`] keeps a min-heap of [`SetData`] events ordered by
//! `(time, serial)`. One *time instant* pops every event due at the
//! earliest time, applies each to the cause list at its point, and then
//! settles the consequences:
//!
//! 1. Dirty points are resolved through their net. Every point joined by
//!    wires takes the combination of all causes on the net, or unknown if
//!    nothing drives it.
//! 2. Components reading a point whose value changed become dirty.
//!    So does a sub-circuit output pin, which is forwarded to the parent
//!    instance as a new event.
//! 3. Dirty components are evaluated; their outputs become new events at
//!    `clock + delay`.
//!
//! [`propagate()`](Propagator::propagate) repeats instants until the queue
//! is empty or the iteration limit is reached, at which point the circuit
//! is *oscillating*.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use gatesim_circuit::{Circuit, Placement, PlacementKind};
use gatesim_core::{
    BitWidth, Component, ComponentId, Direction, EvalContext, Location, Port, StateId, Value,
};
use indexmap::IndexMap;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, warn};

use crate::config::{ConfigError, PropagatorConfig};
use crate::event::SetData;
use crate::metrics::{ComponentFault, FaultReason, PropagationMetrics};
use crate::noise::Noise;
use crate::points::PropagationPoints;
use crate::state::CircuitState;

/// Fault records kept between resets; later faults are only counted.
pub const MAX_RECORDED_FAULTS: usize = 256;

/// Discrete-event simulator for one root circuit and its sub-circuits.
pub struct Propagator {
    root: StateId,
    states: IndexMap<StateId, CircuitState>,
    next_state: u32,
    queue: BinaryHeap<Reverse<SetData>>,
    clock: u64,
    tick_count: u64,
    serial: u64,
    config: PropagatorConfig,
    noise: Option<Noise>,
    oscillating: bool,
    oscillating_points: PropagationPoints,
    faults: Vec<ComponentFault>,
}

// Compile-time assertion: Propagator must be Send (it moves to the
// propagation thread).
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<Propagator>();
};

impl Propagator {
    /// Create a propagator for `root`.
    ///
    /// Every component of the root circuit starts dirty, so the first
    /// [`propagate()`](Self::propagate) evaluates the whole circuit.
    pub fn new(root: Arc<Circuit>, config: PropagatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let root_id = StateId(0);
        let mut states = IndexMap::new();
        states.insert(root_id, CircuitState::new(root_id, root, None));
        Ok(Self {
            root: root_id,
            states,
            next_state: 1,
            queue: BinaryHeap::new(),
            clock: 0,
            tick_count: 0,
            serial: 0,
            noise: config.noise.map(Noise::new),
            config,
            oscillating: false,
            oscillating_points: PropagationPoints::new(),
            faults: Vec::new(),
        })
    }

    // ── Queries ────────────────────────────────────────────────────

    /// The root state.
    pub fn root_state(&self) -> StateId {
        self.root
    }

    /// The simulated circuit.
    pub fn root_circuit(&self) -> &Arc<Circuit> {
        self.states[&self.root].circuit()
    }

    /// Active configuration.
    pub fn config(&self) -> &PropagatorConfig {
        &self.config
    }

    /// Look up a state.
    pub fn state(&self, id: StateId) -> Option<&CircuitState> {
        self.states.get(&id)
    }

    /// All live states, root first.
    pub fn states(&self) -> impl Iterator<Item = &CircuitState> + '_ {
        self.states.values()
    }

    /// Child state simulating `instance` inside `parent`, once created.
    pub fn child_state(&self, parent: StateId, instance: ComponentId) -> Option<StateId> {
        self.states.get(&parent)?.child(instance)
    }

    /// Resolved value at a point; [`Value::NIL`] if unknown to the state.
    pub fn value_at(&self, state: StateId, location: Location) -> Value {
        self.states
            .get(&state)
            .map(|s| s.value_at(location))
            .unwrap_or(Value::NIL)
    }

    /// Time of the most recently processed instant.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Clock ticks since construction or the last reset.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Whether the last `propagate()` stopped at the iteration limit.
    pub fn is_oscillating(&self) -> bool {
        self.oscillating
    }

    /// Points touched during the final quarter of an oscillating round.
    pub fn oscillating_points(&self) -> Option<&PropagationPoints> {
        self.oscillating.then_some(&self.oscillating_points)
    }

    /// Whether events, dirty work, or unreconciled edits remain.
    pub fn is_pending(&self) -> bool {
        !self.queue.is_empty()
            || self.states.values().any(|s| {
                s.is_dirty() || s.circuit().revision() != s.topology().revision()
            })
    }

    /// Number of queued events.
    pub fn queued_events(&self) -> usize {
        self.queue.len()
    }

    /// Faults caught since the last reset (at most [`MAX_RECORDED_FAULTS`]).
    pub fn faults(&self) -> &[ComponentFault] {
        &self.faults
    }

    /// Forget recorded faults.
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Every circuit this propagator reads: the root, each instantiated
    /// sub-circuit, and everything nested beneath them.
    ///
    /// A caller running the propagator concurrently with edits should
    /// hold read locks on all of these.
    pub fn circuits(&self) -> Vec<Arc<Circuit>> {
        let mut out: Vec<Arc<Circuit>> = Vec::new();
        let mut pending: Vec<Arc<Circuit>> =
            self.states.values().map(|s| Arc::clone(s.circuit())).collect();
        while let Some(circuit) = pending.pop() {
            if out.iter().any(|c| Arc::ptr_eq(c, &circuit)) {
                continue;
            }
            pending.extend(circuit.topology().subcircuits().map(|(_, c)| Arc::clone(c)));
            out.push(circuit);
        }
        out
    }

    // ── Scheduling ─────────────────────────────────────────────────

    /// Drive `value` at `location` on behalf of `cause`, effective
    /// `max(delay, 1)` time units from now.
    ///
    /// External stimuli should use their own [`ComponentId::next`] so they
    /// can later be withdrawn with [`retract`](Self::retract).
    pub fn set_value(
        &mut self,
        state: StateId,
        location: Location,
        value: Value,
        cause: ComponentId,
        delay: u32,
    ) {
        self.schedule(state, location, cause, Some(value), delay, false);
    }

    /// Withdraw `cause` from `location` after `max(delay, 1)` time units.
    pub fn retract(&mut self, state: StateId, location: Location, cause: ComponentId, delay: u32) {
        self.schedule(state, location, cause, None, delay, false);
    }

    fn schedule(
        &mut self,
        state: StateId,
        location: Location,
        cause: ComponentId,
        value: Option<Value>,
        delay: u32,
        boundary: bool,
    ) {
        let mut time = self.clock + u64::from(delay.max(1));
        if !boundary {
            if let Some(noise) = self.noise.as_mut() {
                time += noise.extra_delay();
            }
        }
        let serial = self.serial;
        self.serial += 1;
        self.queue.push(Reverse(SetData {
            time,
            serial,
            state,
            location,
            cause,
            value,
        }));
    }

    // ── Driving ────────────────────────────────────────────────────

    /// Run until the event queue is empty or the iteration limit is hit.
    ///
    /// Clears the oscillation flag on entry. If the limit is reached, the
    /// flag is set and the points touched from 75% of the limit onward are
    /// kept for [`oscillating_points`](Self::oscillating_points); the
    /// remaining events stay queued.
    pub fn propagate(&mut self) -> PropagationMetrics {
        let started = Instant::now();
        let mut metrics = PropagationMetrics::default();
        self.oscillating = false;
        self.oscillating_points.clear();

        self.reconcile();
        self.settle_dirty(&mut metrics);

        let limit = self.config.iteration_limit;
        let threshold = self.config.recording_threshold();
        let mut recorded = PropagationPoints::new();
        while !self.queue.is_empty() {
            if metrics.iterations >= limit {
                self.oscillating = true;
                break;
            }
            let record = metrics.iterations >= threshold;
            self.run_instant(record.then_some(&mut recorded), &mut metrics);
            metrics.iterations += 1;
        }

        if self.oscillating {
            debug!(
                clock = self.clock,
                points = recorded.len(),
                "propagation reached iteration limit"
            );
            self.oscillating_points = recorded;
        }
        metrics.oscillating = self.oscillating;
        metrics.elapsed_us = started.elapsed().as_micros() as u64;
        metrics
    }

    /// Process exactly one time instant, adding every point it touches to
    /// `changed`. Returns whether events remain queued.
    ///
    /// A step that drains the queue clears the oscillation flag.
    pub fn step(&mut self, changed: &mut PropagationPoints) -> bool {
        let mut metrics = PropagationMetrics::default();
        self.reconcile();
        self.settle_dirty(&mut metrics);
        self.run_instant(Some(changed), &mut metrics);
        let pending = !self.queue.is_empty();
        if !pending && self.oscillating {
            self.oscillating = false;
            self.oscillating_points.clear();
        }
        pending
    }

    /// Advance the clock by one tick: every clocked component in every
    /// state is re-evaluated on the next propagation.
    pub fn tick(&mut self) {
        self.tick_count += 1;
        for state in self.states.values_mut() {
            state.mark_clocked_dirty();
        }
    }

    /// Discard all simulation state and start over from the root circuit.
    ///
    /// Serial numbers continue from where they were.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.clock = 0;
        self.tick_count = 0;
        self.oscillating = false;
        self.oscillating_points.clear();
        self.faults.clear();
        if let Some(noise) = self.noise.as_mut() {
            noise.reseed();
        }
        let root = self.root;
        self.states.retain(|id, _| *id == root);
        if let Some(state) = self.states.get_mut(&root) {
            state.clear();
            state.topology = state.circuit().topology();
            state.mark_all_dirty();
        }
        debug!(circuit = self.root_circuit().name(), "propagator reset");
    }

    // ── Internals ──────────────────────────────────────────────────

    fn run_instant(
        &mut self,
        mut touched: Option<&mut PropagationPoints>,
        metrics: &mut PropagationMetrics,
    ) {
        let Some(Reverse(head)) = self.queue.peek() else {
            return;
        };
        let time = head.time;
        self.clock = time;

        let mut batch = Vec::new();
        while self.queue.peek().is_some_and(|Reverse(e)| e.time == time) {
            if let Some(Reverse(e)) = self.queue.pop() {
                batch.push(e);
            }
        }

        // Latest scheduling wins when one cause drives a point twice in
        // the same instant.
        let mut seen = HashSet::with_capacity(batch.len());
        for event in batch.into_iter().rev() {
            if !seen.insert((event.state, event.cause, event.location)) {
                continue;
            }
            let Some(state) = self.states.get_mut(&event.state) else {
                continue;
            };
            metrics.events_processed += 1;
            if let Some(points) = touched.as_deref_mut() {
                points.add(event.state, event.location);
            }
            let changed = match event.value {
                Some(value) => state.add_cause(event.location, event.cause, value),
                None => state.remove_cause(event.location, event.cause),
            };
            if changed {
                state.dirty_points.insert(event.location);
            }
        }

        self.settle_dirty(metrics);
    }

    /// Resolve points and evaluate components until no state has dirty
    /// work. New child states created along the way are settled too.
    fn settle_dirty(&mut self, metrics: &mut PropagationMetrics) {
        while let Some(id) = self.states.values().find(|s| s.is_dirty()).map(|s| s.id()) {
            self.resolve_points(id);
            self.evaluate_components(id, metrics);
        }
    }

    fn resolve_points(&mut self, id: StateId) {
        let Some(state) = self.states.get_mut(&id) else {
            return;
        };
        let topology = Arc::clone(&state.topology);
        let dirty = std::mem::take(&mut state.dirty_points);
        let mut done: HashSet<Location> = HashSet::new();
        let mut forwards: SmallVec<[(Location, Value); 4]> = SmallVec::new();

        for at in dirty {
            if done.contains(&at) {
                continue;
            }
            let (points, width): (SmallVec<[Location; 4]>, Option<BitWidth>) =
                match topology.net_at(at) {
                    Some(net) => (net.points.clone(), Some(net.width)),
                    None => (smallvec![at], None),
                };
            let combined = points
                .iter()
                .fold(Value::NIL, |acc, p| acc.combine(&state.driven_value(*p)));

            if width.is_none() && combined.is_nil() {
                // Off-grid point with no drivers left.
                done.insert(at);
                state.values.remove(&at);
                continue;
            }
            let width = width.unwrap_or(combined.width());
            let resolved = if combined.is_nil() {
                Value::unknown(width)
            } else if combined.width() < width {
                combined.extend_to(width)
            } else {
                combined
            };

            for p in points {
                done.insert(p);
                if state.values.insert(p, resolved) == Some(resolved) {
                    continue;
                }
                state
                    .dirty_components
                    .extend(topology.readers(p).iter().copied());
                if topology
                    .pin_at(p)
                    .is_some_and(|pin| pin.direction == Direction::Output)
                {
                    forwards.push((p, resolved));
                }
            }
        }

        let Some((parent, instance)) = state.parent() else {
            return;
        };
        if forwards.is_empty() {
            return;
        }
        let anchor = self
            .states
            .get(&parent)
            .and_then(|s| s.topology.component(instance))
            .map(|p| p.anchor);
        let Some(anchor) = anchor else {
            return;
        };
        for (inner, value) in forwards {
            self.schedule(parent, inner.translate(anchor), instance, Some(value), 1, true);
        }
    }

    fn evaluate_components(&mut self, id: StateId, metrics: &mut PropagationMetrics) {
        let Some(state) = self.states.get_mut(&id) else {
            return;
        };
        let dirty = std::mem::take(&mut state.dirty_components);
        let topology = Arc::clone(&state.topology);
        for component in dirty {
            let Some(placement) = topology.component(component) else {
                continue;
            };
            metrics.components_evaluated += 1;
            match &placement.kind {
                PlacementKind::Component(leaf) => {
                    self.evaluate_leaf(id, component, leaf, &placement.ports, metrics)
                }
                PlacementKind::Subcircuit(child) => {
                    self.evaluate_instance(id, component, child, placement)
                }
            }
        }
    }

    fn evaluate_leaf(
        &mut self,
        id: StateId,
        component: ComponentId,
        leaf: &Arc<dyn Component>,
        ports: &[Port],
        metrics: &mut PropagationMetrics,
    ) {
        let tick_count = self.tick_count;
        let Some(state) = self.states.get_mut(&id) else {
            return;
        };
        let inputs: SmallVec<[Value; 8]> =
            ports.iter().map(|p| state.value_at(p.location)).collect();
        let memory = state.memory.entry(component).or_default();
        let mut ctx = EvalContext::new(ports, &inputs, memory, tick_count);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| leaf.evaluate(&mut ctx)));
        let emissions = ctx.into_emissions();
        let reason = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(FaultReason::Error(e)),
            Err(payload) => Some(FaultReason::Panic(panic_message(payload.as_ref()))),
        };

        if let Some(reason) = reason {
            warn!(
                component = %component,
                name = leaf.name(),
                state = %id,
                time = self.clock,
                reason = %reason,
                "component evaluation failed"
            );
            metrics.faults += 1;
            if self.faults.len() < MAX_RECORDED_FAULTS {
                self.faults.push(ComponentFault {
                    state: id,
                    component,
                    name: leaf.name().to_string(),
                    time: self.clock,
                    reason,
                });
            }
            return;
        }

        for emission in emissions {
            if let Some(port) = ports.get(emission.port) {
                self.schedule(
                    id,
                    port.location,
                    component,
                    Some(emission.value),
                    emission.delay,
                    false,
                );
            }
        }
    }

    /// Forward the values at an instance's input ports into its child
    /// state, creating the child on first use.
    fn evaluate_instance(
        &mut self,
        id: StateId,
        instance: ComponentId,
        circuit: &Arc<Circuit>,
        placement: &Placement,
    ) {
        let child = self.ensure_child(id, instance, circuit);
        let Some(state) = self.states.get(&id) else {
            return;
        };
        let inputs: SmallVec<[(Location, Value); 4]> = placement
            .ports
            .iter()
            .filter(|p| !p.is_output())
            .map(|p| {
                let v = state.value_at(p.location);
                let v = if v.is_nil() { Value::unknown(p.width) } else { v };
                (placement.to_inner(p.location), v)
            })
            .collect();
        for (inner, value) in inputs {
            self.schedule(child, inner, instance, Some(value), 1, true);
        }
    }

    fn ensure_child(
        &mut self,
        parent: StateId,
        instance: ComponentId,
        circuit: &Arc<Circuit>,
    ) -> StateId {
        if let Some(existing) = self.child_state(parent, instance) {
            return existing;
        }
        let id = StateId(self.next_state);
        self.next_state += 1;
        self.states.insert(
            id,
            CircuitState::new(id, Arc::clone(circuit), Some((parent, instance))),
        );
        if let Some(state) = self.states.get_mut(&parent) {
            state.children.insert(instance, id);
        }
        debug!(
            state = %id,
            parent = %parent,
            instance = %instance,
            circuit = circuit.name(),
            "created sub-circuit state"
        );
        id
    }

    /// Bring every state up to its circuit's current revision.
    fn reconcile(&mut self) {
        let ids: Vec<StateId> = self.states.keys().copied().collect();
        for id in ids {
            let Some(state) = self.states.get_mut(&id) else {
                continue;
            };
            let current = state.circuit().topology();
            if Arc::ptr_eq(&current, &state.topology) {
                continue;
            }
            let old = std::mem::replace(&mut state.topology, Arc::clone(&current));

            // Drivers that were components of the old revision and are gone
            // now. Probes and parent instances were never components here.
            let retractions: Vec<(Location, ComponentId)> = state
                .causes
                .iter()
                .flat_map(|(at, causes)| causes.iter().map(move |c| (*at, c.driver)))
                .filter(|(_, driver)| {
                    old.contains_component(*driver) && !current.contains_component(*driver)
                })
                .collect();

            for (component, _) in current.components() {
                if !old.contains_component(component) {
                    state.dirty_components.insert(component);
                }
            }
            let points: Vec<Location> = state
                .causes
                .keys()
                .chain(state.values.keys())
                .copied()
                .chain(current.points())
                .collect();
            state.dirty_points.extend(points);

            let removed: Vec<StateId> = state
                .children
                .iter()
                .filter(|(instance, _)| !current.contains_component(**instance))
                .map(|(_, child)| *child)
                .collect();
            state
                .children
                .retain(|instance, _| current.contains_component(*instance));
            state
                .memory
                .retain(|component, _| current.contains_component(*component));

            debug!(
                state = %id,
                revision = current.revision(),
                retracted = retractions.len(),
                dropped_states = removed.len(),
                "reconciled topology"
            );
            for (at, driver) in retractions {
                self.schedule(id, at, driver, None, 1, true);
            }
            for child in removed {
                self.drop_state(child);
            }
        }
    }

    fn drop_state(&mut self, id: StateId) {
        let Some(state) = self.states.shift_remove(&id) else {
            return;
        };
        for (_, child) in state.children() {
            self.drop_state(child);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl fmt::Debug for Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Propagator")
            .field("circuit", &self.root_circuit().name())
            .field("states", &self.states.len())
            .field("queued", &self.queue.len())
            .field("clock", &self.clock)
            .field("tick_count", &self.tick_count)
            .field("oscillating", &self.oscillating)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_numbers_survive_reset() {
        let mut p = Propagator::new(Circuit::new("empty"), PropagatorConfig::default()).unwrap();
        let stimulus = ComponentId::next();
        let at = Location::new(0, 0);
        p.set_value(p.root_state(), at, Value::TRUE, stimulus, 1);
        p.set_value(p.root_state(), at, Value::TRUE, stimulus, 1);
        p.reset();
        assert_eq!(p.queued_events(), 0);
        p.set_value(p.root_state(), at, Value::TRUE, stimulus, 1);
        let Reverse(head) = p.queue.peek().unwrap();
        assert_eq!(head.serial, 2);
    }

    #[test]
    fn delay_is_at_least_one() {
        let mut p = Propagator::new(Circuit::new("empty"), PropagatorConfig::default()).unwrap();
        p.set_value(p.root_state(), Location::new(3, 3), Value::TRUE, ComponentId::next(), 0);
        let Reverse(head) = p.queue.peek().unwrap();
        assert_eq!(head.time, 1);
    }

    #[test]
    fn stimulus_on_empty_circuit_settles_to_its_value() {
        let mut p = Propagator::new(Circuit::new("empty"), PropagatorConfig::default()).unwrap();
        let at = Location::new(7, 7);
        let stimulus = ComponentId::next();
        p.set_value(p.root_state(), at, Value::FALSE, stimulus, 1);
        let m = p.propagate();
        assert_eq!(m.iterations, 1);
        assert_eq!(p.value_at(p.root_state(), at), Value::FALSE);

        // Off-grid point with its only driver withdrawn is forgotten.
        p.retract(p.root_state(), at, stimulus, 1);
        p.propagate();
        assert!(p.value_at(p.root_state(), at).is_nil());
        assert!(!p.is_pending());
    }

    #[test]
    fn same_instant_duplicate_keeps_latest() {
        let mut p = Propagator::new(Circuit::new("empty"), PropagatorConfig::default()).unwrap();
        let at = Location::new(1, 2);
        let stimulus = ComponentId::next();
        p.set_value(p.root_state(), at, Value::FALSE, stimulus, 2);
        p.set_value(p.root_state(), at, Value::TRUE, stimulus, 2);
        let m = p.propagate();
        assert_eq!(m.events_processed, 1);
        assert_eq!(p.value_at(p.root_state(), at), Value::TRUE);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = PropagatorConfig {
            iteration_limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            Propagator::new(Circuit::new("c"), cfg),
            Err(ConfigError::ZeroIterationLimit)
        ));
    }
}
