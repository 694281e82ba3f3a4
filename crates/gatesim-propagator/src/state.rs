//! Per-instantiation simulation state.
//!
//! A [`CircuitState`] holds everything the propagator knows about one
//! instantiation of a circuit: which drivers assert what at each point,
//! the resolved value of every point, work queued for the current
//! instant, and the memory of sequential components. Sub-circuit
//! instances get their own child state, created the first time the
//! instance is evaluated.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gatesim_circuit::{Circuit, Topology};
use gatesim_core::{ComponentId, Location, StateId, Value};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

/// One driver's contribution at a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cause {
    /// The driving component, instance, or external stimulus.
    pub driver: ComponentId,
    /// The value it asserts.
    pub value: Value,
}

/// Drivers at one point. Never stored empty.
pub(crate) type CauseList = SmallVec<[Cause; 2]>;

/// Simulation state of one circuit instantiation.
pub struct CircuitState {
    id: StateId,
    circuit: Arc<Circuit>,
    pub(crate) topology: Arc<Topology>,
    parent: Option<(StateId, ComponentId)>,
    pub(crate) causes: HashMap<Location, CauseList>,
    pub(crate) values: HashMap<Location, Value>,
    pub(crate) dirty_points: IndexSet<Location>,
    pub(crate) dirty_components: IndexSet<ComponentId>,
    pub(crate) memory: HashMap<ComponentId, Option<Box<dyn Any + Send>>>,
    pub(crate) children: IndexMap<ComponentId, StateId>,
}

impl CircuitState {
    /// A fresh state: every component and point is dirty.
    pub(crate) fn new(
        id: StateId,
        circuit: Arc<Circuit>,
        parent: Option<(StateId, ComponentId)>,
    ) -> Self {
        let topology = circuit.topology();
        let mut state = Self {
            id,
            circuit,
            topology,
            parent,
            causes: HashMap::new(),
            values: HashMap::new(),
            dirty_points: IndexSet::new(),
            dirty_components: IndexSet::new(),
            memory: HashMap::new(),
            children: IndexMap::new(),
        };
        state.mark_all_dirty();
        state
    }

    /// This state's id.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// The circuit being simulated.
    pub fn circuit(&self) -> &Arc<Circuit> {
        &self.circuit
    }

    /// The topology snapshot this state was last reconciled against.
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Parent state and the instance this state simulates, or `None` for
    /// the root.
    pub fn parent(&self) -> Option<(StateId, ComponentId)> {
        self.parent
    }

    /// Resolved value at `location`; [`Value::NIL`] if never resolved.
    pub fn value_at(&self, location: Location) -> Value {
        self.values.get(&location).copied().unwrap_or(Value::NIL)
    }

    /// Drivers currently asserting a value at `location`.
    pub fn causes_at(&self, location: Location) -> &[Cause] {
        self.causes
            .get(&location)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Combination of every cause at `location`.
    pub fn driven_value(&self, location: Location) -> Value {
        self.causes_at(location)
            .iter()
            .fold(Value::NIL, |acc, c| acc.combine(&c.value))
    }

    /// Child state of a sub-circuit instance, if it has been created.
    pub fn child(&self, instance: ComponentId) -> Option<StateId> {
        self.children.get(&instance).copied()
    }

    /// All child states, keyed by instance.
    pub fn children(&self) -> impl Iterator<Item = (ComponentId, StateId)> + '_ {
        self.children.iter().map(|(i, s)| (*i, *s))
    }

    /// Whether work is queued for the current instant.
    pub fn is_dirty(&self) -> bool {
        !self.dirty_points.is_empty() || !self.dirty_components.is_empty()
    }

    /// Set or replace `driver`'s value at `location`. Returns whether the
    /// cause list changed.
    pub(crate) fn add_cause(&mut self, location: Location, driver: ComponentId, value: Value) -> bool {
        let list = self.causes.entry(location).or_default();
        match list.iter_mut().find(|c| c.driver == driver) {
            Some(existing) if existing.value == value => false,
            Some(existing) => {
                existing.value = value;
                true
            }
            None => {
                list.push(Cause { driver, value });
                true
            }
        }
    }

    /// Withdraw `driver` at `location`. Returns whether it was present.
    pub(crate) fn remove_cause(&mut self, location: Location, driver: ComponentId) -> bool {
        let Some(list) = self.causes.get_mut(&location) else {
            return false;
        };
        let Some(index) = list.iter().position(|c| c.driver == driver) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            self.causes.remove(&location);
        }
        true
    }

    /// Queue every component and every known point for re-evaluation.
    pub(crate) fn mark_all_dirty(&mut self) {
        let topology = Arc::clone(&self.topology);
        self.dirty_components
            .extend(topology.components().map(|(id, _)| id));
        self.dirty_points.extend(topology.points());
        self.dirty_points.extend(self.causes.keys().copied());
        self.dirty_points.extend(self.values.keys().copied());
    }

    /// Queue every clocked component.
    pub(crate) fn mark_clocked_dirty(&mut self) {
        let topology = Arc::clone(&self.topology);
        self.dirty_components.extend(
            topology
                .components()
                .filter(|(_, p)| p.is_clocked())
                .map(|(id, _)| id),
        );
    }

    /// Forget all values, causes, memory and children.
    pub(crate) fn clear(&mut self) {
        self.causes.clear();
        self.values.clear();
        self.dirty_points.clear();
        self.dirty_components.clear();
        self.memory.clear();
        self.children.clear();
    }
}

impl fmt::Debug for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitState")
            .field("id", &self.id)
            .field("circuit", &self.circuit.name())
            .field("parent", &self.parent)
            .field("points", &self.values.len())
            .field("children", &self.children.len())
            .finish()
    }
}
