//! The mutable circuit handle.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use gatesim_core::{BitWidth, Component, ComponentId, Direction, Location, Port, WireId};

use crate::error::CircuitError;
use crate::locker::CircuitLocker;
use crate::topology::{Pin, Placement, PlacementKind, Topology, Wire};

/// A circuit: placed components, sub-circuit instances, wires, and pins.
///
/// Circuits are shared through `Arc` between the editor, the propagator,
/// and any parent circuits that instantiate them. Every mutator requires
/// the calling thread to hold the write lock (see
/// [`Transaction`](crate::Transaction)) and panics otherwise. Readers take
/// a [`topology`](Self::topology) snapshot.
pub struct Circuit {
    name: String,
    locker: CircuitLocker,
    topology: RwLock<Arc<Topology>>,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            locker: CircuitLocker::new(),
            topology: RwLock::new(Arc::new(Topology::default())),
        })
    }

    /// Circuit name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lock guarding this circuit.
    pub fn locker(&self) -> &CircuitLocker {
        &self.locker
    }

    /// Current contents.
    pub fn topology(&self) -> Arc<Topology> {
        Arc::clone(&self.topology.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Current revision; changes whenever the contents change.
    pub fn revision(&self) -> u64 {
        self.topology
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .revision()
    }

    /// Whether `other` is this circuit or is nested anywhere beneath it.
    pub fn contains(&self, other: &Circuit) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.topology()
            .subcircuits()
            .any(|(_, child)| child.contains(other))
    }

    // ── Mutators ───────────────────────────────────────────────────

    /// Place a component with its anchor at `anchor`.
    pub fn add_component(
        &self,
        component: Arc<dyn Component>,
        anchor: Location,
    ) -> Result<ComponentId, CircuitError> {
        let id = ComponentId::next();
        let ports = component.ports().into_iter().map(|p| p.at(anchor)).collect();
        self.edit("add_component", |t| {
            t.components.insert(
                id,
                Placement {
                    anchor,
                    kind: PlacementKind::Component(component),
                    ports,
                },
            );
            Ok(id)
        })
    }

    /// Place an instance of `child` with its origin at `anchor`.
    ///
    /// The instance exposes one port per child pin, in pin order. Pins
    /// added to `child` afterwards are not visible through this instance.
    pub fn add_subcircuit(
        &self,
        child: Arc<Circuit>,
        anchor: Location,
    ) -> Result<ComponentId, CircuitError> {
        self.locker.check_for_write_permission("add_subcircuit");
        if child.contains(self) {
            return Err(CircuitError::RecursiveNesting {
                parent: self.name.clone(),
                child: child.name.clone(),
            });
        }
        let id = ComponentId::next();
        let ports = child
            .topology()
            .pins()
            .iter()
            .map(|pin| Port {
                location: pin.location.translate(anchor),
                direction: pin.direction,
                width: pin.width,
            })
            .collect();
        self.edit("add_subcircuit", |t| {
            t.components.insert(
                id,
                Placement {
                    anchor,
                    kind: PlacementKind::Subcircuit(child),
                    ports,
                },
            );
            Ok(id)
        })
    }

    /// Remove a component or sub-circuit instance.
    pub fn remove_component(&self, id: ComponentId) -> Result<(), CircuitError> {
        self.edit("remove_component", |t| {
            t.components
                .shift_remove(&id)
                .map(|_| ())
                .ok_or(CircuitError::NoSuchComponent(id))
        })
    }

    /// Join two points with a wire.
    pub fn add_wire(&self, a: Location, b: Location) -> Result<WireId, CircuitError> {
        self.edit("add_wire", |t| {
            if a == b {
                return Err(CircuitError::DegenerateWire(a));
            }
            let id = WireId::next();
            t.wires.insert(id, Wire { a, b });
            Ok(id)
        })
    }

    /// Remove a wire.
    pub fn remove_wire(&self, id: WireId) -> Result<(), CircuitError> {
        self.edit("remove_wire", |t| {
            t.wires
                .shift_remove(&id)
                .map(|_| ())
                .ok_or(CircuitError::NoSuchWire(id))
        })
    }

    /// Expose `location` as a pin for instantiation.
    pub fn add_pin(
        &self,
        name: impl Into<String>,
        location: Location,
        direction: Direction,
        width: BitWidth,
    ) -> Result<(), CircuitError> {
        let name = name.into();
        self.edit("add_pin", |t| {
            if t.pin_at(location).is_some() {
                return Err(CircuitError::DuplicatePin(location));
            }
            t.pins.push(Pin {
                name,
                location,
                direction,
                width,
            });
            Ok(())
        })
    }

    /// Remove the pin at `location`.
    pub fn remove_pin(&self, location: Location) -> Result<(), CircuitError> {
        self.edit("remove_pin", |t| {
            let index = t
                .pins
                .iter()
                .position(|p| p.location == location)
                .ok_or(CircuitError::NoSuchPin(location))?;
            t.pins.remove(index);
            Ok(())
        })
    }

    /// Copy-on-write edit: clone the snapshot, apply `f`, and publish the
    /// result only if `f` succeeds.
    fn edit<R>(
        &self,
        op: &str,
        f: impl FnOnce(&mut Topology) -> Result<R, CircuitError>,
    ) -> Result<R, CircuitError> {
        self.locker.check_for_write_permission(op);
        let mut slot = self.topology.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Topology::clone(&slot);
        let out = f(&mut next)?;
        next.bump_revision();
        next.rebuild_index();
        tracing::debug!(
            circuit = %self.name,
            op,
            revision = next.revision(),
            "circuit edited"
        );
        *slot = Arc::new(next);
        Ok(out)
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("name", &self.name)
            .field("serial", &self.locker.serial_number())
            .field("revision", &self.revision())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    #[test]
    fn edits_bump_revision_and_keep_old_snapshots() {
        let c = Circuit::new("c");
        let before = c.topology();
        Transaction::new()
            .write(&c)
            .execute(|_| {
                c.add_wire(Location::new(0, 0), Location::new(1, 0)).unwrap();
            })
            .unwrap();
        assert_eq!(before.revision(), 0);
        assert_eq!(c.revision(), 1);
        assert_eq!(c.topology().wires().count(), 1);
        assert_eq!(before.wires().count(), 0);
    }

    #[test]
    fn failed_edit_leaves_revision() {
        let c = Circuit::new("c");
        let _guard = Transaction::new().write(&c).acquire().unwrap();
        let err = c.add_wire(Location::new(2, 2), Location::new(2, 2));
        assert_eq!(err, Err(CircuitError::DegenerateWire(Location::new(2, 2))));
        assert_eq!(c.revision(), 0);
    }

    #[test]
    #[should_panic(expected = "add_wire requires a write transaction")]
    fn mutation_without_transaction_panics() {
        let c = Circuit::new("c");
        let _ = c.add_wire(Location::new(0, 0), Location::new(1, 0));
    }

    #[test]
    fn self_nesting_is_rejected() {
        let c = Circuit::new("c");
        let _guard = Transaction::new().write(&c).acquire().unwrap();
        let err = c.add_subcircuit(Arc::clone(&c), Location::new(0, 0));
        assert!(matches!(err, Err(CircuitError::RecursiveNesting { .. })));
    }
}
