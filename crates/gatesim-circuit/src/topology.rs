//! Immutable circuit contents and their derived connectivity.
//!
//! A [`Topology`] is a snapshot: [`Circuit`](crate::Circuit) mutators
//! clone it, edit the clone, rebuild the derived indexes, and publish the
//! result with a bumped [`revision`](Topology::revision). Anyone holding
//! an `Arc<Topology>` keeps a consistent view regardless of later edits.
//!
//! Connectivity is derived, not stored: points joined by wires form a
//! [`Net`], and every component port or pin touches exactly one net.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gatesim_core::{BitWidth, Component, ComponentId, Direction, Location, Port, WireId};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use crate::circuit::Circuit;

/// A straight connection between two grid points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Wire {
    /// First endpoint.
    pub a: Location,
    /// Second endpoint.
    pub b: Location,
}

/// A named connection point exposed when the circuit is instantiated as a
/// sub-circuit.
///
/// `Input` pins are driven from the parent; `Output` pins drive the
/// parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pin {
    /// Label for diagnostics.
    pub name: String,
    /// Position inside this circuit.
    pub location: Location,
    /// Direction seen from the parent.
    pub direction: Direction,
    /// Number of bits carried.
    pub width: BitWidth,
}

/// What occupies a placement.
#[derive(Clone)]
pub enum PlacementKind {
    /// A leaf component.
    Component(Arc<dyn Component>),
    /// An instance of another circuit.
    Subcircuit(Arc<Circuit>),
}

/// A component or sub-circuit instance placed on the grid.
#[derive(Clone)]
pub struct Placement {
    /// Grid position of the anchor; port offsets are relative to it.
    pub anchor: Location,
    /// The placed element.
    pub kind: PlacementKind,
    /// Ports in absolute grid coordinates.
    ///
    /// For a sub-circuit instance these mirror the child's pins at the
    /// time of placement, in pin order.
    pub ports: Vec<Port>,
}

impl Placement {
    /// The leaf component, if this is not a sub-circuit.
    pub fn component(&self) -> Option<&Arc<dyn Component>> {
        match &self.kind {
            PlacementKind::Component(c) => Some(c),
            PlacementKind::Subcircuit(_) => None,
        }
    }

    /// The instantiated circuit, if this is a sub-circuit.
    pub fn subcircuit(&self) -> Option<&Arc<Circuit>> {
        match &self.kind {
            PlacementKind::Component(_) => None,
            PlacementKind::Subcircuit(c) => Some(c),
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        match &self.kind {
            PlacementKind::Component(c) => c.name(),
            PlacementKind::Subcircuit(c) => c.name(),
        }
    }

    /// Whether the element must re-evaluate on every clock tick.
    pub fn is_clocked(&self) -> bool {
        self.component().is_some_and(|c| c.is_clocked())
    }

    /// Translate a point inside the instantiated circuit to this circuit's
    /// coordinates.
    pub fn to_outer(&self, inner: Location) -> Location {
        inner.translate(self.anchor)
    }

    /// Translate a point of this circuit into the instantiated circuit.
    pub fn to_inner(&self, outer: Location) -> Location {
        Location::new(outer.x - self.anchor.x, outer.y - self.anchor.y)
    }
}

impl fmt::Debug for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placement")
            .field("name", &self.name())
            .field("anchor", &self.anchor)
            .field("subcircuit", &self.subcircuit().is_some())
            .field("ports", &self.ports.len())
            .finish()
    }
}

/// A maximal set of points joined by wires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Net {
    /// Every point on the net, in discovery order.
    pub points: SmallVec<[Location; 4]>,
    /// Widest port or pin touching the net (one bit if none).
    pub width: BitWidth,
}

// ── Topology ───────────────────────────────────────────────────────

/// Snapshot of a circuit's contents.
#[derive(Clone, Default)]
pub struct Topology {
    revision: u64,
    pub(crate) components: IndexMap<ComponentId, Placement>,
    pub(crate) wires: IndexMap<WireId, Wire>,
    pub(crate) pins: Vec<Pin>,
    attachments: HashMap<Location, SmallVec<[ComponentId; 4]>>,
    readers: HashMap<Location, SmallVec<[ComponentId; 4]>>,
    nets: Vec<Net>,
    net_of: HashMap<Location, usize>,
}

impl Topology {
    /// Incremented by every mutation. A fresh circuit is at revision 0.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Placed components and instances, in placement order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Placement)> + '_ {
        self.components.iter().map(|(id, p)| (*id, p))
    }

    /// Look up a placement.
    pub fn component(&self, id: ComponentId) -> Option<&Placement> {
        self.components.get(&id)
    }

    /// Whether `id` is placed in this circuit.
    pub fn contains_component(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    /// Number of placements.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Sub-circuit instances, in placement order.
    pub fn subcircuits(&self) -> impl Iterator<Item = (ComponentId, &Arc<Circuit>)> + '_ {
        self.components
            .iter()
            .filter_map(|(id, p)| p.subcircuit().map(|c| (*id, c)))
    }

    /// Wires, in creation order.
    pub fn wires(&self) -> impl Iterator<Item = (WireId, &Wire)> + '_ {
        self.wires.iter().map(|(id, w)| (*id, w))
    }

    /// Pins, in creation order.
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// The pin at `location`, if any.
    pub fn pin_at(&self, location: Location) -> Option<&Pin> {
        self.pins.iter().find(|p| p.location == location)
    }

    /// Components with a port at `location`.
    pub fn attached(&self, location: Location) -> &[ComponentId] {
        self.attachments
            .get(&location)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Components with an input port at `location`: those that must be
    /// re-evaluated when its value changes.
    pub fn readers(&self, location: Location) -> &[ComponentId] {
        self.readers
            .get(&location)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// The net containing `location`, or `None` if nothing touches it.
    pub fn net_at(&self, location: Location) -> Option<&Net> {
        self.net_of.get(&location).map(|&i| &self.nets[i])
    }

    /// All nets.
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    /// Every point touched by a port, pin, or wire end.
    pub fn points(&self) -> impl Iterator<Item = Location> + '_ {
        self.net_of.keys().copied()
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    /// Recompute attachments and nets from components, wires, and pins.
    pub(crate) fn rebuild_index(&mut self) {
        self.attachments.clear();
        self.readers.clear();
        let mut points: IndexSet<Location> = IndexSet::new();
        let mut widths: HashMap<Location, BitWidth> = HashMap::new();
        let mut widen = |at: Location, w: BitWidth| {
            let slot = widths.entry(at).or_insert(w);
            *slot = (*slot).max(w);
        };

        for (id, placement) in &self.components {
            for port in &placement.ports {
                let ids = self.attachments.entry(port.location).or_default();
                if !ids.contains(id) {
                    ids.push(*id);
                }
                if !port.is_output() {
                    let ids = self.readers.entry(port.location).or_default();
                    if !ids.contains(id) {
                        ids.push(*id);
                    }
                }
                points.insert(port.location);
                widen(port.location, port.width);
            }
        }
        for pin in &self.pins {
            points.insert(pin.location);
            widen(pin.location, pin.width);
        }
        for wire in self.wires.values() {
            points.insert(wire.a);
            points.insert(wire.b);
        }

        let mut sets = UnionFind::new(points.len());
        for wire in self.wires.values() {
            if let (Some(a), Some(b)) = (points.get_index_of(&wire.a), points.get_index_of(&wire.b)) {
                sets.union(a, b);
            }
        }

        self.nets.clear();
        self.net_of.clear();
        let mut net_for_root: HashMap<usize, usize> = HashMap::new();
        for (i, &at) in points.iter().enumerate() {
            let root = sets.find(i);
            let net = *net_for_root.entry(root).or_insert_with(|| {
                self.nets.push(Net {
                    points: SmallVec::new(),
                    width: BitWidth::ZERO,
                });
                self.nets.len() - 1
            });
            let entry = &mut self.nets[net];
            entry.points.push(at);
            if let Some(w) = widths.get(&at) {
                entry.width = entry.width.max(*w);
            }
            self.net_of.insert(at, net);
        }
        for net in &mut self.nets {
            if net.width == BitWidth::ZERO {
                net.width = BitWidth::ONE;
            }
        }
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("revision", &self.revision)
            .field("components", &self.components.len())
            .field("wires", &self.wires.len())
            .field("pins", &self.pins.len())
            .field("nets", &self.nets.len())
            .finish()
    }
}

/// Disjoint-set forest with path halving.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(x: i32, y: i32) -> Location {
        Location::new(x, y)
    }

    #[test]
    fn wires_chain_into_one_net() {
        let mut t = Topology::default();
        t.wires.insert(WireId::next(), Wire { a: loc(0, 0), b: loc(5, 0) });
        t.wires.insert(WireId::next(), Wire { a: loc(5, 0), b: loc(5, 5) });
        t.wires.insert(WireId::next(), Wire { a: loc(9, 9), b: loc(9, 8) });
        t.rebuild_index();

        assert_eq!(t.nets().len(), 2);
        let net = t.net_at(loc(0, 0)).unwrap();
        assert_eq!(net.points.len(), 3);
        assert!(net.points.contains(&loc(5, 5)));
        assert_eq!(net.width, BitWidth::ONE);
        assert!(t.net_at(loc(1, 1)).is_none());
    }

    #[test]
    fn pins_set_net_width() {
        let mut t = Topology::default();
        let w8 = BitWidth::new(8).unwrap();
        t.pins.push(Pin {
            name: "bus".into(),
            location: loc(0, 0),
            direction: Direction::Input,
            width: w8,
        });
        t.wires.insert(WireId::next(), Wire { a: loc(0, 0), b: loc(3, 0) });
        t.rebuild_index();
        assert_eq!(t.net_at(loc(3, 0)).unwrap().width, w8);
        assert_eq!(t.pin_at(loc(0, 0)).unwrap().name, "bus");
    }
}
