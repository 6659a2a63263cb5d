//! A single network interface: a local/global identity, a pairing with its peer, and a
//! routing table.

use crate::routing::RoutingTable;
use crate::topology::{InterfaceId, RouterId};

/// An interface owned by exactly one router.
///
/// Invariants (enforced by [`crate::topology::Network`], not by this type alone):
/// - pairing is symmetric: if `a.matched == Some(b)` then `b.matched == Some(a)`.
/// - `source(a) == target(match(a))` and vice versa.
/// - a virtual interface (`source == target`) never connects outward.
/// - an interface whose `target` is the NULL router is an external/sink endpoint.
#[derive(Debug, Clone)]
pub struct Interface {
    name: String,
    local_id: usize,
    global_id: InterfaceId,
    source: RouterId,
    target: RouterId,
    matched: Option<InterfaceId>,
    routing_table: RoutingTable,
}

impl Interface {
    pub(crate) fn new(
        name: String,
        local_id: usize,
        global_id: InterfaceId,
        source: RouterId,
        target: RouterId,
    ) -> Self {
        Self { name, local_id, global_id, source, target, matched: None, routing_table: RoutingTable::new() }
    }

    /// The interface's name, unique among its owning router's interfaces.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The index of this interface among its owning router's interfaces.
    pub fn local_id(&self) -> usize {
        self.local_id
    }

    /// This interface's position in the network's global interface arena.
    pub fn global_id(&self) -> InterfaceId {
        self.global_id
    }

    /// The router that owns this interface.
    pub fn source(&self) -> RouterId {
        self.source
    }

    /// The router reached by sending a packet out of this interface.
    pub fn target(&self) -> RouterId {
        self.target
    }

    /// The interface on the target router that receives packets sent out of this one, if paired.
    pub fn matched(&self) -> Option<InterfaceId> {
        self.matched
    }

    /// Whether this interface is a loopback (virtual) interface: `source == target`.
    pub fn is_virtual(&self) -> bool {
        self.source == self.target
    }

    /// Whether this interface is unpaired and thus sinks to the NULL router.
    pub fn is_sink(&self) -> bool {
        self.matched.is_none()
    }

    /// This interface's routing table.
    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    /// This interface's routing table, mutably.
    pub fn routing_table_mut(&mut self) -> &mut RoutingTable {
        &mut self.routing_table
    }

    pub(crate) fn set_target(&mut self, target: RouterId) {
        self.target = target;
    }

    pub(crate) fn set_matched(&mut self, matched: Option<InterfaceId>) {
        self.matched = matched;
    }

    pub(crate) fn set_global_id(&mut self, global_id: InterfaceId) {
        self.global_id = global_id;
    }
}
