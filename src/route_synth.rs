//! # Reroute synthesis
//!
//! Given a network and an interface whose far end has failed, [`make_reroute`] synthesizes a
//! backup routing-table entry that detours the affected label around the failure and back onto
//! the original path, via shortest IGP path.

use crate::label::Label;
use crate::routing::{Rule, RuleKind, StackOp};
use crate::topology::{InterfaceId, LinkWeight, Network, RouterId, TopologyError};
use petgraph::algo::bellman_ford;
use petgraph::stable_graph::StableGraph;
use petgraph::Directed;

/// Mints a fresh label each time it is called, guaranteed distinct from every label already
/// present in the network and from every other label this generator has produced. A caller
/// supplies the starting point and this type just counts upward; `make_reroute`'s caller is
/// responsible for seeding it above the network's existing label universe.
#[derive(Debug, Clone)]
pub struct LabelGenerator {
    next: u64,
}

impl LabelGenerator {
    /// Build a generator that will mint sticky-MPLS labels starting at `start`.
    pub fn new(start: u64) -> Self {
        Self { next: start }
    }

    /// Mint the next label.
    pub fn next_label(&mut self) -> Label {
        let l = Label::sticky_mpls(self.next);
        self.next += 1;
        l
    }
}

/// Errors raised during reroute/path synthesis.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum RouteSynthError {
    /// The network topology rejected the detour (e.g. an interface already paired).
    #[error("topology error during synthesis: {0}")]
    Topology(#[from] TopologyError),
    /// No path exists between the two endpoints in the IGP graph.
    #[error("no IGP path between {0:?} and {1:?}")]
    NoPath(RouterId, RouterId),
}

/// Shortest-path predecessor walk from `source` over `graph`, using `petgraph::algo::bellman_ford`
/// (handles negative IGP weights, which plain Dijkstra cannot).
fn shortest_path_in(graph: &StableGraph<(), LinkWeight, Directed, u32>, source: RouterId, target: RouterId) -> Option<Vec<RouterId>> {
    let (distances, predecessors) = bellman_ford(graph, source).ok()?;
    let _ = distances;
    if target == source {
        return Some(vec![source]);
    }
    let mut path = vec![target];
    let mut cur = target;
    loop {
        let pred = predecessors[cur.index()]?;
        path.push(pred);
        if pred == source {
            break;
        }
        cur = pred;
    }
    path.reverse();
    Some(path)
}

/// Find the interface on `router` whose link leads to `next`, among `router`'s owned interfaces.
fn interface_towards(network: &Network, router: RouterId, next: RouterId) -> Option<InterfaceId> {
    network.router(router).interfaces().iter().find_map(|(_, id)| {
        let iface = network.interface(*id);
        if iface.target() == next {
            Some(*id)
        } else {
            None
        }
    })
}

/// Synthesize a backup entry for `failed`'s owning router: detour the label currently forwarded
/// out `failed` around the failure via the shortest remaining IGP path to `failed`'s original
/// peer router, pushing `labels.next_label()` at the detour's entry and popping it on arrival
/// (mirrors `make_reroute`'s push-at-entry/pop-at-exit guard).
///
/// Returns the list of `(interface, top_label, Rule)` insertions a caller should apply via
/// [`crate::routing::RoutingTable::add_rule`] on each named interface's table, one per hop of the
/// detour plus the guard pop at the far end.
pub fn make_reroute(
    network: &Network,
    failed: InterfaceId,
    top_label: Label,
    labels: &mut LabelGenerator,
) -> Result<Vec<(InterfaceId, Label, Rule)>, RouteSynthError> {
    let iface = network.interface(failed);
    let source_router = iface.source();
    let original_target = iface.target();

    // Detour around the failure, not back over it: drop the failed link's edge (both
    // directions) from the graph before computing the shortest path.
    let mut residual = network.graph().clone();
    if let Some(e) = residual.find_edge(source_router, original_target) {
        residual.remove_edge(e);
    }
    if let Some(e) = residual.find_edge(original_target, source_router) {
        residual.remove_edge(e);
    }

    let path = shortest_path_in(&residual, source_router, original_target)
        .ok_or(RouteSynthError::NoPath(source_router, original_target))?;
    if path.len() < 2 {
        return Err(RouteSynthError::NoPath(source_router, original_target));
    }

    let detour_label = labels.next_label();
    let mut insertions = Vec::new();

    for hop in 0..path.len() - 1 {
        let here = path[hop];
        let next = path[hop + 1];
        let out = interface_towards(network, here, next)
            .ok_or(RouteSynthError::NoPath(here, next))?;
        let ops = if hop == 0 {
            vec![StackOp::Push(detour_label)]
        } else {
            vec![]
        };
        let key = if hop == 0 { top_label } else { detour_label };
        insertions.push((out, key, Rule::new(1, 1, RuleKind::Mpls, Some(out), ops)));
    }

    // Guard: at the original target, pop the detour label before resuming the original flow.
    // The interface the guard installs on is the peer of the last hop's outgoing interface: the
    // one that actually receives the detoured packet at `original_target`.
    let last_hop_out = interface_towards(network, path[path.len() - 2], original_target)
        .ok_or(RouteSynthError::NoPath(path[path.len() - 2], original_target))?;
    let guard_iface = network.interface(last_hop_out).matched().unwrap_or(failed);
    insertions.push((guard_iface, detour_label, Rule::new(1, 0, RuleKind::Mpls, iface.matched(), vec![StackOp::Pop])));

    Ok(insertions)
}

/// Synthesize forwarding entries along an explicit router path (rather than the shortest one),
/// pushing a fresh label at the first hop and popping it at the last — used when a caller (e.g.
/// a test scenario) wants an engineered detour rather than the IGP-shortest one.
pub fn make_path(
    network: &Network,
    path: &[RouterId],
    top_label: Label,
    labels: &mut LabelGenerator,
) -> Result<Vec<(InterfaceId, Label, Rule)>, RouteSynthError> {
    if path.len() < 2 {
        return Err(RouteSynthError::NoPath(
            path.first().copied().unwrap_or_else(|| network.null_router()),
            path.last().copied().unwrap_or_else(|| network.null_router()),
        ));
    }
    let detour_label = labels.next_label();
    let mut insertions = Vec::new();
    for hop in 0..path.len() - 1 {
        let here = path[hop];
        let next = path[hop + 1];
        let out = interface_towards(network, here, next).ok_or(RouteSynthError::NoPath(here, next))?;
        let ops = if hop == 0 { vec![StackOp::Push(detour_label)] } else { vec![] };
        let key = if hop == 0 { top_label } else { detour_label };
        insertions.push((out, key, Rule::new(0, 0, RuleKind::Mpls, Some(out), ops)));
    }
    Ok(insertions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;

    #[test]
    fn make_path_pushes_on_entry_and_keys_by_detour_label_downstream() {
        let mut net = Network::new();
        let r0 = net.add_router("r0").unwrap();
        let r1 = net.add_router("r1").unwrap();
        let r2 = net.add_router("r2").unwrap();
        net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        net.add_link(r1, "eth1", r2, "eth0", 1.0).unwrap();

        let mut gen = LabelGenerator::new(1000);
        let top = Label::mpls(5);
        let insertions = make_path(&net, &[r0, r1, r2], top, &mut gen).unwrap();
        assert_eq!(insertions.len(), 2);
        assert_eq!(insertions[0].1, top);
        assert!(matches!(insertions[0].2.ops.as_slice(), [StackOp::Push(_)]));
        assert_eq!(insertions[1].1, insertions[0].2.ops.iter().find_map(|o| match o {
            StackOp::Push(l) => Some(*l),
            _ => None,
        }).unwrap());
    }

    #[test]
    fn make_path_rejects_a_single_router_path() {
        let mut net = Network::new();
        let r0 = net.add_router("r0").unwrap();
        let mut gen = LabelGenerator::new(1000);
        assert!(make_path(&net, &[r0], Label::mpls(1), &mut gen).is_err());
    }
}
