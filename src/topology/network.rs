//! # Network
//!
//! The top-level topology container: a graph of routers, a global interface arena, and the
//! cached label universe.

use crate::label::{sentinels, Label};
use crate::routing::StackOp;
use crate::topology::{Interface, InterfaceId, LinkWeight, Router, RouterId, TopologyError};
use log::debug;
use petgraph::stable_graph::StableGraph;
use petgraph::Directed;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Default IGP weight given to a link when the caller does not specify one.
pub const DEFAULT_LINK_WEIGHT: LinkWeight = 1.0;

/// The physical/logical network topology.
#[derive(Debug, Clone)]
pub struct Network {
    graph: StableGraph<(), LinkWeight, Directed, u32>,
    routers: HashMap<RouterId, Router>,
    interfaces: Vec<Interface>,
    alias_to_router: HashMap<String, RouterId>,
    null_router: RouterId,
    label_universe: RefCell<Option<HashSet<Label>>>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Build an empty network. The NULL router is created eagerly: it exists exactly once per
    /// network.
    pub fn new() -> Self {
        let mut graph = StableGraph::default();
        let null_idx = graph.add_node(());
        let mut routers = HashMap::new();
        routers.insert(null_idx, Router::new(null_idx, "NULL".to_string(), true));
        let mut alias_to_router = HashMap::new();
        alias_to_router.insert("NULL".to_string(), null_idx);
        Self {
            graph,
            routers,
            interfaces: Vec::new(),
            alias_to_router,
            null_router: null_idx,
            label_universe: RefCell::new(None),
        }
    }

    /// The distinguished NULL router that sinks unpaired interfaces.
    pub fn null_router(&self) -> RouterId {
        self.null_router
    }

    /// Add a new router and return its id. Fails if `name` is already bound.
    pub fn add_router<S: Into<String>>(&mut self, name: S) -> Result<RouterId, TopologyError> {
        let name = name.into();
        if self.alias_to_router.contains_key(&name) {
            return Err(TopologyError::DuplicateAlias(name));
        }
        let idx = self.graph.add_node(());
        self.routers.insert(idx, Router::new(idx, name.clone(), false));
        self.alias_to_router.insert(name, idx);
        Ok(idx)
    }

    /// Add `alias` as an additional (and new primary) name for `router`.
    pub fn add_alias<S: Into<String>>(&mut self, router: RouterId, alias: S) -> Result<(), TopologyError> {
        let alias = alias.into();
        if self.alias_to_router.contains_key(&alias) {
            return Err(TopologyError::DuplicateAlias(alias));
        }
        let r = self.routers.get_mut(&router).ok_or(TopologyError::IsNullRouter)?;
        r.add_alias(alias.clone());
        self.alias_to_router.insert(alias, router);
        Ok(())
    }

    /// Resolve a router by any of its aliases.
    pub fn get_router(&self, name: &str) -> Option<RouterId> {
        self.alias_to_router.get(name).copied()
    }

    /// Borrow a router by id.
    pub fn router(&self, id: RouterId) -> &Router {
        &self.routers[&id]
    }

    /// Mutably borrow a router by id.
    pub fn router_mut(&mut self, id: RouterId) -> &mut Router {
        self.routers.get_mut(&id).expect("RouterId must refer to a router in this network")
    }

    /// Iterate all routers (including the NULL router).
    pub fn routers(&self) -> impl Iterator<Item = &Router> {
        self.routers.values()
    }

    /// All interfaces, indexed by global id.
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// Borrow an interface by global id.
    pub fn interface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id]
    }

    /// Mutably borrow an interface by global id. Invalidates the cached label universe, since
    /// callers use this to mutate routing tables.
    pub fn interface_mut(&mut self, id: InterfaceId) -> &mut Interface {
        *self.label_universe.borrow_mut() = None;
        &mut self.interfaces[id]
    }

    /// Look up (or lazily create) the interface named `name` on `router`, targeting the NULL
    /// router until it is paired.
    pub fn get_interface<S: Into<String>>(&mut self, router: RouterId, name: S) -> InterfaceId {
        let name = name.into();
        if let Some(id) = self.router(router).interface(&name) {
            return id;
        }
        let global_id = self.interfaces.len();
        let local_id;
        {
            let r = self.router_mut(router);
            local_id = r.own_interface(name.clone(), global_id);
        }
        let null = self.null_router;
        self.interfaces.push(Interface::new(name, local_id, global_id, router, null));
        *self.label_universe.borrow_mut() = None;
        global_id
    }

    /// Add a virtual (loopback) interface: `source == target`. Traversing a virtual interface
    /// produces only same-router PDS transitions.
    pub fn add_virtual_interface<S: Into<String>>(&mut self, router: RouterId, name: S) -> InterfaceId {
        let name = name.into();
        let global_id = self.interfaces.len();
        let local_id = self.router_mut(router).own_interface(name.clone(), global_id);
        self.interfaces.push(Interface::new(name, local_id, global_id, router, router));
        *self.label_universe.borrow_mut() = None;
        global_id
    }

    /// Pair two interfaces: make their `matched`/`target` fields consistent, and add an edge in
    /// the IGP graph between their owning routers (used by [`crate::route_synth`]'s shortest-path
    /// computations). Symmetric by construction: `match(match(i)) = i`.
    pub fn link(
        &mut self,
        a: InterfaceId,
        b: InterfaceId,
        weight: LinkWeight,
    ) -> Result<(), TopologyError> {
        if self.interfaces[a].matched().is_some() || self.interfaces[b].matched().is_some() {
            return Err(TopologyError::AlreadyPaired);
        }
        let (src_a, src_b) = (self.interfaces[a].source(), self.interfaces[b].source());
        self.interfaces[a].set_target(src_b);
        self.interfaces[a].set_matched(Some(b));
        self.interfaces[b].set_target(src_a);
        self.interfaces[b].set_matched(Some(a));
        if self.graph.find_edge(src_a, src_b).is_none() {
            self.graph.add_edge(src_a, src_b, weight);
            self.graph.add_edge(src_b, src_a, weight);
        }
        debug!("linked {}:{} <-> {}:{}", src_a.index(), self.interfaces[a].name(), src_b.index(), self.interfaces[b].name());
        Ok(())
    }

    /// Convenience wrapper around [`Network::get_interface`] + [`Network::link`].
    pub fn add_link<S1, S2>(
        &mut self,
        from_router: RouterId,
        from_if: S1,
        to_router: RouterId,
        to_if: S2,
        weight: LinkWeight,
    ) -> Result<(InterfaceId, InterfaceId), TopologyError>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let a = self.get_interface(from_router, from_if);
        let b = self.get_interface(to_router, to_if);
        self.link(a, b, weight)?;
        Ok((a, b))
    }

    /// The IGP topology graph (routers as nodes, links as weighted edges).
    pub fn graph(&self) -> &StableGraph<(), LinkWeight, Directed, u32> {
        &self.graph
    }

    /// The set of labels appearing anywhere in the network (entry top-labels and rule operation
    /// labels), plus the nine sentinel labels. Cached on first request, invalidated whenever a
    /// table is mutated through [`Network::interface_mut`].
    pub fn all_labels(&self) -> HashSet<Label> {
        if let Some(cached) = self.label_universe.borrow().as_ref() {
            return cached.clone();
        }
        let mut set: HashSet<Label> = sentinels().into_iter().collect();
        for iface in &self.interfaces {
            for entry in iface.routing_table().entries() {
                if !entry.is_default() {
                    set.insert(entry.top_label());
                }
                for rule in entry.rules() {
                    for op in &rule.ops {
                        match op {
                            StackOp::Push(l) | StackOp::Swap(l) => {
                                set.insert(*l);
                            }
                            StackOp::Pop => {}
                        }
                    }
                }
            }
        }
        *self.label_universe.borrow_mut() = Some(set.clone());
        set
    }

    /// Merge `other` into `self`, renaming any router whose name collides (appending `'`
    /// repeatedly) and reindexing every router and interface into `self`'s arenas. `other`'s
    /// NULL router is folded into `self`'s.
    ///
    /// Returns the router-id remapping `other -> self` (excluding NULL, which always maps to
    /// `self.null_router()`).
    pub fn merge_into(&mut self, other: Network) -> HashMap<RouterId, RouterId> {
        let mut remap: HashMap<RouterId, RouterId> = HashMap::new();
        remap.insert(other.null_router, self.null_router);

        // First pass: create the routers in `self`, picking non-conflicting names.
        let mut other_routers: Vec<_> = other.routers.values().cloned().collect();
        other_routers.sort_by_key(|r| r.index().index());
        for r in &other_routers {
            if r.is_null() {
                continue;
            }
            let mut name = r.name().to_string();
            while self.alias_to_router.contains_key(&name) {
                name.push('\'');
            }
            let new_id = self
                .add_router(name)
                .expect("freshly deduplicated name cannot collide");
            remap.insert(r.index(), new_id);
        }

        // Second pass: recreate interfaces (by name, under the remapped owning router) so they
        // get fresh global ids in `self`'s arena, then restore routing tables and pairing.
        let mut old_to_new_iface: HashMap<InterfaceId, InterfaceId> = HashMap::new();
        for r in &other_routers {
            for (name, old_id) in r.interfaces() {
                let new_router = remap[&r.index()];
                let new_id = self.get_interface(new_router, name.clone());
                old_to_new_iface.insert(*old_id, new_id);
            }
        }
        for r in &other_routers {
            for (_, old_id) in r.interfaces() {
                let old_iface = &other.interfaces[*old_id];
                let new_id = old_to_new_iface[old_id];
                *self.interfaces[new_id].routing_table_mut() = old_iface.routing_table().clone();
                let new_target = remap[&old_iface.target()];
                self.interfaces[new_id].set_target(new_target);
                if let Some(old_match) = old_iface.matched() {
                    self.interfaces[new_id].set_matched(Some(old_to_new_iface[&old_match]));
                }
            }
        }
        // Re-point every outgoing-interface reference inside migrated routing tables: they
        // still hold `other`'s interface ids at this point.
        self.remap_vias(&old_to_new_iface);
        *self.label_universe.borrow_mut() = None;
        remap
    }

    /// Rewrite every rule's `via` field from old interface ids to new ones. Used only right
    /// after [`Network::merge_into`] copies in routing tables still referring to the donor
    /// network's interface ids.
    fn remap_vias(&mut self, map: &HashMap<InterfaceId, InterfaceId>) {
        for new_id in map.values().copied().collect::<Vec<_>>() {
            let table = self.interfaces[new_id].routing_table_mut();
            let entries = std::mem::take(&mut *table);
            let mut rebuilt = entries;
            for entry in rebuilt.entries_mut() {
                for rule in entry.rules_mut() {
                    if let Some(via) = rule.via {
                        if let Some(new_via) = map.get(&via) {
                            rule.via = Some(*new_via);
                        }
                    }
                }
            }
            *self.interfaces[new_id].routing_table_mut() = rebuilt;
        }
    }

    /// Splice `other` into `self` as a detour on an existing link: `link` (which must currently
    /// target the NULL router) is paired with `other`'s `ingoing` interface (which must also
    /// target the NULL router), after merging `other`'s routers/interfaces into `self`.
    pub fn concat(
        &mut self,
        link: InterfaceId,
        other: Network,
        ingoing_name: &str,
    ) -> Result<(), TopologyError> {
        if self.interfaces[link].target() != self.null_router {
            return Err(TopologyError::NotASinkInterface(self.interfaces[link].name().to_string()));
        }
        let ingoing_router = other
            .routers
            .values()
            .find(|r| r.interface(ingoing_name).is_some())
            .ok_or_else(|| TopologyError::UnknownInterface("<other>".to_string(), ingoing_name.to_string()))?
            .index();
        let remap = self.merge_into(other);
        let new_router = remap[&ingoing_router];
        let ingoing = self.get_interface(new_router, ingoing_name);
        self.link(link, ingoing, DEFAULT_LINK_WEIGHT)?;
        Ok(())
    }

    /// Splice `other` into `self` as a PUSH/POP-guarded detour: every interface on `link`'s
    /// router gets a `PUSH(pre_label)` appended when forwarding out of `link`, and a virtual
    /// guard interface is installed that `POP`s `post_label` before rejoining `link`'s original
    /// far end.
    pub fn inject(
        &mut self,
        link: InterfaceId,
        other: Network,
        ingoing_name: &str,
        outgoing_name: &str,
        pre_label: Label,
        post_label: Label,
    ) -> Result<(), TopologyError> {
        let link_match = self.interfaces[link]
            .matched()
            .ok_or_else(|| TopologyError::NotASinkInterface(self.interfaces[link].name().to_string()))?;
        let link_source = self.interfaces[link].source();
        let outgoing_router = other
            .routers
            .values()
            .find(|r| r.interface(outgoing_name).is_some())
            .ok_or_else(|| TopologyError::UnknownInterface("<other>".to_string(), outgoing_name.to_string()))?
            .index();
        let ingoing_router = other
            .routers
            .values()
            .find(|r| r.interface(ingoing_name).is_some())
            .ok_or_else(|| TopologyError::UnknownInterface("<other>".to_string(), ingoing_name.to_string()))?
            .index();

        let remap = self.merge_into(other);
        let new_outgoing_router = remap[&outgoing_router];
        let new_ingoing_router = remap[&ingoing_router];
        let outgoing = self.get_interface(new_outgoing_router, outgoing_name);
        let ingoing = self.get_interface(new_ingoing_router, ingoing_name);

        let virtual_guard = self.add_virtual_interface(new_outgoing_router, "__virtual_guard__");
        let end_link = self.add_virtual_interface(link_source, "__end_link__");

        self.link(link, ingoing, DEFAULT_LINK_WEIGHT)?;
        self.link(outgoing, virtual_guard, DEFAULT_LINK_WEIGHT)?;
        self.link(link_match, end_link, DEFAULT_LINK_WEIGHT)?;

        // every interface on link's router gets a PUSH(pre_label) appended when forwarding
        // out of `link`.
        for (name, id) in self.router(link_source).interfaces().to_vec() {
            let _ = name;
            self.interfaces[id].routing_table_mut().add_to_outgoing(link, StackOp::Push(pre_label));
        }
        let default_top = post_label;
        self.interfaces[virtual_guard].routing_table_mut().add_rule(
            default_top,
            crate::routing::Rule::new(0, 0, crate::routing::RuleKind::Mpls, Some(end_link), vec![StackOp::Pop]),
        );
        *self.label_universe.borrow_mut() = None;
        Ok(())
    }

    /// Number of non-NULL routers.
    pub fn len(&self) -> usize {
        self.routers.values().filter(|r| !r.is_null()).count()
    }

    /// Whether the network has no non-NULL routers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::routing::{Rule, RuleKind, StackOp};

    #[test]
    fn null_router_exists_exactly_once() {
        let net = Network::new();
        assert!(net.get_router("NULL").is_some());
        assert_eq!(net.routers().filter(|r| r.is_null()).count(), 1);
    }

    #[test]
    fn unpaired_interface_sinks_to_null() {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let eth0 = net.get_interface(r0, "eth0");
        assert_eq!(net.interface(eth0).target(), net.null_router());
        assert!(net.interface(eth0).is_sink());
    }

    #[test]
    fn link_pairs_interfaces_symmetrically() {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let r1 = net.add_router("R1").unwrap();
        let (a, b) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();

        assert_eq!(net.interface(a).matched(), Some(b));
        assert_eq!(net.interface(b).matched(), Some(a));
        assert_eq!(net.interface(a).source(), net.interface(b).target());
        assert_eq!(net.interface(b).source(), net.interface(a).target());
    }

    #[test]
    fn linking_an_already_paired_interface_fails() {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let r1 = net.add_router("R1").unwrap();
        let r2 = net.add_router("R2").unwrap();
        net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        let a = net.get_interface(r0, "eth0");
        let c = net.get_interface(r2, "eth0");
        assert!(net.link(a, c, 1.0).is_err());
    }

    #[test]
    fn virtual_interface_has_equal_source_and_target() {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let guard = net.add_virtual_interface(r0, "guard");
        assert!(net.interface(guard).is_virtual());
        assert_eq!(net.interface(guard).source(), net.interface(guard).target());
    }

    #[test]
    fn duplicate_router_name_is_rejected() {
        let mut net = Network::new();
        net.add_router("R0").unwrap();
        assert!(net.add_router("R0").is_err());
    }

    #[test]
    fn all_labels_includes_sentinels_and_table_labels() {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let r1 = net.add_router("R1").unwrap();
        let (_out, in1) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        net.interface_mut(in1).routing_table_mut().add_rule(
            Label::mpls(10),
            Rule::new(0, 0, RuleKind::Mpls, None, vec![StackOp::Swap(Label::mpls(20))]),
        );
        let universe = net.all_labels();
        assert!(universe.contains(&Label::mpls(10)));
        assert!(universe.contains(&Label::mpls(20)));
        assert!(universe.contains(&Label::unused(crate::label::Kind::Mpls)));
    }

    #[test]
    fn all_labels_cache_invalidated_on_table_mutation() {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let eth0 = net.get_interface(r0, "eth0");
        let before = net.all_labels();
        assert!(!before.contains(&Label::mpls(99)));
        net.interface_mut(eth0).routing_table_mut().add_rule(
            Label::mpls(99),
            Rule::new(0, 0, RuleKind::Discard, None, vec![]),
        );
        let after = net.all_labels();
        assert!(after.contains(&Label::mpls(99)));
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.routers.values().filter(|r| !r.is_null()).map(|r| r.name()).collect();
        names.sort_unstable();
        for name in names {
            writeln!(f, "router {}:", name)?;
            let id = self.alias_to_router[name];
            for (iname, iid) in self.router(id).interfaces() {
                writeln!(f, "  {} -> {:?} {}", iname, self.interface(*iid).target(), self.interface(*iid).routing_table())?;
            }
        }
        Ok(())
    }
}
