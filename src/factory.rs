//! # Network\u{2192}PDS factory
//!
//! Translates a [`Network`] + [`Query`] pair into a concrete weighted [`Pds`]. Rather than a
//! pointer-shaped state struct, a [`StateKey`] is interned into a plain [`PdsStateId`] the first
//! time it is reached, and a worklist drives rule generation until no new key is discovered.
//!
//! [`build`] produces one concrete PDS per non-`DUAL` [`ApproxMode`]; `DUAL` is a verifier-level
//! schedule (run `Over`, then `Under` to confirm) rather than a mode this factory understands
//! directly. [`crate::cegar`] mirrors this same state-key shape over abstracted interfaces.

use crate::error::FactoryError;
use crate::label::Label;
use crate::nfa::{Nfa, NfaStateId};
use crate::pds::{Op, Pds, PdsStateId, Pre};
use crate::query::{ApproxMode, Query};
use crate::routing::{Entry, Rule, RoutingTable, RuleKind, StackOp};
use crate::topology::{InterfaceId, Network};
use std::collections::{HashMap, VecDeque};

/// A PDS state's identity before interning: which concrete construction state it represents.
///
/// `Entry` and `Terminal` are "non-cursor" states; `Pending` is a "cursor" state parked mid-way
/// through a multi-op rule, waiting to fire `ops[op_idx]` next.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// A packet about to look up `interface`'s routing table at path-NFA state `path_state`,
    /// having accumulated `weight` so far (`UNDER`/`DUAL` bookkeeping; always `0` for `OVER`).
    Entry { interface: InterfaceId, path_state: NfaStateId, weight: u32 },
    /// Mid-way through firing a multi-op rule: `ops[op_idx]` is the next operation to apply.
    /// `(entry_idx, rule_idx)` identifies the originating rule within `interface`'s table.
    Pending { interface: InterfaceId, entry_idx: usize, rule_idx: usize, op_idx: usize, path_state: NfaStateId, weight: u32 },
    /// The header's journey ended here (a `Receive`/`Discard` rule, or forwarding out an
    /// unpaired/sink interface): accepting iff `path_state` is.
    Terminal { path_state: NfaStateId, weight: u32 },
}

/// The result of [`build`]: the concrete PDS plus the interning table, so a caller (principally
/// [`crate::verifier`] and [`crate::cegar`]) can map a witness trace's PDS states back to the
/// construction state they came from.
#[derive(Debug)]
pub struct FactoryOutput {
    /// The constructed PDS.
    pub pds: Pds,
    /// `state -> interned PDS state id`.
    pub states: HashMap<StateKey, PdsStateId>,
}

/// Build the concrete PDS for `network` under `query`, restricted to `mode` (`DUAL` is rejected:
/// a caller wanting `DUAL` must build `Over` and, on a positive result, `Under` itself).
pub fn build(network: &Network, query: &Query, mode: ApproxMode) -> Result<FactoryOutput, FactoryError> {
    if mode == ApproxMode::Dual {
        return Err(FactoryError::DualIsAScheduleNotAMode);
    }
    // Sorted once up front for deterministic label iteration order, so traces and reduction
    // outputs are reproducible.
    let universe: Vec<Label> = itertools::sorted(network.all_labels()).collect();
    let mut pds = Pds::new(0);
    let mut states: HashMap<StateKey, PdsStateId> = HashMap::new();
    let mut worklist: VecDeque<StateKey> = VecDeque::new();

    let path = query.path();
    // EXACT is UNDER restricted to weight-0 admission; force the bound to 0 here rather than
    // let a nonzero query bound silently make `admit` reject every rule below.
    let failure_bound = if mode == ApproxMode::Exact { 0 } else { query.failure_bound() };

    for iface in 0..network.interfaces().len() {
        let next_states = path.next(path.initial(), Label::interface(iface as u64));
        for path_state in next_states {
            let key = StateKey::Entry { interface: iface, path_state, weight: 0 };
            let id = intern(key, &mut pds, &mut states, &mut worklist);
            pds.mark_initial(id);
        }
    }

    while let Some(key) = worklist.pop_front() {
        let from_id = states[&key];
        match key.clone() {
            StateKey::Entry { interface, path_state, weight } => {
                let table = network.interface(interface).routing_table();
                for (entry_idx, entry) in table.entries().iter().enumerate() {
                    let pre = entry_pre(entry, table, &universe);
                    for (rule_idx, rule) in entry.rules().iter().enumerate() {
                        expand_rule(
                            network, mode, failure_bound, path, &mut pds, &mut states, &mut worklist, from_id,
                            pre.clone(), interface, entry_idx, rule_idx, rule, path_state, weight,
                        )?;
                    }
                }
            }
            StateKey::Pending { interface, entry_idx, rule_idx, op_idx, path_state, weight } => {
                let table = network.interface(interface).routing_table();
                let rule = &table.entries()[entry_idx].rules()[rule_idx];
                let pre = pre_from_prior_op(&rule.ops[op_idx - 1]);
                fire_pending_op(
                    network, &mut pds, &mut states, &mut worklist, from_id, pre, interface, entry_idx, rule_idx,
                    op_idx, rule, path_state, weight,
                )?;
            }
            StateKey::Terminal { .. } => {
                // No outgoing rules: the header's journey has ended.
            }
        }
    }

    for (key, &id) in &states {
        let path_state = match key {
            StateKey::Entry { path_state, .. } | StateKey::Terminal { path_state, .. } => Some(*path_state),
            StateKey::Pending { .. } => None,
        };
        if let Some(s) = path_state {
            if path.is_accepting(s) {
                pds.mark_accepting(id);
            }
        }
    }

    Ok(FactoryOutput { pds, states })
}

fn intern(key: StateKey, pds: &mut Pds, states: &mut HashMap<StateKey, PdsStateId>, worklist: &mut VecDeque<StateKey>) -> PdsStateId {
    if let Some(&id) = states.get(&key) {
        return id;
    }
    let id = pds.add_state();
    states.insert(key.clone(), id);
    worklist.push_back(key);
    id
}

/// The pre-condition an entry's rules are reached under: the entry's own top-label for a
/// specific entry, or the label universe minus every other entry's top-label for the default
/// entry (the default entry matches any label not covered by a more specific entry).
fn entry_pre(entry: &Entry, table: &RoutingTable, universe: &[Label]) -> Pre {
    if !entry.is_default() {
        return Pre::Labels(vec![entry.top_label()]);
    }
    let covered: Vec<Label> = table.entries().iter().filter(|e| !e.is_default()).map(|e| e.top_label()).collect();
    let remaining: Vec<Label> = universe.iter().copied().filter(|u| !covered.iter().any(|c| c.overlaps(u))).collect();
    Pre::Labels(remaining)
}

/// Translate a routing-table [`StackOp`] into a PDS [`Op`]: an IP-lookup `Route` entry's `PUSH`
/// degrades to a PDS `SWAP`, since the lookup replaces rather than grows the label under
/// inspection.
fn translate_op(kind: RuleKind, op: StackOp) -> Op {
    match op {
        StackOp::Pop => Op::Pop,
        StackOp::Swap(l) => Op::Swap(l),
        StackOp::Push(l) => {
            if kind == RuleKind::Route {
                Op::Swap(l)
            } else {
                Op::Push(l)
            }
        }
    }
}

/// The pre-condition the next op in a multi-op sequence is read under: whatever the previous op
/// left on top (a concrete label for `Push`/`Swap`), or wildcard after a `Pop` (the label now
/// exposed comes from further down the original stack, unknown to the factory).
fn pre_from_prior_op(prior: &StackOp) -> Pre {
    match prior {
        StackOp::Push(l) | StackOp::Swap(l) => Pre::Labels(vec![*l]),
        StackOp::Pop => Pre::Wildcard,
    }
}

/// Filter + weight-update for one rule firing under the given approximation mode.
/// `virtual_iface` bypasses the filter entirely (a loopback traversal spends no failure budget).
/// EXACT only ever sees a `failure_bound` of `0` (the caller clamps it), so its admission is
/// just "zero-weight rules only".
fn admit(mode: ApproxMode, failure_bound: u32, weight: u32, priority: u32, rule_weight: u32, virtual_iface: bool) -> Option<u32> {
    if virtual_iface {
        return Some(weight);
    }
    match mode {
        ApproxMode::Over => {
            if priority > failure_bound {
                None
            } else {
                Some(weight)
            }
        }
        ApproxMode::Under => {
            let w = weight + rule_weight;
            if w > failure_bound {
                None
            } else {
                Some(w)
            }
        }
        ApproxMode::Exact => {
            if rule_weight != 0 || failure_bound != 0 {
                None
            } else {
                Some(0)
            }
        }
        ApproxMode::Dual => unreachable!("Dual is rejected by build() before expansion begins"),
    }
}

/// Where a rule's traversal lands: the next incoming-interface Entry if `via` pairs with
/// something, or a Terminal state if it sinks (unpaired interface, or no interface at all, i.e.
/// `Receive`/`Discard`).
fn land(network: &Network, via: Option<InterfaceId>, path_state: NfaStateId, weight: u32) -> StateKey {
    match via.and_then(|v| network.interface(v).matched()) {
        Some(ingress) => StateKey::Entry { interface: ingress, path_state, weight },
        None => StateKey::Terminal { path_state, weight },
    }
}

/// The path-NFA states a rule's `via` interface transitions the construction NFA into: unchanged
/// for a virtual interface or a terminating rule (no interface consumed), or `path().next` on
/// the interface's label otherwise. `None` means "no matching path-NFA transition": the rule is
/// dropped entirely.
fn path_successors(network: &Network, path: &Nfa, via: Option<InterfaceId>, path_state: NfaStateId) -> Option<Vec<NfaStateId>> {
    match via {
        None => Some(vec![path_state]),
        Some(v) if network.interface(v).is_virtual() => Some(vec![path_state]),
        Some(v) => {
            let set: Vec<NfaStateId> = path.next(&[path_state], Label::interface(v as u64)).into_iter().collect();
            if set.is_empty() {
                None
            } else {
                Some(set)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn expand_rule(
    network: &Network,
    mode: ApproxMode,
    failure_bound: u32,
    path: &Nfa,
    pds: &mut Pds,
    states: &mut HashMap<StateKey, PdsStateId>,
    worklist: &mut VecDeque<StateKey>,
    from_id: PdsStateId,
    pre: Pre,
    interface: InterfaceId,
    entry_idx: usize,
    rule_idx: usize,
    rule: &Rule,
    path_state: NfaStateId,
    weight: u32,
) -> Result<(), FactoryError> {
    let virtual_iface = rule.via.map(|v| network.interface(v).is_virtual()).unwrap_or(false);
    let Some(new_weight) = admit(mode, failure_bound, weight, rule.priority, rule.weight, virtual_iface) else {
        return Ok(());
    };
    let Some(next_states) = path_successors(network, path, rule.via, path_state) else {
        return Ok(());
    };

    for s2 in next_states {
        if rule.ops.is_empty() {
            let to_key = land(network, rule.via, s2, new_weight);
            let to = intern(to_key, pds, states, worklist);
            pds.add_rule(from_id, pre.clone(), to, Op::Noop)?;
        } else if rule.ops.len() == 1 {
            let op = translate_op(rule.kind, rule.ops[0]);
            let to_key = land(network, rule.via, s2, new_weight);
            let to = intern(to_key, pds, states, worklist);
            pds.add_rule(from_id, pre.clone(), to, op)?;
        } else {
            let op = translate_op(rule.kind, rule.ops[0]);
            let to_key = StateKey::Pending { interface, entry_idx, rule_idx, op_idx: 1, path_state: s2, weight: new_weight };
            let to = intern(to_key, pds, states, worklist);
            pds.add_rule(from_id, pre.clone(), to, op)?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn fire_pending_op(
    network: &Network,
    pds: &mut Pds,
    states: &mut HashMap<StateKey, PdsStateId>,
    worklist: &mut VecDeque<StateKey>,
    from_id: PdsStateId,
    pre: Pre,
    interface: InterfaceId,
    entry_idx: usize,
    rule_idx: usize,
    op_idx: usize,
    rule: &Rule,
    path_state: NfaStateId,
    weight: u32,
) -> Result<(), FactoryError> {
    let op = translate_op(rule.kind, rule.ops[op_idx]);
    let last = op_idx + 1 == rule.ops.len();
    let to_key = if last {
        land(network, rule.via, path_state, weight)
    } else {
        StateKey::Pending { interface, entry_idx, rule_idx, op_idx: op_idx + 1, path_state, weight }
    };
    let to = intern(to_key, pds, states, worklist);
    pds.add_rule(from_id, pre, to, op)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::nfa::Nfa;
    use crate::query::Query;
    use crate::routing::{Rule, StackOp};

    /// A two-router chain: `r0 --eth0(push l1)--> r1 --eth1(pop)--> r2`, query accepting any
    /// interface path, entering with no label and leaving with none either.
    #[test]
    fn linear_push_pop_builds_a_satisfiable_pds() {
        let mut net = Network::new();
        let r0 = net.add_router("r0").unwrap();
        let r1 = net.add_router("r1").unwrap();
        let (a, b) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        net.interface_mut(b).routing_table_mut().add_rule(
            Label::unused(crate::label::Kind::Mpls),
            Rule::new(0, 0, RuleKind::Receive, None, vec![]),
        );
        net.interface_mut(a).routing_table_mut().add_rule(
            Label::unused(crate::label::Kind::Mpls),
            Rule::new(0, 0, RuleKind::Mpls, Some(a), vec![]),
        );

        let pre = Nfa::new(true);
        let path = Nfa::any_symbol().star();
        let post = Nfa::new(true);
        let query = Query::new(pre, path, post, 0, ApproxMode::Over);
        let out = build(&net, &query, ApproxMode::Over).unwrap();
        assert!(!out.pds.rules().is_empty());
        assert!(!out.pds.initial().is_empty());
    }

    #[test]
    fn dual_mode_is_rejected_at_the_factory() {
        let net = Network::new();
        let query = Query::new(Nfa::new(true), Nfa::new(true), Nfa::new(true), 0, ApproxMode::Dual);
        let err = build(&net, &query, ApproxMode::Dual).unwrap_err();
        assert_eq!(err, FactoryError::DualIsAScheduleNotAMode);
    }
}
