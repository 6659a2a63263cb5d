//! # CEGAR engine
//!
//! Counterexample-guided abstraction refinement: instead of building and saturating the full
//! concrete PDS, collapse concrete interfaces into coarse classes, saturate the much smaller
//! abstract PDS, and replay any witness found against the concrete rules. A replay that gets
//! stuck identifies exactly the two concrete interfaces whose conflation made the abstract
//! witness spurious; splitting them apart and retrying refines the abstraction.
//!
//! This crate's abstraction axis is interfaces only — concrete labels are carried through
//! unabstracted. Abstracting both interfaces and labels would keep replay a plain
//! rule-id/state-id comparison at the cost of a second enumeration step over label classes;
//! restricting to one axis trades that off against coarser-per-round abstractions (more
//! refinement rounds on a network whose non-determinism is label-driven rather than
//! topology-driven), a deliberate scope decision.

use crate::automaton::{pre_star, PAutomaton};
use crate::error::{CegarError, VerifierError};
use crate::factory::{self, FactoryOutput, StateKey};
use crate::label::Label;
use crate::nfa::Nfa;
use crate::pds::{Pds, PdsStateId};
use crate::query::{ApproxMode, Query};
use crate::topology::{InterfaceId, Network};
use crate::verifier::{seed_post_stack_target, Trace};
use std::collections::HashMap;

/// Which partition-refinement strategy to use when a replay fails against more than one
/// abstract rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementStrategy {
    /// Split on the interface pair responsible for the largest number of mismatches found while
    /// scanning the whole candidate chain (coarsest partition that still makes progress).
    BestRefinement,
    /// Split on the first mismatch encountered (cheaper per round, more rounds overall).
    FirstSeparating,
}

/// Configuration for the CEGAR loop, set on [`crate::verifier::VerifierConfig`].
#[derive(Debug, Clone)]
pub struct CegarConfig {
    /// Which refinement strategy to apply when a round's replay fails.
    pub refinement_option: RefinementStrategy,
    /// Maximum number of build/solve/refine rounds before giving up (`MAYBE`).
    pub max_rounds: Option<usize>,
}

impl Default for CegarConfig {
    fn default() -> Self {
        Self { refinement_option: RefinementStrategy::BestRefinement, max_rounds: Some(64) }
    }
}

/// The outcome of a CEGAR run: whether a (now concrete) witness was found, and how many rounds
/// it took.
#[derive(Debug, Clone)]
pub struct CegarOutcome {
    /// Whether a concrete witness trace was confirmed.
    pub accepted: bool,
    /// The confirmed trace, if [`CegarOutcome::accepted`].
    pub trace: Option<Trace>,
    /// Number of build/solve/replay rounds performed.
    pub rounds: usize,
}

/// A partition of concrete interfaces into abstract classes, starting from the coarsest possible
/// partition (every interface in class `0`) and refined one split at a time.
#[derive(Debug, Clone)]
pub struct InterfaceAbstraction {
    class_of: HashMap<InterfaceId, usize>,
    next_class: usize,
}

impl InterfaceAbstraction {
    /// The coarsest abstraction: every interface in the network maps to a single class.
    pub fn coarsest(network: &Network) -> Self {
        let class_of = (0..network.interfaces().len()).map(|i| (i, 0)).collect();
        Self { class_of, next_class: 1 }
    }

    /// The abstract class a concrete interface belongs to.
    pub fn class(&self, interface: InterfaceId) -> usize {
        *self.class_of.get(&interface).unwrap_or(&0)
    }

    /// How many distinct abstract classes currently partition the interface set.
    pub fn class_count(&self) -> usize {
        self.next_class
    }

    /// Move `interface` into a brand-new class of its own, leaving every other interface's class
    /// unchanged (a strict refinement: it can only ever separate states further, never merge
    /// them back).
    pub fn split_off(&mut self, interface: InterfaceId) {
        let fresh = self.next_class;
        self.next_class += 1;
        self.class_of.insert(interface, fresh);
    }
}

fn interface_of(key: &StateKey) -> Option<InterfaceId> {
    match key {
        StateKey::Entry { interface, .. } | StateKey::Pending { interface, .. } => Some(*interface),
        StateKey::Terminal { .. } => None,
    }
}

fn abstract_key(key: &StateKey, abs: &InterfaceAbstraction) -> StateKey {
    match key.clone() {
        StateKey::Entry { interface, path_state, weight } => {
            StateKey::Entry { interface: abs.class(interface), path_state, weight }
        }
        StateKey::Pending { interface, entry_idx, rule_idx, op_idx, path_state, weight } => {
            StateKey::Pending { interface: abs.class(interface), entry_idx, rule_idx, op_idx, path_state, weight }
        }
        StateKey::Terminal { path_state, weight } => StateKey::Terminal { path_state, weight },
    }
}

/// Build the abstract PDS for one round: every concrete state is re-keyed by
/// [`abstract_key`] and interned, merging every concrete state whose interface component shares
/// an abstract class. Rules are copied 1:1 in the same order as `concrete.pds.rules()`, so rule
/// index `i` in the returned PDS names exactly the same `(pre, op)` pair as rule `i` in
/// `concrete.pds` — only the endpoints differ. This lets [`crate::automaton::trace::reconstruct_pre_star`]'s
/// output be replayed directly against the concrete PDS without any further translation.
fn build_abstract(concrete: &FactoryOutput, abs: &InterfaceAbstraction) -> (Pds, HashMap<PdsStateId, PdsStateId>) {
    let id_to_key: HashMap<PdsStateId, &StateKey> = concrete.states.iter().map(|(k, &v)| (v, k)).collect();
    let mut abstract_pds = Pds::new(0);
    let mut key_to_abs: HashMap<StateKey, PdsStateId> = HashMap::new();
    let mut concrete_to_abs: HashMap<PdsStateId, PdsStateId> = HashMap::new();

    for cid in 0..concrete.pds.state_count() {
        let key = id_to_key.get(&cid).expect("every concrete state id was interned by the factory");
        let akey = abstract_key(key, abs);
        let aid = *key_to_abs.entry(akey).or_insert_with(|| abstract_pds.add_state());
        concrete_to_abs.insert(cid, aid);
    }
    for rule in concrete.pds.rules() {
        let from = concrete_to_abs[&rule.from];
        let to = concrete_to_abs[&rule.to];
        abstract_pds
            .add_rule(from, rule.pre.clone(), to, rule.op)
            .expect("abstract endpoints are always in range: every concrete id was mapped above");
    }
    for &p in concrete.pds.initial() {
        abstract_pds.mark_initial(concrete_to_abs[&p]);
    }
    for &p in concrete.pds.accepting() {
        abstract_pds.mark_accepting(concrete_to_abs[&p]);
    }
    (abstract_pds, concrete_to_abs)
}

/// Walk `rule_ids` forward from `start`, checking at each step that the rule's `from` actually
/// matches the current concrete state (rather than merely the abstract class it was found
/// through). Returns every `(expected_from, actual_rule_from)` mismatch found; an empty result
/// means the whole candidate chain replays faithfully in the concrete PDS.
fn replay_and_check(pds: &Pds, start: PdsStateId, rule_ids: &[usize]) -> Vec<(PdsStateId, PdsStateId)> {
    let mut state = start;
    let mut mismatches = Vec::new();
    for &rid in rule_ids {
        let rule = &pds.rules()[rid];
        if rule.from != state {
            mismatches.push((state, rule.from));
        }
        state = rule.to;
    }
    mismatches
}

fn pick_split(mismatches: &[(PdsStateId, PdsStateId)], strategy: RefinementStrategy) -> Option<(PdsStateId, PdsStateId)> {
    match strategy {
        RefinementStrategy::FirstSeparating => mismatches.first().copied(),
        RefinementStrategy::BestRefinement => {
            let mut counts: HashMap<(PdsStateId, PdsStateId), usize> = HashMap::new();
            for &m in mismatches {
                *counts.entry(m).or_insert(0) += 1;
            }
            counts.into_iter().max_by_key(|(_, c)| *c).map(|(m, _)| m)
        }
    }
}

/// Run the CEGAR loop to decide `query` against `network` under `mode`.
pub fn solve(network: &Network, query: &Query, mode: ApproxMode, config: &CegarConfig) -> Result<CegarOutcome, VerifierError> {
    let concrete = factory::build(network, query, mode)?;
    let id_to_key: HashMap<PdsStateId, StateKey> =
        concrete.states.iter().map(|(k, &v)| (v, k.clone())).collect();
    let universe: Vec<Label> = network.all_labels().into_iter().collect();
    let mut abs = InterfaceAbstraction::coarsest(network);
    let max_rounds = config.max_rounds.unwrap_or(64);

    for round in 0..max_rounds {
        log::debug!("cegar round {}: {} interface classes", round, abs.class_count());
        let (abstract_pds, concrete_to_abs) = build_abstract(&concrete, &abs);
        let mut automaton = PAutomaton::new(abstract_pds.state_count());
        seed_post_stack_target(&mut automaton, &abstract_pds, query.post_stack(), &universe);
        pre_star(&abstract_pds, &universe, &mut automaton);

        let abstract_initial: Vec<PdsStateId> =
            concrete.pds.initial().iter().map(|p| concrete_to_abs[p]).collect();
        let Some(edges) = crate::automaton::trace::find_stack_word(&automaton, query.pre_stack(), &abstract_initial) else {
            log::info!("cegar round {}: abstract PDS is empty, UNSAT", round);
            return Ok(CegarOutcome { accepted: false, trace: None, rounds: round + 1 });
        };

        let rule_ids = crate::automaton::trace::reconstruct_pre_star(&abstract_pds, &automaton, &edges);
        let start_abstract = witness_start(&automaton, query.pre_stack(), &abstract_initial, &edges);
        let Some(start_concrete) =
            concrete.pds.initial().iter().copied().find(|p| concrete_to_abs[p] == start_abstract)
        else {
            return Err(VerifierError::Cegar(CegarError::RefinementStuck));
        };

        let mismatches = replay_and_check(&concrete.pds, start_concrete, &rule_ids);
        if mismatches.is_empty() {
            let stack_word: Vec<Label> = edges.iter().filter_map(|&i| automaton.edge(i).label).collect();
            let steps = crate::automaton::trace::replay(&concrete.pds, start_concrete, stack_word, &rule_ids);
            return Ok(CegarOutcome { accepted: true, trace: Some(Trace { steps }), rounds: round + 1 });
        }

        let Some((a, b)) = pick_split(&mismatches, config.refinement_option) else {
            return Err(VerifierError::Cegar(CegarError::RefinementStuck));
        };
        let (ia, ib) = (interface_of(&id_to_key[&a]), interface_of(&id_to_key[&b]));
        match (ia, ib) {
            (Some(x), Some(y)) if x != y => abs.split_off(y),
            _ => return Err(VerifierError::Cegar(CegarError::RefinementStuck)),
        }
    }
    Err(VerifierError::Cegar(CegarError::RoundBudgetExhausted))
}

fn witness_start(automaton: &PAutomaton, word_nfa: &Nfa, initial: &[PdsStateId], edges: &[usize]) -> PdsStateId {
    if let Some(&first) = edges.first() {
        return automaton.edge(first).from;
    }
    let closure: Vec<_> = word_nfa.epsilon_closure(word_nfa.initial()).into_iter().collect();
    initial
        .iter()
        .copied()
        .find(|&p| automaton.is_accepting(p) && word_nfa.accepts_empty_from(&closure))
        .unwrap_or(initial[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::nfa::Nfa;
    use crate::query::Query;
    use crate::routing::{Rule, RuleKind};

    #[test]
    fn coarsest_abstraction_maps_every_interface_to_class_zero() {
        let mut net = Network::new();
        let r0 = net.add_router("r0").unwrap();
        let r1 = net.add_router("r1").unwrap();
        let (a, b) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        let abs = InterfaceAbstraction::coarsest(&net);
        assert_eq!(abs.class(a), abs.class(b));
    }

    #[test]
    fn split_off_separates_one_interface_into_its_own_class() {
        let mut net = Network::new();
        let r0 = net.add_router("r0").unwrap();
        let r1 = net.add_router("r1").unwrap();
        let (a, b) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        let mut abs = InterfaceAbstraction::coarsest(&net);
        abs.split_off(b);
        assert_ne!(abs.class(a), abs.class(b));
    }

    #[test]
    fn solve_finds_a_trace_on_a_trivial_linear_network() {
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
        let query = Query::new(Nfa::new(true), Nfa::any_symbol().star(), Nfa::new(true), 0, ApproxMode::Over);
        let outcome = solve(&net, &query, ApproxMode::Over, &CegarConfig::default()).unwrap();
        assert!(outcome.rounds >= 1);
    }
}
