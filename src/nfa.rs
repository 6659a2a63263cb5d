//! # NFA
//!
//! Finite automata over [`Label`] symbols, used both by [`crate::query::Query`] (pre-stack,
//! path and post-stack regexes) and, compiled, as a capability consumed by
//! [`crate::factory`]'s product construction. States are plain indices, matching the
//! arena-of-indices idiom used by this crate's other modules (e.g. `crate::topology::RouterId`
//! being a plain index rather than a pointer).

use crate::label::Label;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised by NFA construction/compilation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NfaError {
    /// A state index referenced by an edge or as initial/accepting does not exist.
    #[error("state index {0} is out of range")]
    UnknownState(usize),
}

/// A state index into [`Nfa::states`].
pub type NfaStateId = usize;

/// An outgoing edge: either an explicit, sorted set of labels, or its complement ("negated
/// set"), plus a destination state.
#[derive(Debug, Clone, PartialEq)]
pub struct NfaEdge {
    /// The edge's label set (kept sorted by [`Nfa::compile`]).
    pub labels: Vec<Label>,
    /// Whether `labels` denotes the complement (every label *not* in the set matches).
    pub negated: bool,
    /// Destination state.
    pub to: NfaStateId,
}

impl NfaEdge {
    /// Whether this edge matches `symbol` under its positive/negated semantics.
    pub fn matches(&self, symbol: Label) -> bool {
        let in_set = self.labels.iter().any(|l| l.overlaps(&symbol));
        in_set != self.negated
    }
}

/// A single NFA state: an accepting flag, outgoing labeled edges, and outgoing epsilon edges
/// (a designated marker distinct from any label).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NfaState {
    /// Whether this state accepts.
    pub accepting: bool,
    /// Outgoing labeled (possibly negated-set) edges.
    pub edges: Vec<NfaEdge>,
    /// Outgoing epsilon edges (destinations reachable without consuming a symbol).
    pub epsilon: Vec<NfaStateId>,
}

/// A finite automaton over [`Label`] symbols.
///
/// States are plain indices into [`Nfa::states`], matching the arena-of-indices idiom used
/// throughout this crate (e.g. [`crate::topology::InterfaceId`]) rather than boxed/linked
/// nodes.
#[derive(Debug, Clone, Default)]
pub struct Nfa {
    states: Vec<NfaState>,
    initial: Vec<NfaStateId>,
}

impl Nfa {
    /// An NFA with a single state, accepting iff `initially_accepting` (i.e. accepts exactly
    /// the empty word when `true`, nothing when `false`).
    pub fn new(initially_accepting: bool) -> Self {
        Self {
            states: vec![NfaState { accepting: initially_accepting, ..Default::default() }],
            initial: vec![0],
        }
    }

    /// An NFA accepting exactly one symbol: `labels` (or its complement, if `negated`).
    pub fn single(labels: Vec<Label>, negated: bool) -> Self {
        let mut labels = labels;
        labels.sort();
        Self {
            states: vec![
                NfaState { accepting: false, edges: vec![NfaEdge { labels, negated, to: 1 }], epsilon: vec![] },
                NfaState { accepting: true, edges: vec![], epsilon: vec![] },
            ],
            initial: vec![0],
        }
    }

    /// The `.` atom: matches any single label.
    pub fn any_symbol() -> Self {
        Self::single(vec![], true)
    }

    fn add_state(&mut self, accepting: bool) -> NfaStateId {
        self.states.push(NfaState { accepting, ..Default::default() });
        self.states.len() - 1
    }

    fn add_edge(&mut self, from: NfaStateId, edge: NfaEdge) {
        self.states[from].edges.push(edge);
    }

    fn add_epsilon(&mut self, from: NfaStateId, to: NfaStateId) {
        self.states[from].epsilon.push(to);
    }

    /// Offset every state index in `other` by `self.states.len()` and append its states.
    /// Returns the offset applied, so the caller can translate `other`'s initial/accepting ids.
    fn absorb(&mut self, other: &Nfa) -> usize {
        let offset = self.states.len();
        for st in &other.states {
            let edges = st
                .edges
                .iter()
                .map(|e| NfaEdge { labels: e.labels.clone(), negated: e.negated, to: e.to + offset })
                .collect();
            let epsilon = st.epsilon.iter().map(|e| e + offset).collect();
            self.states.push(NfaState { accepting: st.accepting, edges, epsilon });
        }
        offset
    }

    fn accepting_states(&self) -> Vec<NfaStateId> {
        (0..self.states.len()).filter(|&s| self.states[s].accepting).collect()
    }

    /// Concatenation: `self` followed by `other` (epsilon-joined at `self`'s accepting states).
    pub fn concat(mut self, other: &Nfa) -> Nfa {
        let self_accepting = self.accepting_states();
        let offset = self.absorb(other);
        for s in &self_accepting {
            self.states[*s].accepting = false;
            for i in &other.initial {
                self.add_epsilon(*s, i + offset);
            }
        }
        self
    }

    /// Union: either `self` or `other`.
    pub fn union(mut self, other: &Nfa) -> Nfa {
        let new_start = self.add_state(false);
        let self_initial = std::mem::replace(&mut self.initial, vec![new_start]);
        for i in self_initial {
            self.add_epsilon(new_start, i);
        }
        let offset = self.absorb(other);
        for i in &other.initial {
            self.add_epsilon(new_start, i + offset);
        }
        self
    }

    /// Kleene star: zero or more repetitions.
    pub fn star(self) -> Nfa {
        let mut nfa = self.plus();
        let new_start = nfa.add_state(true);
        let old_initial = std::mem::replace(&mut nfa.initial, vec![new_start]);
        for i in old_initial {
            nfa.add_epsilon(new_start, i);
        }
        nfa
    }

    /// Kleene plus: one or more repetitions.
    pub fn plus(mut self) -> Nfa {
        let accepting = self.accepting_states();
        let initial = self.initial.clone();
        for s in accepting {
            for i in &initial {
                self.add_epsilon(s, *i);
            }
        }
        self
    }

    /// Optional: zero or one occurrence.
    pub fn optional(self) -> Nfa {
        self.union(&Nfa::new(true))
    }

    /// The initial state set.
    pub fn initial(&self) -> &[NfaStateId] {
        &self.initial
    }

    /// Borrow a state.
    pub fn state(&self, id: NfaStateId) -> &NfaState {
        &self.states[id]
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether this NFA has no states (never true for a constructed NFA; provided for symmetry
    /// with other collections in this crate).
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether `state` is accepting.
    pub fn is_accepting(&self, state: NfaStateId) -> bool {
        self.states[state].accepting
    }

    /// Whether any state in `states` is accepting.
    pub fn accepts_empty_from(&self, states: &[NfaStateId]) -> bool {
        states.iter().any(|s| self.is_accepting(*s))
    }

    /// The epsilon closure of `states`: every state reachable without consuming a symbol.
    pub fn epsilon_closure(&self, states: &[NfaStateId]) -> BTreeSet<NfaStateId> {
        let mut seen: BTreeSet<NfaStateId> = states.iter().copied().collect();
        let mut stack: Vec<NfaStateId> = states.to_vec();
        while let Some(s) = stack.pop() {
            for &next in &self.states[s].epsilon {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    /// Sort every edge's label set. Precomputing this lets a binary-search-style overlap check
    /// replace a linear scan in hot saturation loops (not yet exploited here, but kept so
    /// `next`'s semantics are independent of construction order).
    pub fn compile(&mut self) {
        for st in &mut self.states {
            for e in &mut st.edges {
                e.labels.sort();
            }
        }
    }

    /// `next(state_set, symbol)`: the union of destinations reachable from the epsilon closure
    /// of `state_set` by consuming `symbol`, including the epsilon fanout at those destinations.
    pub fn next(&self, state_set: &[NfaStateId], symbol: Label) -> BTreeSet<NfaStateId> {
        let closure = self.epsilon_closure(state_set);
        let mut dests = Vec::new();
        for s in &closure {
            for e in &self.states[*s].edges {
                if e.matches(symbol) {
                    dests.push(e.to);
                }
            }
        }
        self.epsilon_closure(&dests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;

    fn single(v: u64) -> Nfa {
        Nfa::single(vec![Label::mpls(v)], false)
    }

    #[test]
    fn single_symbol_accepts_only_that_label() {
        let nfa = single(5);
        let after = nfa.next(nfa.initial(), Label::mpls(5));
        assert!(nfa.accepts_empty_from(&after.into_iter().collect::<Vec<_>>()));
        let after_wrong = nfa.next(nfa.initial(), Label::mpls(6));
        assert!(after_wrong.is_empty());
    }

    #[test]
    fn concat_then_star_accepts_repeated_sequences() {
        let nfa = single(1).concat(&single(2)).star();
        let mut states: Vec<_> = nfa.initial().to_vec();
        for v in [1, 2, 1, 2] {
            let next: Vec<_> = nfa.next(&states, Label::mpls(v)).into_iter().collect();
            states = next;
        }
        assert!(nfa.accepts_empty_from(&states));
    }

    #[test]
    fn optional_accepts_empty() {
        let nfa = single(1).optional();
        assert!(nfa.accepts_empty_from(nfa.initial()));
    }

    #[test]
    fn any_symbol_matches_every_label() {
        let nfa = Nfa::any_symbol();
        let after = nfa.next(nfa.initial(), Label::ip4(0, 8));
        assert!(nfa.accepts_empty_from(&after.into_iter().collect::<Vec<_>>()));
    }
}
