//! # PDS model
//!
//! A [`Pds`] is a weighted pushdown system: states with outgoing rules, plus the reduction
//! passes that prune unreachable/dead states and tighten pre-sets.

pub mod reduce;
pub mod rule;

pub use rule::{Op, PdsRule, PdsStateId, Pre};

use crate::label::Label;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised by PDS construction or reduction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PdsError {
    /// A rule referenced a state beyond the declared state count.
    #[error("rule references out-of-range state {0}")]
    UnknownState(PdsStateId),
}

/// A pushdown system: states (plain indices) with outgoing rules, a distinguished initial state
/// set, and an accepting state set.
#[derive(Debug, Clone, Default)]
pub struct Pds {
    state_count: usize,
    rules: Vec<PdsRule>,
    initial: Vec<PdsStateId>,
    accepting: HashSet<PdsStateId>,
}

impl Pds {
    /// An empty PDS with `state_count` states, none initial or accepting yet.
    pub fn new(state_count: usize) -> Self {
        Self { state_count, rules: Vec::new(), initial: Vec::new(), accepting: HashSet::new() }
    }

    /// Allocate and return a fresh state id, growing `state_count`.
    pub fn add_state(&mut self) -> PdsStateId {
        let id = self.state_count;
        self.state_count += 1;
        id
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Mark `state` as an initial configuration.
    pub fn mark_initial(&mut self, state: PdsStateId) {
        if !self.initial.contains(&state) {
            self.initial.push(state);
        }
    }

    /// Mark `state` as accepting.
    pub fn mark_accepting(&mut self, state: PdsStateId) {
        self.accepting.insert(state);
    }

    /// The initial state set.
    pub fn initial(&self) -> &[PdsStateId] {
        &self.initial
    }

    /// The accepting state set.
    pub fn accepting(&self) -> &HashSet<PdsStateId> {
        &self.accepting
    }

    /// Whether `state` is accepting.
    pub fn is_accepting(&self, state: PdsStateId) -> bool {
        self.accepting.contains(&state)
    }

    /// All rules.
    pub fn rules(&self) -> &[PdsRule] {
        &self.rules
    }

    /// Add a rule. For each concrete label in the resolved pre-set, a caller wanting one rule
    /// per label (rather than a single wildcard/explicit-set rule) should call this once per
    /// label; `add_rule` itself stores whatever `pre` it is given — both shapes are legal,
    /// merely requiring that *a* rule exists per resolved concrete label when the factory
    /// expands a wildcard against the label universe.
    pub fn add_rule(&mut self, from: PdsStateId, pre: Pre, to: PdsStateId, op: Op) -> Result<(), PdsError> {
        if from >= self.state_count {
            return Err(PdsError::UnknownState(from));
        }
        if to >= self.state_count {
            return Err(PdsError::UnknownState(to));
        }
        self.rules.push(PdsRule { from, pre, to, op });
        Ok(())
    }

    /// Rules whose `from` is `state`.
    pub fn rules_from(&self, state: PdsStateId) -> impl Iterator<Item = &PdsRule> {
        self.rules.iter().filter(move |r| r.from == state)
    }

    /// Rules whose `to` is `state`.
    pub fn rules_to(&self, state: PdsStateId) -> impl Iterator<Item = &PdsRule> {
        self.rules.iter().filter(move |r| r.to == state)
    }

    /// Remove every rule for which `keep` returns `false`.
    pub(crate) fn retain_rules(&mut self, mut keep: impl FnMut(&PdsRule) -> bool) {
        self.rules.retain(|r| keep(r));
    }

    /// Replace a rule's pre-set in place (used by reduction levels 1-3 to tighten pre-sets).
    pub(crate) fn set_rule_pre(&mut self, idx: usize, pre: Pre) {
        self.rules[idx].pre = pre;
    }

    /// The label appearing anywhere as an `op`'s argument (used by reduction to seed its label
    /// universe without depending on the originating network).
    pub fn labels_in_ops(&self) -> HashSet<Label> {
        self.rules
            .iter()
            .filter_map(|r| match r.op {
                Op::Swap(l) | Op::Push(l) => Some(l),
                Op::Pop | Op::Noop => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;

    #[test]
    fn add_rule_rejects_out_of_range_states() {
        let mut pds = Pds::new(2);
        let err = pds.add_rule(0, Pre::Wildcard, 5, Op::Pop).unwrap_err();
        assert_eq!(err, PdsError::UnknownState(5));
    }

    #[test]
    fn rules_from_and_to_filter_correctly() {
        let mut pds = Pds::new(3);
        pds.add_rule(0, Pre::Labels(vec![Label::mpls(1)]), 1, Op::Swap(Label::mpls(2))).unwrap();
        pds.add_rule(1, Pre::Wildcard, 2, Op::Pop).unwrap();
        assert_eq!(pds.rules_from(0).count(), 1);
        assert_eq!(pds.rules_to(2).count(), 1);
        assert_eq!(pds.rules_from(2).count(), 0);
    }
}
