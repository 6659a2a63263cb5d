//! PDS reduction passes: four levels of increasingly precise pruning, each a superset of the
//! previous. Every level preserves trace-equivalence: a rule removed by reduction could never
//! have fired in the original system either, so downstream saturation sees exactly the same
//! emptiness answer.

use super::{Op, Pds, Pre};
use crate::label::Label;
use std::collections::{HashMap, HashSet};

impl Pds {
    /// Run reduction at `aggressiveness` (`0..=3`, increasingly precise pruning). Returns
    /// `(rules_before, rules_after)`.
    pub fn reduce(&mut self, aggressiveness: u8) -> (usize, usize) {
        let before = self.rules.len();
        self.reduce_reachability();
        if aggressiveness >= 1 {
            self.reduce_tos(aggressiveness >= 2);
        }
        if aggressiveness >= 3 {
            self.reduce_target_tos();
        }
        // A second reachability pass catches states/rules stranded by the tighter pre-sets
        // above (e.g. a rule whose pre-set became empty removes its `to` state's last inbound
        // edge).
        self.reduce_reachability();
        let after = self.rules.len();
        log::debug!("pds reduce(aggressiveness={}): {} rules -> {} rules", aggressiveness, before, after);
        (before, after)
    }

    /// Level 0: remove rules on a state unreachable forward from `initial`, or not co-reachable
    /// backward from `accepting`.
    fn reduce_reachability(&mut self) {
        let forward = self.forward_reachable();
        let backward = self.backward_co_reachable();
        self.retain_rules(|r| forward.contains(&r.from) && backward.contains(&r.to));
    }

    fn forward_reachable(&self) -> HashSet<super::PdsStateId> {
        let mut seen: HashSet<_> = self.initial.iter().copied().collect();
        let mut stack: Vec<_> = self.initial.clone();
        while let Some(s) = stack.pop() {
            for r in self.rules_from(s) {
                if seen.insert(r.to) {
                    stack.push(r.to);
                }
            }
        }
        seen
    }

    fn backward_co_reachable(&self) -> HashSet<super::PdsStateId> {
        let mut seen: HashSet<_> = self.accepting.iter().copied().collect();
        let mut stack: Vec<_> = self.accepting.iter().copied().collect();
        while let Some(s) = stack.pop() {
            for r in self.rules_to(s) {
                if seen.insert(r.from) {
                    stack.push(r.from);
                }
            }
        }
        seen
    }

    /// Levels 1 and 2: a per-state summary of possible top-of-stack labels (level 1) and,
    /// additionally, the label just below the top (level 2), propagated to a fixed point and
    /// then used to intersect each rule's pre-set. `None` in a summary means "unknown / any
    /// label possible" — the conservative default for states reached only through a `Pop` whose
    /// effect on lower stack contents this summary cannot track.
    fn reduce_tos(&mut self, track_below: bool) {
        let mut tos: HashMap<super::PdsStateId, Option<HashSet<Label>>> = HashMap::new();
        let mut below: HashMap<super::PdsStateId, Option<HashSet<Label>>> = HashMap::new();
        for &s in &self.initial {
            tos.insert(s, None);
            below.insert(s, None);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for r in self.rules.clone() {
                let from_tos = tos.get(&r.from).cloned().unwrap_or(None);
                let from_below = below.get(&r.from).cloned().unwrap_or(None);
                let matched: Option<HashSet<Label>> = match (&from_tos, &r.pre) {
                    (Some(set), _) => {
                        let filtered: HashSet<Label> =
                            set.iter().copied().filter(|l| r.pre.matches(*l)).collect();
                        Some(filtered)
                    }
                    (None, Pre::Labels(ls)) => Some(ls.iter().copied().collect()),
                    (None, Pre::Wildcard) => None,
                };
                let (new_top, new_below): (Option<HashSet<Label>>, Option<HashSet<Label>>) = match r.op {
                    Op::Swap(l) | Op::Push(l) if matched.is_some() => {
                        let mut s = HashSet::new();
                        s.insert(l);
                        let below_for_to = if matches!(r.op, Op::Push(_)) { matched.clone() } else { from_below.clone() };
                        (Some(s), below_for_to)
                    }
                    Op::Swap(l) | Op::Push(l) => {
                        let _ = l;
                        (None, None)
                    }
                    Op::Noop => (matched.clone(), from_below.clone()),
                    Op::Pop => (from_below.clone(), None),
                };
                changed |= merge_summary(&mut tos, r.to, new_top);
                if track_below {
                    changed |= merge_summary(&mut below, r.to, new_below);
                }
            }
        }

        for rule in self.rules.iter_mut() {
            if let Some(Some(set)) = tos.get(&rule.from) {
                let tightened = rule.pre.intersect_concrete(&set.iter().copied().collect::<Vec<_>>());
                rule.pre = tightened;
            }
        }
        self.rules.retain(|r| !r.pre.is_empty());
    }

    /// Level 3: target-TOS pruning. A rule whose op produces a concrete resulting top label is
    /// dropped if its destination state can never subsequently match that label (no outgoing
    /// rule's pre-set could ever overlap it) and the destination is not itself accepting (where
    /// the resulting top still matters for empty-stack acceptance bookkeeping).
    fn reduce_target_tos(&mut self) {
        let live_labels: HashMap<super::PdsStateId, Option<HashSet<Label>>> = {
            let mut map: HashMap<super::PdsStateId, Option<HashSet<Label>>> = HashMap::new();
            for r in &self.rules {
                let entry = map.entry(r.from).or_insert(Some(HashSet::new()));
                match (&r.pre, entry.as_mut()) {
                    (Pre::Wildcard, _) => {
                        *entry = None;
                    }
                    (Pre::Labels(ls), Some(set)) => {
                        set.extend(ls.iter().copied());
                    }
                    (Pre::Labels(_), None) => {}
                }
            }
            map
        };
        let accepting = self.accepting.clone();
        self.retain_rules(|r| {
            if accepting.contains(&r.to) {
                return true;
            }
            let produced = match r.op {
                Op::Swap(l) | Op::Push(l) => Some(l),
                Op::Pop | Op::Noop => None,
            };
            match produced {
                None => true,
                Some(l) => match live_labels.get(&r.to) {
                    None => true,
                    Some(None) => true,
                    Some(Some(set)) => set.iter().any(|x| x.overlaps(&l)),
                },
            }
        });
    }
}

/// Merge `new` into `map[state]` (set union if both are `Some`, `None` if either is). Returns
/// whether the stored summary changed.
fn merge_summary(
    map: &mut HashMap<super::PdsStateId, Option<HashSet<Label>>>,
    state: super::PdsStateId,
    new: Option<HashSet<Label>>,
) -> bool {
    match map.get(&state) {
        None => {
            map.insert(state, new);
            true
        }
        Some(existing) => {
            let merged = match (existing, &new) {
                (None, _) | (_, None) => None,
                (Some(a), Some(b)) => {
                    if b.is_subset(a) {
                        Some(a.clone())
                    } else {
                        Some(a.union(b).copied().collect())
                    }
                }
            };
            if merged.as_ref() == map.get(&state).unwrap().as_ref() {
                false
            } else {
                map.insert(state, merged);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::pds::Pre;

    #[test]
    fn reachability_reduction_drops_dead_rules() {
        let mut pds = Pds::new(4);
        pds.mark_initial(0);
        pds.mark_accepting(2);
        pds.add_rule(0, Pre::Wildcard, 1, Op::Noop).unwrap();
        pds.add_rule(1, Pre::Wildcard, 2, Op::Pop).unwrap();
        // Dead: state 3 is never reached from the initial state.
        pds.add_rule(3, Pre::Wildcard, 2, Op::Pop).unwrap();
        let (before, after) = pds.reduce(0);
        assert_eq!(before, 3);
        assert_eq!(after, 2);
    }

    #[test]
    fn tos_reduction_tightens_pre_set() {
        let mut pds = Pds::new(3);
        pds.mark_initial(0);
        pds.mark_accepting(2);
        pds.add_rule(0, Pre::Wildcard, 1, Op::Swap(Label::mpls(1))).unwrap();
        pds.add_rule(1, Pre::Labels(vec![Label::mpls(1), Label::mpls(2)]), 2, Op::Pop).unwrap();
        pds.reduce(1);
        let r = pds.rules().iter().find(|r| r.from == 1).unwrap();
        match &r.pre {
            Pre::Labels(ls) => assert_eq!(ls, &vec![Label::mpls(1)]),
            Pre::Wildcard => panic!("expected tightened pre-set"),
        }
    }
}
