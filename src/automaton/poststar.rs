//! `post*` saturation (forward direction): computes the automaton accepting exactly the
//! configurations reachable from the configuration set the automaton was seeded with.

use super::{PAutomaton, StateId, TraceLabel, Worklist};
use crate::pds::{Op, Pds, PdsStateId, Pre};
use std::collections::HashMap;

/// Saturate `automaton` (already seeded with the source configuration set's edges, added via
/// [`PAutomaton::add_edge`] with [`TraceLabel::Seed`], one per `(pds_state, label)` pair with
/// `pds_state` as `from`) into the automaton accepting `post*` of that set.
///
/// Pre-creates one auxiliary state per PUSH rule, keyed by `(destination, pushed label)`.
pub fn post_star(pds: &Pds, automaton: &mut PAutomaton) {
    let mut worklist = Worklist::default();
    let mut push_aux: HashMap<(PdsStateId, crate::label::Label), StateId> = HashMap::new();
    for rule in pds.rules() {
        if let Op::Push(label) = rule.op {
            push_aux.entry((rule.to, label)).or_insert_with(|| automaton.fresh_state());
        }
    }

    for idx in 0..automaton.edges().len() {
        worklist.push(idx);
    }

    let mut steps = 0usize;
    while let Some(idx) = worklist.pop() {
        steps += 1;
        let (from, label, to) = {
            let e = automaton.edge(idx);
            (e.from, e.label, e.to)
        };
        let Some(label) = label else {
            // Epsilon edge: close it against every outgoing edge of `to`.
            for &oidx in automaton.out_edges(to).to_vec().iter() {
                let oe = automaton.edge(oidx).clone();
                if let Some(olabel) = oe.label {
                    let (eidx, is_new) =
                        automaton.add_edge(from, Some(olabel), oe.to, TraceLabel::PostStarEpsilon { intermediate: to });
                    if is_new {
                        worklist.push(eidx);
                    }
                }
            }
            continue;
        };

        for (rule_id, rule) in pds.rules().iter().enumerate() {
            if rule.from != from || !rule.pre.matches(label) {
                continue;
            }
            match rule.op {
                Op::Pop => {
                    let (eidx, is_new) =
                        automaton.add_edge(rule.to, None, to, TraceLabel::PostStarRule { from_pds_state: from, rule_id, label });
                    if is_new {
                        worklist.push(eidx);
                    }
                }
                Op::Swap(new_label) => {
                    let (eidx, is_new) = automaton.add_edge(
                        rule.to,
                        Some(new_label),
                        to,
                        TraceLabel::PostStarRule { from_pds_state: from, rule_id, label },
                    );
                    if is_new {
                        worklist.push(eidx);
                    }
                }
                Op::Noop => {
                    let (eidx, is_new) = automaton.add_edge(
                        rule.to,
                        Some(label),
                        to,
                        TraceLabel::PostStarRule { from_pds_state: from, rule_id, label },
                    );
                    if is_new {
                        worklist.push(eidx);
                    }
                }
                Op::Push(new_label) => {
                    let mid = push_aux[&(rule.to, new_label)];
                    let (eidx, is_new) = automaton.add_edge(
                        rule.to,
                        Some(new_label),
                        mid,
                        TraceLabel::PostStarRule { from_pds_state: from, rule_id, label },
                    );
                    if is_new {
                        worklist.push(eidx);
                    }
                    let (eidx2, is_new2) =
                        automaton.add_edge(mid, Some(label), to, TraceLabel::PostStarRule { from_pds_state: from, rule_id, label });
                    if is_new2 {
                        worklist.push(eidx2);
                    }
                    // For every existing epsilon-relation edge (q_src, eps, mid) already
                    // established, close it against this new (mid, label, to) edge too.
                    for &iidx in automaton.in_edges(mid).to_vec().iter() {
                        let ie = automaton.edge(iidx).clone();
                        if ie.label.is_none() {
                            let (eidx3, is_new3) =
                                automaton.add_edge(ie.from, Some(label), to, TraceLabel::PostStarEpsilon { intermediate: mid });
                            if is_new3 {
                                worklist.push(eidx3);
                            }
                        }
                    }
                }
            }
        }
    }
    log::debug!("post_star: fixed point after {} worklist steps, {} edges", steps, automaton.edges().len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::pds::{Op, Pds, Pre};

    /// `p0 --l1/noop--> p1`. Seeding `<p0, l1>` must reach `<p1, l1>`.
    #[test]
    fn noop_rule_carries_label_forward() {
        let mut pds = Pds::new(2);
        pds.add_rule(0, Pre::Wildcard, 1, Op::Noop).unwrap();
        let mut automaton = PAutomaton::new(2);
        let target = automaton.fresh_state();
        automaton.add_edge(0, Some(Label::mpls(1)), target, TraceLabel::Seed);
        post_star(&pds, &mut automaton);
        assert!(automaton.find_edge(1, Some(Label::mpls(1)), target).is_some());
    }

    #[test]
    fn push_then_pop_reaches_back_to_seed_target() {
        // p0 --l1/push l2--> p1 --l2/pop--> p2.
        let mut pds = Pds::new(3);
        pds.add_rule(0, Pre::Labels(vec![Label::mpls(1)]), 1, Op::Push(Label::mpls(2))).unwrap();
        pds.add_rule(1, Pre::Labels(vec![Label::mpls(2)]), 2, Op::Pop).unwrap();
        let mut automaton = PAutomaton::new(3);
        let target = automaton.fresh_state();
        automaton.add_edge(0, Some(Label::mpls(1)), target, TraceLabel::Seed);
        post_star(&pds, &mut automaton);
        // <p2, epsilon> should be reachable: push l2 then immediately pop it leaves us back at
        // the original stack contents, so p2 must have an epsilon edge to `target`.
        assert!(automaton.find_edge(2, None, target).is_some());
    }
}
