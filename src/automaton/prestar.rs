//! `pre*` saturation (backward direction): computes the automaton accepting exactly the
//! configurations that can reach the target set the automaton was seeded with.

use super::{PAutomaton, StateId, TraceLabel, Worklist};
use crate::label::Label;
use crate::pds::{Op, Pds, Pre};
use std::collections::HashMap;

fn resolve(pre: &Pre, universe: &[Label]) -> Vec<Label> {
    match pre {
        Pre::Labels(ls) => ls.clone(),
        Pre::Wildcard => universe.to_vec(),
    }
}

/// Saturate `automaton` (already seeded with the target configuration set's edges, added via
/// [`PAutomaton::add_edge`] with [`TraceLabel::Seed`], and its accepting states marked) into the
/// automaton accepting `pre*` of that set.
pub fn pre_star(pds: &Pds, universe: &[Label], automaton: &mut PAutomaton) {
    let mut worklist = Worklist::default();
    // delta_prime: mid-state (the destination of the edge matching a PUSH rule's pushed label)
    // -> pending (origin state p, rule index) continuations awaiting a second hop.
    let mut delta_prime: HashMap<StateId, Vec<(StateId, usize)>> = HashMap::new();

    for idx in 0..automaton.edges().len() {
        worklist.push(idx);
    }
    for (rule_id, rule) in pds.rules().iter().enumerate() {
        if rule.op == Op::Pop {
            for label in resolve(&rule.pre, universe) {
                let (idx, is_new) =
                    automaton.add_edge(rule.from, Some(label), rule.to, TraceLabel::PreStarRule { rule_id, intermediate: None });
                if is_new {
                    worklist.push(idx);
                }
            }
        }
    }

    let mut steps = 0usize;
    while let Some(idx) = worklist.pop() {
        steps += 1;
        let (from, label, to) = {
            let e = automaton.edge(idx);
            (e.from, e.label, e.to)
        };
        let Some(label) = label else { continue };

        for (rule_id, rule) in pds.rules().iter().enumerate() {
            if rule.to != from {
                continue;
            }
            match rule.op {
                Op::Swap(pushed) if pushed == label => {
                    for l2 in resolve(&rule.pre, universe) {
                        let (eidx, is_new) = automaton.add_edge(
                            rule.from,
                            Some(l2),
                            to,
                            TraceLabel::PreStarRule { rule_id, intermediate: None },
                        );
                        if is_new {
                            worklist.push(eidx);
                            fire_delta_prime(automaton, &mut delta_prime, &mut worklist, rule.from, l2, to);
                        }
                    }
                }
                Op::Noop if rule.pre.matches(label) => {
                    let (eidx, is_new) =
                        automaton.add_edge(rule.from, Some(label), to, TraceLabel::PreStarRule { rule_id, intermediate: None });
                    if is_new {
                        worklist.push(eidx);
                        fire_delta_prime(automaton, &mut delta_prime, &mut worklist, rule.from, label, to);
                    }
                }
                Op::Push(pushed) if pushed == label => {
                    delta_prime.entry(to).or_default().push((rule.from, rule_id));
                    for &eidx2 in automaton.out_edges(to).to_vec().iter() {
                        let e2 = automaton.edge(eidx2).clone();
                        if let Some(l2) = e2.label {
                            if rule.pre.matches(l2) {
                                let (eidx, is_new) = automaton.add_edge(
                                    rule.from,
                                    Some(l2),
                                    e2.to,
                                    TraceLabel::PreStarRule { rule_id, intermediate: Some(to) },
                                );
                                if is_new {
                                    worklist.push(eidx);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    log::debug!("pre_star: fixed point after {} worklist steps, {} edges", steps, automaton.edges().len());
}

/// When a new edge `(from, label, to)` appears, fire any push-completion obligations pending on
/// `from` (`delta_prime[from]`): for each `(p, rule_id)` waiting there whose rule's pre-set
/// matches `label`, add `(p, label, to)`.
fn fire_delta_prime(
    automaton: &mut PAutomaton,
    delta_prime: &mut HashMap<StateId, Vec<(StateId, usize)>>,
    worklist: &mut Worklist,
    from: StateId,
    label: Label,
    to: StateId,
) {
    if let Some(pending) = delta_prime.get(&from).cloned() {
        for (p, rule_id) in pending {
            let (eidx, is_new) = automaton.add_edge(p, Some(label), to, TraceLabel::PreStarRule { rule_id, intermediate: Some(from) });
            if is_new {
                worklist.push(eidx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::pds::{Op, Pds, Pre};

    /// `p0 --pop--> p1`; target set is `{<p1, epsilon>}` (state `p1` accepting empty stack).
    /// `pre*` must then accept `<p0, l1>` (any label, since the pop consumes whatever is on
    /// top).
    #[test]
    fn pop_rule_reaches_target_through_any_label() {
        let mut pds = Pds::new(2);
        pds.add_rule(0, Pre::Wildcard, 1, Op::Pop).unwrap();
        let mut automaton = PAutomaton::new(2);
        automaton.mark_accepting(1);
        pre_star(&pds, &[Label::mpls(7)], &mut automaton);
        assert!(automaton.find_edge(0, Some(Label::mpls(7)), 1).is_some());
    }

    #[test]
    fn push_then_pop_round_trips() {
        // p0 --l1/push l2--> p1 --l2/pop--> p_mid --l1/pop--> p2. Target: <p2, epsilon>.
        let mut pds = Pds::new(4);
        pds.add_rule(0, Pre::Labels(vec![Label::mpls(1)]), 1, Op::Push(Label::mpls(2))).unwrap();
        pds.add_rule(1, Pre::Labels(vec![Label::mpls(2)]), 2, Op::Pop).unwrap();
        pds.add_rule(2, Pre::Labels(vec![Label::mpls(1)]), 3, Op::Pop).unwrap();
        let mut automaton = PAutomaton::new(4);
        automaton.mark_accepting(3);
        pre_star(&pds, &[Label::mpls(1), Label::mpls(2)], &mut automaton);
        // <p0, l1> (stack exactly [l1]) must reach p2 accepting the empty remainder: push l2
        // (stack [l2, l1]), pop l2 (stack [l1]), pop l1 (stack []).
        assert!(automaton.find_edge(0, Some(Label::mpls(1)), 3).is_some());
    }
}
