//! Emptiness testing and witness-trace reconstruction.
//!
//! [`find_stack_word`] is the accept-path search: a product exploration of the P-automaton
//! against a stack-content NFA (the pre-stack regex, for the `pre*` direction this crate's
//! verifier uses) that returns, if satisfiable, the sequence of automaton edges traversed and
//! the concrete stack word they read. [`reconstruct`] then walks those edges' trace labels to
//! recover the ordered sequence of concrete PDS rules that fired, and [`replay`] turns that rule
//! sequence into the snapshot sequence a caller reports as the witness.

use super::{PAutomaton, StateId, TraceLabel};
use crate::label::Label;
use crate::nfa::{Nfa, NfaStateId};
use crate::pds::{Op, Pds, PdsRule, PdsStateId};
use std::collections::{HashSet, VecDeque};

/// One snapshot in a reconstructed witness: the PDS state and the full stack content at that
/// point, top-of-stack first (`stack[0]` is the label a routing-table lookup would match on).
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStep {
    /// The PDS state at this point in the run.
    pub state: PdsStateId,
    /// The stack content, top-of-stack first.
    pub stack: Vec<Label>,
}

/// Search the product of `automaton` and `word_nfa` for an accepting run starting from one of
/// `pds_initial`'s states and `word_nfa`'s initial states: a sequence of automaton edges whose
/// consumed labels are simultaneously accepted by `word_nfa`, ending in a pair of automaton/NFA
/// states that are both accepting.
///
/// This is a breadth-first product search rather than a plain depth-first walk over a single
/// fixed word, because the word itself ranges over `word_nfa`'s language rather than being fixed
/// in advance; BFS also guarantees the shortest witness is found first.
/// Returns the ordered list of automaton edge indices traversed, or `None` if the intersection is
/// empty.
pub fn find_stack_word(automaton: &PAutomaton, word_nfa: &Nfa, pds_initial: &[PdsStateId]) -> Option<Vec<usize>> {
    let start_nfa: Vec<NfaStateId> = word_nfa.epsilon_closure(word_nfa.initial()).into_iter().collect();
    let mut visited: HashSet<(StateId, Vec<NfaStateId>)> = HashSet::new();
    let mut queue: VecDeque<(StateId, Vec<NfaStateId>, Vec<usize>)> = VecDeque::new();

    for &p in pds_initial {
        if visited.insert((p, start_nfa.clone())) {
            queue.push_back((p, start_nfa.clone(), Vec::new()));
        }
    }

    while let Some((state, nfa_states, edges)) = queue.pop_front() {
        if automaton.is_accepting(state) && word_nfa.accepts_empty_from(&nfa_states) {
            return Some(edges);
        }
        for &eidx in automaton.out_edges(state) {
            let e = automaton.edge(eidx);
            match e.label {
                Some(l) => {
                    let next_nfa: Vec<NfaStateId> = word_nfa.next(&nfa_states, l).into_iter().collect();
                    if next_nfa.is_empty() {
                        continue;
                    }
                    if visited.insert((e.to, next_nfa.clone())) {
                        let mut edges2 = edges.clone();
                        edges2.push(eidx);
                        queue.push_back((e.to, next_nfa, edges2));
                    }
                }
                None => {
                    if visited.insert((e.to, nfa_states.clone())) {
                        let mut edges2 = edges.clone();
                        edges2.push(eidx);
                        queue.push_back((e.to, nfa_states.clone(), edges2));
                    }
                }
            }
        }
    }
    None
}

/// Walk `edge_run`'s trace labels (as produced by [`super::pre_star`]) and return the ordered
/// sequence of PDS rule ids that fired to realize it. `pre*`-derived edges already appear in
/// forward chronological order along `edge_run`, so this, unlike `post*` reconstruction, needs
/// no reversal: `post*` traces are produced in reverse derivation order and must be reversed
/// before emission, which is exactly the asymmetry between the two reconstructors.
pub fn reconstruct_pre_star(pds: &Pds, automaton: &PAutomaton, edge_run: &[usize]) -> Vec<usize> {
    let mut out = Vec::new();
    for &idx in edge_run {
        expand_pre(pds, automaton, idx, &mut out);
    }
    out
}

fn expand_pre(pds: &Pds, automaton: &PAutomaton, edge_idx: usize, out: &mut Vec<usize>) {
    let e = automaton.edge(edge_idx).clone();
    let TraceLabel::PreStarRule { rule_id, intermediate } = e.trace else {
        // `TraceLabel::Seed`: part of the original target configuration set, not a firing.
        return;
    };
    out.push(rule_id);
    let rule: &PdsRule = &pds.rules()[rule_id];
    match intermediate {
        None => match rule.op {
            // A `Pop` rule is always the terminal step of its branch: the edge it produced
            // lands directly on the pre-existing target-set state, nothing downstream to chase.
            Op::Pop => {}
            Op::Swap(pushed) => {
                if let Some(cont) = automaton.find_edge(rule.to, Some(pushed), e.to) {
                    expand_pre(pds, automaton, cont, out);
                }
            }
            Op::Noop => {
                if let Some(cont) = automaton.find_edge(rule.to, e.label, e.to) {
                    expand_pre(pds, automaton, cont, out);
                }
            }
            Op::Push(_) => unreachable!("a Push rule's pre*-trace always carries an intermediate state"),
        },
        Some(mid) => {
            // Push-completion: first the popped edge (rule.to reading the pushed label lands on
            // `mid`), then the pre-existing continuation from `mid` (reading this edge's own
            // label) that delta_prime matched against.
            if let Op::Push(pushed) = rule.op {
                if let Some(popped) = automaton.find_edge(rule.to, Some(pushed), mid) {
                    expand_pre(pds, automaton, popped, out);
                }
                if let Some(cont) = automaton.find_edge(mid, e.label, e.to) {
                    expand_pre(pds, automaton, cont, out);
                }
            }
        }
    }
}

/// Walk `edge_run`'s trace labels (as produced by [`super::post_star`]) and return the ordered
/// sequence of PDS rule ids that fired. Unlike `pre*`, a single top-level `post*` edge may expand
/// into *two* constituent firings discovered out of chronological order (the epsilon-closure
/// half and the continuation half); [`expand_post`] restores the correct order per edge, but the
/// caller must still reverse the overall `edge_run` traversal order relative to how `post*`
/// discovers it.
pub fn reconstruct_post_star(pds: &Pds, automaton: &PAutomaton, edge_run: &[usize]) -> Vec<usize> {
    let mut out = Vec::new();
    for &idx in edge_run {
        expand_post(pds, automaton, idx, &mut out);
    }
    out
}

fn expand_post(pds: &Pds, automaton: &PAutomaton, edge_idx: usize, out: &mut Vec<usize>) {
    let e = automaton.edge(edge_idx).clone();
    match e.trace {
        TraceLabel::Seed => {}
        TraceLabel::PostStarRule { rule_id, .. } => out.push(rule_id),
        TraceLabel::PostStarEpsilon { intermediate } => {
            if let Some(eps) = automaton.find_edge(e.from, None, intermediate) {
                expand_post(pds, automaton, eps, out);
            }
            if let Some(cont) = automaton.find_edge(intermediate, e.label, e.to) {
                expand_post(pds, automaton, cont, out);
            }
        }
        TraceLabel::PreStarRule { .. } => unreachable!("a post* automaton never carries pre*-trace labels"),
    }
    let _ = pds;
}

/// Replay `rule_ids` (in the chronological order [`reconstruct_pre_star`] / (reversed)
/// [`reconstruct_post_star`] return) forward from `start_state`/`start_stack`, producing one
/// [`TraceStep`] snapshot per rule firing plus the initial one.
pub fn replay(pds: &Pds, start_state: PdsStateId, start_stack: Vec<Label>, rule_ids: &[usize]) -> Vec<TraceStep> {
    let mut stack = start_stack;
    let mut state = start_state;
    let mut steps = vec![TraceStep { state, stack: stack.clone() }];
    for &rid in rule_ids {
        let rule = &pds.rules()[rid];
        match rule.op {
            Op::Pop => {
                if !stack.is_empty() {
                    stack.remove(0);
                }
            }
            Op::Swap(l) => {
                if let Some(top) = stack.first_mut() {
                    *top = l;
                }
            }
            Op::Noop => {}
            Op::Push(l) => stack.insert(0, l),
        }
        state = rule.to;
        steps.push(TraceStep { state, stack: stack.clone() });
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{pre_star, PAutomaton, TraceLabel};
    use crate::label::Label;
    use crate::pds::{Op, Pds, Pre};

    #[test]
    fn find_stack_word_recovers_a_push_pop_witness() {
        let mut pds = Pds::new(4);
        pds.mark_initial(0);
        pds.add_rule(0, Pre::Labels(vec![Label::mpls(1)]), 1, Op::Push(Label::mpls(2))).unwrap();
        pds.add_rule(1, Pre::Labels(vec![Label::mpls(2)]), 2, Op::Pop).unwrap();
        pds.add_rule(2, Pre::Labels(vec![Label::mpls(1)]), 3, Op::Pop).unwrap();
        let universe = [Label::mpls(1), Label::mpls(2)];
        let mut automaton = PAutomaton::new(4);
        automaton.mark_accepting(3);
        pre_star(&pds, &universe, &mut automaton);

        // The word NFA accepts exactly the single-symbol word "l1": the pre-stack content.
        let word_nfa = Nfa::single(vec![Label::mpls(1)], false);
        let run = find_stack_word(&automaton, &word_nfa, pds.initial()).expect("witness must exist");
        let rule_ids = reconstruct_pre_star(&pds, &automaton, &run);
        let steps = replay(&pds, 0, vec![Label::mpls(1)], &rule_ids);
        assert_eq!(steps.first().unwrap().state, 0);
        assert_eq!(steps.last().unwrap().state, 3);
        assert!(steps.last().unwrap().stack.is_empty());
    }

    #[test]
    fn find_stack_word_returns_none_when_unsatisfiable() {
        let mut pds = Pds::new(2);
        pds.mark_initial(0);
        pds.add_rule(0, Pre::Wildcard, 1, Op::Pop).unwrap();
        let mut automaton = PAutomaton::new(2);
        // No accepting state is ever marked, so nothing can be accepted.
        pre_star(&pds, &[Label::mpls(1)], &mut automaton);
        let word_nfa = Nfa::single(vec![Label::mpls(1)], false);
        assert!(find_stack_word(&automaton, &word_nfa, pds.initial()).is_none());
    }
}
