//! # Top-level verifier
//!
//! Ties the rest of the crate together: given a [`Network`] and a [`Query`], decide whether the
//! query holds by building a [`Pds`] (directly via [`crate::factory::build`], or through the
//! [`crate::cegar`] loop when [`VerifierConfig::cegar`] is set), saturating it with `pre*`
//! against a target automaton seeded from the query's post-stack language, and searching the
//! result against the pre-stack language.

use crate::automaton::trace::{self, TraceStep};
use crate::automaton::{pre_star, PAutomaton, StateId, TraceLabel};
use crate::cegar::{self, CegarConfig};
use crate::error::VerifierError;
use crate::factory;
use crate::label::Label;
use crate::nfa::{Nfa, NfaStateId};
use crate::pds::{Pds, PdsStateId};
use crate::query::{ApproxMode, Query};
use crate::topology::Network;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// The three-valued answer a verification run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationResult {
    /// The query is definitively satisfiable.
    Yes,
    /// The query is definitively unsatisfiable.
    No,
    /// Neither approximation could settle the question (`DUAL` disagreement, or an approximate
    /// mode's positive result that the bound doesn't make definitive on its own).
    Maybe,
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::Yes => write!(f, "YES"),
            VerificationResult::No => write!(f, "NO"),
            VerificationResult::Maybe => write!(f, "MAYBE"),
        }
    }
}

/// A reconstructed witness run: the sequence of snapshots a positive verification passed
/// through, top-of-stack first at each step (text form only, no serde).
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// The ordered snapshots of the witness run.
    pub steps: Vec<TraceStep>,
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "#{} state={} stack=[", i, step.state)?;
            for (j, l) in step.stack.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", l)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Which CEGAR refinement strategy to run, re-exported here so callers configuring a verifier
/// need not reach into [`crate::cegar`] directly.
pub use crate::cegar::RefinementStrategy;

/// Configuration for one [`verify`] call.
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    /// PDS reduction aggressiveness, `0..=3`. `0` disables reduction beyond plain reachability
    /// pruning.
    pub reduction_level: u8,
    /// When set, build and saturate the PDS through the CEGAR loop instead of the concrete
    /// factory.
    pub cegar: Option<CegarConfig>,
    /// When set, dump the concrete PDS in Moped's rule format to this path before saturating —
    /// a pure diagnostic side effect, never read back by this crate.
    pub dump_path: Option<PathBuf>,
}

/// The full result of a [`verify`] call: the three-valued answer, a witness trace when one was
/// found, and the rule counts [`Pds::reduce`] reported (`0` for both when CEGAR was used, since
/// its abstract PDS is rebuilt and reduced fresh every round).
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// The three-valued answer.
    pub result: VerificationResult,
    /// A witness trace, present exactly when a positive result was found.
    pub trace: Option<Trace>,
    /// Rule count of the concrete PDS before reduction.
    pub rules_before: usize,
    /// Rule count of the concrete PDS after reduction.
    pub rules_after: usize,
}

/// Embed `nfa` into `automaton` as a fresh block of auxiliary states, wiring an epsilon edge from
/// every accepting PDS state into `nfa`'s initial states. The result is the standard P-automaton
/// encoding of the target configuration set `{<q, w> : q accepting, w in L(nfa)}`. Shared with
/// [`crate::cegar`], which seeds the same target against its abstract PDS each round.
pub(crate) fn seed_post_stack_target(automaton: &mut PAutomaton, pds: &Pds, nfa: &Nfa, universe: &[Label]) {
    let mut state_of: HashMap<NfaStateId, StateId> = HashMap::new();
    for s in 0..nfa.len() {
        state_of.insert(s, automaton.fresh_state());
    }
    for s in 0..nfa.len() {
        let st = nfa.state(s);
        let from = state_of[&s];
        for &eps in &st.epsilon {
            automaton.add_edge(from, None, state_of[&eps], TraceLabel::Seed);
        }
        for edge in &st.edges {
            if edge.negated {
                for &l in universe {
                    if !edge.labels.iter().any(|el| el.overlaps(&l)) {
                        automaton.add_edge(from, Some(l), state_of[&edge.to], TraceLabel::Seed);
                    }
                }
            } else {
                for &l in &edge.labels {
                    automaton.add_edge(from, Some(l), state_of[&edge.to], TraceLabel::Seed);
                }
            }
        }
        if st.accepting {
            automaton.mark_accepting(from);
        }
    }
    for &p in pds.accepting() {
        for &i in nfa.initial() {
            automaton.add_edge(p, None, state_of[&i], TraceLabel::Seed);
        }
    }
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

struct Run {
    accepted: bool,
    trace: Option<Trace>,
    rules_before: usize,
    rules_after: usize,
}

fn run_single(network: &Network, query: &Query, mode: ApproxMode, config: &VerifierConfig) -> Result<Run, VerifierError> {
    let mut out = factory::build(network, query, mode)?;
    let (rules_before, rules_after) = out.pds.reduce(config.reduction_level);

    if let Some(path) = &config.dump_path {
        let _ = crate::moped::dump(&out.pds, path);
    }

    let universe: Vec<Label> = network.all_labels().into_iter().collect();
    let mut automaton = PAutomaton::new(out.pds.state_count());
    seed_post_stack_target(&mut automaton, &out.pds, query.post_stack(), &universe);
    pre_star(&out.pds, &universe, &mut automaton);

    let run = trace::find_stack_word(&automaton, query.pre_stack(), out.pds.initial());
    match run {
        None => Ok(Run { accepted: false, trace: None, rules_before, rules_after }),
        Some(edges) => {
            let start_state = witness_start(&automaton, query.pre_stack(), out.pds.initial(), &edges);
            let start_stack: Vec<Label> = edges.iter().filter_map(|&i| automaton.edge(i).label).collect();
            let rule_ids = trace::reconstruct_pre_star(&out.pds, &automaton, &edges);
            let steps = trace::replay(&out.pds, start_state, start_stack, &rule_ids);
            Ok(Run { accepted: true, trace: Some(Trace { steps }), rules_before, rules_after })
        }
    }
}

fn run_mode(network: &Network, query: &Query, mode: ApproxMode, config: &VerifierConfig) -> Result<Run, VerifierError> {
    if let Some(cegar_config) = &config.cegar {
        let query = query.with_mode(mode);
        let outcome = cegar::solve(network, &query, mode, cegar_config)?;
        return Ok(Run { accepted: outcome.accepted, trace: outcome.trace, rules_before: 0, rules_after: 0 });
    }
    run_single(network, &query.with_mode(mode), mode, config)
}

/// Decide `query` against `network`, running whichever mode schedule `query.mode()` selects:
///
/// - `OVER` alone: positive with `failure_bound == 0` is `YES`; any negative is `NO`; a positive
///   with a nonzero bound is `MAYBE` (the over-approximation admitted more runs than the exact
///   failure budget allows, so a definitive yes needs `UNDER` to confirm — see `DUAL`).
/// - `UNDER` alone: a positive is always `YES`; a negative is `MAYBE` (the under-approximation
///   may have rejected runs the exact semantics would still accept).
/// - `EXACT` alone: both directions are definitive (`EXACT` is `UNDER` restricted to weight-0
///   admission with the bound forced to zero, which makes it precise).
/// - `DUAL`: run `OVER`; a negative is `NO`. Otherwise run `UNDER`; a positive is `YES`,
///   a negative is `MAYBE`.
pub fn verify(network: &Network, query: &Query, config: &VerifierConfig) -> Result<VerificationOutcome, VerifierError> {
    match query.mode() {
        ApproxMode::Over => {
            let r = run_mode(network, query, ApproxMode::Over, config)?;
            let result = match (r.accepted, query.failure_bound()) {
                (true, 0) => VerificationResult::Yes,
                (true, _) => VerificationResult::Maybe,
                (false, _) => VerificationResult::No,
            };
            log::info!("verify: OVER mode settled {}", result);
            Ok(VerificationOutcome { result, trace: r.trace, rules_before: r.rules_before, rules_after: r.rules_after })
        }
        ApproxMode::Under => {
            let r = run_mode(network, query, ApproxMode::Under, config)?;
            let result = if r.accepted { VerificationResult::Yes } else { VerificationResult::Maybe };
            log::info!("verify: UNDER mode settled {}", result);
            Ok(VerificationOutcome { result, trace: r.trace, rules_before: r.rules_before, rules_after: r.rules_after })
        }
        ApproxMode::Exact => {
            let r = run_mode(network, query, ApproxMode::Exact, config)?;
            let result = if r.accepted { VerificationResult::Yes } else { VerificationResult::No };
            log::info!("verify: EXACT mode settled {}", result);
            Ok(VerificationOutcome { result, trace: r.trace, rules_before: r.rules_before, rules_after: r.rules_after })
        }
        ApproxMode::Dual => {
            let over = run_mode(network, query, ApproxMode::Over, config)?;
            if !over.accepted {
                log::info!("verify: DUAL settled NO on the OVER pass");
                return Ok(VerificationOutcome {
                    result: VerificationResult::No,
                    trace: None,
                    rules_before: over.rules_before,
                    rules_after: over.rules_after,
                });
            }
            let under = run_mode(network, query, ApproxMode::Under, config)?;
            let result = if under.accepted { VerificationResult::Yes } else { VerificationResult::Maybe };
            log::info!("verify: DUAL settled {} after the UNDER pass", result);
            let (trace, rules_before, rules_after) = if under.accepted {
                (under.trace, under.rules_before, under.rules_after)
            } else {
                (over.trace, over.rules_before, over.rules_after)
            };
            Ok(VerificationOutcome { result, trace, rules_before, rules_after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Kind, Label};
    use crate::nfa::Nfa;
    use crate::routing::{Rule, RuleKind, StackOp};

    fn linear_network() -> (Network, crate::topology::InterfaceId, crate::topology::InterfaceId) {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let r1 = net.add_router("R1").unwrap();
        let r2 = net.add_router("R2").unwrap();
        let (r0_out, r1_in) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        let (r1_out, r2_in) = net.add_link(r1, "eth1", r2, "eth0", 1.0).unwrap();

        net.interface_mut(r1_in).routing_table_mut().add_rule(
            Label::mpls(10),
            Rule::new(0, 0, RuleKind::Mpls, Some(r1_out), vec![]),
        );
        net.interface_mut(r2_in).routing_table_mut().add_rule(
            Label::mpls(10),
            Rule::new(0, 0, RuleKind::Receive, None, vec![]),
        );
        (net, r0_out, r2_in)
    }

    #[test]
    fn linear_chain_is_reachable_under_over_mode_with_zero_bound() {
        let (net, r0_out, _r2_in) = linear_network();
        let pre = Nfa::single(vec![Label::mpls(10)], false);
        let path = Nfa::any_symbol().star();
        let post = Nfa::new(true);
        let query = Query::new(pre, path, post, 0, ApproxMode::Over);

        let outcome = verify(&net, &query, &VerifierConfig::default()).unwrap();
        assert_eq!(outcome.result, VerificationResult::Yes);
        let trace = outcome.trace.expect("a positive result carries a witness");
        assert!(trace.steps.len() >= 2);
        let _ = r0_out;
    }

    #[test]
    fn unreachable_label_is_no_under_over_mode() {
        let (net, _r0_out, _r2_in) = linear_network();
        let pre = Nfa::single(vec![Label::mpls(99)], false);
        let path = Nfa::any_symbol().star();
        let post = Nfa::new(true);
        let query = Query::new(pre, path, post, 0, ApproxMode::Over);

        let outcome = verify(&net, &query, &VerifierConfig::default()).unwrap();
        assert_eq!(outcome.result, VerificationResult::No);
        assert!(outcome.trace.is_none());
    }

    #[test]
    fn exact_mode_is_definitive_both_ways() {
        let (net, _r0_out, _r2_in) = linear_network();
        let pre = Nfa::single(vec![Label::mpls(10)], false);
        let path = Nfa::any_symbol().star();
        let post = Nfa::new(true);
        let query = Query::new(pre, path, post, 0, ApproxMode::Exact);

        let outcome = verify(&net, &query, &VerifierConfig::default()).unwrap();
        assert_eq!(outcome.result, VerificationResult::Yes);
        let _ = Kind::Mpls;
    }

    /// `R0` has a priority-0 rule via `R1` and a priority-1 backup via `R3`, both converging on
    /// `R2`. A path query pinned to the backup's outgoing interface can only be witnessed once
    /// that rule is admitted.
    fn failover_network() -> (Network, crate::topology::InterfaceId) {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let r1 = net.add_router("R1").unwrap();
        let r2 = net.add_router("R2").unwrap();
        let r3 = net.add_router("R3").unwrap();
        let ext0 = net.add_virtual_interface(r0, "ext0");
        let (a01, b01) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        let (a12, b12) = net.add_link(r1, "eth1", r2, "eth0", 1.0).unwrap();
        let (a03, b03) = net.add_link(r0, "eth1", r3, "eth0", 1.0).unwrap();
        let (a32, b32) = net.add_link(r3, "eth1", r2, "eth1", 1.0).unwrap();

        net.interface_mut(ext0).routing_table_mut().add_rule(
            Label::mpls(1),
            Rule::new(0, 0, RuleKind::Mpls, Some(a01), vec![]),
        );
        net.interface_mut(ext0).routing_table_mut().add_rule(
            Label::mpls(1),
            Rule::new(1, 0, RuleKind::Mpls, Some(a03), vec![]),
        );
        net.interface_mut(b01).routing_table_mut().add_rule(
            Label::mpls(1),
            Rule::new(0, 0, RuleKind::Mpls, Some(a12), vec![]),
        );
        net.interface_mut(b12).routing_table_mut().add_rule(
            Label::mpls(1),
            Rule::new(0, 0, RuleKind::Receive, None, vec![]),
        );
        net.interface_mut(b03).routing_table_mut().add_rule(
            Label::mpls(1),
            Rule::new(0, 0, RuleKind::Mpls, Some(a32), vec![]),
        );
        net.interface_mut(b32).routing_table_mut().add_rule(
            Label::mpls(1),
            Rule::new(0, 0, RuleKind::Receive, None, vec![]),
        );
        (net, a03)
    }

    #[test]
    fn backup_path_is_unreachable_until_failure_bound_admits_its_priority() {
        let (net, a03) = failover_network();
        let pre = Nfa::single(vec![Label::mpls(1)], false);
        let via_backup = Nfa::any_symbol()
            .star()
            .concat(&Nfa::single(vec![Label::interface(a03 as u64)], false))
            .concat(&Nfa::any_symbol().star());
        let post = Nfa::new(true);

        let zero_bound = Query::new(pre.clone(), via_backup.clone(), post.clone(), 0, ApproxMode::Over);
        let outcome = verify(&net, &zero_bound, &VerifierConfig::default()).unwrap();
        assert_eq!(outcome.result, VerificationResult::No);

        // OVER with a nonzero bound over-approximates: a positive here only means the abstraction
        // admits the run, not that it is definitely realizable, so DUAL (which confirms via
        // UNDER) is needed for a Yes.
        let one_bound = Query::new(pre, via_backup, post, 1, ApproxMode::Dual);
        let outcome = verify(&net, &one_bound, &VerifierConfig::default()).unwrap();
        assert_eq!(outcome.result, VerificationResult::Yes);
    }

    /// `R0` pushes a temporary `l5` on top of a sticky-MPLS `s1` before the `R0`-`R1` hop and pops
    /// it again before `R1`-`R2`, so the header entering and leaving the network both carry `s1`
    /// on top — `s1` is never touched by the intermediate hop.
    fn nested_stack_network(pop_before_exit: bool) -> Network {
        let mut net = Network::new();
        let r0 = net.add_router("R0").unwrap();
        let r1 = net.add_router("R1").unwrap();
        let r2 = net.add_router("R2").unwrap();
        let ext0 = net.add_virtual_interface(r0, "ext0");
        let (a01, b01) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
        let (a12, b12) = net.add_link(r1, "eth1", r2, "eth0", 1.0).unwrap();

        net.interface_mut(ext0).routing_table_mut().add_rule(
            Label::sticky_mpls(1),
            Rule::new(0, 0, RuleKind::Mpls, Some(a01), vec![StackOp::Push(Label::mpls(5))]),
        );
        let hop_ops = if pop_before_exit { vec![StackOp::Pop] } else { vec![] };
        net.interface_mut(b01).routing_table_mut().add_rule(Label::mpls(5), Rule::new(0, 0, RuleKind::Mpls, Some(a12), hop_ops));
        net.interface_mut(b12).routing_table_mut().add_rule(
            Label::sticky_mpls(1),
            Rule::new(0, 0, RuleKind::Receive, None, vec![]),
        );
        net
    }

    #[test]
    fn sticky_label_survives_a_push_pop_wrapped_hop() {
        let net = nested_stack_network(true);
        let pre = Nfa::single(vec![Label::sticky_mpls(1)], false);
        let path = Nfa::any_symbol().star();
        let post = Nfa::single(vec![Label::sticky_mpls(1)], false);
        let query = Query::new(pre, path, post, 0, ApproxMode::Over);

        let outcome = verify(&net, &query, &VerifierConfig::default()).unwrap();
        assert_eq!(outcome.result, VerificationResult::Yes);
    }

    #[test]
    fn sticky_label_mismatch_is_no_when_the_wrapper_is_never_popped() {
        let net = nested_stack_network(false);
        let pre = Nfa::single(vec![Label::sticky_mpls(1)], false);
        let path = Nfa::any_symbol().star();
        let post = Nfa::single(vec![Label::sticky_mpls(1)], false);
        let query = Query::new(pre, path, post, 0, ApproxMode::Over);

        let outcome = verify(&net, &query, &VerifierConfig::default()).unwrap();
        assert_eq!(outcome.result, VerificationResult::No);
    }
}
