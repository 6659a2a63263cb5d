//! # Query
//!
//! A [`Query`] is a triple of regular expressions (pre-stack, path, post-stack) plus a bounded
//! link-failure count and an [`ApproxMode`]. This crate builds queries programmatically; parsing
//! a textual query grammar is out of scope.

use crate::label::{Kind, Label};
use crate::nfa::Nfa;

/// The bottom-of-stack sentinel label the pre/post NFAs are concatenated with before use.
/// Reuses the `unused_Interface` sentinel: it can never collide with a label minted for a real
/// interface, MPLS value or IP prefix.
pub fn bottom_of_stack() -> Label {
    Label::unused(Kind::Interface)
}

/// How aggressively link failures are admitted during PDS construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproxMode {
    /// Over-approximate: failure priorities are a static filter (`priority <= failure_bound`);
    /// a positive result is definitive, a negative one is not.
    Over,
    /// Under-approximate: failure priorities accumulate as weight along a run; a positive
    /// result is definitive.
    Under,
    /// Run `Over`; if positive, re-run `Under` to confirm. Disagreement yields `MAYBE`.
    Dual,
    /// Exact: implemented as `Under` restricted to weight-0 admission with the failure bound
    /// forced to zero.
    Exact,
}

/// A parsed query: pre-stack/path/post-stack NFAs, a failure bound, and an approximation mode.
#[derive(Debug, Clone)]
pub struct Query {
    pre_stack: Nfa,
    path: Nfa,
    post_stack: Nfa,
    failure_bound: u32,
    mode: ApproxMode,
}

impl Query {
    /// Build a query from its three NFAs, failure bound, and mode. `pre_stack`/`post_stack` are
    /// concatenated with the [`bottom_of_stack`] sentinel here, so callers hand in the NFAs as
    /// written by the query grammar (without the sentinel).
    pub fn new(pre_stack: Nfa, path: Nfa, post_stack: Nfa, failure_bound: u32, mode: ApproxMode) -> Self {
        let sentinel = Nfa::single(vec![bottom_of_stack()], false);
        Self {
            pre_stack: pre_stack.concat(&sentinel),
            path,
            post_stack: post_stack.concat(&sentinel),
            failure_bound,
            mode,
        }
    }

    /// The pre-stack NFA (initial header language), sentinel-terminated.
    pub fn pre_stack(&self) -> &Nfa {
        &self.pre_stack
    }

    /// The path NFA (sequence of traversed interfaces).
    pub fn path(&self) -> &Nfa {
        &self.path
    }

    /// The post-stack NFA (final header language), sentinel-terminated.
    pub fn post_stack(&self) -> &Nfa {
        &self.post_stack
    }

    /// The bound on concurrent link failures.
    pub fn failure_bound(&self) -> u32 {
        self.failure_bound
    }

    /// The approximation mode this query was built with.
    pub fn mode(&self) -> ApproxMode {
        self.mode
    }

    /// This query with its mode overridden. Used by the verifier to run the same query under
    /// several modes in sequence (`DUAL`'s OVER-then-UNDER schedule).
    pub fn with_mode(&self, mode: ApproxMode) -> Self {
        Self { mode, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_stack_is_sentinel_terminated() {
        let pre = Nfa::single(vec![Label::mpls(1)], false);
        let path = Nfa::new(true);
        let post = Nfa::new(true);
        let q = Query::new(pre, path, post, 0, ApproxMode::Over);
        let after = q.pre_stack().next(q.pre_stack().initial(), Label::mpls(1));
        let after: Vec<_> = after.into_iter().collect();
        assert!(!q.pre_stack().accepts_empty_from(&after));
        let after2 = q.pre_stack().next(&after, bottom_of_stack());
        assert!(q.pre_stack().accepts_empty_from(&after2.into_iter().collect::<Vec<_>>()));
    }
}
