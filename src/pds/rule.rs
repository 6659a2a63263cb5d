//! PDS rule shape: operations and pre-label sets.

use crate::label::Label;
use std::fmt;

/// A PDS state index, into whatever arena the owning [`super::Pds`] assigns.
pub type PdsStateId = usize;

/// The operation a [`PdsRule`] applies to the stack top.
///
/// Invariant: `Push` rules have the form `<p,γ> -> <q, γ' γ>` — the original top is pushed back
/// on top of the new label, so every rule's right-hand side has length at most two and the rest
/// of the stack below the original top is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Pop the stack top.
    Pop,
    /// Replace the stack top with the given label.
    Swap(Label),
    /// Leave the stack top untouched (used for rules with no stack operations, and by `Receive`
    /// rules that terminate the header in place).
    Noop,
    /// Push the given label on top of the current top (old top moves down one).
    Push(Label),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Pop => write!(f, "pop"),
            Op::Swap(l) => write!(f, "swap({})", l),
            Op::Noop => write!(f, "noop"),
            Op::Push(l) => write!(f, "push({})", l),
        }
    }
}

/// A rule's pre-condition on the stack top: an explicit set of labels, or the wildcard (every
/// label matches). Mirrors the label sets carried by P-automaton edges.
#[derive(Debug, Clone, PartialEq)]
pub enum Pre {
    /// Matches exactly the given labels (under [`Label::overlaps`], so IP masks still apply).
    Labels(Vec<Label>),
    /// Matches any label.
    Wildcard,
}

impl Pre {
    /// Whether this pre-set matches `label`.
    pub fn matches(&self, label: Label) -> bool {
        match self {
            Pre::Labels(ls) => ls.iter().any(|l| l.overlaps(&label)),
            Pre::Wildcard => true,
        }
    }

    /// Whether this pre-set can never match anything (only possible for an empty explicit set).
    pub fn is_empty(&self) -> bool {
        matches!(self, Pre::Labels(ls) if ls.is_empty())
    }

    /// Intersect with a concrete label set. `Wildcard` narrows to exactly `with`; an explicit
    /// set narrows to its overlap with `with`.
    pub fn intersect_concrete(&self, with: &[Label]) -> Pre {
        match self {
            Pre::Wildcard => Pre::Labels(with.to_vec()),
            Pre::Labels(ls) => {
                Pre::Labels(ls.iter().copied().filter(|l| with.iter().any(|w| w.overlaps(l))).collect())
            }
        }
    }
}

/// A single PDS rule: `<from, pre> -> <to, op>`.
#[derive(Debug, Clone, PartialEq)]
pub struct PdsRule {
    /// The source state.
    pub from: PdsStateId,
    /// The pre-condition on the stack top.
    pub pre: Pre,
    /// The destination state.
    pub to: PdsStateId,
    /// The operation applied to the stack.
    pub op: Op,
}

impl fmt::Display for PdsRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {:?}> -> <{}, {}>", self.from, self.pre, self.to, self.op)
    }
}
