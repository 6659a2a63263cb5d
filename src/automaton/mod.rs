//! # P-automaton and saturation
//!
//! A [`PAutomaton`] represents a regular set of PDS configurations `<p, w>`: "the automaton
//! accepts `w` reading from state `p`". States are partitioned into the PDS's own states (ids
//! `0..pds.state_count()`) and auxiliary states introduced during saturation (higher ids).

pub mod poststar;
pub mod prestar;
pub mod trace;

pub use poststar::post_star;
pub use prestar::pre_star;

use crate::label::Label;
use crate::pds::PdsStateId;
use std::collections::{HashMap, HashSet, VecDeque};

/// A state in a [`PAutomaton`]: either a PDS state or an auxiliary state minted during
/// saturation.
pub type StateId = usize;

/// A trace label: a tagged annotation on a P-automaton edge recording the derivation step that
/// created it, so [`trace::reconstruct`] can walk backwards to a concrete witness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceLabel {
    /// The edge belongs to the original target/initial configuration set, not derived from
    /// saturation.
    Seed,
    /// A `pre*` derivation: fired `rule_id`; `intermediate` is set when the edge was produced
    /// via a push-completion obligation rather than directly.
    PreStarRule { rule_id: usize, intermediate: Option<StateId> },
    /// A `post*` derivation produced by closing an epsilon edge against an existing outgoing
    /// edge from `intermediate`.
    PostStarEpsilon { intermediate: StateId },
    /// A `post*` derivation: the edge originates from firing `rule_id` at PDS state
    /// `from_pds_state` while reading `label`.
    PostStarRule { from_pds_state: PdsStateId, rule_id: usize, label: Label },
}

/// A single P-automaton edge: `from` reading `label` (or epsilon, if `None`) reaches `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Source state.
    pub from: StateId,
    /// The consumed label, or `None` for an epsilon edge.
    pub label: Option<Label>,
    /// Destination state.
    pub to: StateId,
    /// How this edge was derived.
    pub trace: TraceLabel,
}

/// A P-automaton: states plus labeled/epsilon edges, with an accepting subset.
#[derive(Debug, Clone)]
pub struct PAutomaton {
    next_state: StateId,
    accepting: HashSet<StateId>,
    edges: Vec<Edge>,
    /// Dedup index: `(from, label, to) -> edge index`. Epsilon edges key on `label = None`.
    index: HashMap<(StateId, Option<Label>, StateId), usize>,
    out: HashMap<StateId, Vec<usize>>,
    inc: HashMap<StateId, Vec<usize>>,
}

impl PAutomaton {
    /// An automaton with `base_states` pre-allocated states (ids `0..base_states`, typically the
    /// PDS's own states) and no edges.
    pub fn new(base_states: usize) -> Self {
        Self {
            next_state: base_states,
            accepting: HashSet::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            out: HashMap::new(),
            inc: HashMap::new(),
        }
    }

    /// Allocate a fresh auxiliary state.
    pub fn fresh_state(&mut self) -> StateId {
        let id = self.next_state;
        self.next_state += 1;
        id
    }

    /// Mark `state` accepting.
    pub fn mark_accepting(&mut self, state: StateId) {
        self.accepting.insert(state);
    }

    /// Whether `state` is accepting.
    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting.contains(&state)
    }

    /// Add an edge if it does not already exist (worklist discipline: a merge of an existing
    /// edge must not re-enqueue it). Returns the edge's index and whether it was newly inserted.
    pub fn add_edge(&mut self, from: StateId, label: Option<Label>, to: StateId, trace: TraceLabel) -> (usize, bool) {
        if let Some(&idx) = self.index.get(&(from, label, to)) {
            return (idx, false);
        }
        let idx = self.edges.len();
        self.edges.push(Edge { from, label, to, trace });
        self.index.insert((from, label, to), idx);
        self.out.entry(from).or_default().push(idx);
        self.inc.entry(to).or_default().push(idx);
        (idx, true)
    }

    /// Borrow an edge by index.
    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    /// All edges.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Indices of edges outgoing from `state`.
    pub fn out_edges(&self, state: StateId) -> &[usize] {
        self.out.get(&state).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Indices of edges incoming to `state`.
    pub fn in_edges(&self, state: StateId) -> &[usize] {
        self.inc.get(&state).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Find a concrete edge `(from, label, to)`, if present.
    pub fn find_edge(&self, from: StateId, label: Option<Label>, to: StateId) -> Option<usize> {
        self.index.get(&(from, label, to)).copied()
    }
}

/// A generic fixed-point worklist shared by `pre_star`/`post_star`: a queue of edge indices to
/// (re-)process, with membership tracked to avoid duplicate enqueues (an `in_waiting` bit per
/// edge).
#[derive(Debug, Default)]
pub(crate) struct Worklist {
    queue: VecDeque<usize>,
    in_waiting: HashSet<usize>,
}

impl Worklist {
    pub(crate) fn push(&mut self, idx: usize) {
        if self.in_waiting.insert(idx) {
            self.queue.push_back(idx);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<usize> {
        let idx = self.queue.pop_front()?;
        self.in_waiting.remove(&idx);
        Some(idx)
    }
}
