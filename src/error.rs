//! Module containing all error types.

use crate::nfa::NfaError;
use crate::pds::PdsError;
use crate::routing::RoutingError;
use crate::topology::TopologyError;
use thiserror::Error;

/// Errors raised while translating a [`crate::topology::Network`] + [`crate::query::Query`]
/// into a [`crate::pds::Pds`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FactoryError {
    /// The factory only builds a concrete PDS for `OVER`/`UNDER`/`EXACT`; `DUAL` must be
    /// expanded by the caller into an `OVER`-then-`UNDER` schedule first.
    #[error("the network\u{2192}PDS factory cannot build a PDS directly for DUAL mode")]
    DualIsAScheduleNotAMode,
    /// A rule referenced an outgoing interface id not present in the network.
    #[error("rule references unknown interface {0}")]
    UnknownInterface(crate::topology::InterfaceId),
    /// Propagated from the PDS being built (an interned state id somehow fell out of range).
    #[error("PDS error during construction: {0}")]
    Pds(#[from] PdsError),
}

/// Errors raised by P-automaton saturation or accept-path search.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AutomatonError {
    /// The requested PDS state has no corresponding P-automaton state (out of range).
    #[error("state {0} has no corresponding automaton state")]
    UnknownState(crate::automaton::StateId),
    /// Trace reconstruction reached an edge with no recorded derivation, which can only mean a
    /// bug in saturation's trace-label bookkeeping.
    #[error("edge {0} carries no trace label usable for reconstruction")]
    UnreconstructibleEdge(usize),
}

/// Errors raised by the CEGAR loop.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CegarError {
    /// Refinement could not separate the good/bad concrete sets with either partition, and no
    /// single abstract rule could be blamed either.
    #[error("CEGAR could not refine the abstraction to exclude a spurious step")]
    RefinementStuck,
    /// The round budget configured on [`crate::verifier::CegarConfig`] was exhausted.
    #[error("CEGAR refinement exhausted its round budget without converging")]
    RoundBudgetExhausted,
}

/// Errors raised by the top-level verifier.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VerifierError {
    /// Error propagated from the network\u{2192}PDS factory.
    #[error("factory error: {0}")]
    Factory(#[from] FactoryError),
    /// Error propagated from the PDS model.
    #[error("PDS error: {0}")]
    Pds(#[from] PdsError),
    /// Error propagated from the CEGAR loop.
    #[error("CEGAR error: {0}")]
    Cegar(#[from] CegarError),
}

/// Top-level error type returned by the public API of this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Error propagated from the topology model.
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    /// Error propagated from a routing table.
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
    /// Error propagated from an NFA.
    #[error("NFA error: {0}")]
    Nfa(#[from] NfaError),
    /// Error propagated from the PDS model or the network-to-PDS factory.
    #[error("PDS error: {0}")]
    Pds(#[from] PdsError),
    /// Error propagated from the network\u{2192}PDS factory.
    #[error("Factory error: {0}")]
    Factory(#[from] FactoryError),
    /// Error propagated from P-automaton saturation or trace reconstruction.
    #[error("Automaton error: {0}")]
    Automaton(#[from] AutomatonError),
    /// Error propagated from the CEGAR loop.
    #[error("CEGAR error: {0}")]
    Cegar(#[from] CegarError),
    /// Error propagated from the top-level verifier.
    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierError),
    /// An internal invariant was violated. This always signals a bug.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(&'static str),
}
