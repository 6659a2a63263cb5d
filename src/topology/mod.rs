//! # Topology
//!
//! [`Router`], [`Interface`] and [`Network`] model the physical/logical network a query is
//! verified against.

pub mod interface;
pub mod network;
pub mod router;

pub use interface::Interface;
pub use network::Network;
pub use router::Router;

use thiserror::Error;

/// Router identification: an index into the network's router graph.
pub type RouterId = petgraph::graph::NodeIndex<u32>;

/// Interface identification: an index into the network's global interface arena
/// ([`Network::interfaces`](network::Network::interfaces)).
pub type InterfaceId = usize;

/// Edge weight in the IGP topology graph, used by [`crate::route_synth`]'s shortest-path
/// computations. Stays a float since it feeds `petgraph`'s `bellman_ford`; this is distinct
/// from the integer weights carried by PDS rules.
pub type LinkWeight = f32;

/// Errors raised by topology operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopologyError {
    /// An alias is already bound to a (possibly different) router.
    #[error("alias {0:?} is already bound to a router")]
    DuplicateAlias(String),
    /// No router with that alias exists.
    #[error("no router named {0:?}")]
    UnknownRouter(String),
    /// No interface with that name exists on the given router.
    #[error("router {0:?} has no interface named {1:?}")]
    UnknownInterface(String, String),
    /// Attempted to pair two interfaces where at least one is already paired with someone else.
    #[error("interface is already paired")]
    AlreadyPaired,
    /// Attempted an operation requiring a non-NULL router on the NULL router.
    #[error("operation is not valid on the NULL router")]
    IsNullRouter,
    /// Injection/concatenation precondition failed: the named interface does not target the
    /// NULL router (i.e. is not a dangling/sink interface ready to be spliced).
    #[error("interface {0:?} does not target the NULL router")]
    NotASinkInterface(String),
}
