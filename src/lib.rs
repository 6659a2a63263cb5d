//! # aalwines
//!
//! Analyzes MPLS networks by reducing reachability questions about packets traversing
//! routers with label-switched forwarding to decision problems on weighted pushdown systems
//! (PDS). Given a network topology, per-interface routing tables, and a query — a triple of
//! regular expressions (pre-stack, path, post-stack) plus a bounded link-failure count and an
//! approximation mode — this crate answers whether there exists a concrete execution whose
//! initial header matches the pre-stack language, whose sequence of traversed interfaces
//! matches the path language, and whose final header matches the post-stack language, and can
//! produce a witness trace when one exists.
//!
//! ## Structure
//!
//! - **[`label`]**: the label/header algebra (MPLS, sticky-MPLS, IPv4/IPv6, interface-id) with
//!   mask-aware overlap and the network's label universe.
//! - **[`topology`]**: [`Router`](topology::Router), [`Interface`](topology::Interface) and
//!   [`Network`](topology::Network) — the physical/logical network a query is checked against.
//! - **[`routing`]**: per-interface [`RoutingTable`](routing::RoutingTable)s: ordered entries
//!   of priority-ranked forwarding [`Rule`](routing::Rule)s.
//! - **[`nfa`]**: finite automata over labels, used for the query's three regexes and as a
//!   capability consumed by the network→PDS product construction.
//! - **[`pds`]**: the weighted pushdown system model and its reduction passes.
//! - **[`factory`]**: translates a [`Network`](topology::Network) + [`Query`](query::Query)
//!   into a [`Pds`](pds::Pds) whose runs correspond one-to-one to concrete network executions.
//! - **[`automaton`]**: the P-automaton representation of regular PDS configuration sets, and
//!   the `pre*`/`post*` saturation engines plus witness-trace reconstruction.
//! - **[`cegar`]**: counterexample-guided abstraction refinement over interfaces, layered on
//!   top of [`factory`] and [`automaton`] for networks too large to verify concretely.
//! - **[`route_synth`]**: Dijkstra/Bellman-Ford-based synthesis of failover and
//!   explicitly-installed label-switched paths, used by test topologies and scenario 3 of the
//!   seed test suite.
//! - **[`verifier`]**: the top-level entry point, [`verifier::verify`], which drives the
//!   OVER/UNDER/DUAL/EXACT approximation-mode schedule and returns a three-valued
//!   [`VerificationResult`](verifier::VerificationResult) plus an optional witness
//!   [`Trace`](verifier::Trace).
//! - **[`query`]**: the parsed [`Query`](query::Query) type the verifier consumes; the query
//!   grammar's parsing mechanics are a collaborator's concern, out of scope for this crate.
//! - **[`moped`]**: a pure writer for Moped's textual PDS rule format, for offline
//!   cross-checking against the external `MOPED_PATH` solver.
//! - **[`coordinate`]**: a router's optional geographic location, carried unchanged through
//!   topology composition.
//!
//! ## Usage
//!
//! ```
//! use aalwines::label::Label;
//! use aalwines::nfa::Nfa;
//! use aalwines::query::{ApproxMode, Query};
//! use aalwines::routing::{Rule, RuleKind};
//! use aalwines::topology::Network;
//! use aalwines::verifier::{verify, VerificationResult, VerifierConfig};
//!
//! let mut net = Network::new();
//! let r0 = net.add_router("R0").unwrap();
//! let r1 = net.add_router("R1").unwrap();
//! let r2 = net.add_router("R2").unwrap();
//! let (_r0_out, r1_in) = net.add_link(r0, "eth0", r1, "eth0", 1.0).unwrap();
//! let (r1_out, r2_in) = net.add_link(r1, "eth1", r2, "eth0", 1.0).unwrap();
//!
//! // A packet entering the network at R1's `eth0` carrying `l10` is forwarded out R1's
//! // `eth1` unchanged, and received at R2.
//! net.interface_mut(r1_in).routing_table_mut().add_rule(
//!     Label::mpls(10),
//!     Rule::new(0, 0, RuleKind::Mpls, Some(r1_out), vec![]),
//! );
//! net.interface_mut(r2_in).routing_table_mut().add_rule(
//!     Label::mpls(10),
//!     Rule::new(0, 0, RuleKind::Receive, None, vec![]),
//! );
//!
//! let pre = Nfa::single(vec![Label::mpls(10)], false);
//! let path = Nfa::any_symbol().star();
//! let post = Nfa::new(true);
//! let query = Query::new(pre, path, post, 0, ApproxMode::Over);
//!
//! let outcome = verify(&net, &query, &VerifierConfig::default()).unwrap();
//! assert_eq!(outcome.result, VerificationResult::Yes);
//! ```

pub mod automaton;
pub mod cegar;
pub mod coordinate;
pub mod error;
pub mod factory;
pub mod label;
pub mod moped;
pub mod nfa;
pub mod pds;
pub mod query;
pub mod route_synth;
pub mod routing;
pub mod topology;
pub mod verifier;

pub use error::Error;
