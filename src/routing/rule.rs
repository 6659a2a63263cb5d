//! A single forwarding rule within a [routing-table entry](crate::routing::Entry).

use crate::routing::op::StackOp;
use crate::topology::InterfaceId;
use std::fmt;

/// What kind of rule this is — needed to tell a terminating hop from one that forwards further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Ordinary MPLS forwarding: apply `ops` and send out `via`.
    Mpls,
    /// The header is accepted at this router (e.g. the destination of an IP lookup): no further
    /// hop is taken.
    Receive,
    /// The header is dropped at this router.
    Discard,
    /// An IP-lookup rule: `ops` that `PUSH` are translated to `SWAP` by the network→PDS factory,
    /// since an IP lookup does not grow the label stack.
    Route,
}

/// A single forwarding rule: an ordered list of stack operations, an outgoing interface, a
/// failover priority and a weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Failover priority. During `OVER` analysis with failure budget `k`, only rules with
    /// `priority <= k` may fire.
    pub priority: u32,
    /// Weight, consumed by `UNDER` analysis.
    pub weight: u32,
    /// What kind of rule this is.
    pub kind: RuleKind,
    /// The outgoing interface, or `None` for `Receive`/`Discard` rules.
    pub via: Option<InterfaceId>,
    /// The ordered, normalized stack operations this rule applies.
    pub ops: Vec<StackOp>,
}

impl Rule {
    /// Build a new rule. `ops` is normalized per [`crate::routing::op::normalize`].
    pub fn new(
        priority: u32,
        weight: u32,
        kind: RuleKind,
        via: Option<InterfaceId>,
        ops: Vec<StackOp>,
    ) -> Self {
        Self { priority, weight, kind, via, ops: crate::routing::op::normalize(ops) }
    }

    /// A plain MPLS-forwarding rule with priority `0` and weight `0`.
    pub fn mpls(via: InterfaceId, ops: Vec<StackOp>) -> Self {
        Self::new(0, 0, RuleKind::Mpls, Some(via), ops)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[prio={} weight={} {:?}", self.priority, self.weight, self.kind)?;
        if let Some(via) = self.via {
            write!(f, " via={}", via)?;
        }
        write!(f, " ops=[")?;
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", op)?;
        }
        write!(f, "]]")
    }
}
