//! # Routing tables
//!
//! A [`RoutingTable`] is the per-interface forwarding table: an ordered sequence of
//! [`Entry`] values keyed on top-label, each holding a priority-ranked list of [`Rule`]s.

pub mod entry;
pub mod op;
pub mod rule;

pub use entry::Entry;
pub use op::StackOp;
pub use rule::{Rule, RuleKind};

use crate::label::Label;
use crate::topology::InterfaceId;
use thiserror::Error;

/// Errors raised by routing-table operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoutingError {
    /// `simple_merge` refused because the same priority class already owns a distinct rule.
    #[error("simple_merge refused: priority class {0} already owns a conflicting rule")]
    ConflictingPriorityClass(u32),
    /// No entry exists for the requested top-label.
    #[error("no entry for top-label {0}")]
    NoSuchEntry(Label),
}

/// A non-determinism warning: two rules share `(top_label, priority, outgoing)` but disagree on
/// `ops`. Non-fatal — surfaced to a warnings sink.
#[derive(Debug, Clone, PartialEq)]
pub struct NonDeterminismWarning {
    /// The top-label the conflicting entries are keyed on.
    pub top_label: Label,
    /// The shared failover priority.
    pub priority: u32,
    /// The shared outgoing interface.
    pub via: Option<InterfaceId>,
    /// Free-text context identifying where the conflict was found (e.g. `"R0:eth0"`).
    pub context: String,
}

impl std::fmt::Display for NonDeterminismWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Overlap on label {} at priority {} via {:?} ({})",
            self.top_label, self.priority, self.via, self.context
        )
    }
}

/// An ordered sequence of [`Entry`] values, kept sorted by top-label with the default entry (if
/// present) last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    entries: Vec<Entry>,
}

impl RoutingTable {
    /// An empty routing table.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// All entries, in sorted order (default entry last, if present).
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// All entries, mutably. Used by [`crate::topology::Network::merge_into`] to rewrite
    /// migrated `via` references; callers must preserve sort order themselves.
    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Look up the entry matching `label`, preferring an exact/overlapping specific entry and
    /// falling back to the default entry.
    pub fn lookup(&self, label: Label) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| !e.is_default() && e.top_label().overlaps(&label))
            .or_else(|| self.entries.iter().find(|e| e.is_default()))
    }

    /// Insert (idempotently) an entry keyed on `top_label`, keeping entries sorted. Returns the
    /// entry's current index; note that further inserts may shift it.
    pub fn insert_entry(&mut self, top_label: Label) -> usize {
        if let Some(idx) = self.entries.iter().position(|e| !e.is_default() && e.top_label() == top_label)
        {
            return idx;
        }
        self.entries.push(Entry::new(top_label));
        self.sort();
        self.entries.iter().position(|e| !e.is_default() && e.top_label() == top_label).unwrap()
    }

    /// Insert (idempotently) the default / ignores-label entry. Returns its index.
    pub fn insert_default_entry(&mut self) -> usize {
        if let Some(idx) = self.entries.iter().position(|e| e.is_default()) {
            return idx;
        }
        self.entries.push(Entry::default_entry());
        self.sort();
        self.entries.iter().position(|e| e.is_default()).unwrap()
    }

    /// Append `rule` to the entry keyed on `top_label`, creating the entry if needed. Preserves
    /// input order within the entry's rule list.
    pub fn add_rule(&mut self, top_label: Label, rule: Rule) {
        let idx = self.insert_entry(top_label);
        self.entries[idx].add_rule(rule);
    }

    /// For every rule currently using `failed` as its outgoing interface, append a new rule
    /// using `backup` whose priority is one greater and whose ops end with `PUSH(relabel)`.
    pub fn add_failover_entries(&mut self, failed: InterfaceId, backup: InterfaceId, relabel: Label) {
        for entry in self.entries.iter_mut() {
            let mut new_rules = Vec::new();
            for rule in entry.rules() {
                if rule.via == Some(failed) {
                    let mut ops = rule.ops.clone();
                    op::push_op(&mut ops, StackOp::Push(relabel));
                    new_rules.push(Rule::new(rule.priority + 1, rule.weight, rule.kind, Some(backup), ops));
                }
            }
            for rule in new_rules {
                entry.add_rule(rule);
            }
        }
    }

    /// Append `op` to every rule (in every entry) whose outgoing interface equals `outgoing`,
    /// honoring the normalization law.
    pub fn add_to_outgoing(&mut self, outgoing: InterfaceId, op: StackOp) {
        for entry in self.entries.iter_mut() {
            entry.add_to_outgoing(outgoing, op);
        }
    }

    /// Sorted merge by top-label. For shared keys, concatenate rule lists rather than rejecting
    /// the merge. Non-determinism introduced by the merge is reported into `warnings` rather
    /// than raised as an error.
    pub fn merge(&mut self, other: &RoutingTable, context: &str, warnings: &mut Vec<NonDeterminismWarning>) {
        for entry in other.entries.iter() {
            if entry.is_default() {
                let idx = self.insert_default_entry();
                for rule in entry.rules() {
                    self.entries[idx].add_rule(rule.clone());
                }
            } else {
                let idx = self.insert_entry(entry.top_label());
                for rule in entry.rules() {
                    self.entries[idx].add_rule(rule.clone());
                }
            }
        }
        self.sort();
        for w in self.check_nondet() {
            let w = NonDeterminismWarning { context: context.to_string(), ..w };
            log::warn!("{}", w);
            warnings.push(w);
        }
    }

    /// No-warning variant of [`RoutingTable::merge`] used by automatic reroute synthesis:
    /// rejects the merge if the same priority class already owns a distinct rule.
    pub fn simple_merge(&mut self, other: &RoutingTable) -> Result<(), RoutingError> {
        for entry in other.entries.iter() {
            let idx = if entry.is_default() {
                self.insert_default_entry()
            } else {
                self.insert_entry(entry.top_label())
            };
            for rule in entry.rules() {
                if let Some(existing) = self.entries[idx]
                    .rules()
                    .iter()
                    .find(|r| r.priority == rule.priority && r.via == rule.via)
                {
                    if existing.ops != rule.ops {
                        return Err(RoutingError::ConflictingPriorityClass(rule.priority));
                    }
                    continue;
                }
                self.entries[idx].add_rule(rule.clone());
            }
        }
        self.sort();
        Ok(())
    }

    /// Sort entries by top-label, with the default entry (if present) forced last.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| match (a.is_default(), b.is_default()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => a.top_label().compare(&b.top_label()),
        });
    }

    /// Scan adjacent entries sharing the same top-label for non-determinism. Entries are kept
    /// merged by [`RoutingTable::merge`], so in practice this also doubles as a consistency
    /// check after hand-built tables (e.g. in tests).
    pub fn check_nondet(&self) -> Vec<NonDeterminismWarning> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            let mut j = i + 1;
            while j < self.entries.len()
                && !self.entries[i].is_default()
                && !self.entries[j].is_default()
                && self.entries[i].top_label() == self.entries[j].top_label()
            {
                j += 1;
            }
            // entries[i..j] all share the same top-label (or is a lone entry); check pairwise
            // within each entry and, degenerate as it is once merge() always folds same-key
            // entries into one, across the group too.
            for entry in &self.entries[i..j] {
                for (a, b) in entry.nondeterministic_pairs() {
                    let ra = &entry.rules()[a];
                    out.push(NonDeterminismWarning {
                        top_label: entry.top_label(),
                        priority: ra.priority,
                        via: ra.via,
                        context: String::new(),
                    });
                }
            }
            i = j;
        }
        out
    }

    /// Whether this table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;

    fn l(v: u64) -> Label {
        Label::mpls(v)
    }

    #[test]
    fn insert_entry_keeps_sorted_order_with_default_last() {
        let mut t = RoutingTable::new();
        t.insert_entry(l(5));
        t.insert_entry(l(1));
        t.insert_default_entry();
        t.insert_entry(l(3));
        let labels: Vec<_> =
            t.entries().iter().map(|e| if e.is_default() { None } else { Some(e.top_label()) }).collect();
        assert_eq!(labels, vec![Some(l(1)), Some(l(3)), Some(l(5)), None]);
    }

    #[test]
    fn add_failover_entries_bumps_priority_and_pushes_label() {
        let mut t = RoutingTable::new();
        t.add_rule(l(1), Rule::mpls(0, vec![StackOp::Swap(l(1))]));
        t.add_failover_entries(0, 1, l(42));
        let entry = t.lookup(l(1)).unwrap();
        assert_eq!(entry.rules().len(), 2);
        let backup = &entry.rules()[1];
        assert_eq!(backup.priority, 1);
        assert_eq!(backup.via, Some(1));
        assert_eq!(backup.ops.last(), Some(&StackOp::Push(l(42))));
    }

    #[test]
    fn merge_concatenates_and_warns_on_conflict() {
        let mut a = RoutingTable::new();
        a.add_rule(l(1), Rule::mpls(0, vec![StackOp::Swap(l(2))]));
        let mut b = RoutingTable::new();
        b.add_rule(l(1), Rule::mpls(0, vec![StackOp::Pop]));
        let mut warnings = Vec::new();
        a.merge(&b, "R0:eth0", &mut warnings);
        assert_eq!(a.lookup(l(1)).unwrap().rules().len(), 2);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn simple_merge_rejects_conflicting_priority_class() {
        let mut a = RoutingTable::new();
        a.add_rule(l(1), Rule::mpls(0, vec![StackOp::Swap(l(2))]));
        let mut b = RoutingTable::new();
        b.add_rule(l(1), Rule::mpls(0, vec![StackOp::Pop]));
        assert!(a.simple_merge(&b).is_err());
    }
}
