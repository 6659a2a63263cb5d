//! # Moped bridge
//!
//! Writes a [`Pds`] out in Moped's textual pushdown-system rule format
//! (`S<from><label> --> S<to><op>`), for offline cross-checking against the external Moped
//! solver.
//!
//! This crate never shells out to Moped itself (spawning an external process and parsing its
//! stdout is out of scope) — [`dump`] is a pure writer a caller can run Moped against by hand.

use crate::label::Label;
use crate::pds::{Op, Pds, Pre};
use std::io::{self, Write};
use std::path::Path;

fn write_op(out: &mut impl Write, op: Op) -> io::Result<()> {
    match op {
        Op::Pop => Ok(()),
        Op::Noop => Ok(()),
        Op::Swap(l) => write!(out, "{}", l),
        Op::Push(l) => write!(out, "{} _", l),
    }
}

fn control_state(out: &mut impl Write, state: usize) -> io::Result<()> {
    write!(out, "S{}", state)
}

/// Write `pds` in Moped's rule format to `path`, truncating any existing file.
pub fn dump(pds: &Pds, path: impl AsRef<Path>) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    dump_to(pds, &mut file)
}

/// Write `pds` in Moped's rule format to an arbitrary writer (used by [`dump`] and directly by
/// tests that want to inspect the text without touching the filesystem).
pub fn dump_to(pds: &Pds, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "(I<_>)")?;
    for &p in pds.initial() {
        write!(out, "I<_> --> ")?;
        control_state(out, p)?;
        writeln!(out, "<_>")?;
    }
    let universe: Vec<Label> = pds
        .labels_in_ops()
        .into_iter()
        .chain(pds.rules().iter().flat_map(|r| match &r.pre {
            Pre::Labels(ls) => ls.clone(),
            Pre::Wildcard => vec![],
        }))
        .collect();

    for rule in pds.rules() {
        let labels: Vec<Label> = match &rule.pre {
            Pre::Labels(ls) => ls.clone(),
            Pre::Wildcard => universe.clone(),
        };
        for l in labels {
            control_state(out, rule.from)?;
            write!(out, "<{}> --> ", l)?;
            control_state(out, rule.to)?;
            write!(out, "<")?;
            write_op(out, rule.op)?;
            writeln!(out, ">")?;
        }
    }
    for &p in pds.accepting() {
        control_state(out, p)?;
        writeln!(out, "<_> --> DONE<_>")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;

    #[test]
    fn dump_to_emits_one_line_per_concrete_rule() {
        let mut pds = Pds::new(2);
        pds.mark_initial(0);
        pds.mark_accepting(1);
        pds.add_rule(0, Pre::Labels(vec![Label::mpls(1)]), 1, Op::Pop).unwrap();

        let mut buf = Vec::new();
        dump_to(&pds, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("S0<l1> --> S1<>"));
        assert!(text.contains("S1<_> --> DONE<_>"));
    }
}
