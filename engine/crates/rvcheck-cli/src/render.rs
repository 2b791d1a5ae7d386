// engine/crates/rvcheck-cli/src/render.rs
//! Console rendering of a run report and of the checkpoint legend.

use std::io::{self, Write};

use colored::Colorize;
use rvcheck::report::{EntityDetail, SequenceDetail};
use rvcheck::{Checkpoint, RunReport};

pub fn report(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    let ingest = &report.ingest;
    writeln!(
        out,
        "Baseline {} | tracked type {} | {} files, {} lines, {} trace events",
        report.baseline.name().bold(),
        report.tracked_type,
        ingest.files_read,
        ingest.lines_read,
        ingest.events
    )?;

    if ingest.malformed_records > 0 {
        writeln!(
            out,
            "{} {} malformed trace record(s) skipped",
            "warning:".yellow().bold(),
            ingest.malformed_records
        )?;
        for sample in &ingest.malformed_samples {
            writeln!(out, "  {}:{}: {}", sample.origin, sample.line, sample.error)?;
        }
    }
    if !ingest.unclassified.is_empty() {
        writeln!(
            out,
            "{} {} trace record(s) with unknown checkpoint labels",
            "warning:".yellow().bold(),
            ingest.unclassified_records()
        )?;
        for (label, count) in &ingest.unclassified {
            writeln!(out, "  {label} x{count}")?;
        }
    }
    for flag in &report.policy_flags {
        writeln!(
            out,
            "{} {} collapsed {} repeated version(s) across {} entities",
            "note:".cyan().bold(),
            flag.checkpoint,
            flag.collapsed_repeats,
            flag.entities
        )?;
    }

    if report.inconsistent_count == 0 {
        let line = format!("All {} entities are consistent", report.entities_examined);
        writeln!(out, "{}", line.green())?;
        return Ok(());
    }

    let line = format!(
        "{} out of {} entities have problems",
        report.inconsistent_count, report.entities_examined
    );
    writeln!(out, "{}", line.red().bold())?;
    for verdict in &report.inconsistent {
        writeln!(out, "  {}: {}", verdict.entity, join(&verdict.diverging))?;
    }

    writeln!(out, "Divergence by checkpoint:")?;
    for (checkpoint, count) in &report.divergence_by_checkpoint {
        writeln!(out, "  {:<36} {count}", checkpoint.name())?;
    }

    for detail in &report.details {
        entity_detail(out, detail)?;
    }
    Ok(())
}

fn entity_detail(out: &mut impl Write, detail: &EntityDetail) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", format!("== {}", detail.entity).bold())?;
    sequence(out, "baseline", &detail.baseline)?;
    for candidate in &detail.candidates {
        sequence(out, "candidate", &candidate.sequence)?;
        let comparison = &candidate.comparison;
        if !comparison.only_in_base.is_empty() {
            writeln!(
                out,
                "    {} {}",
                "missing:".red(),
                versions(&comparison.only_in_base)
            )?;
        }
        if !comparison.only_in_candidate.is_empty() {
            writeln!(
                out,
                "    {} {}",
                "extra:".yellow(),
                versions(&comparison.only_in_candidate)
            )?;
        }
    }
    Ok(())
}

fn sequence(out: &mut impl Write, role: &str, sequence: &SequenceDetail) -> io::Result<()> {
    writeln!(
        out,
        "  {role} {} ({}, {} versions): {}",
        sequence.checkpoint,
        sequence.policy,
        sequence.versions.len(),
        versions(&sequence.versions)
    )?;
    for event in sequence.events.iter().flatten() {
        let record = &event.record;
        writeln!(
            out,
            "      {} {:<9} {:>12}  {}",
            record.timestamp, record.event_kind, record.version, record.label
        )?;
    }
    Ok(())
}

pub fn legend(out: &mut impl Write) -> io::Result<()> {
    for checkpoint in Checkpoint::ALL {
        let alias = checkpoint
            .legacy_alias()
            .map(|alias| format!(" (alias {alias})"))
            .unwrap_or_default();
        writeln!(
            out,
            "{}{alias}  [{}, {}]",
            checkpoint.name().bold(),
            checkpoint.source(),
            checkpoint.default_policy()
        )?;
        writeln!(out, "    {}", checkpoint.description())?;
        writeln!(out, "    labels: {}", checkpoint.labels().join(", "))?;
    }
    Ok(())
}

fn versions(versions: &[u64]) -> String {
    if versions.is_empty() {
        return "-".to_string();
    }
    versions
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn join(checkpoints: &[Checkpoint]) -> String {
    checkpoints
        .iter()
        .map(|checkpoint| checkpoint.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_lists_are_space_separated() {
        assert_eq!(versions(&[]), "-");
        assert_eq!(versions(&[4, 6, 6]), "4 6 6");
    }

    #[test]
    fn legend_lists_every_checkpoint() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        legend(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for checkpoint in Checkpoint::ALL {
            assert!(text.contains(checkpoint.name()), "{}", checkpoint.name());
        }
        assert!(text.contains("alias etcd"));
    }
}
