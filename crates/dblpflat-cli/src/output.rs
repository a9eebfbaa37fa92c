use std::io::Write;

use dblpflat_core::{Extraction, WalkOutcome, WalkStats};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn heading(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", title.bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", sep)?;
    }
    Ok(())
}

/// Print the summary of one finished extraction pass.
pub fn print_pass_summary(
    w: &mut dyn Write,
    table_name: &str,
    extraction: &Extraction,
    written: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    let stats = &extraction.stats;

    heading(w, &format!("TABLE {table_name}"), color)?;
    writeln!(w, "  Records seen: {}", stats.elements_seen)?;
    writeln!(w, "  Rows extracted: {}", stats.rows)?;
    writeln!(w, "  Rows written: {}", written)?;

    if color.enabled() {
        writeln!(w, "  {} {}", "Complete:".green(), stats.full)?;
        writeln!(w, "  {} {}", "Partial:".yellow(), stats.partial)?;
    } else {
        writeln!(w, "  Complete: {}", stats.full)?;
        writeln!(w, "  Partial: {}", stats.partial)?;
    }

    if stats.missing_keys > 0 {
        let msg = format!("Records without a key: {}", stats.missing_keys);
        if color.enabled() {
            writeln!(w, "  {}", msg.red())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    if extraction.outcome == WalkOutcome::Stopped {
        let msg = "Stopped early at the configured record limit";
        if color.enabled() {
            writeln!(w, "  {}", msg.yellow())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }

    writeln!(w)?;
    writeln!(w, "  Values per column:")?;
    let width = stats
        .column_counts
        .iter()
        .map(|(c, _)| c.name().len())
        .max()
        .unwrap_or(0);
    for (column, count) in &stats.column_counts {
        let line = format!("{:<width$}  {}", column.name(), count);
        if color.enabled() && *count == 0 {
            writeln!(w, "    {}", line.dimmed())?;
        } else {
            writeln!(w, "    {}", line)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print the result of a validation-only walk.
pub fn print_validation_summary(
    w: &mut dyn Write,
    path: &str,
    records: u64,
    stats: &WalkStats,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, "VALID", color)?;
    if color.enabled() {
        writeln!(w, "  {} {}", "Document:".green(), path)?;
    } else {
        writeln!(w, "  Document: {}", path)?;
    }
    writeln!(w, "  Records: {}", records)?;
    writeln!(w, "  Elements: {}", stats.elements)?;
    let msg = format!(
        "Peak live nodes: {}, peak depth: {}",
        stats.peak_live_nodes, stats.peak_depth
    );
    if color.enabled() {
        writeln!(w, "  {}", msg.dimmed())?;
    } else {
        writeln!(w, "  {}", msg)?;
    }
    writeln!(w)?;
    Ok(())
}
