// resfetch/src/cli/report.rs
use std::path::Path;

use colored::Colorize;
use resfetch_core::{FetchReport, Materialized};

/// Prints one line per destination followed by the totals.
pub fn print_report(report: &FetchReport, root: &Path, verbose: bool) {
    if verbose {
        for entry in &report.entries {
            let shown = entry
                .destination
                .strip_prefix(root)
                .unwrap_or(&entry.destination);
            println!("  {} {}", outcome_label(&entry.outcome), shown.display());
        }
    }
    println!("{}{}", "==> ".bold().blue(), summary_line(report).bold());
}

fn outcome_label(outcome: &Materialized) -> colored::ColoredString {
    match outcome {
        Materialized::Present => "present  ".normal(),
        Materialized::AlreadyExtracted => "extracted".normal(),
        Materialized::Linked { .. } => "linked   ".cyan(),
        Materialized::Downloaded { extracted: false } => "fetched  ".green(),
        Materialized::Downloaded { extracted: true } => "unpacked ".green(),
    }
}

pub fn summary_line(report: &FetchReport) -> String {
    format!(
        "{} downloaded ({} extracted), {} linked, {} already present",
        report.downloaded(),
        report.extracted(),
        report.linked(),
        report.present()
    )
}
