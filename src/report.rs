use crate::materialize::{RunSummary, WriteOutcome};
use colored::{ColoredString, Colorize};
use std::io::{self, Write};

fn paint_label(outcome: &WriteOutcome) -> ColoredString {
    let label = format!("{:>9}", outcome.label());

    match outcome {
        WriteOutcome::Created => label.green(),
        WriteOutcome::Skipped(_) => label.yellow(),
        WriteOutcome::Overwritten => label.cyan(),
        WriteOutcome::Failed(_) => label.red().bold(),
    }
}

/// Renders an error followed by each of its sources.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

/// Writes one line per file followed by the run totals.
pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
    for report in &summary.files {
        let label = paint_label(&report.outcome);

        let shown = match &report.target {
            Some(target) => target.display().to_string(),
            None => report.path.to_string(),
        };

        match &report.outcome {
            WriteOutcome::Skipped(reason) => {
                writeln!(out, "{} {} {}", label, shown, format!("({})", reason).dimmed())?
            }
            WriteOutcome::Failed(error) => {
                writeln!(out, "{} {}: {}", label, shown, error_chain(error))?
            }
            _ => writeln!(out, "{} {}", label, shown)?,
        }
    }

    writeln!(out)?;
    writeln!(out, "Scaffold complete in: {}", summary.root.display())?;
    writeln!(
        out,
        "Files created: {} | overwritten: {} | skipped (already existed): {} | failed: {}",
        summary.created(),
        summary.overwritten(),
        summary.skipped(),
        summary.failed()
    )?;

    if summary.has_failures() {
        writeln!(
            out,
            "\n{}",
            "Some files could not be written; fix the errors above and re-run.".red()
        )
    } else {
        writeln!(out, "\nNext:\n  docker compose up --build")
    }
}
