use chumon_core::{BatchEvent, BatchReport, QueryState, Rejection, WriteSummary};
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "chumon".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Scrape product pages into an order workbook\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

fn print_detail(label: &str, value: &str) {
    eprintln!("  {} {}", format!("{}:", label).dimmed(), value.bright_white());
}

/// One line per query state transition.
pub fn print_event(event: &BatchEvent<'_>, total: usize) {
    match event.state {
        QueryState::Pending => print_step(event.index + 1, total, &event.query.to_string()),
        QueryState::Routed(site) => print_detail("Site", site.supplier()),
        QueryState::Fetched => print_detail("Page", "fetched"),
        QueryState::Extracted => print_detail("Fields", "extracted"),
        QueryState::Accepted => print_success("accepted"),
        QueryState::Rejected(Rejection::UnknownSite) => print_warning("skipped: unsupported site"),
        QueryState::Rejected(rejection) => print_error(&format!("rejected: {}", rejection)),
    }
}

/// Print batch totals
pub fn print_summary(report: &BatchReport) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Summary".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());
    eprintln!("  {} {}", "Accepted:".dimmed(), report.accepted_count().to_string().bright_green());
    eprintln!("  {} {}", "Rejected:".dimmed(), report.rejected_count().to_string().bright_red());
    if report.skipped > 0 {
        eprintln!("  {} {}", "Not started:".dimmed(), report.skipped.to_string().bright_yellow());
    }
    for (query, rejection) in report.rejections() {
        eprintln!("  {} {} ({})", "✗".red(), query.url(), rejection.dimmed());
    }
    eprintln!();
}

/// Print where the rows went
pub fn print_written(summary: &WriteSummary) {
    let action = if summary.created_file { "Created" } else { "Updated" };
    print_success(&format!(
        "{} {} [{}]: {} rows from row {}",
        action,
        summary.path.display().bright_white(),
        summary.sheet,
        summary.rows_written,
        summary.first_row
    ));
}
