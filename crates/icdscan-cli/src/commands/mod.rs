pub mod egl;
pub mod man_pages;
pub mod report;
pub mod search_paths;
pub mod show_report;
pub mod vulkan;
pub mod write_manifest;

use console::Style;
use icdscan_schema::{Issues, Loadable, LoadableDetails};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_REPORT_ERROR: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;
pub const EXIT_ISSUES_FOUND: u8 = 4;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn colorize_issues(issues: Issues) -> String {
    if issues.is_empty() {
        return Style::new().green().apply_to("ok").to_string();
    }
    let text = issues.to_string();
    if issues.intersects(Issues::CANNOT_LOAD | Issues::UNSUPPORTED) {
        Style::new().red().bold().apply_to(text).to_string()
    } else {
        Style::new().yellow().apply_to(text).to_string()
    }
}

/// Print one list of records as an indented block.
pub fn print_section<D: LoadableDetails>(
    title: &str,
    records: &[Loadable<D>],
    summary: impl Fn(&D) -> String,
) {
    println!("{title} ({}):", records.len());
    if records.is_empty() {
        println!("  (none)");
        return;
    }
    for record in records {
        println!(
            "  {} [{}]",
            record.json_path().display(),
            colorize_issues(record.issues())
        );
        match record.contents() {
            Ok(details) => println!("      {}", summary(details)),
            Err(e) => println!("      error: {e}"),
        }
    }
}

pub fn count_with_issues<D: LoadableDetails>(records: &[Loadable<D>]) -> usize {
    records.iter().filter(|r| !r.issues().is_empty()).count()
}

pub fn exit_code(strict: bool, records_with_issues: usize) -> u8 {
    if strict && records_with_issues > 0 {
        EXIT_ISSUES_FOUND
    } else {
        EXIT_SUCCESS
    }
}
