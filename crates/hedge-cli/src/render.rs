//! Report rendering for the terminal

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use hedge_pipeline::{EntryStatus, Report};

/// Pretty-printed JSON, in the caller-facing report shape
pub fn json(report: &Report) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&report.summary())?)
}

/// One row per symbol in portfolio order, followed by the overall status
pub fn table(report: &Report) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Symbol", "Status", "Attempts", "Detail"]);

    for entry in report.summary().results {
        let (status, detail) = match entry.status {
            EntryStatus::Ok => ("ok", entry.payload.unwrap_or_else(|| "(no payload)".to_string())),
            EntryStatus::Error => (
                "error",
                format!(
                    "{}: {}",
                    entry.error_kind.map_or("Unknown", |k| k.as_str()),
                    entry.error_message.unwrap_or_default()
                ),
            ),
        };
        let attempts = entry.attempts.map_or_else(String::new, |a| a.to_string());
        table.add_row(vec![entry.symbol.to_string(), status.to_string(), attempts, detail]);
    }

    format!(
        "{table}\nOverall: {} ({} succeeded, {} failed)",
        report.overall_status(),
        report.succeeded(),
        report.failed()
    )
}
