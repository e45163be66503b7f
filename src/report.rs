use anyhow::{Context, Result};
use chrono::Local;

use crate::db::HistoryEntry;

pub const REPORT_FILE_NAME: &str = "crowd_report.csv";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Renders history as CSV in ascending id order.
pub fn export_history_csv(entries: &[HistoryEntry]) -> Result<String> {
    let mut ordered: Vec<&HistoryEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.id);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["ID", "Video", "Total", "Average", "Max", "Duration", "Date"])
        .context("failed to write report header")?;

    for entry in ordered {
        let record = &entry.record;
        let date = record
            .completed_at
            .with_timezone(&Local)
            .format(DATE_FORMAT)
            .to_string();
        writer
            .write_record([
                entry.id.to_string(),
                record.video.clone(),
                record.total.to_string(),
                record.average.to_string(),
                record.peak.to_string(),
                record.duration.to_string(),
                date,
            ])
            .with_context(|| format!("failed to write report row {}", entry.id))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush report: {}", err.error()))?;
    String::from_utf8(bytes).context("report is not valid UTF-8")
}
