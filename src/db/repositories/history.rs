use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u64},
    models::{HistoryEntry, HistoryRecord},
};

fn row_to_entry(row: &Row) -> Result<HistoryEntry> {
    let total: i64 = row.get("total")?;
    let max_count: i64 = row.get("max_count")?;
    let duration: i64 = row.get("duration")?;
    let date: String = row.get("date")?;

    Ok(HistoryEntry {
        id: row.get("id")?,
        record: HistoryRecord {
            session_id: row.get("session_id")?,
            video: row.get("video")?,
            total: to_u64(total, "total")?,
            average: row.get("average")?,
            peak: to_u64(max_count, "max_count")?,
            duration: to_u64(duration, "duration")?,
            completed_at: parse_datetime(&date, "date")?,
        },
    })
}

impl Database {
    pub async fn append_history(&self, record: &HistoryRecord) -> Result<i64> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO history (session_id, video, total, average, max_count, duration, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.session_id,
                    record.video,
                    to_i64(record.total)?,
                    record.average,
                    to_i64(record.peak)?,
                    to_i64(record.duration)?,
                    record.completed_at.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Most recent first.
    pub async fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, video, total, average, max_count, duration, date
                 FROM history
                 ORDER BY id DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }
}
