//! Daily snapshot journal.

use chrono::NaiveDate;
use fx_core::error::PersistenceError;
use fx_core::types::QuoteSnapshot;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::persist::{read_json, write_json_atomic};

/// Appends published snapshots to one file per UTC day,
/// `<dir>/realtime_YYYYMMDD.json`, holding a JSON array of records.
#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the records for `date`.
    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("realtime_{}.json", date.format("%Y%m%d")))
    }

    /// Append one snapshot to the file for its timestamp's day.
    ///
    /// Returns the number of records now stored for that day.
    pub fn append(&self, snapshot: &QuoteSnapshot) -> Result<usize, PersistenceError> {
        let path = self.day_path(snapshot.timestamp.date_naive());
        let mut records: Vec<QuoteSnapshot> = read_json(&path)?.unwrap_or_default();
        records.push(snapshot.clone());
        write_json_atomic(&path, &records)?;
        debug!(path = %path.display(), records = records.len(), "snapshot journaled");
        Ok(records.len())
    }

    /// All records stored for `date`, oldest first.
    pub fn read_day(&self, date: NaiveDate) -> Result<Vec<QuoteSnapshot>, PersistenceError> {
        Ok(read_json(&self.day_path(date))?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fx_core::types::Instrument;

    fn snapshot(hour: u32, rate: f64) -> QuoteSnapshot {
        let pair: Instrument = "EUR/USD".parse().unwrap();
        QuoteSnapshot::from_rates(
            Utc.with_ymd_and_hms(2024, 6, 10, hour, 0, 0).unwrap(),
            [(pair, rate)],
        )
    }

    #[test]
    fn test_append_accumulates_records_for_the_day() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());

        assert_eq!(journal.append(&snapshot(9, 1.07)).unwrap(), 1);
        assert_eq!(journal.append(&snapshot(10, 1.08)).unwrap(), 2);

        let day = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert!(dir.path().join("realtime_20240610.json").exists());

        let records = journal.read_day(day).unwrap();
        assert_eq!(records, vec![snapshot(9, 1.07), snapshot(10, 1.08)]);
    }

    #[test]
    fn test_record_layout() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        journal.append(&snapshot(9, 1.07)).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("realtime_20240610.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["rates"]["EUR/USD"]["rate"], 1.07);
        assert!(json[0]["timestamp"].is_string());
    }

    #[test]
    fn test_missing_day_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(journal.read_day(day).unwrap().is_empty());
    }
}
