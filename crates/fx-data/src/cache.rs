//! Per-instrument series cache backed by one JSON file per instrument.

use fx_core::error::PersistenceError;
use fx_core::types::{Instrument, PricePoint, TimeSeries};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::persist::{read_json, write_json_atomic};

/// In-memory series cache mirrored to `<dir>/<BASE>_<QUOTE>.json`.
///
/// Each file holds a JSON array of `{date, rate}` entries and is rewritten
/// in full on every save.
pub struct SeriesCache {
    cache: HashMap<Instrument, TimeSeries>,
    cache_dir: PathBuf,
}

impl SeriesCache {
    /// Create a new series cache.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache: HashMap::new(),
            cache_dir,
        }
    }

    /// Path of the durable record set for an instrument.
    pub fn file_path(&self, instrument: &Instrument) -> PathBuf {
        self.cache_dir.join(format!("{}.json", instrument.file_stem()))
    }

    /// Get the cached series, if it has been loaded.
    pub fn get(&self, instrument: &Instrument) -> Option<&TimeSeries> {
        self.cache.get(instrument)
    }

    /// Get a mutable handle to the series, creating an empty one if needed.
    pub fn entry(&mut self, instrument: &Instrument) -> &mut TimeSeries {
        self.cache
            .entry(instrument.clone())
            .or_insert_with(|| TimeSeries::new(instrument.clone()))
    }

    /// Read an instrument's file into memory unless already cached.
    ///
    /// A missing file yields an empty series. A read failure is returned
    /// without caching anything; callers decide whether to seed an empty
    /// series with [`SeriesCache::entry`].
    pub fn ensure_loaded(&mut self, instrument: &Instrument) -> Result<&TimeSeries, PersistenceError> {
        if !self.cache.contains_key(instrument) {
            let path = self.file_path(instrument);
            let points: Vec<PricePoint> = read_json(&path)?.unwrap_or_default();
            let series = TimeSeries::from_points(instrument.clone(), points);
            self.cache.insert(instrument.clone(), series);
        }
        Ok(self.entry(instrument))
    }

    /// Persist the cached series, replacing the previous file.
    pub fn save(&self, instrument: &Instrument) -> Result<PathBuf, PersistenceError> {
        let path = self.file_path(instrument);
        let points = self
            .cache
            .get(instrument)
            .map(TimeSeries::points)
            .unwrap_or_default();
        write_json_atomic(&path, &points)?;
        Ok(path)
    }
}
