//! Recording analysis and cleaning results into a store.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use reclaim_analyze::AnalysisResult;
use reclaim_clean::CleaningResult;

use crate::error::HistoryError;
use crate::record::{CleaningRecord, DailyTrend, HistoryEntry, ScanRecord};
use crate::store::HistoryStore;

/// Turns engine results into history entries and answers history queries.
pub struct AnalysisRecorder<S> {
    store: S,
}

impl<S: HistoryStore> AnalysisRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append a scan record for `result`.
    pub fn record_scan(&mut self, result: &AnalysisResult) -> Result<ScanRecord, HistoryError> {
        let record = ScanRecord::from_analysis(result);
        self.store.append(&HistoryEntry::Scan(record.clone()))?;
        info!(root = %record.root_path.display(), total_size = record.total_size, "recorded scan");
        Ok(record)
    }

    /// Append a cleaning record for `result`.
    pub fn record_cleaning(
        &mut self,
        operation: impl Into<String>,
        result: &CleaningResult,
    ) -> Result<CleaningRecord, HistoryError> {
        let record = CleaningRecord::from_result(operation, result);
        self.store.append(&HistoryEntry::Cleaning(record.clone()))?;
        info!(operation = %record.operation, bytes_freed = record.bytes_freed, "recorded cleaning");
        Ok(record)
    }

    /// Up to `limit` scan records, newest first.
    pub fn scan_history(&self, limit: usize) -> Result<Vec<ScanRecord>, HistoryError> {
        let mut scans: Vec<_> = self
            .store
            .entries()?
            .into_iter()
            .filter_map(|entry| match entry {
                HistoryEntry::Scan(record) => Some(record),
                HistoryEntry::Cleaning(_) => None,
            })
            .collect();
        newest_first(&mut scans, |r| r.timestamp);
        scans.truncate(limit);
        Ok(scans)
    }

    /// Up to `limit` cleaning records, newest first.
    pub fn cleaning_history(&self, limit: usize) -> Result<Vec<CleaningRecord>, HistoryError> {
        let mut cleanings: Vec<_> = self
            .store
            .entries()?
            .into_iter()
            .filter_map(|entry| match entry {
                HistoryEntry::Cleaning(record) => Some(record),
                HistoryEntry::Scan(_) => None,
            })
            .collect();
        newest_first(&mut cleanings, |r| r.timestamp);
        cleanings.truncate(limit);
        Ok(cleanings)
    }

    /// Bytes freed by every recorded cleaning.
    pub fn total_freed(&self) -> Result<u64, HistoryError> {
        Ok(self
            .store
            .entries()?
            .iter()
            .map(|entry| match entry {
                HistoryEntry::Cleaning(record) => record.bytes_freed,
                HistoryEntry::Scan(_) => 0,
            })
            .sum())
    }

    /// Average scanned size per UTC day, oldest day first.
    pub fn trends(&self) -> Result<Vec<DailyTrend>, HistoryError> {
        let mut days: BTreeMap<NaiveDate, (u128, usize)> = BTreeMap::new();
        for entry in self.store.entries()? {
            if let HistoryEntry::Scan(record) = entry {
                let day = days.entry(record.timestamp.date_naive()).or_default();
                day.0 += u128::from(record.total_size);
                day.1 += 1;
            }
        }

        Ok(days
            .into_iter()
            .map(|(day, (sum, scans))| DailyTrend {
                day,
                average_size: u64::try_from(sum / scans as u128).unwrap_or(u64::MAX),
                scans,
            })
            .collect())
    }

    /// Remove all history.
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.store.clear()
    }
}

/// Sort descending by timestamp; equal timestamps keep the later-appended entry first.
fn newest_first<T, K: Ord>(records: &mut [T], key: impl Fn(&T) -> K) {
    records.reverse();
    records.sort_by(|a, b| key(b).cmp(&key(a)));
}
