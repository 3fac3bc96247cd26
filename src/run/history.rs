//! In-memory history of completed runs.
//!
//! History is ordered newest first and never holds more than
//! [`HISTORY_CAPACITY`] entries; the oldest entry is evicted first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::grade::Grade;
use crate::stats::{mean_f64, median_f64};

/// Maximum number of results kept.
pub const HISTORY_CAPACITY: usize = 5;

/// Summary of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    /// Unique, time-derived identifier
    pub id: String,
    /// When the run completed
    pub timestamp: DateTime<Utc>,
    /// Final download speed in Mbps
    pub download_speed: f64,
    /// Final upload speed in Mbps
    pub upload_speed: f64,
    /// Final ping in milliseconds
    pub ping: f64,
    /// Letter grade for the final metrics
    pub grade: Grade,
}

impl TestResult {
    pub fn new(
        id: String,
        timestamp: DateTime<Utc>,
        download_speed: f64,
        upload_speed: f64,
        ping: f64,
        grade: Grade,
    ) -> Self {
        Self { id, timestamp, download_speed, upload_speed, ping, grade }
    }
}

/// Hands out time-derived result ids that never repeat.
///
/// Ids are epoch milliseconds; a second id in the same millisecond (or a
/// clock that stepped backwards) is bumped past the previous one.
#[derive(Debug, Default)]
pub struct ResultIdGenerator {
    last: Option<i64>,
}

impl ResultIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, timestamp: DateTime<Utc>) -> String {
        let millis = timestamp.timestamp_millis();
        let id = match self.last {
            Some(last) if millis <= last => last + 1,
            _ => millis,
        };
        self.last = Some(id);
        id.to_string()
    }
}

/// Aggregate view over the stored results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub runs: usize,
    pub mean_download_mbps: f64,
    pub mean_upload_mbps: f64,
    pub median_ping_ms: f64,
    pub best_grade: Grade,
}

/// Newest-first, bounded list of completed runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultHistory {
    entries: Vec<TestResult>,
}

impl ResultHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new history with `result` prepended and the oldest entries
    /// evicted past [`HISTORY_CAPACITY`]. `self` is left untouched.
    pub fn appended(&self, result: TestResult) -> ResultHistory {
        let entries = std::iter::once(result)
            .chain(self.entries.iter().cloned())
            .take(HISTORY_CAPACITY)
            .collect();

        ResultHistory { entries }
    }

    /// In-place form of [`appended`](Self::appended).
    pub fn push(&mut self, result: TestResult) {
        *self = self.appended(result);
    }

    pub fn entries(&self) -> &[TestResult] {
        &self.entries
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&TestResult> {
        self.entries.first()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Averages over the stored runs, or `None` when empty.
    pub fn summary(&self) -> Option<HistorySummary> {
        let downloads: Vec<f64> =
            self.entries.iter().map(|r| r.download_speed).collect();
        let uploads: Vec<f64> =
            self.entries.iter().map(|r| r.upload_speed).collect();
        let mut pings: Vec<f64> = self.entries.iter().map(|r| r.ping).collect();

        Some(HistorySummary {
            runs: self.entries.len(),
            mean_download_mbps: mean_f64(&downloads)?,
            mean_upload_mbps: mean_f64(&uploads)?,
            median_ping_ms: median_f64(&mut pings)?,
            best_grade: self.entries.iter().map(|r| r.grade).max()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn result(id: u32, grade: Grade) -> TestResult {
        TestResult::new(
            id.to_string(),
            Utc.timestamp_millis_opt(1_700_000_000_000 + id as i64).unwrap(),
            50.0 + id as f64,
            20.0 + id as f64,
            10.0 + id as f64,
            grade,
        )
    }

    #[test]
    fn test_appended_is_newest_first() {
        let history = ResultHistory::new()
            .appended(result(1, Grade::C))
            .appended(result(2, Grade::B));

        let ids: Vec<&str> =
            history.entries().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_appended_does_not_mutate_original() {
        let original = ResultHistory::new().appended(result(1, Grade::C));
        let _next = original.appended(result(2, Grade::A));

        assert_eq!(original.len(), 1);
        assert_eq!(original.latest().map(|r| r.id.as_str()), Some("1"));
    }

    #[test]
    fn test_sixth_result_evicts_oldest() {
        let mut history = ResultHistory::new();
        for id in 1..=6 {
            history.push(result(id, Grade::C));
        }

        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.latest().map(|r| r.id.as_str()), Some("6"));
        assert!(history.entries().iter().all(|r| r.id != "1"));
    }

    #[test]
    fn test_summary_empty() {
        assert_eq!(ResultHistory::new().summary(), None);
    }

    #[test]
    fn test_summary_values() {
        let mut history = ResultHistory::new();
        history.push(result(0, Grade::D));
        history.push(result(2, Grade::B));

        let summary = history.summary().unwrap();
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.mean_download_mbps, 51.0);
        assert_eq!(summary.mean_upload_mbps, 21.0);
        assert_eq!(summary.median_ping_ms, 11.0);
        assert_eq!(summary.best_grade, Grade::B);
    }

    #[test]
    fn test_id_generator_bumps_same_millisecond() {
        let mut ids = ResultIdGenerator::new();
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let first = ids.next_id(now);
        let second = ids.next_id(now);

        assert_eq!(first, "1700000000000");
        assert_eq!(second, "1700000000001");
    }

    #[test]
    fn test_id_generator_survives_clock_step_back() {
        let mut ids = ResultIdGenerator::new();
        let later = Utc.timestamp_millis_opt(1_700_000_000_500).unwrap();
        let earlier = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let first = ids.next_id(later);
        let second = ids.next_id(earlier);

        assert_ne!(first, second);
        assert_eq!(second, "1700000000501");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: history never exceeds capacity, and after N appends
        /// it holds the last min(N, 5) results, newest first.
        #[test]
        fn history_is_bounded_and_ordered(count in 0u32..20) {
            let mut history = ResultHistory::new();
            for id in 0..count {
                history = history.appended(result(id, Grade::C));
            }

            prop_assert!(history.len() <= HISTORY_CAPACITY);
            prop_assert_eq!(history.len(), (count as usize).min(HISTORY_CAPACITY));

            let expected: Vec<String> = (0..count)
                .rev()
                .take(HISTORY_CAPACITY)
                .map(|id| id.to_string())
                .collect();
            let actual: Vec<String> =
                history.entries().iter().map(|r| r.id.clone()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
