//! Letter grading of a completed run.
//!
//! A run is summarised by a weighted score of its three simulated metrics,
//! which is then bucketed into a letter grade.

use serde::Serialize;
use std::fmt;

/// Letter grade for a completed run.
///
/// Variants are ordered from worst to best for correct derived Ord behavior.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
pub enum Grade {
    F,
    D,
    C,
    B,
    A,
}

/// Score weights and letter cutoffs.
mod thresholds {
    /// Weight of the download speed (Mbps)
    pub const DOWNLOAD_WEIGHT: f64 = 0.4;
    /// Weight of the upload speed (Mbps)
    pub const UPLOAD_WEIGHT: f64 = 0.3;
    /// Weight of the inverted ping
    pub const PING_WEIGHT: f64 = 0.3;
    /// Ping values above this contribute nothing
    pub const PING_CEILING_MS: f64 = 100.0;

    pub const GRADE_A: f64 = 80.0;
    pub const GRADE_B: f64 = 65.0;
    pub const GRADE_C: f64 = 50.0;
    pub const GRADE_D: f64 = 35.0;
}

impl Grade {
    /// Bucket a performance score into a letter.
    pub fn from_score(score: f64) -> Self {
        use thresholds::*;

        if score >= GRADE_A {
            Grade::A
        } else if score >= GRADE_B {
            Grade::B
        } else if score >= GRADE_C {
            Grade::C
        } else if score >= GRADE_D {
            Grade::D
        } else {
            Grade::F
        }
    }

    /// Grade for a set of final metrics.
    pub fn for_metrics(download_mbps: f64, upload_mbps: f64, ping_ms: f64) -> Self {
        Self::from_score(performance_score(download_mbps, upload_mbps, ping_ms))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    /// Returns a human-readable description of the grade.
    pub fn description(&self) -> &'static str {
        match self {
            Grade::A => "Excellent",
            Grade::B => "Good",
            Grade::C => "Average",
            Grade::D => "Below average",
            Grade::F => "Poor",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted performance score.
///
/// `0.4·download + 0.3·upload + 0.3·(100 − min(ping, 100))`
pub fn performance_score(
    download_mbps: f64,
    upload_mbps: f64,
    ping_ms: f64,
) -> f64 {
    use thresholds::*;

    DOWNLOAD_WEIGHT * download_mbps
        + UPLOAD_WEIGHT * upload_mbps
        + PING_WEIGHT * (PING_CEILING_MS - ping_ms.min(PING_CEILING_MS))
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: the grade is a pure function of its inputs.
        #[test]
        fn grade_is_deterministic(
            download in 0.0f64..100.0,
            upload in 0.0f64..50.0,
            ping in 0.0f64..50.0
        ) {
            prop_assert_eq!(
                Grade::for_metrics(download, upload, ping),
                Grade::for_metrics(download, upload, ping)
            );
        }

        /// Property: a faster download never lowers the grade.
        #[test]
        fn better_download_never_lowers_grade(
            download in 0.0f64..100.0,
            improvement in 0.0f64..100.0,
            upload in 0.0f64..50.0,
            ping in 0.0f64..50.0
        ) {
            let base = Grade::for_metrics(download, upload, ping);
            let better = Grade::for_metrics(download + improvement, upload, ping);
            prop_assert!(better >= base);
        }

        /// Property: a lower ping never lowers the grade.
        #[test]
        fn lower_ping_never_lowers_grade(
            download in 0.0f64..100.0,
            upload in 0.0f64..50.0,
            ping in 0.0f64..200.0,
            reduction in 0.0f64..200.0
        ) {
            let base = Grade::for_metrics(download, upload, ping);
            let better =
                Grade::for_metrics(download, upload, (ping - reduction).max(0.0));
            prop_assert!(better >= base);
        }
    }
}
