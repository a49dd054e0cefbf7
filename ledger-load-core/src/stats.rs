use crate::{Comparator, Metric, OperationKind, Threshold};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Result of evaluating one [`Threshold`].
#[derive(Debug, Clone, PartialEq)]
pub struct SloVerdict {
    pub threshold: Threshold,
    /// `None` when no samples were recorded, in which case the verdict fails.
    pub observed: Option<f64>,
    pub passed: bool,
}

impl SloVerdict {
    pub fn new(threshold: Threshold, observed: Option<f64>) -> Self {
        let passed = observed.map(|o| threshold.check(o)).unwrap_or(false);
        Self {
            threshold,
            observed,
            passed,
        }
    }

    /// Distance between the observed value and the bound, positive on the passing side.
    pub fn margin(&self) -> Option<f64> {
        let observed = self.observed?;
        let bound = self.threshold.value;
        Some(match self.threshold.comparator {
            Comparator::Lt | Comparator::Le => bound - observed,
            Comparator::Gt | Comparator::Ge => observed - bound,
        })
    }
}

impl fmt::Display for SloVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let (Some(observed), Some(margin)) = (self.observed, self.margin()) else {
            return write!(f, "{status} {}: undefined (no samples)", self.threshold);
        };

        let unit = match self.threshold.metric {
            Metric::LatencyPercentile(_) => "ms",
            Metric::SuccessRate => "",
        };
        let word = if margin >= 0. { "headroom" } else { "missed by" };
        write!(
            f,
            "{status} {}: observed {observed:.4}{unit} ({word} {:.4}{unit})",
            self.threshold,
            margin.abs()
        )
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub issued: u64,
    pub passed: u64,
    pub failed: u64,
}

impl OperationCounts {
    pub fn record(&mut self, check_passed: bool) {
        self.issued += 1;
        if check_passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Final outcome of a load test run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub verdicts: Vec<SloVerdict>,
    pub counts: BTreeMap<OperationKind, OperationCounts>,
    pub samples: u64,
    pub elapsed: Duration,
    pub passed: bool,
}

impl RunReport {
    pub fn failed_thresholds(&self) -> impl Iterator<Item = &SloVerdict> {
        self.verdicts.iter().filter(|v| !v.passed)
    }

    pub fn counts_for(&self, kind: OperationKind) -> OperationCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for verdict in &self.verdicts {
            writeln!(f, "{verdict}")?;
        }
        for (kind, counts) in &self.counts {
            writeln!(
                f,
                "{kind}: {} issued, {} passed, {} failed",
                counts.issued, counts.passed, counts.failed
            )?;
        }

        let failed = self.failed_thresholds().count();
        let elapsed = humantime::format_duration(Duration::from_millis(
            self.elapsed.as_millis() as u64,
        ));
        if self.passed {
            write!(f, "PASSED: {} samples in {elapsed}", self.samples)
        } else {
            write!(
                f,
                "FAILED: {failed} of {} thresholds failed, {} samples in {elapsed}",
                self.verdicts.len(),
                self.samples
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_verdict_fails() {
        let verdict = SloVerdict::new(Threshold::success_rate(Comparator::Gt, 0.99), None);
        assert!(!verdict.passed);
        assert_eq!(verdict.margin(), None);
        assert_eq!(
            verdict.to_string(),
            "FAIL rate > 0.99: undefined (no samples)"
        );
    }

    #[test]
    fn margin_sign_follows_comparator() {
        let latency = Threshold::latency(0.95, Comparator::Lt, Duration::from_millis(200));
        let verdict = SloVerdict::new(latency, Some(250.));
        assert!(!verdict.passed);
        assert_eq!(verdict.margin(), Some(-50.));
        assert!(verdict.to_string().contains("missed by 50.0000ms"));

        let rate = Threshold::success_rate(Comparator::Gt, 0.5);
        let verdict = SloVerdict::new(rate, Some(0.75));
        assert!(verdict.passed);
        assert_eq!(verdict.margin(), Some(0.25));
    }

    #[test]
    fn counts() {
        let mut counts = OperationCounts::default();
        counts.record(true);
        counts.record(false);
        counts.record(true);
        assert_eq!(
            counts,
            OperationCounts {
                issued: 3,
                passed: 2,
                failed: 1
            }
        );
    }
}
