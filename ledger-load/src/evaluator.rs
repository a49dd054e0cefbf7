use ledger_load_core::{
    Metric, OperationCounts, OperationKind, RequestSample, RunReport, SloVerdict, Threshold,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregates request samples and judges them against the declared thresholds.
///
/// Percentiles are exact (nearest-rank over every recorded latency).
#[derive(Debug, Clone)]
pub struct SloEvaluator {
    thresholds: Vec<Threshold>,
    latencies: Vec<Duration>,
    sorted: bool,
    counts: BTreeMap<OperationKind, OperationCounts>,
    passed: u64,
}

impl SloEvaluator {
    pub fn new(thresholds: Vec<Threshold>) -> Self {
        Self {
            thresholds,
            latencies: vec![],
            sorted: true,
            counts: BTreeMap::new(),
            passed: 0,
        }
    }

    pub fn ingest(&mut self, samples: &[RequestSample]) {
        for sample in samples {
            self.latencies.push(sample.latency);
            self.counts
                .entry(sample.kind)
                .or_default()
                .record(sample.check_passed);
            if sample.check_passed {
                self.passed += 1;
            }
        }
        if !samples.is_empty() {
            self.sorted = false;
        }
    }

    pub fn count(&self) -> u64 {
        self.latencies.len() as u64
    }

    pub fn success_rate(&self) -> Option<f64> {
        let total = self.count();
        (total > 0).then(|| self.passed as f64 / total as f64)
    }

    pub fn latency_percentile(&mut self, quantile: f64) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        if !self.sorted {
            self.latencies.sort_unstable();
            self.sorted = true;
        }

        let n = self.latencies.len();
        let rank = (quantile * n as f64).ceil() as usize;
        Some(self.latencies[rank.clamp(1, n) - 1])
    }

    fn observe(&mut self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::LatencyPercentile(q) => self
                .latency_percentile(q)
                .map(|d| d.as_secs_f64() * 1_000.),
            Metric::SuccessRate => self.success_rate(),
        }
    }

    /// One verdict per threshold, in declaration order.
    pub fn verdicts(&mut self) -> Vec<SloVerdict> {
        let thresholds = self.thresholds.clone();
        thresholds
            .into_iter()
            .map(|threshold| {
                let observed = self.observe(threshold.metric);
                SloVerdict::new(threshold, observed)
            })
            .collect()
    }

    /// Final report. A run with no samples fails every threshold as undefined.
    pub fn finish(mut self, elapsed: Duration) -> RunReport {
        let verdicts = self.verdicts();
        let passed = self.count() > 0 && verdicts.iter().all(|v| v.passed);
        RunReport {
            verdicts,
            samples: self.count(),
            counts: self.counts,
            elapsed,
            passed,
        }
    }
}
