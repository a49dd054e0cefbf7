use ledger_load_core::RequestSample;
use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Throughput, success rate and approximate latency quantiles over one reporting interval.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub tps: f64,
    /// `None` when the interval saw no completed request.
    pub success_rate: Option<f64>,
    pub elapsed: Duration,
    pub count: u64,
    latency: TDigest<K1>,
}

impl Measurement {
    pub fn new(passed: u64, failed: u64, elapsed: Duration) -> Self {
        let count = passed + failed;
        let tps = if elapsed.is_zero() {
            0.
        } else {
            count as f64 / elapsed.as_secs_f64()
        };
        let success_rate = (count > 0).then(|| passed as f64 / count as f64);
        Self {
            tps,
            success_rate,
            elapsed,
            count,
            latency: default_tdigest(),
        }
    }

    pub fn from_samples(samples: &[RequestSample], elapsed: Duration) -> Self {
        let passed = samples.iter().filter(|s| s.check_passed).count() as u64;
        let failed = samples.len() as u64 - passed;
        let mut measurement = Self::new(passed, failed, elapsed);
        for sample in samples {
            measurement.latency.insert(sample.latency.as_secs_f64());
        }
        measurement
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }

        let secs = self.latency.quantile(quantile);

        // TDigest occasionally yields NaN on tiny inputs.
        let secs = if secs.is_finite() && secs >= 0. {
            secs
        } else {
            error!("Non-finite latency estimate for quantile {quantile}.");
            0.
        };

        Duration::from_secs_f64(secs)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(success_rate) = self.success_rate else {
            return write!(f, "TPS=0.00, no completed requests");
        };
        write!(
            f,
            "TPS={:.2}, SuccessRate={:.4}, p50={:?}, p90={:?}, p99={:?}",
            self.tps,
            success_rate,
            self.latency(0.5),
            self.latency(0.90),
            self.latency(0.99),
        )
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_load_core::OperationKind;
    use std::time::SystemTime;

    fn sample(latency_ms: u64, status: u16) -> RequestSample {
        RequestSample::new(
            OperationKind::GetBalance,
            SystemTime::now(),
            Duration::from_millis(latency_ms),
            Some(status),
        )
    }

    #[test]
    fn rates() {
        let samples: Vec<_> = (0..10)
            .map(|i| sample(10, if i < 9 { 200 } else { 500 }))
            .collect();
        let m = Measurement::from_samples(&samples, Duration::from_secs(2));
        assert_eq!(m.count, 10);
        assert_eq!(m.tps, 5.);
        assert_eq!(m.success_rate, Some(0.9));
    }

    #[test]
    fn constant_latency() {
        let samples: Vec<_> = (0..200).map(|_| sample(50, 200)).collect();
        let m = Measurement::from_samples(&samples, Duration::from_secs(1));
        let p90 = m.latency(0.9).as_secs_f64();
        assert!((p90 - 0.05).abs() < 0.001, "{p90}");
    }

    #[test]
    fn empty_interval() {
        let m = Measurement::from_samples(&[], Duration::from_secs(5));
        assert_eq!(m.success_rate, None);
        assert_eq!(m.latency(0.99), Duration::ZERO);
        assert_eq!(m.to_string(), "TPS=0.00, no completed requests");
    }
}
