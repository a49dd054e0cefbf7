use crate::{
    Comparator, ConfigError, OperationKind, Threshold, DEFAULT_CONCURRENCY, DEFAULT_PAUSE,
    DEFAULT_REPORT_INTERVAL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_POOL, MIX_SUM_TOLERANCE,
};
use std::num::NonZeroU32;
use std::ops::RangeInclusive;
use std::time::Duration;
use url::Url;

/// Relative weights of each operation. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct MixWeights {
    pub entries: Vec<(OperationKind, f64)>,
}

impl MixWeights {
    pub fn new(entries: Vec<(OperationKind, f64)>) -> Self {
        Self { entries }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::EmptyMix);
        }

        let mut seen = Vec::with_capacity(self.entries.len());
        for (kind, weight) in &self.entries {
            if !weight.is_finite() || *weight < 0. {
                return Err(ConfigError::InvalidWeight(*kind));
            }
            if seen.contains(kind) {
                return Err(ConfigError::DuplicateOperation(*kind));
            }
            seen.push(*kind);
        }

        let sum: f64 = self.entries.iter().map(|(_, w)| w).sum();
        if (sum - 1.).abs() > MIX_SUM_TOLERANCE {
            return Err(ConfigError::MixDoesNotSumToOne(sum));
        }
        Ok(())
    }
}

impl Default for MixWeights {
    /// 60% charges, 20% reads split evenly between balance and history, 10% withdrawals.
    fn default() -> Self {
        Self::new(vec![
            (OperationKind::Charge, 0.60),
            (OperationKind::GetBalance, 0.15),
            (OperationKind::GetTransactions, 0.15),
            (OperationKind::Withdraw, 0.10),
        ])
    }
}

// TODO: Have a separate builder
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub base_url: String,
    pub concurrency: usize,
    pub duration: Duration,
    pub thresholds: Vec<Threshold>,
    pub mix: MixWeights,
    pub user_pool: RangeInclusive<u32>,
    pub request_timeout: Duration,
    pub pause: Duration,
    /// Fixed seed for reproducible draws. Each virtual user derives its own stream from it.
    pub seed: Option<u64>,
    /// Global cap on requests per second across all virtual users.
    pub rate_limit: Option<NonZeroU32>,
    pub report_interval: Duration,
    /// Probe `GET /health` before starting any virtual user.
    pub preflight: bool,
}

impl RunConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            concurrency: DEFAULT_CONCURRENCY.get(),
            duration: Duration::from_secs(60 * 60),
            thresholds: default_thresholds(),
            mix: MixWeights::default(),
            user_pool: DEFAULT_USER_POOL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pause: DEFAULT_PAUSE,
            seed: None,
            rate_limit: None,
            report_interval: DEFAULT_REPORT_INTERVAL,
            preflight: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        self.mix.validate()?;

        for threshold in &self.thresholds {
            threshold.validate()?;
        }

        if self.user_pool.is_empty() {
            return Err(ConfigError::EmptyUserPool {
                start: *self.user_pool.start(),
                end: *self.user_pool.end(),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.report_interval.is_zero() {
            return Err(ConfigError::ZeroReportInterval);
        }

        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }

        Ok(())
    }
}

/// `p(95) < 200ms` and `rate > 0.99`.
pub fn default_thresholds() -> Vec<Threshold> {
    vec![
        Threshold::latency(0.95, Comparator::Lt, Duration::from_millis(200)),
        Threshold::success_rate(Comparator::Gt, 0.99),
    ]
}
