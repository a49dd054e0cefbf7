use crate::ConfigError;
use std::fmt;
use std::time::Duration;

/// Aggregate a threshold is evaluated against.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Metric {
    /// Latency at the given quantile, observed in milliseconds.
    LatencyPercentile(f64),
    /// Fraction of samples whose check passed.
    SuccessRate,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparator::Lt => observed < bound,
            Comparator::Le => observed <= bound,
            Comparator::Gt => observed > bound,
            Comparator::Ge => observed >= bound,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

/// A declared pass/fail criterion: `metric comparator value`.
///
/// Latency values are in milliseconds; success rates are fractions in `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub comparator: Comparator,
    pub value: f64,
}

impl Threshold {
    /// # Example
    /// ```
    /// use ledger_load_core::{Comparator, Threshold};
    /// use std::time::Duration;
    ///
    /// let p95 = Threshold::latency(0.95, Comparator::Lt, Duration::from_millis(200));
    /// assert_eq!(p95.to_string(), "p(95) < 200ms");
    /// ```
    pub fn latency(quantile: f64, comparator: Comparator, bound: Duration) -> Self {
        Self {
            metric: Metric::LatencyPercentile(quantile),
            comparator,
            value: bound.as_secs_f64() * 1_000.,
        }
    }

    pub fn success_rate(comparator: Comparator, bound: f64) -> Self {
        Self {
            metric: Metric::SuccessRate,
            comparator,
            value: bound,
        }
    }

    pub fn check(&self, observed: f64) -> bool {
        self.comparator.holds(observed, self.value)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.metric {
            Metric::LatencyPercentile(q) if !(q > 0. && q <= 1.) => {
                Err(ConfigError::InvalidQuantile(q))
            }
            Metric::SuccessRate if !(0. ..=1.).contains(&self.value) => {
                Err(ConfigError::InvalidSuccessRate(self.value))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.comparator.symbol();
        match self.metric {
            Metric::LatencyPercentile(q) => {
                write!(f, "p({}) {op} {}ms", q * 100., self.value)
            }
            Metric::SuccessRate => write!(f, "rate {op} {}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_bound_in_millis() {
        let t = Threshold::latency(0.95, Comparator::Lt, Duration::from_millis(200));
        assert_eq!(t.value, 200.);
        assert!(t.check(199.9));
        assert!(!t.check(200.));
    }

    #[test]
    fn success_rate_display() {
        let t = Threshold::success_rate(Comparator::Gt, 0.99);
        assert_eq!(t.to_string(), "rate > 0.99");
        assert!(t.check(1.0));
        assert!(!t.check(0.99));
    }

    #[test]
    fn rejects_bad_quantile() {
        let t = Threshold::latency(1.5, Comparator::Lt, Duration::from_millis(1));
        assert_eq!(t.validate(), Err(ConfigError::InvalidQuantile(1.5)));
        let t = Threshold::latency(0., Comparator::Lt, Duration::from_millis(1));
        assert!(t.validate().is_err());
    }

    #[test]
    fn rejects_bad_rate() {
        let t = Threshold::success_rate(Comparator::Gt, 1.2);
        assert_eq!(t.validate(), Err(ConfigError::InvalidSuccessRate(1.2)));
    }
}
