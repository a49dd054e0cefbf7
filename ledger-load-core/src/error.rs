use thiserror::Error;

/// Invalid run configuration. Always fatal, raised before any virtual user starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("operation mix is empty")]
    EmptyMix,

    #[error("operation mix weight for {0} is negative or not finite")]
    InvalidWeight(crate::OperationKind),

    #[error("operation mix weights sum to {0}, expected 1.0")]
    MixDoesNotSumToOne(f64),

    #[error("operation {0} appears more than once in the mix")]
    DuplicateOperation(crate::OperationKind),

    #[error("latency quantile {0} is outside (0, 1]")]
    InvalidQuantile(f64),

    #[error("success rate bound {0} is outside [0, 1]")]
    InvalidSuccessRate(f64),

    #[error("user identity pool {start}..={end} is empty")]
    EmptyUserPool { start: u32, end: u32 },

    #[error("request timeout must be non-zero")]
    ZeroTimeout,

    #[error("report interval must be non-zero")]
    ZeroReportInterval,

    #[error("invalid base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
