use ledger_load_core::ConfigError;
use thiserror::Error;

/// Errors which abort a run before or while starting virtual users.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("target {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build the HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("failed to seed a random generator: {0}")]
    RandomSource(#[from] rand::Error),
}

/// Failure to build a single request. The iteration is skipped, the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("idempotency token counter exhausted")]
    TokensExhausted,

    #[error("release timestamp is out of the representable range")]
    ReleaseOutOfRange,
}
