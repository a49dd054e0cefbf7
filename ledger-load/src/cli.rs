use clap::Parser;
use ledger_load_core::{
    Comparator, MixWeights, OperationKind, RunConfig, Threshold, DEFAULT_CONCURRENCY,
};
use std::num::NonZeroU32;
use std::time::Duration;

/// Drive a ledger API with concurrent virtual users and check latency and success-rate SLOs.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct LedgerLoadCli {
    /// Base URL of the ledger API.
    #[arg(long, env = "LEDGER_LOAD_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Number of concurrent virtual users.
    #[arg(short = 'u', long, env = "LEDGER_LOAD_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY.get())]
    pub concurrency: usize,

    /// Wall-clock duration of the run, e.g. `1h` or `90s`.
    #[arg(short, long, env = "LEDGER_LOAD_DURATION", default_value = "1h", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Quantile checked by the latency threshold.
    #[arg(long, env = "LEDGER_LOAD_LATENCY_QUANTILE", default_value_t = 0.95)]
    pub latency_quantile: f64,

    /// The latency quantile must stay strictly below this.
    #[arg(long, env = "LEDGER_LOAD_LATENCY_MAX", default_value = "200ms", value_parser = humantime::parse_duration)]
    pub latency_max: Duration,

    /// The fraction of passed checks must stay strictly above this.
    #[arg(long, env = "LEDGER_LOAD_MIN_SUCCESS_RATE", default_value_t = 0.99)]
    pub min_success_rate: f64,

    /// Lowest user id drawn by virtual users.
    #[arg(long, env = "LEDGER_LOAD_USER_MIN", default_value_t = 1)]
    pub user_min: u32,

    /// Highest user id drawn by virtual users.
    #[arg(long, env = "LEDGER_LOAD_USER_MAX", default_value_t = 100)]
    pub user_max: u32,

    #[arg(long, env = "LEDGER_LOAD_CHARGE_WEIGHT", default_value_t = 0.60)]
    pub charge_weight: f64,

    #[arg(long, env = "LEDGER_LOAD_BALANCE_WEIGHT", default_value_t = 0.15)]
    pub balance_weight: f64,

    #[arg(long, env = "LEDGER_LOAD_TRANSACTIONS_WEIGHT", default_value_t = 0.15)]
    pub transactions_weight: f64,

    #[arg(long, env = "LEDGER_LOAD_WITHDRAW_WEIGHT", default_value_t = 0.10)]
    pub withdraw_weight: f64,

    /// Per-request timeout.
    #[arg(long, env = "LEDGER_LOAD_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Pause between two requests of the same virtual user.
    #[arg(long, env = "LEDGER_LOAD_PAUSE", default_value = "1s", value_parser = humantime::parse_duration)]
    pub pause: Duration,

    /// Seed for reproducible traffic.
    #[arg(long, env = "LEDGER_LOAD_SEED")]
    pub seed: Option<u64>,

    /// Global cap on requests per second.
    #[arg(long, env = "LEDGER_LOAD_RATE_LIMIT")]
    pub rate_limit: Option<NonZeroU32>,

    /// Interval between streaming statistics log lines.
    #[arg(long, env = "LEDGER_LOAD_REPORT_INTERVAL", default_value = "5s", value_parser = humantime::parse_duration)]
    pub report_interval: Duration,

    /// Skip the `/health` probe before starting.
    #[arg(long, env = "LEDGER_LOAD_NO_PREFLIGHT")]
    pub no_preflight: bool,
}

impl LedgerLoadCli {
    pub fn into_config(self) -> RunConfig {
        let mut config = RunConfig::new(&self.base_url);
        config.concurrency = self.concurrency;
        config.duration = self.duration;
        config.thresholds = vec![
            Threshold::latency(self.latency_quantile, Comparator::Lt, self.latency_max),
            Threshold::success_rate(Comparator::Gt, self.min_success_rate),
        ];
        config.mix = MixWeights::new(vec![
            (OperationKind::Charge, self.charge_weight),
            (OperationKind::GetBalance, self.balance_weight),
            (OperationKind::GetTransactions, self.transactions_weight),
            (OperationKind::Withdraw, self.withdraw_weight),
        ]);
        config.user_pool = self.user_min..=self.user_max;
        config.request_timeout = self.timeout;
        config.pause = self.pause;
        config.seed = self.seed;
        config.rate_limit = self.rate_limit;
        config.report_interval = self.report_interval;
        config.preflight = !self.no_preflight;
        config
    }
}
