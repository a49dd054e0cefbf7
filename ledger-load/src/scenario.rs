//! Load test driver: a fixed pool of virtual users for a fixed wall-clock duration.
use crate::client::LedgerClient;
use crate::error::RunError;
use crate::evaluator::SloEvaluator;
use crate::measurement::Measurement;
use crate::mix::MixPolicy;
use crate::payload::PayloadBuilder;
use crate::runner::{RunClock, StopHandle, VirtualUser};
use crate::timer::Timer;
use crate::token::TokenGenerator;
use crate::transaction::{Recorder, RUN_HOOK};
use ledger_load_core::{MixWeights, RunConfig, RunReport, Threshold};
use rand::rngs::{OsRng, SmallRng};
use rand::SeedableRng;
use std::{
    future::Future,
    num::NonZeroU32,
    ops::RangeInclusive,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::task::JoinSet;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, info_span, instrument, trace, warn, Instrument};

/// Durations beyond this are clamped.
const MAX_RUN_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

type RunFuture = Pin<Box<dyn Future<Output = Result<RunReport, RunError>> + Send>>;

/// A configured load test against a ledger API. Awaiting it runs the test.
///
/// # Example
/// ```no_run
/// use ledger_load::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let report = LoadTest::new("http://localhost:8080")
///         .concurrency(100)
///         .duration(Duration::from_secs(60 * 60))
///         .await
///         .unwrap();
///
///     println!("{report}");
/// }
/// ```
pub struct LoadTest {
    config: RunConfig,
    stop: StopHandle,
    runner_fut: Option<RunFuture>,
}

impl LoadTest {
    pub fn new(base_url: &str) -> Self {
        Self::from_config(RunConfig::new(base_url))
    }

    pub fn from_config(config: RunConfig) -> Self {
        Self {
            config,
            stop: StopHandle::default(),
            runner_fut: None,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Handle for ending the run early; virtual users finish their current request first.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

impl Future for LoadTest {
    type Output = Result<RunReport, RunError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let config = self.config.clone();
            let stop = self.stop.clone();
            self.runner_fut = Some(Box::pin(run_load_test(config, stop)));
        }

        match &mut self.runner_fut {
            Some(runner) => runner.as_mut().poll(cx),
            None => unreachable!(),
        }
    }
}

pub trait ConfigurableLoadTest: Future + Sized + Send {
    fn concurrency(self, concurrency: usize) -> Self;
    fn duration(self, duration: Duration) -> Self;
    fn threshold(self, threshold: Threshold) -> Self;
    fn thresholds(self, thresholds: Vec<Threshold>) -> Self;
    fn mix(self, mix: MixWeights) -> Self;
    fn user_pool(self, pool: RangeInclusive<u32>) -> Self;
    fn request_timeout(self, timeout: Duration) -> Self;
    fn pause(self, pause: Duration) -> Self;
    fn seed(self, seed: u64) -> Self;
    fn rate_limit(self, tps: NonZeroU32) -> Self;
    fn report_interval(self, interval: Duration) -> Self;
    fn preflight(self, enabled: bool) -> Self;
}

impl ConfigurableLoadTest for LoadTest {
    /// Number of virtual users, all started at once.
    fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Wall-clock length of the run. Zero yields an empty run with undefined verdicts.
    fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    /// Add a threshold to the declared set.
    fn threshold(mut self, threshold: Threshold) -> Self {
        self.config.thresholds.push(threshold);
        self
    }

    /// Replace the declared thresholds.
    ///
    /// # Example
    /// ```no_run
    /// use ledger_load::prelude::*;
    /// use std::time::Duration;
    ///
    /// # async fn run() {
    /// LoadTest::new("http://localhost:8080")
    ///     .thresholds(vec![
    ///         Threshold::latency(0.99, Comparator::Lt, Duration::from_millis(500)),
    ///         Threshold::success_rate(Comparator::Ge, 0.95),
    ///     ])
    ///     .duration(Duration::from_secs(120))
    ///     .await
    ///     .unwrap();
    /// # }
    /// ```
    fn thresholds(mut self, thresholds: Vec<Threshold>) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    fn mix(mut self, mix: MixWeights) -> Self {
        self.config.mix = mix;
        self
    }

    fn user_pool(mut self, pool: RangeInclusive<u32>) -> Self {
        self.config.user_pool = pool;
        self
    }

    fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    fn pause(mut self, pause: Duration) -> Self {
        self.config.pause = pause;
        self
    }

    fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    fn rate_limit(mut self, tps: NonZeroU32) -> Self {
        self.config.rate_limit = Some(tps);
        self
    }

    fn report_interval(mut self, interval: Duration) -> Self {
        self.config.report_interval = interval;
        self
    }

    fn preflight(mut self, enabled: bool) -> Self {
        self.config.preflight = enabled;
        self
    }
}

#[instrument(name = "load_test", skip_all, fields(base_url = %config.base_url, concurrency = config.concurrency))]
pub(crate) async fn run_load_test(
    config: RunConfig,
    stop: StopHandle,
) -> Result<RunReport, RunError> {
    config.validate()?;
    let mix = Arc::new(MixPolicy::new(&config.mix)?);
    let client = LedgerClient::new(&config.base_url, config.request_timeout)
        .map_err(RunError::HttpClient)?;

    if config.preflight {
        let status = client
            .preflight()
            .await
            .map_err(|source| RunError::Unreachable {
                url: config.base_url.clone(),
                source,
            })?;
        debug!("Preflight returned {status}");
    }

    let rngs = user_rngs(config.seed, config.concurrency)?;

    let tokens = Arc::new(TokenGenerator::new());
    let builder = PayloadBuilder::new(tokens.clone());
    let recorder = Recorder::new(config.rate_limit);
    let mut evaluator = SloEvaluator::new(config.thresholds.clone());

    info!(
        "Starting run {} for {}",
        tokens.run_id(),
        humantime::format_duration(config.duration)
    );

    let start = Instant::now();
    let deadline = start
        .checked_add(config.duration)
        .unwrap_or_else(|| start + MAX_RUN_DURATION);
    let clock = RunClock::new(deadline, stop.clone());

    let mut users = JoinSet::new();
    for (index, rng) in rngs.into_iter().enumerate() {
        let user = VirtualUser {
            index,
            rng,
            mix: mix.clone(),
            builder: builder.clone(),
            client: client.clone(),
            user_pool: config.user_pool.clone(),
            pause: config.pause,
            clock: clock.clone(),
        };
        users.spawn(
            RUN_HOOK
                .scope(recorder.clone(), user.run())
                .instrument(info_span!("user", index)),
        );
    }

    // NOTE: Interim statistics only; verdicts are computed once every user has stopped.
    let mut timer = Timer::new(config.report_interval).await;
    trace!("Reporting every {timer}");
    loop {
        tokio::select! {
            elapsed = timer.tick() => {
                let samples = recorder.drain();
                info!("{}", Measurement::from_samples(&samples, elapsed));
                evaluator.ingest(&samples);
            }
            _ = clock.expired() => break,
        }
    }

    stop.stop();
    debug!("Waiting for virtual users to finish in-flight requests");

    let mut issued = 0;
    while let Some(res) = users.join_next().await {
        match res {
            Ok(n) => issued += n,
            Err(err) => error!("Virtual user task failed: {err}"),
        }
    }

    evaluator.ingest(&recorder.drain());
    let report = evaluator.finish(start.elapsed());

    for verdict in &report.verdicts {
        if verdict.passed {
            info!("{verdict}");
        } else {
            warn!("{verdict}");
        }
    }
    info!(
        "Run complete: {issued} requests, {}",
        if report.passed { "passed" } else { "failed" }
    );

    Ok(report)
}

/// One generator per virtual user, all derived from a single root seeder.
fn user_rngs(seed: Option<u64>, concurrency: usize) -> Result<Vec<SmallRng>, RunError> {
    let mut seeder = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_rng(OsRng)?,
    };
    (0..concurrency)
        .map(|_| SmallRng::from_rng(&mut seeder).map_err(RunError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_load_core::{ConfigError, OperationKind};
    use rand::Rng;

    #[tokio::test]
    async fn invalid_config_aborts_before_start() {
        let res = LoadTest::new("http://127.0.0.1:9").concurrency(0).await;
        assert!(matches!(
            res,
            Err(RunError::Config(ConfigError::ZeroConcurrency))
        ));

        let res = LoadTest::new("http://127.0.0.1:9")
            .mix(MixWeights::new(vec![(OperationKind::Charge, 0.3)]))
            .await;
        assert!(matches!(
            res,
            Err(RunError::Config(ConfigError::MixDoesNotSumToOne(_)))
        ));
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn unreachable_target_is_fatal() {
        let res = LoadTest::new("http://127.0.0.1:1")
            .duration(Duration::from_secs(30))
            .request_timeout(Duration::from_secs(2))
            .await;
        assert!(matches!(res, Err(RunError::Unreachable { .. })));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn empty_run_without_target() {
        let report = LoadTest::new("http://127.0.0.1:1")
            .preflight(false)
            .duration(Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(report.samples, 0);
        assert!(!report.passed);
        assert!(report.verdicts.iter().all(|v| v.observed.is_none()));
    }

    fn draws(rngs: Vec<SmallRng>) -> Vec<Vec<(OperationKind, u32)>> {
        let mix = MixPolicy::default();
        rngs.into_iter()
            .map(|mut rng| {
                (0..50)
                    .map(|_| (mix.select(&mut rng), rng.gen_range(1..=100)))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn seeded_users_replay_the_same_traffic() {
        let first = draws(user_rngs(Some(42), 4).unwrap());
        let second = draws(user_rngs(Some(42), 4).unwrap());
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        // Users get distinct streams.
        assert_ne!(first[0], first[1]);

        let other = draws(user_rngs(Some(43), 4).unwrap());
        assert_ne!(first, other);
    }

    #[test]
    fn unseeded_users_differ_between_runs() {
        let first = draws(user_rngs(None, 2).unwrap());
        let second = draws(user_rngs(None, 2).unwrap());
        assert_ne!(first, second);
        assert!(user_rngs(None, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn builder_sets_config() {
        let test = LoadTest::new("http://localhost:8080/")
            .concurrency(7)
            .duration(Duration::from_secs(3))
            .seed(42)
            .pause(Duration::from_millis(10))
            .user_pool(5..=6)
            .thresholds(vec![]);

        let config = test.config();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.concurrency, 7);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.user_pool, 5..=6);
        assert!(config.thresholds.is_empty());
    }
}
