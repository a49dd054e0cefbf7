use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use ledger_load_core::{OperationKind, RequestSample};
use metrics_util::AtomicBucket;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
#[allow(unused)]
use tracing::{debug, error, trace, warn};

/// Wait for a permit from the task's rate limiter, if the run has one.
///
/// Callers race this against the end of the run, so a permit granted after the deadline is
/// never spent on a request.
pub(crate) async fn admit() {
    let limiter = RUN_HOOK
        .try_with(|hook| hook.limiter.clone())
        .ok()
        .flatten();
    if let Some(limiter) = limiter {
        limiter.until_ready().await;
    }
}

/// Issue one request, timing it and recording the outcome into the task's [`Recorder`].
///
/// A transport error (connection failure, timeout, truncated body) becomes a sample with no
/// status and a failed check; it is never propagated.
pub(crate) async fn transaction_hook<T>(kind: OperationKind, func: T) -> RequestSample
where
    T: Future<Output = Result<u16, reqwest::Error>>,
{
    let hook = RUN_HOOK.try_with(|v| v.clone()).ok();

    let issued_at = SystemTime::now();
    let start = Instant::now();
    let res = func.await;
    let latency = start.elapsed();

    let status = match res {
        Ok(status) => Some(status),
        Err(err) => {
            debug!("{kind} request failed: {err}");
            None
        }
    };
    let sample = RequestSample::new(kind, issued_at, latency, status);
    trace!(
        "{}: status={:?} latency={:?} passed={}",
        kind.check_name(),
        sample.status,
        sample.latency,
        sample.check_passed
    );

    #[cfg(feature = "metrics")]
    {
        let operation = kind.name();
        metrics::histogram!("ledger_request_latency", "operation" => operation)
            .record(latency.as_secs_f64());
        if sample.check_passed {
            metrics::counter!("ledger_request_success", "operation" => operation).increment(1);
        } else {
            metrics::counter!("ledger_request_failure", "operation" => operation).increment(1);
        }
    }

    match hook {
        Some(hook) => hook.samples.push(sample.clone()),
        None => error!("No recorder available; sample dropped."),
    }

    sample
}

/// Shared, append-only sample sink plus the optional run-wide rate limiter.
#[derive(Clone)]
pub(crate) struct Recorder {
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub samples: Arc<AtomicBucket<RequestSample>>,
}

impl Recorder {
    pub fn new(rate_limit: Option<NonZeroU32>) -> Self {
        Self {
            limiter: rate_limit.map(|tps| Arc::new(rate_limiter(tps))),
            samples: Arc::new(AtomicBucket::new()),
        }
    }

    /// Take every sample recorded since the last drain.
    pub fn drain(&self) -> Vec<RequestSample> {
        let mut samples = vec![];
        self.samples.clear_with(|block| samples.extend_from_slice(block));
        samples
    }
}

tokio::task_local! {
    pub(crate) static RUN_HOOK: Recorder;
}

fn rate_limiter(tps_limit: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps_limit).allow_burst(NonZeroU32::MIN))
}
