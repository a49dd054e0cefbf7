//! A single virtual user: select, build, issue, record, pause, repeat.
use crate::client::LedgerClient;
use crate::mix::MixPolicy;
use crate::payload::PayloadBuilder;
use crate::transaction::{admit, transaction_hook};
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Shared stop flag for a run. Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    /// Ask every virtual user to finish its current iteration and exit.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Wall-clock deadline of a run combined with its [`StopHandle`].
#[derive(Debug, Clone)]
pub(crate) struct RunClock {
    deadline: Instant,
    stop: StopHandle,
}

impl RunClock {
    pub fn new(deadline: Instant, stop: StopHandle) -> Self {
        Self { deadline, stop }
    }

    pub fn is_over(&self) -> bool {
        self.stop.is_stopped() || Instant::now() >= self.deadline
    }

    /// Resolves once the deadline passes or the run is stopped.
    pub async fn expired(&self) {
        let notified = self.stop.notify.notified();
        if self.stop.is_stopped() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(self.deadline) => {}
            _ = notified => {}
        }
    }

    /// Sleep for `dur`, cut short by the end of the run.
    pub async fn pause(&self, dur: Duration) {
        let wake = (Instant::now() + dur).min(self.deadline);
        let notified = self.stop.notify.notified();
        if self.stop.is_stopped() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(wake) => {}
            _ = notified => {}
        }
    }
}

pub(crate) struct VirtualUser<R> {
    pub index: usize,
    pub rng: R,
    pub mix: Arc<MixPolicy>,
    pub builder: PayloadBuilder,
    pub client: LedgerClient,
    pub user_pool: RangeInclusive<u32>,
    pub pause: Duration,
    pub clock: RunClock,
}

impl<R: Rng + Send> VirtualUser<R> {
    /// Loop until the run is over, returning the number of requests issued.
    ///
    /// A request in flight when the run ends is allowed to complete. A user still waiting on
    /// the rate limiter when the run ends exits without issuing.
    pub async fn run(mut self) -> u64 {
        let mut issued = 0;
        while !self.clock.is_over() {
            tokio::select! {
                biased;
                _ = self.clock.expired() => break,
                _ = admit() => {}
            }

            let kind = self.mix.select(&mut self.rng);
            let user_id = self.rng.gen_range(self.user_pool.clone());

            match self
                .builder
                .build(kind, user_id, &mut self.rng, OffsetDateTime::now_utc())
            {
                Ok(request) => {
                    let sample = transaction_hook(kind, self.client.send(&request)).await;
                    issued += 1;
                    if !sample.check_passed {
                        debug!(
                            "{} failed for user {user_id}: status={:?}",
                            kind.check_name(),
                            sample.status
                        );
                    }
                }
                Err(err) => warn!("Skipping {kind} iteration: {err}"),
            }

            self.clock.pause(self.pause).await;
        }

        trace!("Virtual user {} done after {issued} requests", self.index);
        issued
    }
}
