mod utils;
use utils::*;

use ledger_load::prelude::*;
use mock_service::{MockConfig, Route};
use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn idempotency_keys_never_repeat() {
    init();
    let mock = mock_service::spawn(MockConfig::default()).await.unwrap();

    let report = LoadTest::new(&mock.base_url())
        .concurrency(20)
        .duration(Duration::from_secs(3))
        .pause(Duration::ZERO)
        .mix(MixWeights::new(vec![
            (OperationKind::Charge, 0.5),
            (OperationKind::Withdraw, 0.5),
        ]))
        .await
        .unwrap();

    let stats = mock.stats();
    let writes = report.counts_for(OperationKind::Charge).issued
        + report.counts_for(OperationKind::Withdraw).issued;

    assert!(writes > 100, "only {writes} writes");
    assert_eq!(stats.duplicate_keys, 0);
    assert_eq!(stats.unique_keys as u64, writes);
    assert_eq!(stats.rejected, 0);
    assert_eq!(report.verdicts[1].observed, Some(1.0), "{report}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn reads_stay_in_pool_and_first_page() {
    init();
    let mock = mock_service::spawn(MockConfig::default()).await.unwrap();

    LoadTest::new(&mock.base_url())
        .concurrency(8)
        .duration(Duration::from_secs(2))
        .pause(Duration::from_millis(1))
        .user_pool(10..=12)
        .seed(1234)
        .await
        .unwrap();

    let stats = mock.stats();
    assert!(stats.requests.get(&Route::Transactions).copied().unwrap_or(0) > 0);
    assert_eq!(stats.pages, BTreeSet::from([(1, 10)]));
    assert!(!stats.user_ids.is_empty());
    assert!(stats.user_ids.iter().all(|id| (10..=12).contains(id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn rate_limit_caps_throughput() {
    init();
    let mock = mock_service::spawn(MockConfig::default()).await.unwrap();

    let start = Instant::now();
    let report = LoadTest::new(&mock.base_url())
        .concurrency(16)
        .duration(Duration::from_secs(2))
        .pause(Duration::ZERO)
        .rate_limit(NonZeroU32::new(20).unwrap())
        .await
        .unwrap();
    let wall = start.elapsed();

    assert!(report.samples > 0);
    assert!(report.samples <= 45, "{} samples", report.samples);
    // Users queued on the limiter at the deadline exit without issuing.
    assert!(wall < Duration::from_millis(2500), "2s run took {wall:?}");
    assert!(report.elapsed < Duration::from_millis(2500), "{:?}", report.elapsed);
    let stats = mock.stats();
    let served: u64 = stats.requests.values().sum();
    assert_eq!(served, report.samples);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(30_000)]
async fn timeouts_are_failed_checks() {
    init();
    let mock = mock_service::spawn(MockConfig::default().with_delay(Duration::from_millis(500)))
        .await
        .unwrap();

    let report = LoadTest::new(&mock.base_url())
        .concurrency(2)
        .duration(Duration::from_secs(2))
        .pause(Duration::ZERO)
        .request_timeout(Duration::from_millis(100))
        .await
        .unwrap();

    assert!(report.samples > 0);
    assert_eq!(report.verdicts[1].observed, Some(0.0));
    assert!(!report.passed);
    for kind in OperationKind::ALL {
        assert_eq!(report.counts_for(kind).passed, 0, "{kind}");
    }
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn unreachable_target_aborts() {
    init();
    let res = LoadTest::new("http://127.0.0.1:1")
        .request_timeout(Duration::from_secs(2))
        .await;
    assert!(matches!(res, Err(ledger_load::RunError::Unreachable { .. })));
}
