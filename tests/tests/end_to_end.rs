mod utils;
use utils::*;

use ledger_load::prelude::*;
use mock_service::{MockConfig, Route};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn healthy_ledger_passes() {
    init();
    let mock = mock_service::spawn(MockConfig::default().with_delay(Duration::from_millis(50)))
        .await
        .unwrap();

    let report = LoadTest::new(&mock.base_url())
        .concurrency(10)
        .duration(Duration::from_secs(5))
        .report_interval(Duration::from_secs(1))
        .await
        .unwrap();

    println!("{report}");
    assert!(report.passed);
    assert!(report.samples >= 10);

    let p95 = report.verdicts[0].observed.unwrap();
    assert!((50. ..150.).contains(&p95), "p95 = {p95}ms");
    assert_eq!(report.verdicts[1].observed, Some(1.0));

    for kind in OperationKind::ALL {
        assert_eq!(report.counts_for(kind).failed, 0, "{kind}");
    }
    assert_eq!(mock.health_hits(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn failing_withdrawals_fail_success_rate() {
    init();
    let mock = mock_service::spawn(
        MockConfig::default()
            .with_delay(Duration::from_millis(50))
            .failing(Route::Withdraw, 500),
    )
    .await
    .unwrap();

    let report = LoadTest::new(&mock.base_url())
        .concurrency(10)
        .duration(Duration::from_secs(5))
        .pause(Duration::from_millis(200))
        .await
        .unwrap();

    println!("{report}");
    assert!(!report.passed);

    let rate = &report.verdicts[1];
    assert!(matches!(rate.threshold.metric, Metric::SuccessRate));
    assert!(!rate.passed);
    assert!(rate.observed.unwrap() < 1.0);
    assert!(rate.margin().unwrap() < 0.);

    let withdraw = report.counts_for(OperationKind::Withdraw);
    assert!(withdraw.issued > 0);
    assert_eq!(withdraw.failed, withdraw.issued);
    for kind in [
        OperationKind::Charge,
        OperationKind::GetBalance,
        OperationKind::GetTransactions,
    ] {
        let counts = report.counts_for(kind);
        assert!(counts.issued > 0, "{kind}");
        assert_eq!(counts.failed, 0, "{kind}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(10_000)]
async fn zero_duration_is_an_undefined_verdict() {
    init();
    let mock = mock_service::spawn(MockConfig::default()).await.unwrap();

    let report = LoadTest::new(&mock.base_url())
        .concurrency(10)
        .duration(Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(report.samples, 0);
    assert!(!report.passed);
    assert!(report
        .verdicts
        .iter()
        .all(|v| v.observed.is_none() && !v.passed));
    assert!(mock.stats().requests.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(20_000)]
async fn async_withdrawals_are_accepted() {
    init();
    let mut config = MockConfig::default();
    config.withdraw_status = 202;
    let mock = mock_service::spawn(config).await.unwrap();

    let report = LoadTest::new(&mock.base_url())
        .concurrency(4)
        .duration(Duration::from_secs(2))
        .pause(Duration::from_millis(10))
        .mix(MixWeights::new(vec![(OperationKind::Withdraw, 1.0)]))
        .await
        .unwrap();

    let withdraw = report.counts_for(OperationKind::Withdraw);
    assert!(withdraw.issued > 0);
    assert_eq!(withdraw.passed, withdraw.issued);
    assert_eq!(report.samples, withdraw.issued);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(20_000)]
async fn stop_handle_ends_run_early() {
    init();
    let mock = mock_service::spawn(MockConfig::default()).await.unwrap();

    let test = LoadTest::new(&mock.base_url())
        .concurrency(4)
        .duration(Duration::from_secs(60 * 60));
    let stop = test.stop_handle();

    let run = tokio::spawn(test);
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    stop.stop();

    let report = run.await.unwrap().unwrap();
    assert!(report.samples >= 4);
    assert!(report.elapsed < Duration::from_secs(10));
}
