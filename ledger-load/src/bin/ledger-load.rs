use clap::Parser;
use ledger_load::cli::LedgerLoadCli;
use ledger_load::prelude::*;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ledger_load=info")),
        )
        .init();

    let config = LedgerLoadCli::parse().into_config();
    let test = LoadTest::from_config(config);

    let stop = test.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; stopping virtual users");
            stop.stop();
        }
    });

    match test.await {
        Ok(report) => {
            println!("{report}");
            if report.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(2)
        }
    }
}
