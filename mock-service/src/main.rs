use mock_service::MockConfig;
use std::net::SocketAddr;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_service=debug,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = "0.0.0.0:8080".parse()?;
    let config = MockConfig::default().with_delay(Duration::from_millis(10));
    mock_service::run(addr, config).await
}
