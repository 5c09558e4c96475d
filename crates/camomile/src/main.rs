use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config = match camomile::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(cause = %e, "failed to load configuration");
            return std::process::ExitCode::FAILURE;
        }
    };

    let shutdown = config.shutdown.clone();
    let handle = match camomile::serve(config).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(cause = %e, "failed to start server");
            return std::process::ExitCode::FAILURE;
        }
    };

    tracing::info!(addr = %handle.local_addr(), "camomile is listening");
    shutdown.cancelled().await;
    std::process::ExitCode::SUCCESS
}
