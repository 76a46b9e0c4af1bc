use fetchcache::config::ConfigError;
use fetchcache::{listener, ProxyConfig};
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fetchcache=info")),
        )
        .init();

    let config = match ProxyConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            print_usage_error(&e);
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        port = config.port,
        capacity_bytes = config.capacity_bytes,
        "fetchcache starting"
    );

    if let Err(e) = listener::run(config).await {
        error!("listener failed: {e}");
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}

fn print_usage_error(e: &ConfigError) {
    println!("{e}");
}
