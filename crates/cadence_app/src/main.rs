use cadence_app::app::{run, AppConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env().unwrap_or_default();
    if let Err(err) = run(config).await {
        eprintln!("Failed to start cadence: {err:#}");
        std::process::exit(1);
    }
}
