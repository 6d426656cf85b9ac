use dashboard::DashboardConfig;
use dashboard::app;
use std::env;

/// Main entry point for the web dashboard
///
/// Reads `DASHBOARD_*` settings from the environment; an optional first
/// argument replaces the data file path.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DashboardConfig::from_env()?.with_data_arg(env::args().nth(1));

    log::info!(
        "Starting dashboard for {} on http://{}",
        config.data_path.display(),
        config.bind_addr
    );
    app::run(config).await
}
