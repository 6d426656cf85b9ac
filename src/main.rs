use dashboard::editor::EditorBackend;
use dashboard::{Dashboard, DashboardConfig};
use std::env;
use std::sync::Arc;

/// Renders the dashboard once into a standalone HTML file
///
/// # Usage
/// `dashboard [data-file] [output.html]`
///
/// The data file falls back to `DASHBOARD_DATA` and then the built-in default;
/// the report is written to `dashboard.html` unless a second argument is given.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let config = DashboardConfig::from_env()?.with_data_arg(args.next());
    let output = args.next().unwrap_or_else(|| "dashboard.html".to_string());

    let dashboard = Dashboard::from_config(&config, Arc::new(EditorBackend::new()));
    let html = dashboard.render_html();
    std::fs::write(&output, html)?;

    log::info!(
        "wrote dashboard for {} to {}",
        config.data_path.display(),
        output
    );
    Ok(())
}
