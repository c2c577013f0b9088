use alveoli::app::{self, Snapshot};
use alveoli::config::Args;
use alveoli::grid::aggregate_rows;
use alveoli::loader;
use log::{debug, info};

/// Main entry point for the heatmap web application
///
/// Loads the startup source, aggregates it once and serves the result. A
/// missing or unreadable source ends the process before the server starts.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse_args();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    info!("Alveoli heatmap v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let rows = loader::load_records(&args.source, &args.sheet).map_err(|e| {
        format!("Failed to load {}: {}", args.source.display(), e)
    })?;
    let aggregation = aggregate_rows(&rows);

    let snapshot = Snapshot::new(aggregation, args.source.display().to_string());
    app::run(&args, snapshot).await
}
