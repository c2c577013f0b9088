#![cfg(not(tarpaulin_include))]

use alveoli::figure::{self, FigureOptions, TITLE};
use alveoli::graph::{self, GraphOptions};
use alveoli::grid::aggregate_rows;
use alveoli::{downloader, loader};
use clap::Parser;
use log::info;
use std::path::PathBuf;

/// Render the alveoli heatmap to files without starting the server
///
/// Writes `heatmap.png`, `heatmap.html` and `grid.csv` into the output directory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct RenderArgs {
    /// CSV file or workbook to aggregate
    #[arg(long, default_value = "Alveolus_evolution_in_time_v3.csv", env = "ALVEOLI_SOURCE")]
    source: PathBuf,

    /// Sheet holding the `Alveoli` and `Count` columns
    #[arg(long, default_value = loader::DEFAULT_SHEET, env = "ALVEOLI_SHEET")]
    sheet: String,

    /// Directory receiving the rendered files
    #[arg(long, default_value = "heatmap_output")]
    out_dir: PathBuf,

    /// PNG width in pixels
    #[arg(long, default_value_t = 1600)]
    width: u32,

    /// PNG height in pixels
    #[arg(long, default_value_t = 700)]
    height: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = RenderArgs::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rows = loader::load_records(&args.source, &args.sheet)?;
    let aggregation = aggregate_rows(&rows);

    std::fs::create_dir_all(&args.out_dir)?;

    let png_path = args.out_dir.join("heatmap.png");
    let options = GraphOptions {
        width: args.width,
        height: args.height,
        ..Default::default()
    };
    graph::save_heatmap_png(&aggregation.grid, &options, &png_path)?;
    info!("Wrote {}", png_path.display());

    let html_path = args.out_dir.join("heatmap.html");
    let figure = figure::build_figure(&aggregation.grid, &FigureOptions::default());
    std::fs::write(&html_path, figure::to_html(&figure, TITLE))?;
    info!("Wrote {}", html_path.display());

    let csv_path = args.out_dir.join("grid.csv");
    std::fs::write(&csv_path, downloader::to_csv(&aggregation.grid)?)?;
    info!("Wrote {}", csv_path.display());

    Ok(())
}
