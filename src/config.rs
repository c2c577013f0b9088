//! Command-line and environment configuration.
//!
//! Every flag can also be set through the environment variable named next to
//! it, which is how the server is usually configured in deployment.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::loader::DEFAULT_SHEET;

/// Default upload limit, 16 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Alveoli heatmap server
///
/// Loads alveoli counts from a CSV file or workbook, aggregates them per
/// aisle, column and channel, and serves an interactive heatmap. Uploading a
/// replacement spreadsheet rewrites the workbook sheet and refreshes the map.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// CSV file or workbook loaded at startup
    #[arg(
        long,
        value_name = "FILE",
        default_value = "Alveolus_evolution_in_time_v3.csv",
        env = "ALVEOLI_SOURCE"
    )]
    pub source: PathBuf,

    /// Workbook whose sheet is replaced by uploads
    #[arg(
        long,
        value_name = "FILE",
        default_value = "Alveolus_evolution_in_time_v3.xlsx",
        env = "ALVEOLI_WORKBOOK"
    )]
    pub workbook: PathBuf,

    /// Sheet holding the `Alveoli` and `Count` columns
    #[arg(long, default_value = DEFAULT_SHEET, env = "ALVEOLI_SHEET")]
    pub sheet: String,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "ALVEOLI_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8050, env = "ALVEOLI_PORT")]
    pub port: u16,

    /// Enable debug logging
    #[arg(short, long, env = "ALVEOLI_DEBUG")]
    pub debug: bool,

    /// Largest accepted upload, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, value_name = "BYTES")]
    pub max_upload_bytes: usize,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Socket address built from `host` and `port`.
    pub fn bind_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid bind address {}:{}: {}", self.host, self.port, e))
    }

    /// Default log filter: `debug` with `--debug`, `info` otherwise.
    pub fn log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["alveoli-heatmap"]).unwrap();
        assert_eq!(args.source, PathBuf::from("Alveolus_evolution_in_time_v3.csv"));
        assert_eq!(args.sheet, "Counter");
        assert_eq!(args.port, 8050);
        assert!(!args.debug);
        assert_eq!(args.log_filter(), "info");
        assert_eq!(args.bind_addr().unwrap().to_string(), "0.0.0.0:8050");
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "alveoli-heatmap",
            "--source",
            "counts.xlsx",
            "--host",
            "127.0.0.1",
            "--port",
            "3000",
            "--debug",
        ])
        .unwrap();
        assert_eq!(args.source, PathBuf::from("counts.xlsx"));
        assert_eq!(args.bind_addr().unwrap().to_string(), "127.0.0.1:3000");
        assert_eq!(args.log_filter(), "debug");
    }

    #[test]
    fn test_bad_host() {
        let args = Args::try_parse_from(["alveoli-heatmap", "--host", "not a host"]).unwrap();
        assert!(args.bind_addr().is_err());
    }
}
