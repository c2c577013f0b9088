use thiserror::Error;

/// Errors produced while loading, persisting or rendering heatmap data.
#[derive(Error, Debug)]
pub enum HeatmapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX read error: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    #[error("Spreadsheet read error: {0}")]
    SpreadsheetRead(#[from] calamine::Error),

    #[error("XLSX write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Rendering failed: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, HeatmapError>;
