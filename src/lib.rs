/*!
# Alveoli Heatmap

Aggregates storage-location counts onto an aisle × (column, channel) grid and
serves the result as an interactive heatmap in the browser.

## Overview

Each input row names an alveolus with a string such as `C3A12Ch7H4d2_B`
(column 3, aisle 12, channel 7, height 4, depth 2, side B) and carries a
`Count`. Counts are summed per (aisle, column, channel) into a dense 15 × 96
grid; height, depth and side are parsed but do not affect the grid. A parallel
label grid keeps the hover text of the last record written to each cell.

## Architecture

### Data layer
- **location**: alveoli string parsing and grid addressing
- **grid**: preprocessing, aggregation and the summary counters
- **loader**: CSV and workbook (sheet `Counter`) readers
- **saving**: replaces the `Counter` sheet of the backing workbook

### Presentation layer
- **figure**: plotly.js figure and standalone HTML page
- **graph**: static PNG rendering with plotters
- **downloader**: grid export as CSV or XLSX
- **app**: axum routes, including the spreadsheet upload

## REST API Endpoints

- `/` - Heatmap page with the upload drop zone
- `/api/figure` - Plotly figure JSON
- `/api/summary` - Aggregation counters
- `/api/upload` - Replace the `Counter` sheet and re-aggregate
- `/heatmap.png` - Static rendering
- `/export/grid.csv`, `/export/grid.xlsx`, `/export/figure.html` - Downloads
*/

pub mod config;
pub mod downloader;
pub mod error;
pub mod figure;
pub mod grid;
pub mod loader;
pub mod location;
pub mod saving;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;

pub use error::{HeatmapError, Result};
pub use grid::{Aggregation, AggregationSummary, HeatmapGrid, RawRecord, Record, aggregate};
pub use location::LocationCode;
