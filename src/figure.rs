//! Interactive heatmap description for the browser.
//!
//! The figure is a plotly.js `{data, layout}` object: one heatmap trace plus
//! dashed separators between storage columns. The served page hands it to
//! `Plotly.newPlot` unchanged.

use crate::grid::{AggregationSummary, HeatmapGrid};
use crate::location::{CHANNELS, COLUMNS, aisle_label, flat_label};
use serde_json::{Value, json};

/// plotly.js bundle loaded by the served pages
pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.27.0.min.js";

/// Page and figure title
pub const TITLE: &str = "Interactive Heatmap";

/// Stops of the Plasma sequential colour scale, dark to bright.
pub const PLASMA: [(u8, u8, u8); 10] = [
    (0x0d, 0x08, 0x87),
    (0x46, 0x03, 0x9f),
    (0x72, 0x01, 0xa8),
    (0x9c, 0x17, 0x9e),
    (0xbd, 0x37, 0x86),
    (0xd8, 0x57, 0x6b),
    (0xed, 0x79, 0x53),
    (0xfb, 0x9f, 0x3a),
    (0xfd, 0xca, 0x26),
    (0xf0, 0xf9, 0x21),
];

/// Configuration options for figure generation
#[derive(Clone, Debug)]
pub struct FigureOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub color_label: String,
    pub colorscale: &'static [(u8, u8, u8)],
    /// Draw each cell's value on the cell
    pub show_values: bool,
}

impl Default for FigureOptions {
    fn default() -> Self {
        Self {
            title: TITLE.to_string(),
            x_label: "Channel and Column".to_string(),
            y_label: "Aisle".to_string(),
            color_label: "Count".to_string(),
            colorscale: &PLASMA,
            show_values: true,
        }
    }
}

/// X category labels, `C1Ch1` through `C8Ch12`.
pub fn x_categories(grid: &HeatmapGrid) -> Vec<String> {
    (0..grid.cols).map(flat_label).collect()
}

/// Y category labels, `A1` through `A15`.
pub fn y_categories(grid: &HeatmapGrid) -> Vec<String> {
    (0..grid.rows).map(aisle_label).collect()
}

/// Centre of each storage column block on the x axis, with its `C<n>` label.
pub fn column_ticks() -> (Vec<f64>, Vec<String>) {
    let channels = CHANNELS as f64;
    (1..=COLUMNS)
        .map(|c| {
            let i = (c - 1) as f64;
            ((i + 0.5) * channels - 0.5, format!("C{}", c))
        })
        .unzip()
}

/// X positions of the separators between storage columns.
pub fn separator_positions() -> Vec<f64> {
    (1..COLUMNS)
        .map(|i| (i * CHANNELS) as f64 - 0.5)
        .collect()
}

/// Evenly spaced `[position, "rgb(..)"]` stops for plotly.
pub fn colorscale_json(stops: &[(u8, u8, u8)]) -> Value {
    let last = stops.len().saturating_sub(1).max(1) as f64;
    Value::Array(
        stops
            .iter()
            .enumerate()
            .map(|(i, (r, g, b))| json!([i as f64 / last, format!("rgb({},{},{})", r, g, b)]))
            .collect(),
    )
}

/// Builds the plotly figure for `grid`.
///
/// Rows are emitted aisle 1 first and the y axis runs bottom-up, so aisle 15
/// sits at the top of the chart.
pub fn build_figure(grid: &HeatmapGrid, options: &FigureOptions) -> Value {
    let (tickvals, ticktext) = column_ticks();

    let shapes: Vec<Value> = separator_positions()
        .into_iter()
        .map(|x| {
            json!({
                "type": "line",
                "xref": "x",
                "yref": "paper",
                "x0": x,
                "x1": x,
                "y0": 0,
                "y1": 1,
                "line": { "color": "white", "width": 3, "dash": "dash" },
            })
        })
        .collect();

    let mut trace = json!({
        "type": "heatmap",
        "z": grid.value_rows(),
        "x": x_categories(grid),
        "y": y_categories(grid),
        "text": grid.label_rows(),
        "hoverinfo": "text",
        "colorscale": colorscale_json(options.colorscale),
        "colorbar": { "title": { "text": options.color_label } },
    });
    if options.show_values {
        trace["texttemplate"] = json!("%{z}");
    }

    json!({
        "data": [trace],
        "layout": {
            "title": { "text": options.title },
            "xaxis": {
                "title": { "text": options.x_label },
                "tickvals": tickvals,
                "ticktext": ticktext,
            },
            "yaxis": {
                "title": { "text": options.y_label },
                "type": "category",
            },
            "shapes": shapes,
        },
    })
}

/// JSON view of a summary for the page's status line.
pub fn summary_json(summary: &AggregationSummary) -> Value {
    json!({
        "total_entries": summary.total_entries,
        "matched_entries": summary.matched_entries,
        "unmatched": summary.unmatched,
        "out_of_range": summary.out_of_range,
        "all_matched": summary.all_matched(),
    })
}

/// Self-contained HTML page showing the figure, for saving to disk.
pub fn to_html(figure: &Value, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
</head>
<body>
<h1>{title}</h1>
<div id="heatmap" style="width:100%;height:80vh;"></div>
<script>
const figure = {figure};
Plotly.newPlot("heatmap", figure.data, figure.layout);
</script>
</body>
</html>
"#,
        title = title,
        cdn = PLOTLY_CDN,
        figure = figure,
    )
}
