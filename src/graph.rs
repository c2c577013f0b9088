#![cfg(feature = "web")]
use crate::error::{HeatmapError, Result};
use crate::figure::{PLASMA, TITLE, column_ticks, separator_positions};
use crate::grid::{HeatmapGrid, format_count};
use crate::location::{COLUMNS, aisle_label};
use image::{ImageOutputFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Configuration options for static heatmap rendering
///
/// This structure contains the customizable properties of the PNG image.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the image
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,

    /// Draw non-zero cell values on the cells
    pub show_values: bool,
}

impl Default for GraphOptions {
    /// Creates a default configuration for heatmap rendering
    ///
    /// # Returns
    /// * `GraphOptions` - 1600x700 pixels with the same titles as the interactive figure
    fn default() -> Self {
        Self {
            title: TITLE.to_string(),
            x_label: "Channel and Column".to_string(),
            y_label: "Aisle".to_string(),
            width: 1600,
            height: 700,
            show_values: true,
        }
    }
}

/// Maps `t` in `[0, 1]` onto the Plasma colour ramp.
pub fn plasma_color(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (PLASMA.len() - 1) as f64;
    let lower = scaled.floor() as usize;
    let upper = (lower + 1).min(PLASMA.len() - 1);
    let frac = scaled - lower as f64;

    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    let (r0, g0, b0) = PLASMA[lower];
    let (r1, g1, b1) = PLASMA[upper];
    RGBColor(mix(r0, r1), mix(g0, g1), mix(b0, b1))
}

fn render_error<E: std::fmt::Display>(e: E) -> HeatmapError {
    HeatmapError::Render(e.to_string())
}

/// `C<n>` label of the column tick at `x`, empty away from the tick positions.
fn column_tick_label(ticks: &(Vec<f64>, Vec<String>), x: f64) -> String {
    let (positions, text) = ticks;
    positions
        .iter()
        .position(|p| (p - x).abs() < 1e-6)
        .and_then(|i| text.get(i).cloned())
        .unwrap_or_default()
}

/// Draws the heatmap into an RGB pixel buffer of `width * height * 3` bytes.
///
/// # Implementation Notes
/// * Aisle 1 is the bottom row and aisle 15 the top row
/// * Colours are scaled between the grid minimum (at most 0) and its maximum
/// * Dashed white lines separate the storage columns
fn draw_heatmap(grid: &HeatmapGrid, options: &GraphOptions, buffer: &mut [u8]) -> Result<()> {
    let root = BitMapBackend::with_buffer(buffer, (options.width, options.height))
        .into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let cols = grid.cols as f64;
    let rows = grid.rows as f64;
    let min = grid.min_value();
    let span = (grid.max_value() - min).max(f64::EPSILON);

    let ticks = column_ticks();

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(
            (-0.5..cols - 0.5).with_key_points(ticks.0.clone()),
            -0.5..rows - 0.5,
        )
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(COLUMNS as usize)
        .y_labels(grid.rows)
        .x_label_formatter(&|x| column_tick_label(&ticks, *x))
        .y_label_formatter(&|y| aisle_label(y.round().max(0.0) as usize))
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series((0..grid.rows).flat_map(|r| {
            (0..grid.cols).map(move |c| {
                let value = grid.value(r, c);
                let color = plasma_color((value - min) / span);
                let (x, y) = (c as f64, r as f64);
                Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], color.filled())
            })
        }))
        .map_err(render_error)?;

    if options.show_values {
        let font = ("sans-serif", 10).into_font().color(&WHITE);
        chart
            .draw_series(
                (0..grid.rows)
                    .flat_map(|r| (0..grid.cols).map(move |c| (r, c)))
                    .filter(|&(r, c)| grid.value(r, c) != 0.0)
                    .map(|(r, c)| {
                        Text::new(
                            format_count(grid.value(r, c)),
                            (c as f64 - 0.4, r as f64 + 0.3),
                            font.clone(),
                        )
                    }),
            )
            .map_err(render_error)?;
    }

    // Separators are drawn as short segments to get a dashed look.
    let dash = 0.3;
    for x in separator_positions() {
        let mut y = -0.5;
        while y < rows - 0.5 {
            let end = (y + dash).min(rows - 0.5);
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(x, y), (x, end)],
                    WHITE.stroke_width(3),
                )))
                .map_err(render_error)?;
            y += dash * 2.0;
        }
    }

    root.present().map_err(render_error)?;
    Ok(())
}

/// Renders the heatmap as PNG bytes
///
/// # Arguments
/// * `grid` - Aggregated grid to draw
/// * `options` - Image size and titles
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
pub fn create_heatmap_png(grid: &HeatmapGrid, options: &GraphOptions) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; options.width as usize * options.height as usize * 3];
    draw_heatmap(grid, options, &mut buffer)?;

    let image = RgbImage::from_raw(options.width, options.height, buffer)
        .ok_or_else(|| HeatmapError::Render("pixel buffer size mismatch".to_string()))?;

    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(render_error)?;
    Ok(png.into_inner())
}

/// Renders the heatmap and saves it as a PNG file at `path`.
pub fn save_heatmap_png(
    grid: &HeatmapGrid,
    options: &GraphOptions,
    path: impl AsRef<Path>,
) -> Result<()> {
    let png = create_heatmap_png(grid, options)?;
    std::fs::write(path, png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Record, aggregate};

    #[test]
    fn test_plasma_endpoints() {
        assert_eq!(plasma_color(0.0), RGBColor(0x0d, 0x08, 0x87));
        assert_eq!(plasma_color(1.0), RGBColor(0xf0, 0xf9, 0x21));
        assert_eq!(plasma_color(-3.0), plasma_color(0.0));
        assert_eq!(plasma_color(7.0), plasma_color(1.0));
        assert_eq!(plasma_color(f64::NAN), plasma_color(0.0));
    }

    #[test]
    fn test_plasma_interpolates_between_stops() {
        // Halfway between the fifth and sixth stops.
        assert_eq!(plasma_color(0.5), RGBColor(203, 71, 121));
    }

    #[test]
    fn test_column_labels_sit_on_block_centres() {
        let ticks = column_ticks();
        assert_eq!(column_tick_label(&ticks, 5.5), "C1");
        assert_eq!(column_tick_label(&ticks, 89.5), "C8");
        assert_eq!(column_tick_label(&ticks, 6.0), "");
        assert_eq!(column_tick_label(&ticks, 11.5), "");
    }

    fn small_options() -> GraphOptions {
        GraphOptions {
            width: 480,
            height: 240,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_heatmap_png() {
        let result = aggregate(&[
            Record::new("C1A1Ch1H1d1_A", 5.0),
            Record::new("C8A15Ch12H1d1_B", 2.0),
        ]);
        let png = create_heatmap_png(&result.grid, &small_options()).unwrap();

        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.to_rgb8().dimensions(), (480, 240));
    }

    #[test]
    fn test_save_heatmap_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.png");

        save_heatmap_png(&HeatmapGrid::new(), &small_options(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
    }
}
