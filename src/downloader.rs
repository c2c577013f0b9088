use crate::error::{HeatmapError, Result};
use crate::figure::{x_categories, y_categories};
use crate::grid::HeatmapGrid;

/// Sheet name used for the exported grid
pub const EXPORT_SHEET: &str = "Heatmap";

/// Convert the aggregated grid to CSV format
///
/// The header row is `Aisle` followed by the `C<col>Ch<channel>` categories;
/// each following row holds one aisle, aisle 1 first.
///
/// # Examples
/// ```
/// use alveoli::grid::HeatmapGrid;
/// use alveoli::downloader::to_csv;
///
/// let csv = to_csv(&HeatmapGrid::new()).unwrap();
/// assert!(csv.starts_with("Aisle,C1Ch1,"));
/// ```
pub fn to_csv(grid: &HeatmapGrid) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Aisle".to_string()];
    header.extend(x_categories(grid));
    writer.write_record(&header)?;

    for (label, row) in y_categories(grid).into_iter().zip(grid.value_rows()) {
        let mut record = vec![label];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| HeatmapError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| HeatmapError::Render(e.to_string()))
}

/// Convert the aggregated grid to XLSX format
///
/// Same layout as [`to_csv`], written with numbers as numeric cells on a
/// sheet named `Heatmap`.
pub fn to_xlsx(grid: &HeatmapGrid) -> Result<Vec<u8>> {
    use rust_xlsxwriter::Workbook;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET)?;

    worksheet.write_string(0, 0, "Aisle")?;
    for (c, category) in x_categories(grid).iter().enumerate() {
        worksheet.write_string(0, (c + 1) as u16, category)?;
    }

    for (r, label) in y_categories(grid).iter().enumerate() {
        let row = (r + 1) as u32;
        worksheet.write_string(row, 0, label)?;
        for c in 0..grid.cols {
            worksheet.write_number(row, (c + 1) as u16, grid.value(r, c))?;
        }
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}
