use calamine::{Reader, Xlsx, open_workbook};
use log::info;
use rust_xlsxwriter::{Workbook, Worksheet};
use std::path::Path;

use crate::error::Result;
use crate::loader::{CellValue, SheetTable};

/// Writes a table onto a worksheet at its origin, header row included.
pub fn write_table(worksheet: &mut Worksheet, table: &SheetTable) -> Result<()> {
    let (top, left) = table.origin;
    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (top + r as u32, (left + c as u32) as u16);
            match cell {
                CellValue::Empty => {}
                CellValue::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
            }
        }
    }
    Ok(())
}

/// Reads every sheet of an existing workbook, in order, as `(name, table)` pairs.
fn read_sheets(filename: &Path) -> Result<Vec<(String, SheetTable)>> {
    let mut workbook: Xlsx<_> = open_workbook(filename)?;
    let names = workbook.sheet_names().to_vec();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        sheets.push((name, SheetTable::from_range(&range)));
    }
    Ok(sheets)
}

/// Replaces sheet `sheet_name` of the workbook at `filename` with `table`.
///
/// Other sheets are kept (values only). The sheet is appended when the
/// workbook lacks it and the workbook is created when the file is missing.
/// The new workbook is written next to the target and renamed over it.
pub fn replace_sheet(filename: impl AsRef<Path>, sheet_name: &str, table: &SheetTable) -> Result<()> {
    let filename = filename.as_ref();

    let mut sheets = if filename.exists() {
        read_sheets(filename)?
    } else {
        Vec::new()
    };

    match sheets.iter_mut().find(|(name, _)| name == sheet_name) {
        Some((_, existing)) => *existing = table.clone(),
        None => sheets.push((sheet_name.to_string(), table.clone())),
    }

    let mut workbook = Workbook::new();
    for (name, sheet) in &sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;
        write_table(worksheet, sheet)?;
    }

    let dir = match filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .suffix(".xlsx")
        .tempfile_in(dir)?;
    workbook.save(staged.path())?;
    staged.persist(filename).map_err(|e| e.error)?;

    info!(
        "Replaced sheet {} of {} with {} rows",
        sheet_name,
        filename.display(),
        table.rows.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{DEFAULT_SHEET, from_excel, workbook_table};

    fn table(rows: &[(&str, f64)]) -> SheetTable {
        let mut cells = vec![vec![
            CellValue::Text("Alveoli".to_string()),
            CellValue::Text("Count".to_string()),
        ]];
        for (alveoli, count) in rows {
            cells.push(vec![
                CellValue::Text(alveoli.to_string()),
                CellValue::Number(*count),
            ]);
        }
        SheetTable::new(cells)
    }

    #[test]
    fn test_creates_missing_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.xlsx");

        replace_sheet(&path, DEFAULT_SHEET, &table(&[("C1A1Ch1H1d1_A", 5.0)])).unwrap();

        let records = from_excel(&path, DEFAULT_SHEET).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].alveoli.as_deref(), Some("C1A1Ch1H1d1_A"));
        assert_eq!(records[0].count, Some(5.0));
    }

    #[test]
    fn test_replaces_only_target_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.xlsx");

        let mut workbook = Workbook::new();
        let notes = workbook.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write_string(0, 0, "keep me").unwrap();
        let counter = workbook.add_worksheet();
        counter.set_name(DEFAULT_SHEET).unwrap();
        counter.write_string(0, 0, "stale").unwrap();
        workbook.save(&path).unwrap();

        replace_sheet(
            &path,
            DEFAULT_SHEET,
            &table(&[("C1A1Ch1H1d1_A", 1.0), ("C2A2Ch2H1d1_B", 2.0)]),
        )
        .unwrap();

        let notes = workbook_table(&path, "Notes").unwrap();
        assert_eq!(notes.rows[0][0], CellValue::Text("keep me".to_string()));

        let records = from_excel(&path, DEFAULT_SHEET).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].count, Some(2.0));
    }

    #[test]
    fn test_kept_sheets_stay_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.xlsx");

        let mut workbook = Workbook::new();
        let notes = workbook.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write_string(2, 1, "B3 value").unwrap();
        workbook.save(&path).unwrap();

        replace_sheet(&path, DEFAULT_SHEET, &table(&[("C1A1Ch1H1d1_A", 1.0)])).unwrap();

        let notes = workbook_table(&path, "Notes").unwrap();
        assert_eq!(notes.origin, (2, 1));
        assert_eq!(notes.rows[0][0], CellValue::Text("B3 value".to_string()));
        assert_eq!(from_excel(&path, DEFAULT_SHEET).unwrap().len(), 1);
    }

    #[test]
    fn test_appends_missing_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.xlsx");

        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("Other").unwrap();
        workbook.save(&path).unwrap();

        replace_sheet(&path, DEFAULT_SHEET, &table(&[("C1A1Ch1H1d1_A", 4.0)])).unwrap();

        let records = from_excel(&path, DEFAULT_SHEET).unwrap();
        assert_eq!(records[0].count, Some(4.0));
        assert!(workbook_table(&path, "Other").is_ok());
    }
}
