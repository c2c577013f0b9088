use crate::error::{HeatmapError, Result};
use crate::grid::RawRecord;
use calamine::{Data, Range, Reader, open_workbook_auto, open_workbook_auto_from_rs};
use log::{debug, warn};
use std::io::{Cursor, Read};
use std::path::Path;

/// Header of the column holding alveoli strings
pub const ALVEOLI_COLUMN: &str = "Alveoli";

/// Header of the column holding counts
pub const COUNT_COLUMN: &str = "Count";

/// Sheet read from, and replaced in, the backing workbook
pub const DEFAULT_SHEET: &str = "Counter";

/// A single spreadsheet cell, independent of the file format it came from.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Classifies a raw CSV field: blank, numeric or text.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else if let Ok(n) = trimmed.parse::<f64>() {
            CellValue::Number(n)
        } else {
            CellValue::Text(field.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text rendering of the cell, `None` when empty.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(crate::grid::format_count(*n)),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }

    /// Numeric value of the cell; blank and `NaN` cells are missing.
    fn as_count(&self) -> std::result::Result<Option<f64>, ()> {
        match self {
            CellValue::Empty => Ok(None),
            CellValue::Number(n) if n.is_nan() => Ok(None),
            CellValue::Number(n) => Ok(Some(*n)),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                    return Ok(None);
                }
                trimmed.parse::<f64>().map(Some).map_err(|_| ())
            }
            CellValue::Bool(_) => Err(()),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) if s.trim().is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) => CellValue::Text(s.clone()),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(format!("{:?}", e)),
        }
    }
}

/// A rectangular table of cells; the first row is the header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetTable {
    pub rows: Vec<Vec<CellValue>>,
    /// Zero-based `(row, column)` of the top-left cell within its sheet
    pub origin: (u32, u32),
}

impl SheetTable {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        SheetTable {
            rows,
            origin: (0, 0),
        }
    }

    pub fn from_range(range: &Range<Data>) -> Self {
        SheetTable {
            rows: range
                .rows()
                .map(|row| row.iter().map(CellValue::from).collect())
                .collect(),
            origin: range.start().unwrap_or((0, 0)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(CellValue::is_empty))
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.rows
            .first()
            .and_then(|header| {
                header.iter().position(|cell| {
                    cell.as_text()
                        .map(|text| text.trim() == name)
                        .unwrap_or(false)
                })
            })
            .ok_or_else(|| HeatmapError::MissingColumn(name.to_string()))
    }

    /// Converts the data rows into records, keyed by the `Alveoli` and `Count` headers.
    pub fn records(&self) -> Result<Vec<RawRecord>> {
        let alveoli_col = self.column_index(ALVEOLI_COLUMN)?;
        let count_col = self.column_index(COUNT_COLUMN)?;

        let mut records = Vec::with_capacity(self.rows.len().saturating_sub(1));
        for (r, row) in self.rows.iter().enumerate().skip(1) {
            let cell = |c: usize| row.get(c).cloned().unwrap_or(CellValue::Empty);

            let alveoli = cell(alveoli_col).as_text();
            let count_cell = cell(count_col);
            let count = match count_cell.as_count() {
                Ok(count) => count,
                Err(()) => {
                    warn!(
                        "Row {}: non-numeric count {:?} treated as missing",
                        r + 1,
                        count_cell
                    );
                    None
                }
            };
            let extra = row
                .iter()
                .enumerate()
                .filter(|(c, _)| *c != alveoli_col && *c != count_col)
                .filter_map(|(_, value)| value.as_text())
                .collect();

            records.push(RawRecord {
                alveoli,
                count,
                extra,
            });
        }

        Ok(records)
    }
}

/// Reads CSV text into a table, keeping the header as the first row.
pub fn csv_table<R: Read>(reader: R) -> Result<SheetTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::from_field).collect());
    }

    Ok(SheetTable::new(rows))
}

/// Load records from a CSV file
///
/// The file must have a header row with `Alveoli` and `Count` columns; any
/// other columns are carried along untouched.
///
/// # Examples
/// ```no_run
/// use alveoli::loader::from_csv;
///
/// let records = from_csv("Alveolus_evolution_in_time_v3.csv").unwrap();
/// println!("{} rows", records.len());
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(filepath)?;
    csv_table(file)?.records()
}

/// Reads one sheet of a workbook file (xlsx, xls or ods) into a table.
pub fn workbook_table(filepath: impl AsRef<Path>, sheet_name: &str) -> Result<SheetTable> {
    let mut workbook = open_workbook_auto(filepath)?;

    if !workbook.sheet_names().iter().any(|name| name == sheet_name) {
        return Err(HeatmapError::SheetNotFound(sheet_name.to_string()));
    }

    let range = workbook.worksheet_range(sheet_name)?;
    Ok(SheetTable::from_range(&range))
}

/// Load records from sheet `sheet_name` of an Excel workbook
///
/// # Examples
/// ```no_run
/// use alveoli::loader::{from_excel, DEFAULT_SHEET};
///
/// let records = from_excel("Alveolus_evolution_in_time_v3.xlsx", DEFAULT_SHEET).unwrap();
/// println!("{} rows", records.len());
/// ```
pub fn from_excel(filepath: impl AsRef<Path>, sheet_name: &str) -> Result<Vec<RawRecord>> {
    workbook_table(filepath, sheet_name)?.records()
}

/// Decodes an uploaded file into a table.
///
/// CSV is recognised by the file name; anything else is handed to the
/// spreadsheet reader, which prefers `sheet_name` and falls back to the first
/// sheet.
pub fn decode_upload(file_name: &str, bytes: &[u8], sheet_name: &str) -> Result<SheetTable> {
    if bytes.is_empty() {
        return Err(HeatmapError::EmptyUpload);
    }

    let table = if file_extension(file_name).as_deref() == Some("csv") {
        csv_table(bytes)?
    } else {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let names = workbook.sheet_names();
        let chosen = names
            .iter()
            .find(|name| name.as_str() == sheet_name)
            .or_else(|| names.first())
            .cloned()
            .ok_or_else(|| HeatmapError::SheetNotFound(sheet_name.to_string()))?;
        debug!("Reading sheet {} of upload {}", chosen, file_name);
        let range = workbook.worksheet_range(&chosen)?;
        SheetTable::from_range(&range)
    };

    if table.is_empty() {
        return Err(HeatmapError::EmptyUpload);
    }
    Ok(table)
}

fn file_extension(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Detect file type and load records with the appropriate reader
///
/// `.csv` files go through [`from_csv`]; `.xlsx`, `.xlsm`, `.xls` and `.ods`
/// through [`from_excel`] reading `sheet_name`.
pub fn load_records(filepath: impl AsRef<Path>, sheet_name: &str) -> Result<Vec<RawRecord>> {
    let path = filepath.as_ref();

    match file_extension(path).as_deref() {
        Some("csv") => from_csv(path),
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => from_excel(path, sheet_name),
        Some(ext) => Err(HeatmapError::UnsupportedFormat(ext.to_string())),
        None => Err(HeatmapError::UnsupportedFormat(format!(
            "{} has no extension",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "Date,Alveoli,Count\n\
        2023-01-01,C1A1Ch1H1d1_A,5\n\
        2023-01-02,C1A1Ch1H2d1_B,3\n\
        2023-01-03,C2A4Ch7H1d1_A,\n\
        ,,\n\
        2023-01-04,XYZ,2.5\n";

    #[test]
    fn test_csv_records() {
        let records = csv_table(SAMPLE.as_bytes()).unwrap().records().unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[0].alveoli.as_deref(), Some("C1A1Ch1H1d1_A"));
        assert_eq!(records[0].count, Some(5.0));
        assert_eq!(records[0].extra, vec!["2023-01-01".to_string()]);
        assert_eq!(records[2].count, None);
        assert!(records[3].is_blank());
        assert_eq!(records[4].count, Some(2.5));
    }

    #[test]
    fn test_missing_header() {
        let err = csv_table("Location,Count\nC1A1Ch1H1d1_A,1\n".as_bytes())
            .unwrap()
            .records()
            .unwrap_err();
        assert!(matches!(err, HeatmapError::MissingColumn(ref c) if c == "Alveoli"));
    }

    #[test]
    fn test_non_numeric_count_is_missing() {
        let records = csv_table("Alveoli,Count\nC1A1Ch1H1d1_A,lots\nC1A1Ch1H1d1_A,NaN\n".as_bytes())
            .unwrap()
            .records()
            .unwrap();
        assert_eq!(records[0].count, None);
        assert_eq!(records[1].count, None);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let records = csv_table("Alveoli,Count,Note\nC1A1Ch1H1d1_A\n".as_bytes())
            .unwrap()
            .records()
            .unwrap();
        assert_eq!(records[0].count, None);
        assert!(records[0].extra.is_empty());
    }

    #[test]
    fn test_load_records_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let records = load_records(file.path(), DEFAULT_SHEET).unwrap();
        assert_eq!(records.len(), 5);

        let err = load_records("data.txt", DEFAULT_SHEET).unwrap_err();
        assert!(matches!(err, HeatmapError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = load_records("does/not/exist.csv", DEFAULT_SHEET).unwrap_err();
        assert!(matches!(err, HeatmapError::Io(_)));
    }

    #[test]
    fn test_decode_csv_upload() {
        let table = decode_upload("counts.CSV", SAMPLE.as_bytes(), DEFAULT_SHEET).unwrap();
        assert_eq!(table.rows.len(), 6);
        assert_eq!(table.rows[1][2], CellValue::Number(5.0));

        let err = decode_upload("counts.csv", b"", DEFAULT_SHEET).unwrap_err();
        assert!(matches!(err, HeatmapError::EmptyUpload));
    }

    #[test]
    fn test_decode_garbage_workbook_fails() {
        assert!(decode_upload("counts.xlsx", b"not a workbook", DEFAULT_SHEET).is_err());
    }
}
