use crate::location::{AISLES, FLAT_WIDTH, LocationCode, ParseLocationError, Side};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// A row as read from the source table, before any filtering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRecord {
    /// Value of the `Alveoli` column, `None` when the cell is blank
    pub alveoli: Option<String>,
    /// Value of the `Count` column, `None` when blank or non-numeric
    pub count: Option<f64>,
    /// Non-empty values of every other column
    pub extra: Vec<String>,
}

impl RawRecord {
    pub fn is_blank(&self) -> bool {
        self.alveoli.is_none() && self.count.is_none() && self.extra.is_empty()
    }
}

/// A row that survived preprocessing and takes part in aggregation.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub alveoli: String,
    pub count: f64,
}

impl Record {
    pub fn new(alveoli: impl Into<String>, count: f64) -> Self {
        Record {
            alveoli: alveoli.into(),
            count,
        }
    }
}

/// Dense aisle × (column, channel) grid of summed counts with a parallel label grid.
///
/// Row `r` holds aisle `r + 1`; column `c` holds the flattened
/// `(column - 1) * 12 + (channel - 1)` index.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct HeatmapGrid {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
    pub labels: Vec<Option<String>>,
}

impl HeatmapGrid {
    pub fn new() -> Self {
        let rows = AISLES as usize;
        let cols = FLAT_WIDTH;
        HeatmapGrid {
            rows,
            cols,
            values: vec![0.0; rows * cols],
            labels: vec![None; rows * cols],
        }
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[self.index(row, col)]
    }

    pub fn label(&self, row: usize, col: usize) -> Option<&str> {
        self.labels[self.index(row, col)].as_deref()
    }

    /// Value of the cell fed by `(aisle, column, channel)`, all 1-based.
    pub fn cell(&self, aisle: u32, column: u32, channel: u32) -> Option<f64> {
        let code = LocationCode {
            column,
            aisle,
            channel,
            height: 0,
            depth: 0,
            side: Side::A,
        };
        code.grid_position().map(|(r, c)| self.value(r, c))
    }

    /// Adds `count` into the cell of `code` and overwrites its label.
    ///
    /// Returns `false` and leaves the grid untouched when the code lies outside it.
    pub fn accumulate(&mut self, code: &LocationCode, count: f64) -> bool {
        let Some((row, col)) = code.grid_position() else {
            return false;
        };
        let index = self.index(row, col);
        self.values[index] += count;
        self.labels[index] = Some(format!(
            "{}<br>Count: {}",
            code.cell_name(),
            format_count(count)
        ));
        true
    }

    /// Rows of values, aisle 1 first.
    pub fn value_rows(&self) -> Vec<Vec<f64>> {
        self.values.chunks(self.cols).map(|r| r.to_vec()).collect()
    }

    /// Rows of hover labels, aisle 1 first; empty cells become empty strings.
    pub fn label_rows(&self) -> Vec<Vec<String>> {
        self.labels
            .chunks(self.cols)
            .map(|r| r.iter().map(|l| l.clone().unwrap_or_default()).collect())
            .collect()
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().cloned().fold(0.0, f64::max)
    }

    pub fn min_value(&self) -> f64 {
        self.values.iter().cloned().fold(f64::INFINITY, f64::min).min(0.0)
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

impl Default for HeatmapGrid {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters and diagnostics of one aggregation pass.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct AggregationSummary {
    /// Rows considered after preprocessing
    pub total_entries: usize,
    /// Rows that landed in a grid cell
    pub matched_entries: usize,
    /// Alveoli strings that did not match the pattern
    pub unmatched: Vec<String>,
    /// Alveoli strings that matched but address no grid cell
    pub out_of_range: Vec<String>,
}

impl AggregationSummary {
    pub fn all_matched(&self) -> bool {
        self.total_entries == self.matched_entries
    }
}

/// Result of aggregating a table of records.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Aggregation {
    pub grid: HeatmapGrid,
    pub summary: AggregationSummary,
}

/// Drops rows with a missing count and rows that are entirely empty.
pub fn preprocess(rows: &[RawRecord]) -> Vec<Record> {
    rows.iter()
        .filter(|row| !row.is_blank())
        .filter_map(|row| {
            let count = row.count?;
            Some(Record {
                alveoli: row.alveoli.clone().unwrap_or_default(),
                count,
            })
        })
        .collect()
}

/// Parses every record's location and sums its count into the grid.
///
/// Records that do not parse, or parse to a location outside the grid, are
/// logged and skipped; the pass always runs to completion.
pub fn aggregate(records: &[Record]) -> Aggregation {
    let mut grid = HeatmapGrid::new();
    let mut summary = AggregationSummary {
        total_entries: records.len(),
        ..Default::default()
    };

    for record in records {
        match LocationCode::parse(&record.alveoli) {
            Ok(code) => {
                if grid.accumulate(&code, record.count) {
                    summary.matched_entries += 1;
                } else {
                    warn!("Alveoli string outside the grid: {}", record.alveoli);
                    summary.out_of_range.push(record.alveoli.clone());
                }
            }
            Err(ParseLocationError::Overflow) => {
                warn!("Alveoli string outside the grid: {}", record.alveoli);
                summary.out_of_range.push(record.alveoli.clone());
            }
            Err(ParseLocationError::NoMatch) => {
                warn!("No match for Alveoli string: {}", record.alveoli);
                summary.unmatched.push(record.alveoli.clone());
            }
        }
    }

    info!("Total entries: {}", summary.total_entries);
    info!("Matched entries: {}", summary.matched_entries);
    if !summary.all_matched() {
        warn!("Some entries did not match the regular expression and were not processed.");
    }
    debug!("Grid total: {}", grid.total());

    Aggregation { grid, summary }
}

/// Convenience wrapper running [`preprocess`] then [`aggregate`].
pub fn aggregate_rows(rows: &[RawRecord]) -> Aggregation {
    let records = preprocess(rows);
    aggregate(&records)
}

/// Formats a count the way it appears in labels: integral values have no fraction.
pub fn format_count(count: f64) -> String {
    if count.is_finite() && count.fract() == 0.0 && count.abs() < 1e15 {
        format!("{}", count as i64)
    } else {
        format!("{}", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(alveoli: Option<&str>, count: Option<f64>) -> RawRecord {
        RawRecord {
            alveoli: alveoli.map(str::to_string),
            count,
            extra: Vec::new(),
        }
    }

    #[test]
    fn test_same_cell_sums_and_last_label_wins() {
        let records = vec![
            Record::new("C1A1Ch1H1d1_A", 5.0),
            Record::new("C1A1Ch1H2d1_B", 3.0),
        ];
        let result = aggregate(&records);

        assert_eq!(result.grid.cell(1, 1, 1), Some(8.0));
        assert_eq!(result.grid.label(0, 0), Some("C1A1Ch1<br>Count: 3"));
        assert_eq!(result.summary.total_entries, 2);
        assert_eq!(result.summary.matched_entries, 2);
        assert!(result.summary.all_matched());
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let mut records = vec![
            Record::new("C2A3Ch4H1d1_A", 1.5),
            Record::new("C2A3Ch4H1d2_A", 2.0),
            Record::new("C8A15Ch12H1d1_B", 7.0),
            Record::new("C2A3Ch4H3d1_B", 4.0),
        ];
        let forward = aggregate(&records);
        records.reverse();
        let backward = aggregate(&records);

        assert_eq!(forward.grid.values, backward.grid.values);
        assert_eq!(forward.grid.cell(3, 2, 4), Some(7.5));
        assert_eq!(forward.grid.cell(15, 8, 12), Some(7.0));
        assert_eq!(forward.grid.value(14, 95), 7.0);
    }

    #[test]
    fn test_unmatched_leaves_grid_unchanged() {
        let result = aggregate(&[Record::new("XYZ", 10.0)]);

        assert_eq!(result.grid, HeatmapGrid::new());
        assert_eq!(result.summary.total_entries, 1);
        assert_eq!(result.summary.matched_entries, 0);
        assert_eq!(result.summary.unmatched, vec!["XYZ".to_string()]);
        assert!(result.summary.out_of_range.is_empty());
    }

    #[test]
    fn test_out_of_range_column_rejected() {
        let result = aggregate(&[
            Record::new("C9A1Ch1H1d1_A", 5.0),
            Record::new("C1A16Ch1H1d1_A", 2.0),
            Record::new("C1A1Ch1H1d1_A", 1.0),
        ]);

        assert_eq!(result.grid.total(), 1.0);
        assert_eq!(result.summary.matched_entries, 1);
        assert_eq!(
            result.summary.out_of_range,
            vec!["C9A1Ch1H1d1_A".to_string(), "C1A16Ch1H1d1_A".to_string()]
        );
        assert!(result.summary.unmatched.is_empty());
    }

    #[test]
    fn test_missing_count_is_dropped() {
        let rows = vec![
            raw(Some("C1A1Ch1H1d1_A"), Some(4.0)),
            raw(Some("C1A1Ch1H1d1_A"), None),
            raw(None, None),
            raw(Some("C1A2Ch1H1d1_A"), None),
        ];
        let result = aggregate_rows(&rows);

        assert_eq!(result.summary.total_entries, 1);
        assert_eq!(result.summary.matched_entries, 1);
        assert_eq!(result.grid.cell(1, 1, 1), Some(4.0));
        assert_eq!(result.grid.cell(2, 1, 1), Some(0.0));
    }

    #[test]
    fn test_missing_alveoli_counts_as_unmatched() {
        let result = aggregate_rows(&[raw(None, Some(3.0))]);
        assert_eq!(result.summary.total_entries, 1);
        assert_eq!(result.summary.unmatched, vec![String::new()]);
    }

    #[test]
    fn test_blank_rows_are_dropped() {
        let mut with_extra = raw(None, None);
        with_extra.extra.push("note".to_string());

        assert!(raw(None, None).is_blank());
        assert!(!with_extra.is_blank());
        assert!(preprocess(&[raw(None, None), with_extra]).is_empty());
    }

    #[test]
    fn test_label_rows_shape() {
        let result = aggregate(&[Record::new("C1A2Ch2H1d1_A", 2.5)]);
        let labels = result.grid.label_rows();

        assert_eq!(labels.len(), 15);
        assert!(labels.iter().all(|r| r.len() == 96));
        assert_eq!(labels[1][1], "C1A2Ch2<br>Count: 2.5");
        assert_eq!(labels[0][0], "");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(3.0), "3");
        assert_eq!(format_count(-2.0), "-2");
        assert_eq!(format_count(2.5), "2.5");
    }
}
