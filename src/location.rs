use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref ALVEOLI_REGEX: Regex =
        Regex::new(r"C(\d+)A(\d+)Ch(\d+)H(\d+)d(\d+)_([AB])").unwrap();
}

/// Number of storage columns along the flattened x axis.
pub const COLUMNS: u32 = 8;

/// Number of aisles, one grid row each.
pub const AISLES: u32 = 15;

/// Number of channels inside each column.
pub const CHANNELS: u32 = 12;

/// Width of the flattened column × channel axis.
pub const FLAT_WIDTH: usize = (COLUMNS * CHANNELS) as usize;

/// Side of the rack an alveolus opens on.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// A parsed alveoli string, `C<col>A<aisle>Ch<channel>H<height>d<depth>_<side>`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LocationCode {
    pub column: u32,
    pub aisle: u32,
    pub channel: u32,
    pub height: u32,
    pub depth: u32,
    pub side: Side,
}

/// Why an alveoli string could not be turned into a [`LocationCode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseLocationError {
    /// The string does not contain the pattern at all.
    NoMatch,
    /// The pattern matched but a number does not fit in a `u32`.
    Overflow,
}

impl fmt::Display for ParseLocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseLocationError::NoMatch => write!(f, "no match for alveoli pattern"),
            ParseLocationError::Overflow => write!(f, "alveoli coordinate overflows u32"),
        }
    }
}

impl std::error::Error for ParseLocationError {}

impl LocationCode {
    /// Finds the first alveoli pattern inside `input`.
    ///
    /// The search is unanchored, so `"x C1A1Ch1H1d1_A y"` parses.
    pub fn parse(input: &str) -> Result<Self, ParseLocationError> {
        let caps = ALVEOLI_REGEX
            .captures(input)
            .ok_or(ParseLocationError::NoMatch)?;

        let number = |i: usize| -> Result<u32, ParseLocationError> {
            caps[i].parse().map_err(|_| ParseLocationError::Overflow)
        };

        let side = match &caps[6] {
            "A" => Side::A,
            _ => Side::B,
        };

        Ok(LocationCode {
            column: number(1)?,
            aisle: number(2)?,
            channel: number(3)?,
            height: number(4)?,
            depth: number(5)?,
            side,
        })
    }

    /// Index on the flattened column × channel axis, `(column-1)*12 + (channel-1)`.
    ///
    /// Returns `None` when the column or channel lies outside the grid.
    pub fn flat_index(&self) -> Option<usize> {
        if !(1..=COLUMNS).contains(&self.column) || !(1..=CHANNELS).contains(&self.channel) {
            return None;
        }
        Some(((self.column - 1) * CHANNELS + (self.channel - 1)) as usize)
    }

    /// Zero-based `(row, col)` of the grid cell this location feeds.
    pub fn grid_position(&self) -> Option<(usize, usize)> {
        if !(1..=AISLES).contains(&self.aisle) {
            return None;
        }
        let col = self.flat_index()?;
        Some(((self.aisle - 1) as usize, col))
    }

    /// Short cell name used in hover labels, e.g. `C1A1Ch1`.
    pub fn cell_name(&self) -> String {
        format!("C{}A{}Ch{}", self.column, self.aisle, self.channel)
    }
}

impl FromStr for LocationCode {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LocationCode::parse(s)
    }
}

impl fmt::Display for LocationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::A => 'A',
            Side::B => 'B',
        };
        write!(
            f,
            "C{}A{}Ch{}H{}d{}_{}",
            self.column, self.aisle, self.channel, self.height, self.depth, side
        )
    }
}

/// Category label of a flattened x index, e.g. `C1Ch1`.
pub fn flat_label(flat: usize) -> String {
    let column = flat / CHANNELS as usize + 1;
    let channel = flat % CHANNELS as usize + 1;
    format!("C{}Ch{}", column, channel)
}

/// Row label of a zero-based aisle index, e.g. `A1`.
pub fn aisle_label(row: usize) -> String {
    format!("A{}", row + 1)
}
