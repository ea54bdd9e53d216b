use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Serial day of 1970-01-01 in the spreadsheet date system.
pub const SPREADSHEET_UNIX_EPOCH_SERIAL: f64 = 25569.0;

/// A single cell of a raw import table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Classifies a textual cell. Plain decimals such as `44927` or
    /// `44927.0` become numbers; identifiers like `007` and exponent
    /// forms stay text.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if !is_plain_decimal(trimmed) {
            return Cell::Text(raw.to_string());
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Cell::Number(value),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number(s),
            Cell::Empty => None,
        }
    }
}

/// `-?digits(.digits)?` without a leading zero in the integer part.
fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(integer) || (integer.len() > 1 && integer.starts_with('0')) {
        return false;
    }
    fraction.is_none_or(digits)
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// A rectangular import: header in row 0, data rows after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub header: Vec<Cell>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(header: Vec<Cell>, rows: Vec<Vec<Cell>>) -> Self {
        Self { header, rows }
    }

    /// Splits a grid whose first row is the header.
    pub fn from_grid(mut grid: Vec<Vec<Cell>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let header = grid.remove(0);
        Self { header, rows: grid }
    }

    /// Row count including the header, zero for an empty grid.
    pub fn total_rows(&self) -> usize {
        if self.header.is_empty() && self.rows.is_empty() {
            0
        } else {
            self.rows.len() + 1
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}

/// Converts a spreadsheet serial day into a calendar date.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    let days = (serial - SPREADSHEET_UNIX_EPOCH_SERIAL).floor();
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    if days >= 0.0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new((-days) as u64))
    }
}

pub fn format_dotted_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

pub fn parse_dotted_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%d.%m.%Y").ok()
}

/// Percentage of `actual` against `planned`, two decimals; zero when nothing was planned.
pub fn ratio_percentage(planned: Option<f64>, actual: Option<f64>) -> String {
    let planned = planned.unwrap_or(0.0);
    let actual = actual.unwrap_or(0.0);
    let percentage = if planned != 0.0 {
        actual / planned * 100.0
    } else {
        0.0
    };
    let rendered = format!("{percentage:.2}");
    if rendered == "-0.00" {
        "0.00".to_string()
    } else {
        rendered
    }
}
