//! Field-level conversion of raw text into typed values
//!
//! A [`FieldReader`] never stops at the first bad field. It records every
//! problem and hands back a placeholder so the caller can keep building;
//! [`FieldReader::finish`] then either returns the record or all the errors.

use crate::error::{FieldError, RecordParseError};
use crate::source::SourceRow;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%d-%b-%Y", "%Y-%m-%d"];

/// Parse a RIF date: `yyyyMMdd`, `dd-MMM-yyyy` or ISO `yyyy-MM-dd`
pub fn parse_date(text: &str) -> Result<NaiveDate, String> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .ok_or_else(|| format!("invalid date '{}'", text))
}

pub fn parse_decimal(text: &str) -> Result<BigDecimal, String> {
    BigDecimal::from_str(text.trim()).map_err(|e| format!("invalid decimal '{}': {}", text, e))
}

fn parse_int(text: &str) -> Result<i32, String> {
    text.trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid integer '{}': {}", text, e))
}

fn parse_char(text: &str) -> Result<char, String> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single character, got '{}'", text)),
    }
}

/// Collects typed values and field errors for one row
pub struct FieldReader<'a> {
    row: &'a SourceRow,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    pub fn new(row: &'a SourceRow) -> Self {
        Self {
            row,
            errors: Vec::new(),
        }
    }

    pub fn row_number(&self) -> u64 {
        self.row.row_number()
    }

    fn push_error(&mut self, column: &str, message: String) {
        self.errors.push(FieldError {
            column: column.to_string(),
            message,
        });
    }

    /// A value that must be present and parse
    pub fn required<T: Default>(
        &mut self,
        column: &str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> T {
        match self.row.get(column) {
            None => {
                self.push_error(column, "required value is missing".to_string());
                T::default()
            },
            Some(text) => parse(text).unwrap_or_else(|message| {
                self.push_error(column, message);
                T::default()
            }),
        }
    }

    /// A value that may be absent but must parse when present
    pub fn optional<T>(
        &mut self,
        column: &str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Option<T> {
        let text = self.row.get(column)?;
        match parse(text) {
            Ok(value) => Some(value),
            Err(message) => {
                self.push_error(column, message);
                None
            },
        }
    }

    pub fn string(&mut self, column: &str) -> String {
        self.required(column, |v| Ok(v.to_string()))
    }

    pub fn opt_string(&mut self, column: &str) -> Option<String> {
        self.row.get(column).map(str::to_string)
    }

    pub fn date(&mut self, column: &str) -> NaiveDate {
        self.required(column, parse_date)
    }

    pub fn opt_date(&mut self, column: &str) -> Option<NaiveDate> {
        self.optional(column, parse_date)
    }

    pub fn decimal(&mut self, column: &str) -> BigDecimal {
        self.required(column, parse_decimal)
    }

    pub fn opt_decimal(&mut self, column: &str) -> Option<BigDecimal> {
        self.optional(column, parse_decimal)
    }

    pub fn int(&mut self, column: &str) -> i32 {
        self.required(column, parse_int)
    }

    pub fn opt_int(&mut self, column: &str) -> Option<i32> {
        self.optional(column, parse_int)
    }

    pub fn char(&mut self, column: &str) -> char {
        self.required(column, parse_char)
    }

    pub fn opt_char(&mut self, column: &str) -> Option<char> {
        self.optional(column, parse_char)
    }

    /// Take over the errors of a reader for another row of the same record
    pub fn absorb(&mut self, other: FieldReader<'_>) {
        let row_number = other.row_number();
        let same_row = row_number == self.row_number();
        self.errors.extend(other.errors.into_iter().map(|mut error| {
            if !same_row {
                error.column = format!("{} (row {})", error.column, row_number);
            }
            error
        }));
    }

    pub fn finish<T>(self, value: T) -> Result<T, RecordParseError> {
        if self.errors.is_empty() {
            return Ok(value);
        }
        Err(RecordParseError {
            row_number: self.row.row_number(),
            message: format!("{} field(s) could not be parsed", self.errors.len()),
            errors: self.errors,
        })
    }
}
