//! Reference dictionaries injected into the enrichment pass.

use crate::error::{FlattenError, Result};
use crate::fuzzy::token_set_ratio;
use crate::table::{Table, TableValue};
use crate::utils::collapse_whitespace;
use crate::workbook::{read_active_sheet, Worksheet};
use log::debug;
use std::collections::HashSet;
use std::path::Path;

/// Header names the object column of the reference workbook is known by.
pub const OBJECT_NAME_HEADERS: [&str; 4] = [
    "исходное наименование",
    "наименование объекта",
    "source name",
    "object name",
];

const HEADER_THRESHOLD: f64 = 0.6;

fn dedup(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| collapse_whitespace(&v))
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Canonical object (estate) names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstateDictionary {
    names: Vec<String>,
}

impl EstateDictionary {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: dedup(names.into_iter().map(Into::into)),
        }
    }

    pub fn from_workbook(path: impl AsRef<Path>) -> Result<Self> {
        let sheet = read_active_sheet(path)?;
        Self::from_worksheet(&sheet)
    }

    /// The header row is the first row with text; the object column is the header that
    /// best resembles one of [`OBJECT_NAME_HEADERS`].
    pub fn from_worksheet(sheet: &Worksheet) -> Result<Self> {
        let missing = || FlattenError::MissingColumn(OBJECT_NAME_HEADERS.join(" / "));

        let header_row = (0..sheet.row_count())
            .find(|r| (0..sheet.row(*r).len()).any(|c| !sheet.text(*r, c).is_empty()))
            .ok_or_else(missing)?;

        let (col, score) = (0..sheet.row(header_row).len())
            .map(|c| {
                let header = sheet.text(header_row, c);
                let score = OBJECT_NAME_HEADERS
                    .iter()
                    .map(|known| token_set_ratio(&header, known))
                    .fold(0.0, f64::max);
                (c, score)
            })
            .fold(None, |best: Option<(usize, f64)>, (c, score)| match best {
                Some((_, b)) if b >= score => best,
                _ => Some((c, score)),
            })
            .ok_or_else(missing)?;
        if score < HEADER_THRESHOLD {
            return Err(missing());
        }
        debug!("Object names in column {} (header score {:.2})", col, score);

        let names = (header_row + 1..sheet.row_count()).map(|r| sheet.text(r, col));
        Ok(Self { names: dedup(names) })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Canonical category terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTerms {
    terms: Vec<String>,
}

impl CategoryTerms {
    pub fn new<S: Into<String>>(terms: impl IntoIterator<Item = S>) -> Self {
        Self {
            terms: dedup(terms.into_iter().map(Into::into)),
        }
    }

    /// Terms from the named column of a table.
    pub fn from_table(table: &Table, column: &str) -> Result<Self> {
        let values = table.column_values(column)?;
        Ok(Self {
            terms: dedup(values.into_iter().filter_map(|v| match v {
                TableValue::Empty => None,
                other => Some(other.to_string()),
            })),
        })
    }

    /// Terms from the named column of a CSV file with a header line.
    pub fn from_csv_path(path: impl AsRef<Path>, column: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let index = reader
            .headers()?
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| FlattenError::MissingColumn(column.to_string()))?;

        let mut terms = Vec::new();
        for record in reader.records() {
            if let Some(value) = record?.get(index) {
                terms.push(value.to_string());
            }
        }
        Ok(Self { terms: dedup(terms) })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
