use crate::hierarchy::Level;
use crate::workbook::{Cell, CellValue, Worksheet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What a single cell contributes to row classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSignature<'a> {
    pub fill: Option<&'a str>,
    pub value: &'a CellValue,
    pub row: usize,
    pub col: usize,
}

/// Splits a cell into its fill token and value. Never fails.
pub fn classify(cell: &Cell) -> (Option<&str>, &CellValue) {
    (cell.fill.as_deref(), &cell.value)
}

impl Worksheet {
    /// Signature of the cell at `(row, col)`; missing cells read as empty and unfilled.
    pub fn signature(&self, row: usize, col: usize) -> CellSignature<'_> {
        let (fill, value) = match self.cell(row, col) {
            Some(cell) => classify(cell),
            None => (None, self.value(row, col)),
        };
        CellSignature {
            fill,
            value,
            row,
            col,
        }
    }
}

/// Logical meaning assigned to a fill color by one report type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum FillCategory {
    Section,
    Company,
    Account,
    #[serde(alias = "Object")]
    SubLevel,
    Total,
}

impl FillCategory {
    /// Hierarchy level entered by a header of this category; `None` for totals.
    pub fn level(self) -> Option<Level> {
        match self {
            FillCategory::Section => Some(Level::Section),
            FillCategory::Company => Some(Level::Company),
            FillCategory::Account => Some(Level::Account),
            FillCategory::SubLevel => Some(Level::SubLevel),
            FillCategory::Total => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum FillMatch {
    /// The cell style carries no fill at all.
    NoFill,
    /// A fill token, compared case-insensitively.
    Token(String),
}

impl FillMatch {
    pub fn token(token: &str) -> Self {
        FillMatch::Token(token.to_string())
    }

    pub fn matches(&self, fill: Option<&str>) -> bool {
        match (self, fill) {
            (FillMatch::NoFill, None) => true,
            (FillMatch::Token(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual.trim()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ColorRule {
    pub category: FillCategory,
    /// Every known rendering of this color across producing-application versions.
    pub fills: Vec<FillMatch>,
}

impl ColorRule {
    pub fn new(category: FillCategory, tokens: &[&str]) -> Self {
        Self {
            category,
            fills: tokens.iter().map(|t| FillMatch::token(t)).collect(),
        }
    }

    pub fn or_no_fill(mut self) -> Self {
        self.fills.push(FillMatch::NoFill);
        self
    }
}

/// Ordered fill-to-category table of one report type. The first matching rule wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema)]
pub struct ColorTable {
    pub rules: Vec<ColorRule>,
}

impl ColorTable {
    pub fn new(rules: Vec<ColorRule>) -> Self {
        Self { rules }
    }

    /// `None` means the color is unknown to this report and the row gets data-row treatment.
    pub fn category_of(&self, fill: Option<&str>) -> Option<FillCategory> {
        self.rules
            .iter()
            .find(|rule| rule.fills.iter().any(|m| m.matches(fill)))
            .map(|rule| rule.category)
    }
}
