//! Row-by-row walk over a worksheet that carries the current hierarchy context.
//!
//! The context is a plain value folded across the rows: header rows produce a
//! new context through [`transition`], total and data rows are handed to an
//! emitter together with a snapshot of the context in force at that row.

use crate::classifier::CellSignature;
use crate::workbook::Worksheet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Hierarchy levels from outermost to innermost.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum Level {
    Section,
    Company,
    Account,
    SubLevel,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Section, Level::Company, Level::Account, Level::SubLevel];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyContext {
    slots: [Option<String>; 4],
}

impl HierarchyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with a company read from the sheet header.
    pub fn with_company(company: Option<String>) -> Self {
        let mut ctx = Self::default();
        ctx.slots[Level::Company.index()] = company;
        ctx
    }

    pub fn get(&self, level: Level) -> Option<&str> {
        self.slots[level.index()].as_deref()
    }

    pub fn section(&self) -> Option<&str> {
        self.get(Level::Section)
    }

    pub fn company(&self) -> Option<&str> {
        self.get(Level::Company)
    }

    pub fn account(&self) -> Option<&str> {
        self.get(Level::Account)
    }

    pub fn sub_level(&self) -> Option<&str> {
        self.get(Level::SubLevel)
    }

    /// Enters a header of `level`: that slot takes `label`, every deeper slot is cleared,
    /// outer slots are left untouched.
    pub fn enter(&self, level: Level, label: &str) -> Self {
        let mut next = self.clone();
        let label = label.trim();
        next.slots[level.index()] = if label.is_empty() {
            None
        } else {
            Some(label.to_string())
        };
        for deeper in Level::ALL.iter().filter(|l| **l > level) {
            next.slots[deeper.index()] = None;
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowClass {
    Header { level: Level, label: String },
    Total,
    Data,
    Skip,
}

/// Context after a row of the given class. Only headers change it.
pub fn transition(ctx: &HierarchyContext, class: &RowClass) -> HierarchyContext {
    match class {
        RowClass::Header { level, label } => ctx.enter(*level, label),
        _ => ctx.clone(),
    }
}

/// Borrowed view of one worksheet row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub sheet: &'a Worksheet,
    pub index: usize,
}

impl<'a> RowView<'a> {
    pub fn text(&self, col: usize) -> String {
        self.sheet.text(self.index, col)
    }

    pub fn raw_text(&self, col: usize) -> String {
        self.sheet.raw_text(self.index, col)
    }

    pub fn signature(&self, col: usize) -> CellSignature<'a> {
        self.sheet.signature(self.index, col)
    }

    pub fn is_blank(&self, cols: &[usize]) -> bool {
        cols.iter()
            .all(|c| self.sheet.value(self.index, *c).is_empty())
    }
}

/// Folds the hierarchy context over `rows`, collecting whatever `emit` returns for
/// total and data rows, in source order.
pub fn walk<T, C, E, I>(
    sheet: &Worksheet,
    rows: Range<usize>,
    initial: HierarchyContext,
    mut classify_row: C,
    mut emit: E,
) -> Vec<T>
where
    C: FnMut(&RowView<'_>) -> RowClass,
    E: FnMut(&HierarchyContext, &RowView<'_>, &RowClass) -> I,
    I: IntoIterator<Item = T>,
{
    let mut ctx = initial;
    let mut out = Vec::new();

    for index in rows {
        let row = RowView { sheet, index };
        let class = classify_row(&row);
        match class {
            RowClass::Total | RowClass::Data => out.extend(emit(&ctx, &row, &class)),
            RowClass::Header { .. } => ctx = transition(&ctx, &class),
            RowClass::Skip => {}
        }
    }

    out
}
