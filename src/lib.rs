//! # Ledger Sheet Flattener
//!
//! A library for flattening semi-structured accounting spreadsheets (trial
//! balances, revenue statements, supplier ledgers) into normalized long-format
//! records.
//!
//! ## Core Concepts
//!
//! - **Fill colors as structure**: the exports carry their hierarchy only in cell
//!   background colors, so every cell is read together with its fill token
//! - **Hierarchy context**: the current section / company / account / sub-level,
//!   folded across the rows of a sheet by pure transitions
//! - **Layouts**: every fixed cell, column offset, color variant and keyword list
//!   is a field of a serde layout struct with empirical defaults
//! - **Enrichment**: multi-line ledger cells are split into items and each item is
//!   resolved into a semantic role (partner, contract, bank account, ...)
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledger_sheet_flattener::*;
//!
//! let records = parse_supplier_ledger("reports/60_march.xlsx")?;
//! let enricher = Enricher::new(
//!     EstateDictionary::from_workbook("reference/objects.xlsx")?,
//!     CategoryTerms::from_csv_path("reference/categories.csv", "Категория")?,
//! );
//! let enriched = enricher.enrich(&records);
//! Table::from_records(&enriched).write_csv_path("out/60_march.csv")?;
//!
//! let batch = collect_folder("reports/statements", |p: &std::path::Path| parse_statement(p))?;
//! println!("{} rows, {} files failed", batch.table.len(), batch.failed());
//! ```

pub mod batch;
pub mod classifier;
pub mod convert;
pub mod enrichment;
pub mod error;
pub mod fuzzy;
pub mod hierarchy;
pub mod income;
pub mod layout;
pub mod names;
pub mod reference;
pub mod schema;
pub mod statement;
pub mod supplier_ledger;
pub mod table;
pub mod utils;
pub mod workbook;

pub use batch::{collect_folder, find_workbooks, BatchFailure, BatchReport, FILE_COLUMN};
pub use classifier::{classify, CellSignature, ColorRule, ColorTable, FillCategory, FillMatch};
pub use convert::{convert_legacy_workbooks, ConversionReport, ConverterConfig};
pub use enrichment::Enricher;
pub use error::{FlattenError, Result};
pub use fuzzy::{best_match, token_set_ratio};
pub use hierarchy::{walk, HierarchyContext, Level, RowClass, RowView};
pub use income::{parse_income, parse_income_with_layout, parse_income_worksheet};
pub use layout::*;
pub use names::normalize_name;
pub use reference::{CategoryTerms, EstateDictionary};
pub use schema::*;
pub use statement::{parse_statement, parse_statement_with_layout, parse_statement_worksheet};
pub use supplier_ledger::{
    parse_supplier_ledger, parse_supplier_ledger_with_layout, parse_supplier_ledger_worksheet,
};
pub use table::{Table, TableValue, TabularRecord, PREFERRED_COLUMNS};
pub use workbook::{read_active_sheet, Cell, CellValue, Workbook, Worksheet};

use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The report types this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    Statement,
    Income,
    SupplierLedger,
}

impl ReportKind {
    /// Parses one workbook with default layouts into a table.
    pub fn parse_table(self, path: &Path) -> Result<Table> {
        Ok(match self {
            ReportKind::Statement => Table::from_records(&parse_statement(path)?),
            ReportKind::Income => Table::from_records(&parse_income(path)?),
            ReportKind::SupplierLedger => Table::from_records(&parse_supplier_ledger(path)?),
        })
    }

    /// Parses every workbook under `root` as this report type.
    pub fn collect(self, root: impl AsRef<Path>) -> Result<BatchReport> {
        match self {
            ReportKind::Statement => collect_folder(root, |p: &Path| parse_statement(p)),
            ReportKind::Income => collect_folder(root, |p: &Path| parse_income(p)),
            ReportKind::SupplierLedger => collect_folder(root, |p: &Path| parse_supplier_ledger(p)),
        }
    }
}

/// Supplier ledger parse followed by the enrichment pass.
pub fn parse_and_enrich_supplier_ledger(
    path: impl AsRef<Path>,
    enricher: &Enricher,
) -> Result<Vec<EnrichedRecord>> {
    let path = path.as_ref();
    let records = parse_supplier_ledger(path)?;
    let enriched = enricher.enrich(&records);
    info!(
        "Enriched {} ledger records from {}",
        enriched.len(),
        path.display()
    );
    Ok(enriched)
}
