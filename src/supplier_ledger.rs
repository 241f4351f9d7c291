//! Supplier ledger ("Карточка счета") parser.
//!
//! Column positions of the debit and credit sides are detected from the header
//! text rather than assumed, and each source row yields one record per side that
//! carries an amount.

use crate::error::{FlattenError, Result};
use crate::layout::{LedgerLayout, SideColumns};
use crate::schema::{DtCr, LedgerRecord};
use crate::utils::{cell_number, collapse_whitespace, non_empty, parse_day_first_date, split_lines};
use crate::workbook::{read_active_sheet, Worksheet};
use log::{debug, info, warn};
use regex::Regex;
use std::path::Path;

/// Everything read from the header block before the rows are walked.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerHeader {
    pub company: Option<String>,
    pub start_row: usize,
    pub debit: SideColumns,
    pub credit: SideColumns,
}

pub fn parse_supplier_ledger(path: impl AsRef<Path>) -> Result<Vec<LedgerRecord>> {
    parse_supplier_ledger_with_layout(path, &LedgerLayout::default())
}

pub fn parse_supplier_ledger_with_layout(
    path: impl AsRef<Path>,
    layout: &LedgerLayout,
) -> Result<Vec<LedgerRecord>> {
    let path = path.as_ref();
    let sheet = read_active_sheet(path)?;
    let records = parse_supplier_ledger_worksheet(&sheet, layout)?;
    info!(
        "Parsed supplier ledger {}: {} records",
        path.display(),
        records.len()
    );
    Ok(records)
}

pub fn parse_supplier_ledger_worksheet(
    sheet: &Worksheet,
    layout: &LedgerLayout,
) -> Result<Vec<LedgerRecord>> {
    let account_code = Regex::new(&layout.account_code_pattern)
        .map_err(|e| FlattenError::InvalidLayout(format!("account_code_pattern: {}", e)))?;
    let header = detect_header(sheet, layout);

    let end = sheet.last_row().map(|r| r + 1).unwrap_or(0);
    let mut records = Vec::new();
    for row in header.start_row..end {
        records.extend(parse_row(sheet, row, &header, layout, &account_code));
    }
    Ok(records)
}

pub fn detect_header(sheet: &Worksheet, layout: &LedgerLayout) -> LedgerHeader {
    let company = find_company(sheet, layout);
    if company.is_none() {
        warn!("No company name found in the ledger header");
    }

    let start_row = find_start_row(sheet, layout).unwrap_or_else(|| {
        warn!(
            "Opening balance marker not found, starting at row {}",
            layout.default_start_row + 1
        );
        layout.default_start_row
    });

    let scan_limit = start_row.max(layout.default_start_row);
    let debit = find_side_columns(sheet, &layout.debit_headers, layout, scan_limit)
        .unwrap_or_else(|| {
            warn!("Debit columns not detected, using defaults");
            layout.default_debit
        });
    let credit = find_side_columns(sheet, &layout.credit_headers, layout, scan_limit)
        .unwrap_or_else(|| {
            warn!("Credit columns not detected, using defaults");
            layout.default_credit
        });

    debug!(
        "Ledger header: company {:?}, start row {}, debit {:?}, credit {:?}",
        company, start_row, debit, credit
    );

    LedgerHeader {
        company,
        start_row,
        debit,
        credit,
    }
}

fn find_company(sheet: &Worksheet, layout: &LedgerLayout) -> Option<String> {
    let excluded: Vec<String> = layout.company_exclude.iter().map(|k| k.to_lowercase()).collect();
    for row in 0..layout.company_scan_rows {
        for col in 0..layout.company_scan_cols {
            let text = collapse_whitespace(&sheet.text(row, col));
            if text.is_empty() {
                continue;
            }
            let lower = text.to_lowercase();
            if !excluded.iter().any(|k| lower.contains(k.as_str())) {
                return Some(text);
            }
        }
    }
    None
}

/// Row after the one carrying the opening-balance marker.
fn find_start_row(sheet: &Worksheet, layout: &LedgerLayout) -> Option<usize> {
    let marker = layout.opening_balance_marker.to_lowercase();
    let rows = layout.start_scan_rows.min(sheet.row_count());
    (0..rows)
        .find(|row| {
            (0..sheet.row(*row).len()).any(|col| sheet.text(*row, col).to_lowercase().contains(&marker))
        })
        .map(|row| row + 1)
}

/// A side header ("Дебет"/"Дт") with the account sub-header right below it.
fn find_side_columns(
    sheet: &Worksheet,
    headers: &[String],
    layout: &LedgerLayout,
    scan_limit: usize,
) -> Option<SideColumns> {
    let headers: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let subheader = layout.account_subheader.to_lowercase();

    for row in 0..scan_limit.min(sheet.row_count()) {
        for col in 0..sheet.row(row).len() {
            let text = sheet.text(row, col).to_lowercase();
            if !headers.contains(&text) {
                continue;
            }
            if sheet.text(row + 1, col).to_lowercase().contains(&subheader) {
                return Some(SideColumns {
                    account_col: col,
                    sum_col: col + 1,
                });
            }
        }
    }
    None
}

fn parse_row(
    sheet: &Worksheet,
    row: usize,
    header: &LedgerHeader,
    layout: &LedgerLayout,
    account_code: &Regex,
) -> Vec<LedgerRecord> {
    let lines = |col: usize| split_lines(&sheet.raw_text(row, col), &layout.placeholders);
    let doc = lines(layout.doc_col);
    let an_dt = lines(layout.an_dt_col);
    let an_cr = lines(layout.an_cr_col);
    let date = parse_day_first_date(sheet.value(row, layout.date_col));

    let context = [layout.date_col, layout.doc_col, layout.an_dt_col, layout.an_cr_col]
        .iter()
        .map(|col| sheet.raw_text(row, *col).to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let is_total = layout
        .total_keywords
        .iter()
        .any(|k| context.contains(&k.to_lowercase()));

    [(DtCr::Debit, header.debit), (DtCr::Credit, header.credit)]
        .into_iter()
        .filter_map(|(side, columns)| {
            let (account, value) = read_side(sheet, row, columns, is_total, account_code)?;
            Some(LedgerRecord {
                date,
                company: header.company.clone(),
                doc: doc.clone(),
                an_dt: an_dt.clone(),
                an_cr: an_cr.clone(),
                dt_cr: side,
                account,
                value,
            })
        })
        .collect()
}

/// Account and amount of one side, or `None` when the side carries no amount.
///
/// On total rows a merged cell can push the amount into the account column; such
/// content is taken as the amount when it does not look like an account code.
pub fn read_side(
    sheet: &Worksheet,
    row: usize,
    columns: SideColumns,
    is_total: bool,
    account_code: &Regex,
) -> Option<(Option<String>, f64)> {
    let account = collapse_whitespace(&sheet.text(row, columns.account_col));
    let sum = sheet.value(row, columns.sum_col);

    if let Some(value) = cell_number(sum) {
        return Some((non_empty(account), value));
    }

    let spilled = sum.is_empty() && is_total && !account.is_empty() && !account_code.is_match(&account);
    if !spilled {
        return None;
    }
    let value = cell_number(sheet.value(row, columns.account_col))?;
    Some((None, value))
}
