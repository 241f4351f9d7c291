//! Revenue-recognition report parser.
//!
//! Section, company and object bands are told apart by fill color; detail rows
//! carry the document name, partner, a billing period range and the amount.

use crate::error::{FlattenError, Result};
use crate::hierarchy::{walk, HierarchyContext, RowClass, RowView};
use crate::layout::IncomeLayout;
use crate::schema::NormalizedRecord;
use crate::utils::{cell_number, collapse_whitespace, non_empty, parse_period_range};
use crate::workbook::{read_active_sheet, Worksheet};
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::Path;

/// Position of the table header found by [`find_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeHeader {
    pub row: usize,
    pub name_col: usize,
}

impl IncomeHeader {
    fn partner_col(&self, layout: &IncomeLayout) -> usize {
        self.name_col + layout.partner_offset
    }

    fn period_col(&self, layout: &IncomeLayout) -> usize {
        self.name_col + layout.period_offset
    }

    fn value_col(&self, layout: &IncomeLayout) -> usize {
        self.name_col + layout.value_offset
    }
}

struct StagedRecord {
    record: NormalizedRecord,
    total: bool,
}

pub fn parse_income(path: impl AsRef<Path>) -> Result<Vec<NormalizedRecord>> {
    parse_income_with_layout(path, &IncomeLayout::default())
}

pub fn parse_income_with_layout(
    path: impl AsRef<Path>,
    layout: &IncomeLayout,
) -> Result<Vec<NormalizedRecord>> {
    let path = path.as_ref();
    let sheet = read_active_sheet(path)?;
    let records = parse_income_worksheet(&sheet, layout)?;
    info!("Parsed income report {}: {} records", path.display(), records.len());
    Ok(records)
}

pub fn parse_income_worksheet(
    sheet: &Worksheet,
    layout: &IncomeLayout,
) -> Result<Vec<NormalizedRecord>> {
    let header = find_header(sheet, layout)?;
    debug!("Income header row {} at column {}", header.row, header.name_col);

    let end = sheet.last_row().map(|r| r + 1).unwrap_or(0);
    let staged = walk(
        sheet,
        header.row + 1..end.max(header.row + 1),
        HierarchyContext::new(),
        |row| classify_row(row, &header, layout),
        |ctx, row, class| Some(emit_row(ctx, row, class, &header, layout)),
    );

    let mut records = carry_total_dates(staged);
    records.retain(has_content);
    backfill_company(&mut records);
    Ok(records)
}

/// First row within the scan window holding the header marker.
pub fn find_header(sheet: &Worksheet, layout: &IncomeLayout) -> Result<IncomeHeader> {
    let marker = layout.header_marker.trim().to_lowercase();
    let rows = layout.header_scan_rows.min(sheet.row_count());

    (0..rows)
        .find_map(|row| {
            (0..sheet.row(row).len())
                .find(|col| sheet.text(row, *col).to_lowercase() == marker)
                .map(|name_col| IncomeHeader { row, name_col })
        })
        .ok_or_else(|| FlattenError::HeaderRowNotFound(layout.header_marker.clone()))
}

fn classify_row(row: &RowView<'_>, header: &IncomeHeader, layout: &IncomeLayout) -> RowClass {
    let name = row.text(header.name_col);
    if name == layout.total_marker {
        return RowClass::Total;
    }

    let primary = [
        header.name_col,
        header.partner_col(layout),
        header.period_col(layout),
        header.value_col(layout),
    ];
    if row.is_blank(&primary) {
        return RowClass::Skip;
    }

    // only a bare name can be a band; partner, period or amount make it a detail row
    let details = [
        header.partner_col(layout),
        header.period_col(layout),
        header.value_col(layout),
    ];
    if !row.is_blank(&details) {
        return RowClass::Data;
    }

    let fill = row.signature(header.name_col).fill;
    match layout.colors.category_of(fill).and_then(|c| c.level()) {
        Some(level) => RowClass::Header { level, label: name },
        None => RowClass::Data,
    }
}

fn emit_row(
    ctx: &HierarchyContext,
    row: &RowView<'_>,
    class: &RowClass,
    header: &IncomeHeader,
    layout: &IncomeLayout,
) -> StagedRecord {
    let text = |col: usize| non_empty(collapse_whitespace(&row.text(col)));
    let total = *class == RowClass::Total;

    let mut record = NormalizedRecord {
        date: parse_period_range(&row.text(header.period_col(layout))),
        record_type: Some(layout.record_type.clone()),
        partner: text(header.partner_col(layout)),
        value: cell_number(row.sheet.value(row.index, header.value_col(layout))),
        ..Default::default()
    };

    if total {
        record.category = Some(layout.total_category.clone());
    } else {
        record.category = ctx.section().map(str::to_string);
        record.company = ctx.company().map(str::to_string);
        record.estate = ctx.sub_level().map(str::to_string);
        record.document = text(header.name_col);
    }

    StagedRecord { record, total }
}

/// A total row without a period of its own belongs to the month of the row before it.
fn carry_total_dates(staged: Vec<StagedRecord>) -> Vec<NormalizedRecord> {
    let mut previous = None;
    staged
        .into_iter()
        .map(|StagedRecord { mut record, total }| {
            if total && record.date.is_none() {
                record.date = previous;
            }
            previous = record.date;
            record
        })
        .collect()
}

fn has_content(record: &NormalizedRecord) -> bool {
    record.company.is_some()
        || record.document.is_some()
        || record.partner.is_some()
        || record.value.is_some()
}

fn backfill_company(records: &mut [NormalizedRecord]) {
    let companies: BTreeSet<String> = records.iter().filter_map(|r| r.company.clone()).collect();
    if companies.len() != 1 {
        return;
    }
    let company = companies.into_iter().next();
    for record in records.iter_mut().filter(|r| r.company.is_none()) {
        record.company = company.clone();
    }
}
