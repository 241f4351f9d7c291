//! Trial-balance statement parser.
//!
//! The sheet groups rows as account → sub-level → detail, with the level of a
//! row given only by its fill color. Every detail row is unpivoted into one
//! record per filled indicator column (opening balance, turnover and closing
//! balance, each split by debit/credit).

use crate::classifier::FillCategory;
use crate::error::{FlattenError, Result};
use crate::hierarchy::{walk, HierarchyContext, RowClass, RowView};
use crate::layout::{CellRef, StatementLayout};
use crate::schema::{Field, NormalizedRecord};
use crate::utils::{cell_number, collapse_whitespace, non_empty, parse_period_label};
use crate::workbook::{read_active_sheet, Worksheet};
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::Path;

/// Where the values of one hierarchy level end up in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelTarget {
    Field(Field),
    /// No canonical column; kept as an extra column under this name.
    Extra(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatementHeader {
    pub company: String,
    pub date: NaiveDate,
    pub labels: Vec<String>,
    /// Targets of the sub-level and detail levels.
    pub sub_level: LevelTarget,
    pub detail: LevelTarget,
}

struct StagedRecord {
    record: NormalizedRecord,
    total: bool,
}

pub fn parse_statement(path: impl AsRef<Path>) -> Result<Vec<NormalizedRecord>> {
    parse_statement_with_layout(path, &StatementLayout::default())
}

pub fn parse_statement_with_layout(
    path: impl AsRef<Path>,
    layout: &StatementLayout,
) -> Result<Vec<NormalizedRecord>> {
    let path = path.as_ref();
    let sheet = read_active_sheet(path)?;
    let records = parse_statement_worksheet(&sheet, layout)?;
    info!(
        "Parsed statement {}: {} records",
        path.display(),
        records.len()
    );
    Ok(records)
}

pub fn parse_statement_worksheet(
    sheet: &Worksheet,
    layout: &StatementLayout,
) -> Result<Vec<NormalizedRecord>> {
    let header = read_header(sheet, layout)?;
    debug!(
        "Statement header: company '{}', date {}, labels {:?}",
        header.company, header.date, header.labels
    );

    let end = sheet
        .last_row()
        .map(|r| r + 1)
        .unwrap_or(0)
        .max(layout.start_row);

    let mut staged = walk(
        sheet,
        layout.start_row..end,
        HierarchyContext::with_company(Some(header.company.clone())),
        |row| classify_row(row, layout),
        |ctx, row, class| emit_row(ctx, row, class, layout, &header),
    );

    relocate_total_labels(&mut staged);
    let dominant = dominant_account(&staged, layout.fallback_account.as_deref());
    for total in staged.iter_mut().filter(|s| s.total) {
        total.record.account = dominant.clone();
    }

    Ok(staged
        .into_iter()
        .map(|s| tidy_record(s.record, layout))
        .collect())
}

/// Reads company, period and level labels from their fixed header cells.
pub fn read_header(sheet: &Worksheet, layout: &StatementLayout) -> Result<StatementHeader> {
    let company = required_text(sheet, layout.company_cell, "company name")?;
    let period = required_text(sheet, layout.period_cell, "reporting period")?;
    let date = parse_period_label(&period)?;

    let labels: Vec<String> = layout
        .level_label_cells
        .iter()
        .map(|cell| collapse_whitespace(&sheet.text(cell.row, cell.col)))
        .collect();

    let label = |level: usize| labels.get(level).cloned().unwrap_or_default();
    let sub_level = level_target(layout, &label(1), 2, &[Field::Account]);
    let taken = match &sub_level {
        LevelTarget::Field(field) => vec![Field::Account, *field],
        LevelTarget::Extra(_) => vec![Field::Account],
    };
    let detail = level_target(layout, &label(2), 3, &taken);

    Ok(StatementHeader {
        company,
        date,
        labels,
        sub_level,
        detail,
    })
}

fn required_text(sheet: &Worksheet, cell: CellRef, what: &str) -> Result<String> {
    non_empty(collapse_whitespace(&sheet.text(cell.row, cell.col))).ok_or_else(|| {
        FlattenError::MissingHeader {
            cell: cell.to_string(),
            what: what.to_string(),
        }
    })
}

fn level_target(layout: &StatementLayout, label: &str, level: usize, taken: &[Field]) -> LevelTarget {
    if label.is_empty() {
        return LevelTarget::Extra(format!("Level {}", level));
    }
    match layout.label_fields.get(label) {
        Some(field) if !taken.contains(field) => LevelTarget::Field(*field),
        _ => LevelTarget::Extra(label.to_string()),
    }
}

fn classify_row(row: &RowView<'_>, layout: &StatementLayout) -> RowClass {
    let mut tracked: Vec<usize> = layout.columns.iter().map(|c| c.col).collect();
    tracked.push(layout.name_col);
    if row.is_blank(&tracked) {
        return RowClass::Skip;
    }

    let name = row.text(layout.name_col);
    let signature = row.signature(layout.name_col);
    match layout.colors.category_of(signature.fill) {
        Some(FillCategory::Total) => {
            if name.to_lowercase().contains(&layout.total_keyword.to_lowercase()) {
                RowClass::Total
            } else {
                RowClass::Data
            }
        }
        Some(category) => match category.level() {
            Some(level) => RowClass::Header { level, label: name },
            None => RowClass::Data,
        },
        None => RowClass::Data,
    }
}

fn emit_row(
    ctx: &HierarchyContext,
    row: &RowView<'_>,
    class: &RowClass,
    layout: &StatementLayout,
    header: &StatementHeader,
) -> Vec<StagedRecord> {
    let total = *class == RowClass::Total;
    let name = non_empty(row.text(layout.name_col));

    let mut template = NormalizedRecord {
        date: Some(header.date),
        company: ctx.company().map(str::to_string),
        ..Default::default()
    };
    if total {
        // the total label lands in the level-1 column, sorted out after the walk
        template.account = name;
    } else {
        template.account = ctx.account().map(str::to_string);
        assign(&mut template, &header.sub_level, ctx.sub_level().map(str::to_string));
        assign(&mut template, &header.detail, name);
    }

    layout
        .columns
        .iter()
        .filter(|column| !row.sheet.value(row.index, column.col).is_empty())
        .map(|column| {
            let mut record = template.clone();
            record.record_type = Some(column.indicator.clone());
            record.dt_cr = Some(column.side);
            record.value = cell_number(row.sheet.value(row.index, column.col));
            StagedRecord { record, total }
        })
        .collect()
}

fn assign(record: &mut NormalizedRecord, target: &LevelTarget, value: Option<String>) {
    match target {
        LevelTarget::Field(field) => record.set_field(*field, value),
        LevelTarget::Extra(name) => {
            if let Some(value) = value {
                record.extra.insert(name.clone(), value);
            }
        }
    }
}

fn relocate_total_labels(staged: &mut [StagedRecord]) {
    for total in staged.iter_mut().filter(|s| s.total) {
        total.record.category = total.record.account.take();
    }
}

/// The single account all total rows belong to: the only account present, else the
/// fallback code when several are present, else none.
fn dominant_account(staged: &[StagedRecord], fallback: Option<&str>) -> Option<String> {
    let accounts: BTreeSet<&str> = staged
        .iter()
        .filter(|s| !s.total)
        .filter_map(|s| s.record.account.as_deref())
        .filter(|a| !a.trim().is_empty())
        .collect();

    match accounts.len() {
        0 => None,
        1 => accounts.into_iter().next().map(str::to_string),
        _ => fallback.map(str::to_string),
    }
}

fn tidy_record(mut record: NormalizedRecord, layout: &StatementLayout) -> NormalizedRecord {
    let tidy = |value: Option<String>| value.and_then(|v| non_empty(collapse_whitespace(&v)));

    record.company = tidy(record.company);
    record.estate = tidy(record.estate);
    record.record_type = tidy(record.record_type);
    record.partner = tidy(record.partner);
    record.contract = tidy(record.contract);
    record.document = tidy(record.document);
    record.bank_account = tidy(record.bank_account);
    record.account = tidy(record.account);
    record.category = tidy(record.category).map(|category| {
        layout
            .category_corrections
            .get(&category)
            .cloned()
            .unwrap_or(category)
    });
    record.extra = std::mem::take(&mut record.extra)
        .into_iter()
        .filter_map(|(k, v)| non_empty(collapse_whitespace(&v)).map(|v| (k, v)))
        .collect();
    record
}
