//! Report layouts.
//!
//! Every empirically discovered constant (fixed cells, column offsets, color
//! variants, keyword lists, thresholds) lives here with its default value, so a
//! report from another export vintage can be handled by loading a JSON override
//! instead of touching parser code.

use crate::classifier::{ColorRule, ColorTable, FillCategory};
use crate::error::Result;
use crate::schema::{DtCr, Field};
use crate::workbook::format_reference;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Shared JSON plumbing for every layout struct.
pub trait LayoutConfig: Serialize + DeserializeOwned + JsonSchema + Default {
    /// Fields missing from `json` keep their default values.
    fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(Self);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

/// 0-based cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_reference(self.row, self.col))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndicatorColumn {
    pub col: usize,
    #[schemars(description = "Indicator written to the Type column")]
    pub indicator: String,
    pub side: DtCr,
}

impl IndicatorColumn {
    fn new(col: usize, indicator: &str, side: DtCr) -> Self {
        Self {
            col,
            indicator: indicator.to_string(),
            side,
        }
    }
}

/// Trial-balance ("Оборотно-сальдовая ведомость") layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StatementLayout {
    pub company_cell: CellRef,
    pub period_cell: CellRef,
    #[schemars(description = "Header cells naming hierarchy levels 1..3")]
    pub level_label_cells: Vec<CellRef>,
    pub start_row: usize,
    pub name_col: usize,
    pub columns: Vec<IndicatorColumn>,
    pub colors: ColorTable,
    #[schemars(description = "A total-colored row is a total only if its name contains this keyword")]
    pub total_keyword: String,
    pub label_fields: BTreeMap<String, Field>,
    pub category_corrections: BTreeMap<String, String>,
    #[schemars(description = "Account written to total rows when the sheet holds several accounts")]
    pub fallback_account: Option<String>,
}

impl Default for StatementLayout {
    fn default() -> Self {
        let balance_open = "Сальдо на начало периода";
        let turnover = "Обороты за период";
        let balance_close = "Сальдо на конец периода";

        Self {
            company_cell: CellRef::new(0, 0),
            period_cell: CellRef::new(2, 0),
            level_label_cells: vec![CellRef::new(5, 0), CellRef::new(6, 0), CellRef::new(7, 0)],
            start_row: 10,
            name_col: 0,
            columns: vec![
                IndicatorColumn::new(1, balance_open, DtCr::Debit),
                IndicatorColumn::new(2, balance_open, DtCr::Credit),
                IndicatorColumn::new(3, turnover, DtCr::Debit),
                IndicatorColumn::new(4, turnover, DtCr::Credit),
                IndicatorColumn::new(5, balance_close, DtCr::Debit),
                IndicatorColumn::new(6, balance_close, DtCr::Credit),
            ],
            colors: ColorTable::new(vec![
                ColorRule::new(
                    FillCategory::Account,
                    &["FFC0C0C0", "FFBFBFBF", "FFD9D9D9", "theme:0:-0.249977111117893"],
                ),
                ColorRule::new(
                    FillCategory::SubLevel,
                    &["FFE0E0E0", "FFE6E6E6", "FFF2F2F2", "theme:0:-0.0499893185216834"],
                ),
                ColorRule::new(FillCategory::Total, &["FFFFF2CC", "FFFFFFCC", "FFF4ECC5"]),
            ]),
            total_keyword: "итого".to_string(),
            label_fields: [
                ("Счет", Field::Account),
                ("Контрагенты", Field::Partner),
                ("Договоры", Field::Contract),
                ("Документы расчетов с контрагентом", Field::Document),
                ("Статьи затрат", Field::Category),
                ("Статьи движения денежных средств", Field::Category),
                ("Номенклатурные группы", Field::Category),
                ("Прочие доходы и расходы", Field::Category),
                ("Объекты", Field::Estate),
                ("Объекты строительства", Field::Estate),
                ("Банковские счета", Field::BankAccount),
            ]
            .into_iter()
            .map(|(label, field)| (label.to_string(), field))
            .collect(),
            category_corrections: [
                ("Итого развернутое", "Итого"),
                ("Итого:", "Итого"),
                ("Прочие расходы (не принимаемые для НУ)", "Прочие расходы"),
            ]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect(),
            fallback_account: Some("60.01".to_string()),
        }
    }
}

impl LayoutConfig for StatementLayout {}

/// Revenue-recognition report layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct IncomeLayout {
    pub header_marker: String,
    pub header_scan_rows: usize,
    pub partner_offset: usize,
    pub period_offset: usize,
    pub value_offset: usize,
    pub total_marker: String,
    pub total_category: String,
    pub record_type: String,
    #[schemars(description = "Section, Company and Object (SubLevel) color families, in evaluation order")]
    pub colors: ColorTable,
}

impl Default for IncomeLayout {
    fn default() -> Self {
        Self {
            header_marker: "Наименование".to_string(),
            header_scan_rows: 30,
            partner_offset: 1,
            period_offset: 2,
            value_offset: 3,
            total_marker: "Итого:".to_string(),
            total_category: "Итого за месяц".to_string(),
            record_type: "Выручка".to_string(),
            colors: ColorTable::new(vec![
                ColorRule::new(FillCategory::Section, &["FFFFCC99", "FFFAC090", "FFF8CBAD"]),
                ColorRule::new(FillCategory::Company, &["FFCCFFCC", "FFC6EFCE", "FFE2EFDA"]),
                ColorRule::new(FillCategory::SubLevel, &["FFCCFFFF", "FFDDEBF7"]).or_no_fill(),
            ]),
        }
    }
}

impl LayoutConfig for IncomeLayout {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SideColumns {
    pub account_col: usize,
    pub sum_col: usize,
}

/// Supplier ledger ("Карточка счета") layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LedgerLayout {
    pub company_scan_rows: usize,
    pub company_scan_cols: usize,
    pub company_exclude: Vec<String>,
    pub opening_balance_marker: String,
    pub start_scan_rows: usize,
    pub default_start_row: usize,
    pub date_col: usize,
    pub doc_col: usize,
    pub an_dt_col: usize,
    pub an_cr_col: usize,
    pub debit_headers: Vec<String>,
    pub credit_headers: Vec<String>,
    pub account_subheader: String,
    pub default_debit: SideColumns,
    pub default_credit: SideColumns,
    pub total_keywords: Vec<String>,
    pub placeholders: Vec<String>,
    #[schemars(description = "Regex a genuine account code matches (as opposed to a spilled total)")]
    pub account_code_pattern: String,
}

impl Default for LedgerLayout {
    fn default() -> Self {
        Self {
            company_scan_rows: 6,
            company_scan_cols: 4,
            company_exclude: strings(&["период", "отчет", "дата", "счет", "наименование", "организация"]),
            opening_balance_marker: "сальдо на начало".to_string(),
            start_scan_rows: 40,
            default_start_row: 8,
            date_col: 0,
            doc_col: 1,
            an_dt_col: 2,
            an_cr_col: 3,
            debit_headers: strings(&["дебет", "дт"]),
            credit_headers: strings(&["кредит", "кт"]),
            account_subheader: "счет".to_string(),
            default_debit: SideColumns {
                account_col: 4,
                sum_col: 5,
            },
            default_credit: SideColumns {
                account_col: 6,
                sum_col: 7,
            },
            total_keywords: strings(&["итого", "оборот", "сальдо"]),
            placeholders: strings(&["<...>", "...", "<…>", "…"]),
            account_code_pattern: r"^\d{1,3}(\.\d{1,2})?$".to_string(),
        }
    }
}

impl LayoutConfig for LedgerLayout {}

/// Thresholds and dictionaries of the enrichment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub bank_account_min_digits: usize,
    pub document_keywords: Vec<String>,
    pub document_threshold: f64,
    pub contract_terms: Vec<String>,
    pub contract_threshold: f64,
    pub estate_threshold: f64,
    pub category_threshold: f64,
    #[schemars(description = "Items with more digit characters than this are never company names")]
    pub max_company_digits: usize,
    pub reassignment_prefix: String,
    pub correction_prefix: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            bank_account_min_digits: 14,
            document_keywords: strings(&[
                "Поступление (акт, накладная)",
                "Поступление товаров и услуг",
                "Поступление на расчетный счет",
                "Реализация товаров и услуг",
                "Реализация (акт, накладная)",
                "Списание с расчетного счета",
                "Платежное поручение",
                "Счет-фактура",
                "Акт сверки",
                "Авансовый отчет",
                "Возврат товаров",
                "Взаимозачет",
                "Корректировка долга",
                "Операция",
            ]),
            document_threshold: 0.8,
            contract_terms: strings(&["договор", "дог.", "контракт", "соглашение"]),
            contract_threshold: 0.8,
            estate_threshold: 0.7,
            category_threshold: 0.75,
            max_company_digits: 2,
            reassignment_prefix: "Перенос задолженности".to_string(),
            correction_prefix: "Корректировка долга".to_string(),
        }
    }
}

impl LayoutConfig for EnrichmentConfig {}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
