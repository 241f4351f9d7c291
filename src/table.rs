//! In-memory normalized table shared by every report type.

use crate::error::{FlattenError, Result};
use crate::schema::{EnrichedRecord, LedgerRecord, NormalizedRecord};
use chrono::NaiveDate;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Column order of combined output. Columns not listed here follow in first-seen order.
pub const PREFERRED_COLUMNS: [&str; 19] = [
    "File",
    "Date",
    "Company",
    "Estate",
    "Type",
    "Category",
    "Partner",
    "Supplier",
    "Related Company",
    "Contract",
    "Document",
    "Bank Account",
    "Account",
    "DtCr",
    "Value",
    "Doc",
    "AnDT",
    "AnCR",
    "Unclassified",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum TableValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    List(Vec<String>),
}

impl TableValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, TableValue::Empty)
    }
}

impl fmt::Display for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableValue::Empty => Ok(()),
            TableValue::Text(s) => f.write_str(s),
            TableValue::Number(n) => write!(f, "{}", n),
            TableValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TableValue::List(items) => f.write_str(&items.join("; ")),
        }
    }
}

impl From<Option<String>> for TableValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(TableValue::Empty, TableValue::Text)
    }
}

impl From<Option<&str>> for TableValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(TableValue::Empty, |s| TableValue::Text(s.to_string()))
    }
}

impl From<&str> for TableValue {
    fn from(value: &str) -> Self {
        TableValue::Text(value.to_string())
    }
}

impl From<Option<f64>> for TableValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(TableValue::Empty, TableValue::Number)
    }
}

impl From<Option<NaiveDate>> for TableValue {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map_or(TableValue::Empty, TableValue::Date)
    }
}

impl From<&[String]> for TableValue {
    fn from(value: &[String]) -> Self {
        TableValue::List(value.to_vec())
    }
}

/// A record type that can be laid out as one table row.
pub trait TabularRecord {
    /// Every column the type can produce, present even when a table has no rows.
    fn columns() -> Vec<&'static str>;

    fn to_row(&self) -> Vec<(String, TableValue)>;
}

fn cell(column: &str, value: impl Into<TableValue>) -> (String, TableValue) {
    (column.to_string(), value.into())
}

impl TabularRecord for NormalizedRecord {
    fn columns() -> Vec<&'static str> {
        vec![
            "Date",
            "Company",
            "Estate",
            "Type",
            "Category",
            "Partner",
            "Contract",
            "Document",
            "Bank Account",
            "Account",
            "DtCr",
            "Value",
        ]
    }

    fn to_row(&self) -> Vec<(String, TableValue)> {
        let mut row = vec![
            cell("Date", self.date),
            cell("Company", self.company.clone()),
            cell("Estate", self.estate.clone()),
            cell("Type", self.record_type.clone()),
            cell("Category", self.category.clone()),
            cell("Partner", self.partner.clone()),
            cell("Contract", self.contract.clone()),
            cell("Document", self.document.clone()),
            cell("Bank Account", self.bank_account.clone()),
            cell("Account", self.account.clone()),
            cell("DtCr", self.dt_cr.map(|s| s.as_str())),
            cell("Value", self.value),
        ];
        row.extend(self.extra.iter().map(|(k, v)| cell(k, v.as_str())));
        row
    }
}

impl TabularRecord for LedgerRecord {
    fn columns() -> Vec<&'static str> {
        vec!["Date", "Company", "Doc", "AnDT", "AnCR", "DtCr", "Account", "Value"]
    }

    fn to_row(&self) -> Vec<(String, TableValue)> {
        vec![
            cell("Date", self.date),
            cell("Company", self.company.clone()),
            cell("Doc", self.doc.as_slice()),
            cell("AnDT", self.an_dt.as_slice()),
            cell("AnCR", self.an_cr.as_slice()),
            cell("DtCr", self.dt_cr.as_str()),
            cell("Account", self.account.clone()),
            cell("Value", Some(self.value)),
        ]
    }
}

impl TabularRecord for EnrichedRecord {
    fn columns() -> Vec<&'static str> {
        let mut columns = LedgerRecord::columns();
        columns.extend([
            "Partner",
            "Supplier",
            "Related Company",
            "Category",
            "Estate",
            "Contract",
            "Document",
            "Bank Account",
            "Unclassified",
        ]);
        columns
    }

    fn to_row(&self) -> Vec<(String, TableValue)> {
        let mut row = self.record.to_row();
        row.extend([
            cell("Partner", self.partner.clone()),
            cell("Supplier", self.supplier.clone()),
            cell("Related Company", self.related_company.clone()),
            cell("Category", self.category.clone()),
            cell("Estate", self.estate.clone()),
            cell("Contract", self.contract.clone()),
            cell("Document", self.document.clone()),
            cell("Bank Account", self.bank_account.clone()),
            cell("Unclassified", self.unclassified.as_slice()),
        ]);
        row
    }
}

/// Ordered columns and rows of [`TableValue`]; every row is as wide as `columns`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<TableValue>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let mut table = Self::default();
        for column in columns {
            table.ensure_column(&column.into());
        }
        table
    }

    pub fn from_records<R: TabularRecord>(records: &[R]) -> Self {
        let mut table = Table::new(R::columns());
        for record in records {
            table.push_row(record.to_row());
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<TableValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&TableValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Result<Vec<&TableValue>> {
        let col = self
            .column_index(name)
            .ok_or_else(|| FlattenError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| &r[col]).collect())
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(TableValue::Empty);
        }
        self.columns.len() - 1
    }

    /// Appends a row; unknown columns are added and earlier rows padded with empties.
    pub fn push_row(&mut self, values: Vec<(String, TableValue)>) {
        let mut row = vec![TableValue::Empty; self.columns.len()];
        for (column, value) in values {
            let index = self.ensure_column(&column);
            if index >= row.len() {
                row.resize(index + 1, TableValue::Empty);
            }
            row[index] = value;
        }
        self.rows.push(row);
    }

    /// Sets `column` to `value` in every row, adding the column if needed.
    pub fn with_column(mut self, column: &str, value: TableValue) -> Self {
        let index = self.ensure_column(column);
        for row in &mut self.rows {
            row[index] = value.clone();
        }
        self
    }

    /// Rows whose `column` equals `value`, with all columns kept.
    pub fn filter_eq(&self, column: &str, value: &TableValue) -> Table {
        let rows = match self.column_index(column) {
            Some(col) => self
                .rows
                .iter()
                .filter(|r| &r[col] == value)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Projection onto `columns`, in that order.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<Table> {
        let indices = columns
            .iter()
            .map(|c| {
                self.column_index(c.as_ref())
                    .ok_or_else(|| FlattenError::MissingColumn(c.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Table {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|i| r[*i].clone()).collect())
                .collect(),
        })
    }

    /// Stacks tables; the column set is their union in preferred order.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Table {
        let mut combined = Table::default();
        for table in tables {
            for column in &table.columns {
                combined.ensure_column(column);
            }
            for row in table.rows {
                combined.push_row(table.columns.iter().cloned().zip(row).collect());
            }
        }
        combined.into_preferred_order()
    }

    pub fn into_preferred_order(self) -> Table {
        let mut order: Vec<usize> = PREFERRED_COLUMNS
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        order.extend(
            (0..self.columns.len()).filter(|i| !PREFERRED_COLUMNS.contains(&self.columns[*i].as_str())),
        );
        Table {
            columns: order.iter().map(|i| self.columns[*i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| order.iter().map(|i| r[*i].clone()).collect())
                .collect(),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.columns)?;
        for row in &self.rows {
            csv.write_record(row.iter().map(|v| v.to_string()))?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    /// Array of row objects, keys in column order.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [TableValue],
}

impl Serialize for RowRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowRef {
                columns: &self.columns,
                values: row,
            })?;
        }
        seq.end()
    }
}
