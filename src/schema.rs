use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DtCr {
    #[schemars(description = "Debit side of the ledger")]
    Debit,

    #[schemars(description = "Credit side of the ledger")]
    Credit,
}

impl DtCr {
    pub fn as_str(self) -> &'static str {
        match self {
            DtCr::Debit => "Debit",
            DtCr::Credit => "Credit",
        }
    }
}

/// Canonical semantic columns a hierarchy level can be renamed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum Field {
    Account,
    Estate,
    Category,
    Partner,
    Contract,
    Document,
    #[serde(rename = "Bank Account")]
    BankAccount,
}

impl Field {
    pub fn column(self) -> &'static str {
        match self {
            Field::Account => "Account",
            Field::Estate => "Estate",
            Field::Category => "Category",
            Field::Partner => "Partner",
            Field::Contract => "Contract",
            Field::Document => "Document",
            Field::BankAccount => "Bank Account",
        }
    }
}

/// One long-format row produced by the statement and income parsers.
///
/// Columns a report does not carry stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedRecord {
    #[serde(rename = "Date")]
    #[schemars(description = "First day of the month the record applies to")]
    pub date: Option<NaiveDate>,

    #[serde(rename = "Company")]
    pub company: Option<String>,

    #[serde(rename = "Estate")]
    pub estate: Option<String>,

    #[serde(rename = "Type")]
    #[schemars(description = "Indicator of the value, e.g. the turnover or balance column it came from")]
    pub record_type: Option<String>,

    #[serde(rename = "Category")]
    pub category: Option<String>,

    #[serde(rename = "Partner")]
    pub partner: Option<String>,

    #[serde(rename = "Contract")]
    pub contract: Option<String>,

    #[serde(rename = "Document")]
    pub document: Option<String>,

    #[serde(rename = "Bank Account")]
    pub bank_account: Option<String>,

    #[serde(rename = "Account")]
    pub account: Option<String>,

    #[serde(rename = "DtCr")]
    pub dt_cr: Option<DtCr>,

    #[serde(rename = "Value")]
    pub value: Option<f64>,

    #[serde(flatten)]
    #[schemars(description = "Hierarchy levels whose labels have no canonical column")]
    pub extra: BTreeMap<String, String>,
}

impl NormalizedRecord {
    pub fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::Account => self.account.as_deref(),
            Field::Estate => self.estate.as_deref(),
            Field::Category => self.category.as_deref(),
            Field::Partner => self.partner.as_deref(),
            Field::Contract => self.contract.as_deref(),
            Field::Document => self.document.as_deref(),
            Field::BankAccount => self.bank_account.as_deref(),
        }
    }

    pub fn set_field(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::Account => &mut self.account,
            Field::Estate => &mut self.estate,
            Field::Category => &mut self.category,
            Field::Partner => &mut self.partner,
            Field::Contract => &mut self.contract,
            Field::Document => &mut self.document,
            Field::BankAccount => &mut self.bank_account,
        };
        *slot = value;
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(NormalizedRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// One side (debit or credit) of one supplier-ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerRecord {
    #[serde(rename = "Date")]
    pub date: Option<NaiveDate>,

    #[serde(rename = "Company")]
    pub company: Option<String>,

    #[serde(rename = "Doc")]
    #[schemars(description = "Lines of the document cell, in order")]
    pub doc: Vec<String>,

    #[serde(rename = "AnDT")]
    #[schemars(description = "Lines of the debit analytics cell, in order")]
    pub an_dt: Vec<String>,

    #[serde(rename = "AnCR")]
    #[schemars(description = "Lines of the credit analytics cell, in order")]
    pub an_cr: Vec<String>,

    #[serde(rename = "DtCr")]
    pub dt_cr: DtCr,

    #[serde(rename = "Account")]
    pub account: Option<String>,

    #[serde(rename = "Value")]
    pub value: f64,
}

/// Semantic role an enrichment item was resolved to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum Role {
    Partner,
    Supplier,
    #[serde(rename = "Related Company")]
    RelatedCompany,
    Category,
    Estate,
    Contract,
    Document,
    #[serde(rename = "Bank Account")]
    BankAccount,
    Unclassified,
}

/// Which free-text list of the ledger row an item came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum ItemSource {
    Doc,
    AnDt,
    AnCr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Assignment {
    pub role: Role,
    pub source: ItemSource,
    /// The item exactly as it appeared in the source list.
    pub item: String,
}

/// A ledger record with its free-text items resolved into semantic roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: LedgerRecord,

    #[serde(rename = "Partner")]
    pub partner: Option<String>,

    #[serde(rename = "Supplier")]
    pub supplier: Option<String>,

    #[serde(rename = "Related Company")]
    pub related_company: Option<String>,

    #[serde(rename = "Category")]
    pub category: Option<String>,

    #[serde(rename = "Estate")]
    pub estate: Option<String>,

    #[serde(rename = "Contract")]
    pub contract: Option<String>,

    #[serde(rename = "Document")]
    pub document: Option<String>,

    #[serde(rename = "Bank Account")]
    pub bank_account: Option<String>,

    #[serde(rename = "Unclassified")]
    pub unclassified: Vec<String>,

    #[serde(skip)]
    pub assignments: Vec<Assignment>,
}

impl EnrichedRecord {
    pub fn new(record: LedgerRecord) -> Self {
        Self {
            record,
            partner: None,
            supplier: None,
            related_company: None,
            category: None,
            estate: None,
            contract: None,
            document: None,
            bank_account: None,
            unclassified: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn slot(&self, role: Role) -> Option<&str> {
        match role {
            Role::Partner => self.partner.as_deref(),
            Role::Supplier => self.supplier.as_deref(),
            Role::RelatedCompany => self.related_company.as_deref(),
            Role::Category => self.category.as_deref(),
            Role::Estate => self.estate.as_deref(),
            Role::Contract => self.contract.as_deref(),
            Role::Document => self.document.as_deref(),
            Role::BankAccount => self.bank_account.as_deref(),
            Role::Unclassified => None,
        }
    }

    pub(crate) fn slot_mut(&mut self, role: Role) -> Option<&mut Option<String>> {
        match role {
            Role::Partner => Some(&mut self.partner),
            Role::Supplier => Some(&mut self.supplier),
            Role::RelatedCompany => Some(&mut self.related_company),
            Role::Category => Some(&mut self.category),
            Role::Estate => Some(&mut self.estate),
            Role::Contract => Some(&mut self.contract),
            Role::Document => Some(&mut self.document),
            Role::BankAccount => Some(&mut self.bank_account),
            Role::Unclassified => None,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EnrichedRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}
