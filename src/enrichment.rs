//! Resolution of free-text ledger items into semantic roles.
//!
//! Every line of the Doc, AnDT and AnCR lists is run through a fixed priority
//! chain of dictionary rules. Lines no rule claims may name a counterparty, and
//! which role a counterparty gets depends on the side of the record and on
//! whether the row is a debt reassignment. Nothing is dropped: lines that end
//! up nowhere are kept in `unclassified`.

use crate::fuzzy::{best_match, contains_any};
use crate::layout::EnrichmentConfig;
use crate::names::normalize_name;
use crate::reference::{CategoryTerms, EstateDictionary};
use crate::schema::{Assignment, DtCr, EnrichedRecord, ItemSource, LedgerRecord, Role};
use crate::utils::collapse_whitespace;
use log::debug;

type Rule = fn(&Enricher, &str) -> Option<String>;

/// Dictionary rules in the order they are tried; the first that matches claims the item.
const PRIORITY: [(Role, Rule); 5] = [
    (Role::BankAccount, Enricher::match_bank_account),
    (Role::Document, Enricher::match_document),
    (Role::Contract, Enricher::match_contract),
    (Role::Estate, Enricher::match_estate),
    (Role::Category, Enricher::match_category),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    DebtReassignment,
}

#[derive(Debug, Clone, Default)]
pub struct Enricher {
    estates: EstateDictionary,
    categories: CategoryTerms,
    config: EnrichmentConfig,
}

impl Enricher {
    pub fn new(estates: EstateDictionary, categories: CategoryTerms) -> Self {
        Self {
            estates,
            categories,
            config: EnrichmentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EnrichmentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    pub fn enrich(&self, records: &[LedgerRecord]) -> Vec<EnrichedRecord> {
        let enriched: Vec<EnrichedRecord> = records.iter().map(|r| self.enrich_record(r)).collect();
        debug!(
            "Enriched {} records, {} with unclassified items",
            enriched.len(),
            enriched.iter().filter(|r| !r.unclassified.is_empty()).count()
        );
        enriched
    }

    pub fn enrich_record(&self, record: &LedgerRecord) -> EnrichedRecord {
        let mode = self.mode(&record.doc);
        let mut out = EnrichedRecord::new(record.clone());

        let items = record
            .doc
            .iter()
            .map(|item| (ItemSource::Doc, item))
            .chain(record.an_dt.iter().map(|item| (ItemSource::AnDt, item)))
            .chain(record.an_cr.iter().map(|item| (ItemSource::AnCr, item)));

        let mut deferred = Vec::new();
        for (source, item) in items {
            if mode == Mode::DebtReassignment && source == ItemSource::Doc {
                if let Some(role) = self.reassignment_role(item) {
                    if out.slot(role).is_none() {
                        place(&mut out, role, source, item, item.clone());
                        continue;
                    }
                }
            }

            match self.classify_item(item) {
                Some((role, value)) => place(&mut out, role, source, item, value),
                None if self.is_company_candidate(item) => deferred.push((source, item)),
                None => place(&mut out, Role::Unclassified, source, item, item.clone()),
            }
        }

        for (source, item) in deferred {
            match company_role(mode, record.dt_cr, source) {
                Some(role @ (Role::Partner | Role::Supplier)) => {
                    place(&mut out, role, source, item, normalize_name(item))
                }
                Some(role) => place(&mut out, role, source, item, collapse_whitespace(item)),
                None => place(&mut out, Role::Unclassified, source, item, item.clone()),
            }
        }

        out
    }

    /// First dictionary rule claiming `item`, with the value to store for it.
    pub fn classify_item(&self, item: &str) -> Option<(Role, String)> {
        PRIORITY
            .iter()
            .find_map(|(role, rule)| rule(self, item).map(|value| (*role, value)))
    }

    fn mode(&self, doc: &[String]) -> Mode {
        if doc.iter().any(|item| self.reassignment_role(item).is_some()) {
            Mode::DebtReassignment
        } else {
            Mode::Normal
        }
    }

    /// Category for a reassignment document, Document for a debt correction.
    fn reassignment_role(&self, item: &str) -> Option<Role> {
        let item = item.trim_start().to_lowercase();
        if item.starts_with(&self.config.reassignment_prefix.to_lowercase()) {
            Some(Role::Category)
        } else if item.starts_with(&self.config.correction_prefix.to_lowercase()) {
            Some(Role::Document)
        } else {
            None
        }
    }

    fn is_company_candidate(&self, item: &str) -> bool {
        item.chars().filter(|c| c.is_ascii_digit()).count() <= self.config.max_company_digits
    }

    fn match_bank_account(&self, item: &str) -> Option<String> {
        let leading_digits = item
            .chars()
            .filter(|c| !c.is_whitespace())
            .take_while(|c| c.is_ascii_digit())
            .count();
        (leading_digits >= self.config.bank_account_min_digits).then(|| item.to_string())
    }

    fn match_document(&self, item: &str) -> Option<String> {
        let keywords = &self.config.document_keywords;
        let found = contains_any(item, keywords).is_some()
            || best_match(item, keywords, self.config.document_threshold).is_some();
        found.then(|| item.to_string())
    }

    fn match_contract(&self, item: &str) -> Option<String> {
        best_match(item, &self.config.contract_terms, self.config.contract_threshold)
            .map(|_| item.to_string())
    }

    fn match_estate(&self, item: &str) -> Option<String> {
        best_match(item, self.estates.names(), self.config.estate_threshold)
            .map(|(name, _)| name.to_string())
    }

    fn match_category(&self, item: &str) -> Option<String> {
        best_match(item, self.categories.terms(), self.config.category_threshold)
            .map(|(term, _)| term.to_string())
    }
}

/// Role of a counterparty candidate; `None` leaves it unclassified.
fn company_role(mode: Mode, side: DtCr, source: ItemSource) -> Option<Role> {
    match (mode, source) {
        (_, ItemSource::Doc) => None,
        (Mode::DebtReassignment, ItemSource::AnCr) => Some(Role::Partner),
        (Mode::DebtReassignment, ItemSource::AnDt) => Some(Role::RelatedCompany),
        (Mode::Normal, source) => Some(match (side, source) {
            (DtCr::Debit, ItemSource::AnDt) | (DtCr::Credit, ItemSource::AnCr) => Role::Supplier,
            _ => Role::Partner,
        }),
    }
}

/// Fills the role's slot, or sends the item to the residual list when the slot is taken.
fn place(out: &mut EnrichedRecord, role: Role, source: ItemSource, item: &str, value: String) {
    let role = match out.slot_mut(role) {
        Some(slot) if slot.is_none() => {
            *slot = Some(value);
            role
        }
        _ => {
            out.unclassified.push(item.to_string());
            Role::Unclassified
        }
    };
    out.assignments.push(Assignment {
        role,
        source,
        item: item.to_string(),
    });
}
