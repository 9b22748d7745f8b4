//! Field extraction over a block graph.
//!
//! Each document type has an extractor mapping key/value pairs (and, for
//! bank statements, tables) to a fixed set of canonical fields:
//! - `W2Extractor`: employee/employer identity and wage boxes
//! - `BankStatementExtractor`: account info, balances, transactions
//! - `GenericExtractor`: every pair and table, no canonical fields
//!
//! Matching is deliberately simple. For each canonical field we walk a
//! ranked list of key phrases; for each phrase we scan pairs in document
//! order with case-insensitive substring containment. The first hit wins
//! and is then checked against the field's format. A value that fails its
//! format becomes null. Extraction never fails.

mod bank_statement;
mod format;
mod generic;
mod w2;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blocks::{BlockGraph, KeyValuePair};
use crate::document::DocumentType;

pub use bank_statement::{BankStatementExtractor, BankStatementFields, Transaction, TransactionSummary};
pub use format::{Amount, FieldFormat, FieldValidationFailure, FieldValue};
pub use generic::{GenericExtractor, GenericFields};
pub use w2::{W2Extractor, W2Fields};

/// Maps a block graph to a document-type-specific field set.
pub trait FieldExtractor: Send + Sync {
    fn document_type(&self) -> DocumentType;

    /// Extract fields. Missing data yields null fields, never an error.
    fn extract(&self, graph: &BlockGraph) -> ExtractedFields;
}

/// Pick the extractor for a caller-supplied document type.
pub fn extractor_for(document_type: DocumentType) -> Box<dyn FieldExtractor> {
    match document_type {
        DocumentType::W2 => Box::new(W2Extractor),
        DocumentType::BankStatement => Box::new(BankStatementExtractor),
        DocumentType::Generic => Box::new(GenericExtractor),
    }
}

/// Extracted fields, tagged by document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "document_type", rename_all = "snake_case")]
pub enum ExtractedFields {
    W2(W2Fields),
    BankStatement(BankStatementFields),
    Generic(GenericFields),
}

impl ExtractedFields {
    pub fn document_type(&self) -> DocumentType {
        match self {
            ExtractedFields::W2(_) => DocumentType::W2,
            ExtractedFields::BankStatement(_) => DocumentType::BankStatement,
            ExtractedFields::Generic(_) => DocumentType::Generic,
        }
    }

    /// Canonical fields in declaration order, unset ones as `None`.
    pub fn canonical_fields(&self) -> Vec<(&'static str, Option<&FieldValue>)> {
        match self {
            ExtractedFields::W2(fields) => fields.entries(),
            ExtractedFields::BankStatement(fields) => fields.entries(),
            ExtractedFields::Generic(_) => Vec::new(),
        }
    }

    /// Look up one canonical field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.canonical_fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value)
    }
}

/// A canonical field and how to find it.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    /// Key phrases in priority order, lowercase.
    pub phrases: &'static [&'static str],
    pub format: FieldFormat,
}

/// Result of matching a rule set against key/value pairs.
#[derive(Debug, Default)]
pub struct FieldMatches {
    values: HashMap<&'static str, FieldValue>,
}

impl FieldMatches {
    /// Take a field's value, leaving nothing behind.
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }
}

/// Match every rule against the pairs.
pub fn match_fields(pairs: &[KeyValuePair], rules: &[FieldRule]) -> FieldMatches {
    let keys: Vec<String> = pairs.iter().map(|p| p.key.to_lowercase()).collect();
    let mut matches = FieldMatches::default();

    for rule in rules {
        let Some(pair) = find_pair(pairs, &keys, rule.phrases) else {
            continue;
        };

        match rule.format.apply(&pair.value) {
            Ok(value) => {
                matches.values.insert(rule.name, value);
            }
            Err(failure) => {
                debug!(
                    "Field {} matched key '{}' but failed validation: {}",
                    rule.name, pair.key, failure
                );
            }
        }
    }

    matches
}

/// First pair whose key contains a phrase, trying phrases in priority order.
fn find_pair<'a>(
    pairs: &'a [KeyValuePair],
    lowercase_keys: &[String],
    phrases: &[&str],
) -> Option<&'a KeyValuePair> {
    phrases.iter().find_map(|phrase| {
        lowercase_keys
            .iter()
            .position(|key| key.contains(phrase))
            .map(|i| &pairs[i])
    })
}
