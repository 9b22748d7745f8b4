//! Untyped extraction: everything the graph holds, no canonical fields.

use serde::{Deserialize, Serialize};

use super::{ExtractedFields, FieldExtractor};
use crate::blocks::{BlockGraph, KeyValuePair, Table};
use crate::document::DocumentType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericFields {
    pub key_values: Vec<KeyValuePair>,
    pub tables: Vec<Table>,
    /// LINE texts joined with newlines.
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenericExtractor;

impl FieldExtractor for GenericExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Generic
    }

    fn extract(&self, graph: &BlockGraph) -> ExtractedFields {
        ExtractedFields::Generic(GenericFields {
            key_values: graph.key_value_pairs(),
            tables: graph.tables(),
            text: graph.lines().join("\n"),
        })
    }
}
