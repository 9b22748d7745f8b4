//! Normalized OCR block graph.
//!
//! Document-analysis services return a flat list of blocks (words, lines,
//! key/value sets, tables, cells) linked to each other by id. `BlockGraph`
//! owns one response worth of blocks and resolves those links:
//! - lookup by id in constant time
//! - ordered CHILD / VALUE traversal, tolerating dangling ids
//! - key/value pair reconstruction (see `key_value`)
//! - table reconstruction (see `table`)
//!
//! The wire shape is the AnalyzeDocument JSON (`Blocks`, `BlockType`, `Id`,
//! `Relationships`, ...). Geometry and other unknown attributes are ignored.

mod key_value;
mod table;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use key_value::KeyValuePair;
pub use table::Table;

/// Errors from building a block graph.
#[derive(Debug, Error)]
pub enum BlockGraphError {
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Kind of OCR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Page,
    Word,
    Line,
    KeyValueSet,
    Table,
    Cell,
    SelectionElement,
    /// Layout, signature, query and other block kinds we carry but never interpret.
    #[serde(other)]
    Other,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Page => "PAGE",
            BlockType::Word => "WORD",
            BlockType::Line => "LINE",
            BlockType::KeyValueSet => "KEY_VALUE_SET",
            BlockType::Table => "TABLE",
            BlockType::Cell => "CELL",
            BlockType::SelectionElement => "SELECTION_ELEMENT",
            BlockType::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of a KEY_VALUE_SET block (and header markers on cells).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Key,
    Value,
    ColumnHeader,
    #[serde(other)]
    Other,
}

/// How a relationship links a block to other blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Child,
    Value,
    #[serde(other)]
    Other,
}

/// An ordered list of block ids related to a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    #[serde(rename = "Type")]
    pub kind: RelationshipType,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Checkbox state of a SELECTION_ELEMENT block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionStatus {
    Selected,
    NotSelected,
}

impl SelectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStatus::Selected => "SELECTED",
            SelectionStatus::NotSelected => "NOT_SELECTED",
        }
    }
}

/// One OCR-detected unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub id: String,
    pub block_type: BlockType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Confidence score (0 - 100), if the service reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<EntityType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
    /// 1-based row of a CELL block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u32>,
    /// 1-based column of a CELL block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_status: Option<SelectionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl Block {
    /// Create a bare block of the given type.
    pub fn new(id: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            id: id.into(),
            block_type,
            text: None,
            confidence: None,
            entity_types: Vec::new(),
            relationships: Vec::new(),
            row_index: None,
            column_index: None,
            selection_status: None,
            page: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.entity_types.push(entity);
        self
    }

    pub fn with_children<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_relationship(RelationshipType::Child, ids)
    }

    pub fn with_values<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_relationship(RelationshipType::Value, ids)
    }

    pub fn with_cell_position(mut self, row: u32, column: u32) -> Self {
        self.row_index = Some(row);
        self.column_index = Some(column);
        self
    }

    fn with_relationship<I, S>(mut self, kind: RelationshipType, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships.push(Relationship {
            kind,
            ids: ids.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Whether this is a KEY_VALUE_SET block with the KEY role.
    pub fn is_key(&self) -> bool {
        self.block_type == BlockType::KeyValueSet && self.entity_types.contains(&EntityType::Key)
    }

    /// Related ids of one relationship kind, in response order.
    pub fn related_ids(&self, kind: RelationshipType) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(move |r| r.kind == kind)
            .flat_map(|r| r.ids.iter().map(|id| id.as_str()))
    }
}

/// All blocks of one analysis response with id lookup.
///
/// Immutable once built; safe to share across threads.
#[derive(Debug, Clone)]
pub struct BlockGraph {
    blocks: Vec<Block>,
    index: HashMap<String, usize>,
}

impl BlockGraph {
    /// Build a graph from raw blocks.
    ///
    /// Fails only when ids are empty or duplicated. Dangling relationship
    /// ids are kept and resolve to nothing.
    pub fn build(blocks: Vec<Block>) -> Result<Self, BlockGraphError> {
        let mut index = HashMap::with_capacity(blocks.len());
        for (position, block) in blocks.iter().enumerate() {
            if block.id.is_empty() {
                return Err(BlockGraphError::MalformedResponse(format!(
                    "block at position {} has an empty id",
                    position
                )));
            }
            if index.insert(block.id.clone(), position).is_some() {
                return Err(BlockGraphError::MalformedResponse(format!(
                    "duplicate block id '{}'",
                    block.id
                )));
            }
        }
        Ok(Self { blocks, index })
    }

    /// Build a graph from a raw collaborator payload.
    ///
    /// Accepts `{"Blocks": [...]}` or a bare array of blocks.
    pub fn from_response(payload: &serde_json::Value) -> Result<Self, BlockGraphError> {
        let raw = match payload {
            serde_json::Value::Array(_) => payload,
            serde_json::Value::Object(map) => map.get("Blocks").ok_or_else(|| {
                BlockGraphError::MalformedResponse("response has no Blocks field".to_string())
            })?,
            _ => {
                return Err(BlockGraphError::MalformedResponse(
                    "response is not a JSON object".to_string(),
                ))
            }
        };
        if !raw.is_array() {
            return Err(BlockGraphError::MalformedResponse(
                "Blocks is not an array".to_string(),
            ));
        }
        let blocks = Vec::<Block>::deserialize(raw)
            .map_err(|e| BlockGraphError::MalformedResponse(format!("invalid block: {}", e)))?;
        Self::build(blocks)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All blocks in response order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn lookup(&self, id: &str) -> Option<&Block> {
        self.index.get(id).map(|&i| &self.blocks[i])
    }

    /// CHILD blocks in relationship order. Dangling ids are skipped.
    pub fn children_of(&self, block: &Block) -> Vec<&Block> {
        self.resolve(block, RelationshipType::Child)
    }

    /// VALUE blocks linked from a KEY block. Dangling ids are skipped.
    pub fn values_of(&self, block: &Block) -> Vec<&Block> {
        self.resolve(block, RelationshipType::Value)
    }

    fn resolve(&self, block: &Block, kind: RelationshipType) -> Vec<&Block> {
        block
            .related_ids(kind)
            .filter_map(|id| self.lookup(id))
            .collect()
    }

    /// Blocks of one type, in insertion order.
    pub fn blocks_of_type(&self, block_type: BlockType) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(move |b| b.block_type == block_type)
    }

    /// Text of a composite block: its WORD children joined by spaces.
    ///
    /// Selection elements contribute their status. Blocks with no children
    /// fall back to their own text.
    pub fn text_of(&self, block: &Block) -> String {
        let parts: Vec<&str> = self
            .children_of(block)
            .into_iter()
            .filter_map(|child| match child.block_type {
                BlockType::Word => child.text.as_deref(),
                BlockType::SelectionElement => child.selection_status.map(|s| s.as_str()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            block.text.clone().unwrap_or_default()
        } else {
            parts.join(" ")
        }
    }

    /// LINE texts in insertion order.
    pub fn lines(&self) -> Vec<&str> {
        self.blocks_of_type(BlockType::Line)
            .filter_map(|b| b.text.as_deref())
            .collect()
    }
}
