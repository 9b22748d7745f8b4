//! Key/value pair reconstruction from KEY_VALUE_SET blocks.

use serde::{Deserialize, Serialize};

use super::BlockGraph;

/// A form field as printed on the page: key text and its value text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_confidence: Option<f64>,
}

impl BlockGraph {
    /// Reconstruct key/value pairs in document order.
    ///
    /// A KEY block contributes a pair only when its key text is non-empty and
    /// its first resolvable VALUE block yields non-empty text.
    pub fn key_value_pairs(&self) -> Vec<KeyValuePair> {
        self.blocks()
            .iter()
            .filter(|block| block.is_key())
            .filter_map(|key_block| {
                let key = self.text_of(key_block).trim().to_string();
                if key.is_empty() {
                    return None;
                }

                let value_block = self.values_of(key_block).into_iter().next()?;
                let value = self.text_of(value_block).trim().to_string();
                if value.is_empty() {
                    return None;
                }

                Some(KeyValuePair {
                    key,
                    value,
                    key_confidence: key_block.confidence,
                    value_confidence: value_block.confidence,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::blocks::{Block, BlockGraph, BlockType, EntityType};

    fn word(id: &str, text: &str) -> Block {
        Block::new(id, BlockType::Word).with_text(text)
    }

    #[test]
    fn test_pairs_follow_value_relationship() {
        let graph = BlockGraph::build(vec![
            Block::new("k1", BlockType::KeyValueSet)
                .with_entity(EntityType::Key)
                .with_confidence(91.0)
                .with_children(["w1", "w2"])
                .with_values(["v1"]),
            Block::new("v1", BlockType::KeyValueSet)
                .with_entity(EntityType::Value)
                .with_confidence(88.0)
                .with_children(["w3"]),
            word("w1", "Account"),
            word("w2", "Number:"),
            word("w3", "0012345678"),
        ])
        .unwrap();

        let pairs = graph.key_value_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].key, "Account Number:");
        assert_eq!(pairs[0].value, "0012345678");
        assert_eq!(pairs[0].key_confidence, Some(91.0));
        assert_eq!(pairs[0].value_confidence, Some(88.0));
    }

    #[test]
    fn test_key_without_value_is_dropped() {
        let graph = BlockGraph::build(vec![
            Block::new("k1", BlockType::KeyValueSet)
                .with_entity(EntityType::Key)
                .with_children(["w1"])
                .with_values(["gone"]),
            Block::new("k2", BlockType::KeyValueSet)
                .with_entity(EntityType::Key)
                .with_children(["w1"]),
            word("w1", "Employer name"),
        ])
        .unwrap();

        assert!(graph.key_value_pairs().is_empty());
    }

    #[test]
    fn test_empty_value_is_dropped() {
        let graph = BlockGraph::build(vec![
            Block::new("k1", BlockType::KeyValueSet)
                .with_entity(EntityType::Key)
                .with_children(["w1"])
                .with_values(["v1"]),
            Block::new("v1", BlockType::KeyValueSet).with_entity(EntityType::Value),
            word("w1", "Control number"),
        ])
        .unwrap();

        assert!(graph.key_value_pairs().is_empty());
    }
}
