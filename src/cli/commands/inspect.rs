//! Inspect command: summarize a saved analysis response offline.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use console::style;
use serde::Serialize;

use crate::blocks::{BlockGraph, BlockType};
use crate::cli::helpers::{print_confidence, print_fields};
use crate::confidence::{summarize, ConfidenceSummary};
use crate::document::DocumentType;
use crate::extract::{extractor_for, ExtractedFields};

#[derive(Debug, Serialize)]
struct InspectReport {
    block_count: usize,
    blocks_by_type: BTreeMap<BlockType, usize>,
    key_value_pairs: usize,
    tables: usize,
    lines: usize,
    confidence: ConfidenceSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<ExtractedFields>,
}

pub async fn cmd_inspect(
    response: &Path,
    document_type: Option<DocumentType>,
    json: bool,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(response)
        .await
        .with_context(|| format!("Failed to read {}", response.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", response.display()))?;
    let graph = BlockGraph::from_response(&payload)?;

    let report = build_report(&graph, document_type);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} blocks",
        style(response.display()).bold(),
        report.block_count
    );
    for (block_type, count) in &report.blocks_by_type {
        println!("  {:<18} {:>5}", block_type.as_str(), count);
    }
    println!(
        "  {} {} key/value pairs, {} tables, {} lines",
        style("→").dim(),
        report.key_value_pairs,
        report.tables,
        report.lines
    );
    println!();
    print_confidence(&report.confidence);

    if let Some(fields) = &report.fields {
        println!();
        println!("{} {}", style("Fields:").bold(), fields.document_type());
        print_fields(fields);
    }

    Ok(())
}

fn build_report(graph: &BlockGraph, document_type: Option<DocumentType>) -> InspectReport {
    let mut blocks_by_type = BTreeMap::new();
    for block in graph.blocks() {
        *blocks_by_type.entry(block.block_type).or_insert(0) += 1;
    }

    InspectReport {
        block_count: graph.len(),
        blocks_by_type,
        key_value_pairs: graph.key_value_pairs().len(),
        tables: graph.tables().len(),
        lines: graph.lines().len(),
        confidence: summarize(graph),
        fields: document_type.map(|t| extractor_for(t).extract(graph)),
    }
}
