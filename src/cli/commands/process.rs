//! Process command: validate, analyze, extract.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::cli::helpers::{print_confidence, print_fields, success, warning};
use crate::config::Config;
use crate::document::{DocumentType, DocumentUpload};
use crate::pipeline::{ExtractionMethod, PipelineResult, ProcessingPipeline};

pub async fn cmd_process(
    config: &Config,
    file: &Path,
    document_type: DocumentType,
    content_type: Option<&str>,
    replay: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let upload = DocumentUpload::from_path(file, content_type)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    upload
        .validate(config.pipeline.max_document_bytes)
        .with_context(|| format!("Rejected {}", file.display()))?;

    let analyzer = config.build_analyzer(replay)?;
    let binding = config.binding_for(document_type, analyzer);
    let pipeline = ProcessingPipeline::new(config.feature_policy());

    let result = pipeline
        .process(&upload.bytes, document_type, &binding)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(file, &result);
    }

    Ok(())
}

fn print_result(file: &Path, result: &PipelineResult) {
    println!(
        "{} {} as {} ({} blocks)",
        success(),
        style(file.display()).bold(),
        result.document_type,
        result.block_count
    );

    let method = match result.extraction_method {
        ExtractionMethod::Adapter => format!(
            "adapter {}",
            result.adapter_id.as_deref().unwrap_or("?")
        ),
        other => other.to_string(),
    };
    println!("  {} method: {}", style("→").dim(), method);
    println!("  {} sha256: {}", style("→").dim(), result.document_sha256.get(..16).unwrap_or(&result.document_sha256));
    if let Some(reason) = &result.fallback_reason {
        println!("  {} fell back after: {}", warning(), reason);
    }

    println!();
    print_fields(&result.fields);
    println!();
    print_confidence(&result.confidence);
}
