//! Check command: verify analyzer settings and profiles without analyzing anything.

use console::style;

use crate::blocks::BlockGraph;
use crate::cli::helpers::{error, success, warning};
use crate::config::{AnalyzerKind, Config};
use crate::document::DocumentType;

pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let mut failures = 0;

    match &config.source_path {
        Some(path) => println!("{} Config: {}", success(), path.display()),
        None => println!("{} Config: none found, using defaults", warning()),
    }

    match config.analyzer.kind {
        AnalyzerKind::Http => match config.http_config() {
            Ok(http) => {
                println!("{} Endpoint: {}", success(), http.endpoint);
                if http.api_token.is_none() {
                    println!("  {} No API token set", style("→").dim());
                }
                if let Err(e) = config.build_analyzer(None) {
                    println!("{} {}", error(), e);
                    failures += 1;
                }
            }
            Err(e) => {
                println!("{} {}", error(), e);
                failures += 1;
            }
        },
        AnalyzerKind::Replay => match config.analyzer.replay_path.as_deref() {
            Some(raw) => {
                let path = config.resolve_path(raw);
                match check_replay(&path).await {
                    Ok(blocks) => println!(
                        "{} Replay: {} ({} blocks)",
                        success(),
                        path.display(),
                        blocks
                    ),
                    Err(e) => {
                        println!("{} Replay: {}: {}", error(), path.display(), e);
                        failures += 1;
                    }
                }
            }
            None => {
                println!("{} analyzer.replay_path is not set", error());
                failures += 1;
            }
        },
    }

    println!(
        "{} W-2 features: {}",
        success(),
        config
            .feature_policy()
            .primary_request(DocumentType::W2, None)
            .feature_list()
    );

    for document_type in DocumentType::all() {
        match config.adapter_for(document_type) {
            Some(adapter) => println!(
                "{} Profile {}: adapter {} v{}",
                success(),
                document_type,
                adapter.adapter_id,
                adapter.version
            ),
            None => println!(
                "  {} Profile {}: none (standard analysis)",
                style("→").dim(),
                document_type
            ),
        }
    }

    if failures > 0 {
        anyhow::bail!("{} check(s) failed", failures);
    }
    Ok(())
}

async fn check_replay(path: &std::path::Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path).await?;
    let payload: serde_json::Value = serde_json::from_str(&raw)?;
    Ok(BlockGraph::from_response(&payload)?.len())
}
