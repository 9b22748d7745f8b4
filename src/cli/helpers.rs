//! Shared output helpers for CLI commands.

use console::{style, StyledObject};

use crate::confidence::ConfidenceSummary;
use crate::extract::{ExtractedFields, FieldValue};

pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

pub fn warning() -> StyledObject<&'static str> {
    style("!").yellow()
}

fn value_or_dash(value: Option<&FieldValue>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => style("-").dim().to_string(),
    }
}

/// Print extracted fields as an aligned list.
pub fn print_fields(fields: &ExtractedFields) {
    match fields {
        ExtractedFields::W2(_) => print_canonical(fields),
        ExtractedFields::BankStatement(bank) => {
            print_canonical(fields);

            println!();
            println!(
                "{} ({})",
                style("Transactions").bold(),
                bank.summary.transaction_count
            );
            for t in &bank.transactions {
                println!(
                    "  {:<12} {:<32} {:>12} {:>12}",
                    t.date.as_deref().unwrap_or("-"),
                    truncate(t.description.as_deref().unwrap_or("-"), 32),
                    t.amount.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
                    t.balance.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
                );
            }
            println!(
                "  {} deposits {}  withdrawals {}",
                style("→").dim(),
                style(bank.summary.total_deposits).green(),
                style(bank.summary.total_withdrawals).red()
            );
        }
        ExtractedFields::Generic(generic) => {
            println!("{}", style("Key/value pairs").bold());
            for pair in &generic.key_values {
                println!("  {:<40} {}", truncate(&pair.key, 40), pair.value);
            }
            println!();
            println!("{} {}", style("Tables:").bold(), generic.tables.len());
            for table in &generic.tables {
                println!(
                    "  {} {} rows",
                    style(&table.id).dim(),
                    table.rows.len()
                );
            }
            println!("{} {}", style("Lines:").bold(), generic.text.lines().count());
        }
    }
}

fn print_canonical(fields: &ExtractedFields) {
    let entries = fields.canonical_fields();
    let width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, value) in entries {
        let label = format!("{:<width$}", name, width = width);
        println!("  {}  {}", style(label).cyan(), value_or_dash(value));
    }
}

pub fn print_confidence(summary: &ConfidenceSummary) {
    if summary.no_data {
        println!("{} No confidence data", warning());
        return;
    }

    let s = &summary.overall;
    let quality = summary.quality.map(|q| q.as_str()).unwrap_or("-");
    println!(
        "{} mean {:.1}, median {:.1}, range {:.1}-{:.1}, p25/p75 {:.1}/{:.1}, sd {:.2} ({} values, {})",
        style("Confidence:").bold(),
        s.mean,
        s.median,
        s.min,
        s.max,
        s.p25,
        s.p75,
        s.std_dev,
        s.count,
        style(quality).cyan()
    );
    for (block_type, stats) in &summary.by_block_type {
        println!(
            "  {:<18} {:>5} blocks, mean {:.1} ({:.1}-{:.1})",
            block_type.as_str(),
            stats.count,
            stats.mean,
            stats.min,
            stats.max
        );
    }
}

/// Truncate to at most `max` characters, marking the cut with `…`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
