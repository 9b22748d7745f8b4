//! Configuration display command.

use console::style;

use crate::config::Config;

/// Print the effective configuration as TOML.
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    let source = config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults (no config file found)".to_string());

    eprintln!("{} Source: {}", style("→").dim(), source);
    if config.analyzer.api_token.is_some() {
        eprintln!("{} API token: set", style("→").dim());
    }

    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
