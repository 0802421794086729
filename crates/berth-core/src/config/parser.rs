//! TOML parser with helpful error messages

use super::schema::BerthConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse berth.toml; relative paths are rebased onto the file's directory.
pub fn parse_berth_toml(path: &Path) -> Result<BerthConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_berth_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    if let Some(base) = path.parent() {
        config.rebase(base);
    }
    Ok(config)
}

/// Parse berth.toml content from string
pub fn parse_berth_toml_str(content: &str) -> Result<BerthConfig> {
    let config: BerthConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message().to_string();

    let line_num = error.span().map(|span| {
        let start = span.start.min(content.len());
        content.as_bytes()[..start]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1
    });

    match line_num {
        Some(line_num) => anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            message
        ),
        None => anyhow::anyhow!("TOML parsing error: {}", message),
    }
}

fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &BerthConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}
