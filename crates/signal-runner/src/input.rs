//! Reading block configs and signal batches from files or stdin.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, bail};
use serde_json::Value;

use signal_core::{Signal, resolve_env_placeholders};

/// Load a JSON block config and substitute `[[ENV]]` placeholders.
pub fn load_config(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading block config {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing block config {}", path.display()))?;
    resolve_env_placeholders(value).context("resolving block config placeholders")
}

/// Read signals from a file path, or stdin when `source` is `-`.
pub fn read_signals(source: &str) -> anyhow::Result<Vec<Signal>> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading signals from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading signals {source}"))?
    };
    parse_signals(&text)
}

/// Accepts either one JSON array of objects, or JSON Lines (one object per line, blanks ignored).
pub fn parse_signals(text: &str) -> anyhow::Result<Vec<Signal>> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        let items: Vec<Value> =
            serde_json::from_str(trimmed).context("parsing signal array")?;
        return items
            .into_iter()
            .enumerate()
            .map(|(idx, v)| Signal::from_value(v).with_context(|| format!("signal #{idx}")))
            .collect();
    }
    let mut signals = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("parsing signal on line {}", lineno + 1))?;
        if !value.is_object() {
            bail!("signal on line {} is not a JSON object", lineno + 1);
        }
        signals.push(Signal::from_value(value)?);
    }
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn parses_json_lines_and_skips_blanks() {
        let signals = parse_signals("{\"sub\":\"a\"}\n\n  {\"sub\":\"b\"}\n").unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[1].get("sub"), Some(&json!("b")));
    }

    #[test]
    fn parses_json_array() {
        let signals = parse_signals(r#"[{"sub":"a"},{"sub":"b"},{}]"#).unwrap();
        assert_eq!(signals.len(), 3);
        assert!(signals[2].is_empty());
    }

    #[test]
    fn rejects_non_object_signals() {
        assert!(parse_signals("[1, 2]").is_err());
        let err = parse_signals("{\"ok\":1}\n\"nope\"\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_input_is_an_empty_batch() {
        assert!(parse_signals("   \n").unwrap().is_empty());
    }

    #[test]
    fn load_config_reads_and_parses_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sender": "sender@mail.com", "recipients": ["a@x.com"]}}"#).unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg["sender"], json!("sender@mail.com"));
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/block.json")).unwrap_err();
        assert!(format!("{err:#}").contains("reading block config"));
    }

    #[test]
    fn read_signals_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"sub": "S", "body": "B"}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let signals = read_signals(&path).unwrap();
        assert_eq!(signals.len(), 1);
    }
}
