//! File and stdout handling for the CLI
//!
//! - Input: JSON files (scenario, configuration)
//! - Output: JSON lines or plain text on stdout
//! - UTF-8 only

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read and parse a JSON file
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))?;
    if content.trim().is_empty() {
        return Err(CliError::io_error(format!("{} is empty", path.display())));
    }
    serde_json::from_str(&content)
        .map_err(|e| CliError::scenario_invalid(format!("{}: {}", path.display(), e)))
}

/// Write JSON values to `out`, one per line
pub fn write_lines<W: Write>(out: &mut W, values: &[Value]) -> CliResult<()> {
    for value in values {
        serde_json::to_writer(&mut *out, value)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Write JSON values to stdout, one per line
pub fn write_json_lines(values: &[Value]) -> CliResult<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    write_lines(&mut lock, values)
}

/// Write plain text to stdout
pub fn write_text(text: &str) -> CliResult<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", text)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_lines() {
        let mut out = Vec::new();
        write_lines(&mut out, &[json!({"a": 1}), json!({"b": 2})]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn test_read_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"max_candidates\": 2}}").unwrap();
        let value: Value = read_json_file(file.path()).unwrap();
        assert_eq!(value["max_candidates"], 2);
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        let err = read_json_file::<Value>(file.path()).unwrap_err();
        assert_eq!(err.code_str(), "OPENATTR_CLI_IO_ERROR");
    }
}
