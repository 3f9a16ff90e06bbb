//! Atomic JSONL file operations.
//!
//! - Atomic writes: write to a temp file, sync to disk, then rename
//! - JSONL reading with line numbers in parse errors

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Write content to a file atomically.
///
/// 1. Writes content to a temporary file next to the target
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Renames the temp file over the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Write one JSON line per record, atomically.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized or the file written.
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut content = String::new();
    for record in records {
        content.push_str(&serde_json::to_string(record)?);
        content.push('\n');
    }
    atomic_write(path, &content)
}

/// Read every record of a JSONL file, skipping blank lines.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, or `InvalidPayload`
/// naming the first line that does not parse.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let record = serde_json::from_str(&line).map_err(|e| {
            Error::InvalidPayload(format!("{}:{}: {e}", path.display(), line_num + 1))
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Line {
        id: String,
        n: u32,
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("out.jsonl");

        atomic_write(&path, "line 1\nline 2\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "line 1\nline 2\n");
        assert!(!path.with_extension("jsonl.tmp").exists());
    }

    #[test]
    fn test_write_then_read_jsonl() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lines.jsonl");
        let lines = vec![
            Line { id: "a".into(), n: 1 },
            Line { id: "b".into(), n: 2 },
        ];

        write_jsonl(&path, &lines).unwrap();
        let back: Vec<Line> = read_jsonl(&path).unwrap();
        assert_eq!(back, lines);
    }

    #[test]
    fn test_read_jsonl_reports_bad_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.jsonl");
        fs::write(&path, "{\"id\":\"a\",\"n\":1}\n\nnot json\n").unwrap();

        let err = read_jsonl::<Line>(&path).unwrap_err();
        assert!(matches!(&err, Error::InvalidPayload(msg) if msg.contains("bad.jsonl:3:")));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_jsonl::<Line>(Path::new("/nonexistent/file.jsonl"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
