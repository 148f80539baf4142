//! Writers for the two record files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::Result;

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// One JSON array, four-space indent.
pub fn write_json_array<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut out = create(path)?;
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut ser)?;
    out.flush()?;
    Ok(())
}

/// One JSON object per line. Returns the number of lines written.
pub fn write_jsonl<T, I>(path: &Path, records: I) -> Result<usize>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut out = create(path)?;
    let mut written = 0;
    for record in records {
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::QaRecord;

    #[test]
    fn json_array_with_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("qa.json");
        let records = vec![QaRecord {
            instruction: "What?".into(),
            input: String::new(),
            output: "That.".into(),
        }];
        write_json_array(&path, &records).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n    {\n        \"instruction\": \"What?\""));
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back[0]["output"], "That.");
        assert_eq!(back[0]["input"], "");
    }

    #[test]
    fn empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.json");
        write_json_array::<QaRecord>(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.jsonl");
        let n = write_jsonl(&path, ["a", "b\nc"].iter().map(|s| serde_json::json!({ "input": s, "output": "" })))
            .unwrap();
        assert_eq!(n, 2);
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], r#"{"input":"b\nc","output":""}"#);
    }
}
