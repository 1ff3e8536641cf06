//! Buffered append writer for the TSV export and its JSONL mirror

use crate::output::record::{RecipeRecord, TSV_HEADERS};
use crate::output::OutputResult;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Collects parsed records and appends them to disk in batches
///
/// The queue is the source of truth for what has been processed, so the
/// writer appends every record it is handed; it never deduplicates.
pub struct ResultWriter {
    tsv_path: PathBuf,
    jsonl_path: Option<PathBuf>,
    flush_threshold: usize,
    buffer: Vec<RecipeRecord>,
}

impl ResultWriter {
    pub fn new(tsv_path: PathBuf, jsonl_path: Option<PathBuf>, flush_threshold: usize) -> Self {
        Self {
            tsv_path,
            jsonl_path,
            flush_threshold: flush_threshold.max(1),
            buffer: Vec::new(),
        }
    }

    /// Buffers a record, flushing to disk once the threshold is reached
    pub fn append(&mut self, record: RecipeRecord) -> OutputResult<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes all buffered records to disk
    pub fn flush(&mut self) -> OutputResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.buffer);
        self.write_tsv(&rows)?;
        if self.jsonl_path.is_some() {
            self.write_jsonl(&rows)?;
        }
        tracing::info!("Flushed {} recipes to {}", rows.len(), self.tsv_path.display());
        Ok(())
    }

    /// Final flush; call before shutting down
    pub fn finalize(&mut self) -> OutputResult<()> {
        self.flush()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn write_tsv(&self, rows: &[RecipeRecord]) -> OutputResult<()> {
        ensure_parent_dir(&self.tsv_path)?;
        let need_header = !self.tsv_path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.tsv_path)?;

        if need_header {
            writeln!(file, "{}", TSV_HEADERS.join("\t"))?;
        }
        for record in rows {
            writeln!(file, "{}", record.to_row().join("\t"))?;
        }
        Ok(())
    }

    fn write_jsonl(&self, rows: &[RecipeRecord]) -> OutputResult<()> {
        let Some(path) = &self.jsonl_path else {
            return Ok(());
        };
        ensure_parent_dir(path)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for record in rows {
            writeln!(file, "{}", serde_json::to_string(&record.to_json())?)?;
        }
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: u32) -> RecipeRecord {
        RecipeRecord::new(
            format!("Recipe {}", n),
            "mix and bake".into(),
            "flour, water".into(),
            format!("https://1000.menu/cooking/{}", n),
        )
    }

    #[test]
    fn test_tsv_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("out.tsv");

        let mut writer = ResultWriter::new(tsv.clone(), None, 1);
        writer.append(record(1)).unwrap();
        writer.append(record(2)).unwrap();
        writer.finalize().unwrap();

        let content = std::fs::read_to_string(&tsv).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("title\tinstructions\tingredients\turl"));
        assert!(lines[1].starts_with("Recipe 1\t"));
        assert!(lines[2].starts_with("Recipe 2\t"));
    }

    #[test]
    fn test_buffering_until_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("out.tsv");

        let mut writer = ResultWriter::new(tsv.clone(), None, 3);
        writer.append(record(1)).unwrap();
        writer.append(record(2)).unwrap();
        assert_eq!(writer.buffered(), 2);
        assert!(!tsv.exists());

        writer.append(record(3)).unwrap();
        assert_eq!(writer.buffered(), 0);
        assert!(tsv.exists());
    }

    #[test]
    fn test_jsonl_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("out.tsv");
        let jsonl = dir.path().join("out.jsonl");

        let mut writer = ResultWriter::new(tsv, Some(jsonl.clone()), 10);
        writer.append(record(1)).unwrap();
        writer.finalize().unwrap();

        let content = std::fs::read_to_string(&jsonl).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["title"], "Recipe 1");
        assert_eq!(parsed["url"], "https://1000.menu/cooking/1");
    }

    #[test]
    fn test_flush_on_empty_buffer_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("out.tsv");

        let mut writer = ResultWriter::new(tsv.clone(), None, 5);
        writer.flush().unwrap();
        assert!(!tsv.exists());
    }

    #[test]
    fn test_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("deep/nested/out.tsv");

        let mut writer = ResultWriter::new(tsv.clone(), None, 1);
        writer.append(record(1)).unwrap();
        assert!(tsv.exists());
    }

    #[test]
    fn test_append_across_writer_instances() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("out.tsv");

        {
            let mut writer = ResultWriter::new(tsv.clone(), None, 1);
            writer.append(record(1)).unwrap();
        }
        {
            let mut writer = ResultWriter::new(tsv.clone(), None, 1);
            writer.append(record(2)).unwrap();
        }

        let content = std::fs::read_to_string(&tsv).unwrap();
        // One header, two data rows, no repeated header.
        assert_eq!(content.lines().count(), 3);
        assert_eq!(content.matches("title\t").count(), 1);
    }
}
