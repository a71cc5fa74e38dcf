//! Delimited-text point plugin.
//!
//! Parses `id,x,y[,label]` lines into [`PointRecord`]s. Blank lines and
//! `#` comments are skipped; a `csv` or `txt` extension plus a parseable
//! first data line passes the probe.

use crate::error::{IngestError, Result};
use crate::plugin::{IngestPlugin, IngestRecord};
use lattice_index::ByteKey;
use lattice_store::adapter::point::{PointRecord, POINT_ADAPTER_ID};
use std::path::Path;
use tracing::info;

/// Plugin parsing point records from delimited text files.
pub struct PointCsvPlugin {
    extensions: Vec<&'static str>,
    target_indexes: Vec<ByteKey>,
}

impl PointCsvPlugin {
    /// A plugin routing records to the given indexes.
    pub fn new(target_indexes: Vec<ByteKey>) -> Self {
        PointCsvPlugin {
            extensions: vec!["csv", "txt"],
            target_indexes,
        }
    }

    fn parse_line(line: &str) -> Option<PointRecord> {
        let mut parts = line.split(',').map(str::trim);
        let id = parts.next()?;
        if id.is_empty() {
            return None;
        }
        let x: f64 = parts.next()?.parse().ok()?;
        let y: f64 = parts.next()?.parse().ok()?;
        let mut record = PointRecord::new(id, x, y);
        if let Some(label) = parts.next() {
            if !label.is_empty() {
                record = record.with_label(label);
            }
        }
        Some(record)
    }

    fn data_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
        content
            .lines()
            .enumerate()
            .map(|(n, l)| (n + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
    }
}

impl IngestPlugin<PointRecord> for PointCsvPlugin {
    fn file_extension_filters(&self) -> &[&str] {
        &self.extensions
    }

    fn supports(&self, path: &Path) -> bool {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                // the file may not be for this plugin at all
                info!(file = %path.display(), "unable to read file as point csv: {e}");
                return false;
            }
        };
        let result = match Self::data_lines(&content).next() {
            Some((_, line)) => Self::parse_line(line).is_some(),
            None => false,
        };
        result
    }

    fn to_records(&self, path: &Path) -> Result<Vec<IngestRecord<PointRecord>>> {
        let content = std::fs::read_to_string(path)?;
        let mut records = Vec::new();
        for (line_number, line) in Self::data_lines(&content) {
            let record = Self::parse_line(line).ok_or_else(|| IngestError::Parse {
                file: path.display().to_string(),
                detail: format!("malformed point on line {line_number}: {line:?}"),
            })?;
            records.push(IngestRecord {
                adapter_id: ByteKey::from(POINT_ADAPTER_ID),
                index_ids: self.target_indexes.clone(),
                record,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parses_points_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "points.csv",
            "# fixture\np1, 1.5, 2.5, depot\n\np2, -3.0, 4.0\n",
        );
        let plugin = PointCsvPlugin::new(vec![ByteKey::from("spatial")]);

        assert!(plugin.supports(&path));
        let records = plugin.to_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record.id, "p1");
        assert_eq!(records[0].record.label.as_deref(), Some("depot"));
        assert_eq!(records[0].index_ids, vec![ByteKey::from("spatial")]);
        assert_eq!(records[1].record.y, 4.0);
    }

    #[test]
    fn test_probe_rejects_non_point_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "other.csv", "name;value\nfoo;1\n");
        let plugin = PointCsvPlugin::new(vec![]);
        assert!(!plugin.supports(&path));
        assert!(!plugin.supports(&dir.path().join("missing.csv")));
    }

    #[test]
    fn test_malformed_line_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "points.csv", "p1, 1.0, 2.0\np2, not-a-number, 3.0\n");
        let plugin = PointCsvPlugin::new(vec![]);
        assert!(matches!(
            plugin.to_records(&path),
            Err(IngestError::Parse { .. })
        ));
    }
}
