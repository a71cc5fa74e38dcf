//! Local-filesystem ingest driver.
//!
//! Recurses over a directory (or accepts a single file), filters candidates
//! by the plugins' extension lists, probes each candidate against each
//! plugin, and hands matching files to a caller-supplied sink. A file that
//! fails to parse is logged and skipped so one bad file does not abort a
//! bulk ingest; a missing input path is an error.

use crate::error::{IngestError, Result};
use crate::plugin::{IngestPlugin, IngestRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Counters reported after a driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Files handed to a plugin and parsed successfully.
    pub files_ingested: usize,
    /// Candidate files no plugin claimed.
    pub files_skipped: usize,
    /// Files a plugin claimed but failed to parse.
    pub files_failed: usize,
    /// Records produced across all parsed files.
    pub records: usize,
}

/// Recursive local-file ingest driver.
pub struct LocalFileDriver {
    /// Extra extension filter applied on top of each plugin's own list;
    /// empty means plugin lists only.
    extensions: Vec<String>,
}

impl LocalFileDriver {
    /// A driver honoring each plugin's extension list.
    pub fn new() -> Self {
        LocalFileDriver {
            extensions: Vec::new(),
        }
    }

    /// Restrict candidates to the given extensions (lowercase, no dot).
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Walk `input` and feed every parsed record to `sink`.
    ///
    /// Each (plugin name, plugin) pair is probed in order; the first plugin
    /// that claims a file parses it.
    pub fn process_input<T, F>(
        &self,
        input: &Path,
        plugins: &[(&str, &dyn IngestPlugin<T>)],
        mut sink: F,
    ) -> Result<IngestSummary>
    where
        F: FnMut(IngestRecord<T>) -> Result<()>,
    {
        if !input.exists() {
            return Err(IngestError::Input(format!(
                "input path '{}' does not exist",
                input.display()
            )));
        }

        let mut files = Vec::new();
        collect_files(input, &mut files)?;
        files.sort();

        let mut summary = IngestSummary::default();
        for file in files {
            let extension = file
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase)
                .unwrap_or_default();
            if !self.extensions.is_empty() && !self.extensions.contains(&extension) {
                continue;
            }

            let candidate = plugins.iter().find(|(_, plugin)| {
                plugin
                    .file_extension_filters()
                    .contains(&extension.as_str())
                    && plugin.supports(&file)
            });
            let Some((name, plugin)) = candidate.copied() else {
                debug!(file = %file.display(), "no plugin claimed file");
                summary.files_skipped += 1;
                continue;
            };

            match plugin.to_records(&file) {
                Ok(records) => {
                    debug!(
                        file = %file.display(),
                        plugin = name,
                        records = records.len(),
                        "file ingested"
                    );
                    summary.files_ingested += 1;
                    summary.records += records.len();
                    for record in records {
                        sink(record)?;
                    }
                }
                Err(e) => {
                    error!(file = %file.display(), plugin = name, "failed to ingest file: {e}");
                    summary.files_failed += 1;
                }
            }
        }

        info!(
            ingested = summary.files_ingested,
            skipped = summary.files_skipped,
            failed = summary.files_failed,
            records = summary.records,
            "local ingest complete"
        );
        Ok(summary)
    }
}

impl Default for LocalFileDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(());
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            collect_files(&entry_path, files)?;
        } else {
            files.push(entry_path);
        }
    }
    Ok(())
}
