use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use opinion_common::{AnalysisFile, AnalysisMetadata, OpinionAnalysis, OpinionError, Result};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::analyzer::{ResultSink, RunCounts};
use crate::export::write_json;
use crate::report::round1;

pub fn load_analysis(path: &Path) -> Result<AnalysisFile> {
    let content = std::fs::read_to_string(path).map_err(|e| OpinionError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| OpinionError::json(path, e))
}

/// Load `path` if it exists, an empty file otherwise.
pub fn load_analysis_or_default(path: &Path) -> Result<AnalysisFile> {
    if path.exists() {
        load_analysis(path)
    } else {
        Ok(AnalysisFile::default())
    }
}

pub fn save_analysis(path: &Path, file: &AnalysisFile) -> Result<()> {
    write_json(path, file)?;
    info!(path = %path.display(), records = file.data.len(), "Saved analysis results");
    Ok(())
}

/// Union of two result sets keyed by source text. `incoming` wins on
/// conflict; the merged data is ordered by index.
pub fn merge(base: &AnalysisFile, incoming: &AnalysisFile) -> AnalysisFile {
    let mut by_text: HashMap<&str, &OpinionAnalysis> = HashMap::new();
    for record in base.data.iter().chain(&incoming.data) {
        by_text.insert(record.source_text.as_str(), record);
    }

    let mut data: Vec<OpinionAnalysis> = by_text.into_values().cloned().collect();
    data.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.source_text.cmp(&b.source_text)));

    let model = if incoming.metadata.model.is_empty() {
        base.metadata.model.clone()
    } else {
        incoming.metadata.model.clone()
    };
    let metadata = AnalysisMetadata {
        model,
        run_id: incoming.metadata.run_id.clone(),
        last_updated: Some(Utc::now()),
        success_rate: incoming.metadata.success_rate,
        failed: incoming.metadata.failed,
        total: 0,
    };
    AnalysisFile::new(metadata, data)
}

/// Renumber records 1..=n in their current order. Runs that restart their
/// numbering leave duplicate indexes behind once merged; this repairs them.
/// Returns how many records changed index.
pub fn reindex(file: &mut AnalysisFile) -> usize {
    let mut changed = 0;
    for (position, record) in file.data.iter_mut().enumerate() {
        if record.index != position + 1 {
            record.index = position + 1;
            changed += 1;
        }
    }
    file.metadata.total = file.data.len();
    if changed > 0 {
        file.metadata.last_updated = Some(Utc::now());
    }
    changed
}

/// Opinions whose text has no result yet, in input order.
pub fn unanalyzed<'a>(opinions: &'a [String], file: &AnalysisFile) -> Vec<&'a str> {
    let done: HashSet<&str> = file.data.iter().map(|a| a.source_text.as_str()).collect();
    opinions
        .iter()
        .map(String::as_str)
        .filter(|text| !done.contains(text))
        .collect()
}

// =============================================================================
// Progress
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    /// The file exists but does not parse yet, usually mid-write.
    InProgress { size: u64 },
    Completed {
        size: u64,
        total: usize,
        success_rate: Option<f64>,
    },
}

pub fn check_progress(path: &Path) -> ProgressStatus {
    let Ok(meta) = std::fs::metadata(path) else {
        return ProgressStatus::NotStarted;
    };
    let size = meta.len();
    match load_analysis(path) {
        Ok(file) => ProgressStatus::Completed {
            size,
            total: file.data.len(),
            success_rate: file.metadata.success_rate,
        },
        Err(_) => ProgressStatus::InProgress { size },
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressStatus::NotStarted => write!(f, "not started"),
            ProgressStatus::InProgress { size } => write!(f, "in progress ({size} bytes)"),
            ProgressStatus::Completed {
                size,
                total,
                success_rate,
            } => {
                write!(f, "completed: {total} records, {size} bytes")?;
                if let Some(rate) = success_rate {
                    write!(f, ", success {rate:.1}%")?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// FileSink
// =============================================================================

/// Persists a run to an analysis file, merged over the results it started from.
pub struct FileSink {
    path: PathBuf,
    base: AnalysisFile,
    model: String,
    run_id: String,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, base: AnalysisFile, model: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            base,
            model: model.into(),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl ResultSink for FileSink {
    fn save(&mut self, results: &[OpinionAnalysis], counts: RunCounts) -> Result<()> {
        let incoming = AnalysisFile::new(
            AnalysisMetadata {
                model: self.model.clone(),
                run_id: self.run_id.clone(),
                success_rate: Some(round1(counts.success_rate())),
                failed: counts.failed,
                ..Default::default()
            },
            results.to_vec(),
        );
        save_analysis(&self.path, &merge(&self.base, &incoming))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, index: usize, sentiment: &str) -> OpinionAnalysis {
        OpinionAnalysis {
            source_text: text.into(),
            index,
            sentiment: opinion_common::LabelSet::parse(sentiment),
            ..Default::default()
        }
    }

    fn file(data: Vec<OpinionAnalysis>) -> AnalysisFile {
        AnalysisFile::new(AnalysisMetadata::default(), data)
    }

    #[test]
    fn merge_prefers_incoming_and_orders_by_index() {
        let base = file(vec![record("a", 3, "neutral"), record("b", 1, "neutral")]);
        let incoming = file(vec![record("a", 3, "negative"), record("c", 2, "positive")]);

        let merged = merge(&base, &incoming);
        let texts: Vec<&str> = merged.data.iter().map(|r| r.source_text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c", "a"]);
        assert_eq!(merged.data[2].sentiment.raw(), "negative");
        assert_eq!(merged.metadata.total, 3);
        assert!(merged.metadata.last_updated.is_some());
    }

    #[test]
    fn reindex_repairs_restarted_numbering() {
        // two runs that each numbered from 1, merged back to back
        let mut merged = file(vec![
            record("a", 1, "neutral"),
            record("b", 2, "neutral"),
            record("c", 1, "negative"),
            record("d", 2, "positive"),
        ]);
        assert!(!crate::verify(&merged.data).passed());

        assert_eq!(reindex(&mut merged), 2);
        let indexes: Vec<usize> = merged.data.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4]);
        assert_eq!(merged.data[2].source_text, "c");
        assert!(merged.metadata.last_updated.is_some());
        assert!(crate::verify(&merged.data).passed());

        assert_eq!(reindex(&mut merged), 0);
    }

    #[test]
    fn unanalyzed_keeps_input_order() {
        let opinions = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let done = file(vec![record("y", 2, "neutral")]);
        assert_eq!(unanalyzed(&opinions, &done), vec!["x", "z"]);
    }

    #[test]
    fn progress_states() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        assert_eq!(check_progress(&path), ProgressStatus::NotStarted);

        std::fs::write(&path, "{\"data\": [").unwrap();
        assert!(matches!(check_progress(&path), ProgressStatus::InProgress { .. }));

        save_analysis(&path, &file(vec![record("a", 1, "neutral")])).unwrap();
        assert!(matches!(
            check_progress(&path),
            ProgressStatus::Completed { total: 1, .. }
        ));
    }

    #[test]
    fn file_sink_merges_over_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/analysis.json");
        let mut sink = FileSink::new(&path, file(vec![record("old", 1, "neutral")]), "glm-4-flash");

        sink.save(
            &[record("new", 2, "negative")],
            RunCounts {
                succeeded: 1,
                failed: 1,
            },
        )
        .unwrap();

        let saved = load_analysis(&path).unwrap();
        assert_eq!(saved.data.len(), 2);
        assert_eq!(saved.metadata.model, "glm-4-flash");
        assert_eq!(saved.metadata.success_rate, Some(50.0));
        assert_eq!(saved.metadata.run_id, sink.run_id());
    }
}
