use std::io::Write;
use std::path::{Path, PathBuf};

use opinion_common::{CleanFile, CleanOpinion, Dimension, OpinionAnalysis, OpinionError, Result};
use serde::Serialize;
use tracing::info;

/// Write `bytes` next to `path` and rename into place, creating parent
/// directories. Readers never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| OpinionError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    if let Err(e) = write() {
        let _ = std::fs::remove_file(&tmp);
        return Err(OpinionError::io(&tmp, e));
    }
    std::fs::rename(&tmp, path).map_err(|e| OpinionError::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Pretty JSON with non-ASCII text kept as-is.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| OpinionError::json(path, e))?;
    write_atomic(path, &json)
}

/// One opinion per line.
pub fn write_txt(path: &Path, opinions: &[CleanOpinion]) -> Result<()> {
    let mut body = String::new();
    for opinion in opinions {
        body.push_str(&opinion.content);
        body.push('\n');
    }
    write_atomic(path, body.as_bytes())?;
    info!(path = %path.display(), count = opinions.len(), "Wrote opinion lines");
    Ok(())
}

pub fn write_clean_json(path: &Path, opinions: &[CleanOpinion]) -> Result<()> {
    write_json(path, &CleanFile::new(opinions.to_vec()))?;
    info!(path = %path.display(), count = opinions.len(), "Wrote clean opinions");
    Ok(())
}

/// Header row plus one row per record, for spreadsheets.
fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut count = 0;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| OpinionError::io(path, e.into()))?;
        count += 1;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| OpinionError::io(path, e.into_error()))?;
    write_atomic(path, &bytes)?;
    Ok(count)
}

pub fn write_clean_csv(path: &Path, opinions: &[CleanOpinion]) -> Result<()> {
    let count = write_csv(path, opinions)?;
    info!(path = %path.display(), count, "Wrote clean opinions CSV");
    Ok(())
}

#[derive(Serialize)]
struct AnalysisRow<'a> {
    index: usize,
    source_text: &'a str,
    sentiment: String,
    sentiment_confidence: f64,
    topic: String,
    topic_confidence: f64,
    pattern: String,
    pattern_confidence: f64,
    risk_level: String,
    risk_confidence: f64,
    actor: String,
    actor_confidence: f64,
    key_phrase: &'a str,
    brief_summary: &'a str,
}

impl<'a> From<&'a OpinionAnalysis> for AnalysisRow<'a> {
    fn from(r: &'a OpinionAnalysis) -> Self {
        Self {
            index: r.index,
            source_text: &r.source_text,
            sentiment: r.label(Dimension::Sentiment),
            sentiment_confidence: r.sentiment_confidence,
            topic: r.label(Dimension::Topic),
            topic_confidence: r.topic_confidence,
            pattern: r.label(Dimension::Pattern),
            pattern_confidence: r.pattern_confidence,
            risk_level: r.label(Dimension::Risk),
            risk_confidence: r.risk_confidence,
            actor: r.label(Dimension::Actor),
            actor_confidence: r.actor_confidence,
            key_phrase: &r.key_phrase,
            brief_summary: &r.brief_summary,
        }
    }
}

/// Labeled results flattened to one row each; composite labels keep their
/// `a|b` form.
pub fn write_analysis_csv(path: &Path, records: &[OpinionAnalysis]) -> Result<()> {
    let count = write_csv(path, records.iter().map(AnalysisRow::from))?;
    info!(path = %path.display(), count, "Wrote analysis CSV");
    Ok(())
}

/// Trimmed, non-empty lines of an opinion text file.
pub fn read_opinion_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| OpinionError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn read_clean_json(path: &Path) -> Result<CleanFile> {
    let content = std::fs::read_to_string(path).map_err(|e| OpinionError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| OpinionError::json(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opinion_common::{content_hash, Platform};

    fn opinion(content: &str) -> CleanOpinion {
        CleanOpinion {
            content: content.to_string(),
            platform: Platform::Zhihu,
            keywords: "9810".into(),
            source_url: String::new(),
            crawl_time: String::new(),
            content_hash: content_hash(content),
        }
    }

    #[test]
    fn txt_round_trip_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean/opinions.txt");
        write_txt(&path, &[opinion("第一条"), opinion("  "), opinion("第二条")]).unwrap();

        assert_eq!(read_opinion_lines(&path).unwrap(), vec!["第一条", "第二条"]);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn clean_json_keeps_chinese_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opinions.json");
        write_clean_json(&path, &[opinion("跨境电商")]).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("跨境电商"));
        assert!(raw.contains("\"total\": 1"));

        let file = read_clean_json(&path).unwrap();
        assert_eq!(file.data[0].platform, Platform::Zhihu);
    }

    #[test]
    fn clean_csv_has_header_and_quotes_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean/opinions.csv");
        write_clean_csv(&path, &[opinion("税负重，但是合规, 没办法")]).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let mut lines = raw.lines();
        assert_eq!(
            lines.next(),
            Some("content,platform,keywords,source_url,crawl_time,content_hash")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("\"税负重，但是合规, 没办法\",zhihu,9810,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn analysis_csv_flattens_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.csv");
        let record = OpinionAnalysis {
            index: 7,
            source_text: "Temu涨价了".into(),
            sentiment: opinion_common::LabelSet::parse("negative"),
            sentiment_confidence: 0.9,
            actor: opinion_common::LabelSet::parse("consumer|government"),
            ..Default::default()
        };
        write_analysis_csv(&path, &[record]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "index");
        assert_eq!(headers.len(), 14);

        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "7");
        assert_eq!(&row[1], "Temu涨价了");
        assert_eq!(&row[2], "negative");
        assert_eq!(&row[3], "0.9");
        assert_eq!(&row[4], "unknown");
        assert_eq!(&row[10], "consumer|government");
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
