use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{OpinionError, Result};
use crate::keywords::KeywordLibrary;
use crate::types::Platform;

/// TOML-backed pipeline configuration. Every section has defaults, so an
/// empty or absent file is a valid configuration. Secrets stay in the env.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub paths: PathsConfig,
    pub keywords: KeywordLibrary,
    pub date_range: DateRangeConfig,
    pub targets: TargetsConfig,
    pub clean: CleanConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub clean_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            raw_dir: "data/raw".into(),
            clean_dir: "data/clean".into(),
            analysis_dir: "data/analysis".into(),
            logs_dir: "logs".into(),
        }
    }
}

impl PathsConfig {
    pub fn clean_txt(&self) -> PathBuf {
        self.clean_dir.join("cleaned_opinions.txt")
    }

    pub fn clean_json(&self) -> PathBuf {
        self.clean_dir.join("cleaned_opinions.json")
    }

    pub fn clean_csv(&self) -> PathBuf {
        self.clean_dir.join("cleaned_opinions.csv")
    }

    pub fn analysis_json(&self) -> PathBuf {
        self.analysis_dir.join("analysis_results.json")
    }

    pub fn analysis_csv(&self) -> PathBuf {
        self.analysis_dir.join("analysis_results.csv")
    }

    /// Stats of the last `clean` run.
    pub fn clean_stats_json(&self) -> PathBuf {
        self.logs_dir.join("clean_stats.json")
    }
}

/// Publication window the crawl targeted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateRangeConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRangeConfig {
    /// Inclusive on both ends.
    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

impl Default for DateRangeConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetsConfig {
    pub weibo: usize,
    pub zhihu: usize,
    pub xiaohongshu: usize,
    pub total: usize,
}

impl TargetsConfig {
    pub fn for_platform(&self, platform: &Platform) -> Option<usize> {
        match platform {
            Platform::Weibo => Some(self.weibo),
            Platform::Zhihu => Some(self.zhihu),
            Platform::Xiaohongshu => Some(self.xiaohongshu),
            Platform::Other(_) => None,
        }
    }
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            weibo: 2500,
            zhihu: 1500,
            xiaohongshu: 800,
            total: 4800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanConfig {
    /// Minimum content length in characters.
    pub min_length: usize,
    /// Longer content is truncated to this many characters.
    pub max_length: usize,
    pub remove_duplicates: bool,
    pub remove_ads: bool,
    pub remove_urls: bool,
    pub remove_emojis: bool,
    pub remove_bracket_tags: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_length: 500,
            remove_duplicates: true,
            remove_ads: true,
            remove_urls: true,
            remove_emojis: true,
            remove_bracket_tags: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub retry_times: u32,
    pub retry_backoff_ms: u64,
    pub pause_every: usize,
    pub pause_ms: u64,
    pub progress_every: usize,
    pub checkpoint_every: usize,
    pub concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "glm-4-flash".into(),
            temperature: 0.3,
            top_p: 0.8,
            max_tokens: 500,
            retry_times: 3,
            retry_backoff_ms: 1000,
            pause_every: 10,
            pause_ms: 1000,
            progress_every: 5,
            checkpoint_every: 50,
            concurrency: 1,
        }
    }
}

impl FileConfig {
    /// Check cross-field constraints, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.keywords.is_empty() {
            problems.push("keyword library is empty".to_string());
        }
        if self.date_range.start > self.date_range.end {
            problems.push(format!(
                "date_range.start {} is after date_range.end {}",
                self.date_range.start, self.date_range.end
            ));
        }
        if self.clean.min_length > self.clean.max_length {
            problems.push(format!(
                "clean.min_length {} exceeds clean.max_length {}",
                self.clean.min_length, self.clean.max_length
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            problems.push(format!(
                "llm.temperature {} is outside [0, 2]",
                self.llm.temperature
            ));
        }
        if !(self.llm.top_p > 0.0 && self.llm.top_p <= 1.0) {
            problems.push(format!("llm.top_p {} is outside (0, 1]", self.llm.top_p));
        }
        if self.llm.concurrency == 0 {
            problems.push("llm.concurrency must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(OpinionError::Validation(problems.join("; ")))
        }
    }

    /// Create the data and log directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        let p = &self.paths;
        for dir in [&p.data_dir, &p.raw_dir, &p.clean_dir, &p.analysis_dir, &p.logs_dir] {
            std::fs::create_dir_all(dir).map_err(|e| OpinionError::io(dir, e))?;
        }
        Ok(())
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OpinionError::io(path, e))?;
    toml::from_str(&content).map_err(|source| OpinionError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `path` when given, defaults otherwise. The result is validated.
pub fn load_or_default(path: Option<&Path>) -> Result<FileConfig> {
    let config = match path {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FileConfig::default();
        config.validate().unwrap();
        assert_eq!(config.llm.model, "glm-4-flash");
        assert_eq!(config.targets.total, 4800);
        assert_eq!(config.clean.min_length, 10);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [clean]
            min_length = 5

            [llm]
            concurrency = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.clean.min_length, 5);
        assert_eq!(config.clean.max_length, 500);
        assert_eq!(config.llm.concurrency, 4);
        assert_eq!(config.llm.retry_times, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<FileConfig, _> = toml::from_str("[llm]\nbatch = 50\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut config = FileConfig::default();
        config.clean.min_length = 600;
        config.llm.top_p = 0.0;
        config.llm.concurrency = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("min_length"));
        assert!(err.contains("top_p"));
        assert!(err.contains("concurrency"));
    }

    #[test]
    fn load_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opinion.toml");
        std::fs::write(&path, "[date_range]\nstart = \"2025-07-01\"\nend = \"2025-08-01\"\n").unwrap();

        let config = load_or_default(Some(&path)).unwrap();
        assert_eq!(config.date_range.start, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    }

    #[test]
    fn ensure_dirs_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FileConfig::default();
        config.paths.data_dir = dir.path().join("data");
        config.paths.raw_dir = dir.path().join("data/raw");
        config.paths.clean_dir = dir.path().join("data/clean");
        config.paths.analysis_dir = dir.path().join("data/analysis");
        config.paths.logs_dir = dir.path().join("logs");

        config.ensure_dirs().unwrap();
        assert!(config.paths.analysis_dir.is_dir());
        assert!(config.paths.logs_dir.is_dir());
    }

    #[test]
    fn targets_and_date_range_lookups() {
        let config = FileConfig::default();
        assert_eq!(config.targets.for_platform(&Platform::Zhihu), Some(1500));
        assert_eq!(config.targets.for_platform(&Platform::parse("douyin")), None);

        let range = &config.date_range;
        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }
}
