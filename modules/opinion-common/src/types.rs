use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::labels::{Actor, Dimension, LabelSet, Pattern, RiskLevel, Sentiment, Topic};

// =============================================================================
// Platform
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    Weibo,
    Zhihu,
    Xiaohongshu,
    Other(String),
}

impl Platform {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "weibo" | "wb" => Platform::Weibo,
            "zhihu" => Platform::Zhihu,
            "xiaohongshu" | "xhs" => Platform::Xiaohongshu,
            other => Platform::Other(other.to_string()),
        }
    }

    /// Platform for a raw-data subdirectory such as `data/raw/xhs`.
    pub fn from_dir_name(name: &str) -> Self {
        Platform::parse(name)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Platform::Weibo => "weibo",
            Platform::Zhihu => "zhihu",
            Platform::Xiaohongshu => "xiaohongshu",
            Platform::Other(name) => name,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Platform {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Platform::parse(&raw))
    }
}

// =============================================================================
// Raw crawler output
// =============================================================================

/// One item from a crawler dump. Crawlers disagree on field names, so the
/// object is kept as-is and read through accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPost(pub serde_json::Map<String, serde_json::Value>);

impl RawPost {
    /// First non-empty of `content`, `text`, `desc`, `title`, trimmed.
    pub fn content(&self) -> &str {
        self.first_str(&["content", "text", "desc", "title"])
    }

    pub fn keywords(&self) -> String {
        match self.first_value(&["keyword", "tag_list", "source_keyword"]) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(","),
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        }
    }

    pub fn source_url(&self) -> &str {
        self.first_str(&["source_url", "note_url", "url"])
    }

    pub fn crawl_time(&self) -> String {
        match self.first_value(&["crawl_time", "time"]) {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    /// The item's own `platform` field, if it carries one.
    pub fn platform(&self) -> Option<Platform> {
        let raw = self.first_str(&["platform"]);
        (!raw.is_empty()).then(|| Platform::parse(raw))
    }

    fn first_value(&self, keys: &[&str]) -> Option<&serde_json::Value> {
        keys.iter().filter_map(|k| self.0.get(*k)).find(|v| match v {
            serde_json::Value::String(s) => !s.trim().is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            serde_json::Value::Null => false,
            _ => true,
        })
    }

    fn first_str(&self, keys: &[&str]) -> &str {
        keys.iter()
            .filter_map(|k| self.0.get(*k).and_then(|v| v.as_str()))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

/// SHA-256 hex digest of the text, used as the dedup key.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

// =============================================================================
// Clean opinions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanOpinion {
    pub content: String,
    pub platform: Platform,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub crawl_time: String,
    #[serde(default)]
    pub content_hash: String,
}

/// `{ "total": n, "data": [...] }` as written by the clean step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanFile {
    pub total: usize,
    pub data: Vec<CleanOpinion>,
}

impl CleanFile {
    pub fn new(data: Vec<CleanOpinion>) -> Self {
        Self {
            total: data.len(),
            data,
        }
    }
}

// =============================================================================
// LLM analysis
// =============================================================================

/// One opinion labeled on the five dimensions.
///
/// Every field is optional on the wire; confidences are clamped to `[0, 1]`
/// and read from numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpinionAnalysis {
    #[serde(default)]
    pub sentiment: LabelSet<Sentiment>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub sentiment_confidence: f64,
    #[serde(default)]
    pub topic: LabelSet<Topic>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub topic_confidence: f64,
    #[serde(default)]
    pub pattern: LabelSet<Pattern>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub pattern_confidence: f64,
    #[serde(default)]
    pub risk_level: LabelSet<RiskLevel>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub risk_confidence: f64,
    #[serde(default)]
    pub actor: LabelSet<Actor>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub actor_confidence: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub key_phrase: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brief_summary: String,
    #[serde(default)]
    pub source_text: String,
    #[serde(default)]
    pub index: usize,
}

impl OpinionAnalysis {
    /// Raw label on a dimension, composite labels kept joined.
    pub fn label(&self, dim: Dimension) -> String {
        match dim {
            Dimension::Sentiment => self.sentiment.raw(),
            Dimension::Topic => self.topic.raw(),
            Dimension::Pattern => self.pattern.raw(),
            Dimension::Risk => self.risk_level.raw(),
            Dimension::Actor => self.actor.raw(),
        }
    }

    /// Individual labels on a dimension, composite labels split.
    pub fn components(&self, dim: Dimension) -> Vec<String> {
        fn names<T: crate::labels::Label>(set: &LabelSet<T>) -> Vec<String> {
            if set.is_empty() {
                return vec!["unknown".to_string()];
            }
            set.split().iter().map(|l| l.as_str().to_string()).collect()
        }
        match dim {
            Dimension::Sentiment => names(&self.sentiment),
            Dimension::Topic => names(&self.topic),
            Dimension::Pattern => names(&self.pattern),
            Dimension::Risk => names(&self.risk_level),
            Dimension::Actor => names(&self.actor),
        }
    }

    pub fn confidence(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Sentiment => self.sentiment_confidence,
            Dimension::Topic => self.topic_confidence,
            Dimension::Pattern => self.pattern_confidence,
            Dimension::Risk => self.risk_confidence,
            Dimension::Actor => self.actor_confidence,
        }
    }

    /// Exactly one risk label, and it is critical or high.
    pub fn is_high_risk(&self) -> bool {
        self.risk_level.as_single().is_some_and(RiskLevel::is_high)
    }

    /// Mean of the five confidences.
    pub fn mean_confidence(&self) -> f64 {
        Dimension::ALL
            .iter()
            .map(|d| self.confidence(*d))
            .sum::<f64>()
            / Dimension::ALL.len() as f64
    }

    /// Clamp every confidence into `[0, 1]`; NaN becomes 0.
    pub fn clamp_confidences(&mut self) {
        for conf in [
            &mut self.sentiment_confidence,
            &mut self.topic_confidence,
            &mut self.pattern_confidence,
            &mut self.risk_confidence,
            &mut self.actor_confidence,
        ] {
            *conf = clamp_unit(*conf);
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn lenient_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().map(|v| v / 100.0).unwrap_or(0.0),
                None => s.parse().unwrap_or(0.0),
            }
        }
        _ => 0.0,
    };
    Ok(clamp_unit(parsed))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("，"),
        other => other.to_string(),
    })
}

// =============================================================================
// Analysis results file
// =============================================================================

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC. Anything else is dropped.
fn lenient_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|t| t.and_utc())
            })
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    #[serde(default, alias = "total_records")]
    pub total: usize,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default, deserialize_with = "lenient_time")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Percentage of attempted opinions that were labeled.
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisFile {
    pub metadata: AnalysisMetadata,
    pub data: Vec<OpinionAnalysis>,
}

impl AnalysisFile {
    pub fn new(metadata: AnalysisMetadata, data: Vec<OpinionAnalysis>) -> Self {
        let mut file = Self { metadata, data };
        file.metadata.total = file.data.len();
        file
    }

    /// Accepts a bare list, the flat `{total, model, data}` envelope, or
    /// `{metadata, data}`.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        use serde_json::Value;

        let (metadata, data) = match value {
            Value::Array(_) => (AnalysisMetadata::default(), value),
            Value::Object(mut map) => {
                let data = map.remove("data").unwrap_or(Value::Array(Vec::new()));
                let metadata = match map.remove("metadata") {
                    Some(meta @ Value::Object(_)) => serde_json::from_value(meta)?,
                    _ => {
                        // Flat envelope; older files wrote success_rate as "93.5%".
                        if let Some(Value::String(rate)) = map.get("success_rate").cloned() {
                            let parsed = rate.trim_end_matches('%').trim().parse::<f64>().ok();
                            map.insert(
                                "success_rate".into(),
                                parsed.map(Value::from).unwrap_or(Value::Null),
                            );
                        }
                        serde_json::from_value(Value::Object(map))?
                    }
                };
                (metadata, data)
            }
            _ => (AnalysisMetadata::default(), Value::Array(Vec::new())),
        };

        let data: Vec<OpinionAnalysis> = serde_json::from_value(data)?;
        Ok(Self::new(metadata, data))
    }
}

impl<'de> Deserialize<'de> for AnalysisFile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        AnalysisFile::from_value(value).map_err(serde::de::Error::custom)
    }
}
