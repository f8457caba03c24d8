//! The five labeling dimensions and their composite form.
//!
//! Every dimension keeps the values the labeling prompt asks for plus an
//! `Other` catch-all: models regularly invent labels (`media`, `student`) and
//! those must survive a load/save cycle untouched.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single value on one labeling dimension.
pub trait Label: Clone + PartialEq + fmt::Debug + Send + Sync {
    fn parse(raw: &str) -> Self;
    fn as_str(&self) -> &str;
}

macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            /// Values the labeling prompt offers, in prompt order.
            pub const KNOWN: &'static [&'static str] = &[$($wire),+];
        }

        impl Label for $name {
            fn parse(raw: &str) -> Self {
                let trimmed = raw.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($wire) {
                        return $name::$variant;
                    }
                )+
                $name::Other(trimmed.to_string())
            }

            fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Other(value) => value,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

label_enum!(
    /// Overall sentiment of an opinion.
    Sentiment {
        Positive => "positive",
        Neutral => "neutral",
        Negative => "negative",
    }
);

label_enum!(
    /// Core topic under discussion.
    Topic {
        TaxPolicy => "tax_policy",
        PriceImpact => "price_impact",
        Compliance => "compliance",
        BusinessRisk => "business_risk",
        Advocacy => "advocacy",
        Misc => "other",
    }
);

label_enum!(
    /// Cross-border e-commerce customs mode the opinion refers to.
    Pattern {
        Mode0110 => "0110",
        Mode9610 => "9610",
        Mode9710 => "9710",
        Mode9810 => "9810",
        Mode1039 => "1039",
        Temu => "Temu",
        Multiple => "multiple",
        Unknown => "unknown",
    }
);

label_enum!(
    /// Risk the opinion signals.
    RiskLevel {
        Critical => "critical",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
);

label_enum!(
    /// Main party involved.
    Actor {
        Enterprise => "enterprise",
        Consumer => "consumer",
        Government => "government",
        CrossBorderSeller => "cross_border_seller",
        GeneralPublic => "general_public",
        Multiple => "multiple",
    }
);

impl RiskLevel {
    /// Critical and high are reported together as "high risk".
    pub fn is_high(&self) -> bool {
        matches!(self, RiskLevel::Critical | RiskLevel::High)
    }

    /// Severity score used in weighted risk indexes.
    pub fn weight(&self) -> u32 {
        match self {
            RiskLevel::Critical => 100,
            RiskLevel::High => 75,
            RiskLevel::Medium => 50,
            RiskLevel::Low => 25,
            RiskLevel::Other(_) => 0,
        }
    }

    /// Display order, most severe first. Unknown levels sort last.
    pub fn rank(&self) -> u8 {
        match self {
            RiskLevel::Critical => 0,
            RiskLevel::High => 1,
            RiskLevel::Medium => 2,
            RiskLevel::Low => 3,
            RiskLevel::Other(_) => 4,
        }
    }
}

// =============================================================================
// LabelSet
// =============================================================================

/// One or more labels on a dimension, written `consumer|government` on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet<T: Label>(Vec<T>);

impl<T: Label> LabelSet<T> {
    pub fn new(labels: Vec<T>) -> Self {
        Self(labels)
    }

    pub fn single(label: T) -> Self {
        Self(vec![label])
    }

    /// Parse a raw (possibly composite) label. Empty components are dropped.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split('|')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(T::parse)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_composite(&self) -> bool {
        self.0.len() > 1
    }

    /// The label when exactly one was assigned.
    pub fn as_single(&self) -> Option<&T> {
        match self.0.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn primary(&self) -> Option<&T> {
        self.0.first()
    }

    pub fn split(&self) -> &[T] {
        &self.0
    }

    pub fn contains(&self, label: &T) -> bool {
        self.0.contains(label)
    }

    /// Canonical pipe-joined form, `"unknown"` when nothing was assigned.
    pub fn raw(&self) -> String {
        if self.0.is_empty() {
            return "unknown".to_string();
        }
        self.0
            .iter()
            .map(Label::as_str)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl<T: Label> Default for LabelSet<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T: Label> fmt::Display for LabelSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw())
    }
}

impl<T: Label> Serialize for LabelSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_empty() {
            return serializer.serialize_none();
        }
        serializer.serialize_str(&self.raw())
    }
}

impl<'de, T: Label> Deserialize<'de> for LabelSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(s) => LabelSet::parse(&s),
            serde_json::Value::Array(items) => LabelSet(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(T::parse)
                    .collect(),
            ),
            serde_json::Value::Number(n) => LabelSet::parse(&n.to_string()),
            _ => LabelSet::default(),
        })
    }
}

// =============================================================================
// Dimension
// =============================================================================

/// Addresses one of the five labeling dimensions generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Sentiment,
    Topic,
    Pattern,
    Risk,
    Actor,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Sentiment,
        Dimension::Topic,
        Dimension::Pattern,
        Dimension::Risk,
        Dimension::Actor,
    ];

    /// JSON field holding the label.
    pub fn field(self) -> &'static str {
        match self {
            Dimension::Sentiment => "sentiment",
            Dimension::Topic => "topic",
            Dimension::Pattern => "pattern",
            Dimension::Risk => "risk_level",
            Dimension::Actor => "actor",
        }
    }

    /// JSON field holding the label's confidence.
    pub fn confidence_field(self) -> &'static str {
        match self {
            Dimension::Sentiment => "sentiment_confidence",
            Dimension::Topic => "topic_confidence",
            Dimension::Pattern => "pattern_confidence",
            Dimension::Risk => "risk_confidence",
            Dimension::Actor => "actor_confidence",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}
