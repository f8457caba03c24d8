use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Platform;

/// Search terms grouped by what they match: customs modes, tax vocabulary,
/// and sentiment cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeywordLibrary {
    pub modes: Vec<String>,
    pub tax: Vec<String>,
    pub sentiment: Vec<String>,
}

const DEFAULT_MODES: &[&str] = &["0110", "9610", "9710", "9810", "1039", "Temu"];
const DEFAULT_TAX: &[&str] = &["增值税", "跨境电商", "税收政策", "补税", "纳税", "报税", "合规"];
const DEFAULT_SENTIMENT: &[&str] = &["困难", "焦虑", "方案", "讨论", "怎么办", "求助", "分享"];

/// Xiaohongshu search is slow and noisy, so it gets a short fixed list.
const XIAOHONGSHU: &[&str] = &["9610", "Temu", "增值税", "跨境电商"];

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for KeywordLibrary {
    fn default() -> Self {
        Self {
            modes: owned(DEFAULT_MODES),
            tax: owned(DEFAULT_TAX),
            sentiment: owned(DEFAULT_SENTIMENT),
        }
    }
}

impl KeywordLibrary {
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty() && self.tax.is_empty() && self.sentiment.is_empty()
    }

    /// Every keyword once, sorted.
    pub fn flat(&self) -> Vec<String> {
        self.modes
            .iter()
            .chain(&self.tax)
            .chain(&self.sentiment)
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn for_platform(&self, platform: &Platform) -> Vec<String> {
        match platform {
            Platform::Zhihu => {
                let mut words: Vec<String> = Vec::new();
                for w in self.modes.iter().chain(&self.tax) {
                    if !words.contains(w) {
                        words.push(w.clone());
                    }
                }
                words
            }
            Platform::Xiaohongshu => owned(XIAOHONGSHU),
            Platform::Weibo | Platform::Other(_) => self.flat(),
        }
    }
}
