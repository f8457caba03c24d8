//! Raw post → clean opinion.
//!
//! Four passes in fixed order: dedup, length, ads, normalize. Each pass can
//! be switched off in `[clean]`, and each records its surviving count.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use opinion_common::{content_hash, CleanConfig, CleanOpinion, Platform, RawPost};
use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::sources::SourcedPost;

/// Phrases that mark promotional posts.
pub const AD_KEYWORDS: &[&str] = &[
    "购买", "点击这里", "扫码", "联系我", "微信号", "可以赚钱", "日赚", "月入", "包邮", "限时",
    "点一下", "长按识别", "点击链接", "领优惠", "代理", "加盟", "投资", "返利",
];

/// A short post with one ad phrase is treated as an ad.
const AD_SHORT_CHARS: usize = 20;

static RE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid url regex"));
static RE_EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{1F300}-\x{1F9FF}\x{2600}-\x{27BF}]").expect("valid emoji regex")
});
static RE_BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").expect("valid bracket regex"));
static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

// =============================================================================
// Stats
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanStats {
    pub total_raw: usize,
    pub after_dedup: usize,
    pub after_length: usize,
    pub after_ads: usize,
    pub final_count: usize,
    pub truncated: usize,
}

impl CleanStats {
    /// Share of raw posts that survived, as a percentage.
    pub fn retention_rate(&self) -> f64 {
        if self.total_raw == 0 {
            return 0.0;
        }
        self.final_count as f64 / self.total_raw as f64 * 100.0
    }
}

impl fmt::Display for CleanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Cleaning Complete ===")?;
        writeln!(f, "Raw posts:        {}", self.total_raw)?;
        writeln!(f, "After dedup:      {}", self.after_dedup)?;
        writeln!(f, "After length:     {}", self.after_length)?;
        writeln!(f, "After ad filter:  {}", self.after_ads)?;
        writeln!(f, "Final:            {}", self.final_count)?;
        writeln!(f, "Truncated:        {}", self.truncated)?;
        writeln!(f, "Retention:        {:.1}%", self.retention_rate())
    }
}

// =============================================================================
// Passes
// =============================================================================

struct Draft {
    platform: Platform,
    content: String,
    post: RawPost,
}

/// Does the text read as an advertisement?
pub fn is_ad(content: &str) -> bool {
    let short = content.chars().count() < AD_SHORT_CHARS;
    AD_KEYWORDS.iter().any(|kw| {
        let hits = content.matches(kw).count();
        hits > 0 && (hits > 1 || short)
    })
}

/// Strip URLs, emoji and `[tag]` markup per config, then collapse whitespace.
pub fn normalize(content: &str, config: &CleanConfig) -> String {
    let mut text = content.to_string();
    if config.remove_urls {
        text = RE_URL.replace_all(&text, "").into_owned();
    }
    if config.remove_emojis {
        text = RE_EMOJI.replace_all(&text, "").into_owned();
    }
    if config.remove_bracket_tags {
        text = RE_BRACKET_TAG.replace_all(&text, "").into_owned();
    }
    RE_WHITESPACE.replace_all(&text, " ").trim().to_string()
}

pub struct Cleaner {
    config: CleanConfig,
}

impl Cleaner {
    pub fn new(config: CleanConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, posts: Vec<SourcedPost>) -> (Vec<CleanOpinion>, CleanStats) {
        let mut stats = CleanStats {
            total_raw: posts.len(),
            ..Default::default()
        };

        let drafts = self.dedup(posts);
        stats.after_dedup = drafts.len();
        info!(before = stats.total_raw, after = stats.after_dedup, "Dedup pass");

        let drafts = self.filter_length(drafts, &mut stats.truncated);
        stats.after_length = drafts.len();
        info!(
            before = stats.after_dedup,
            after = stats.after_length,
            truncated = stats.truncated,
            "Length pass"
        );

        let drafts: Vec<Draft> = if self.config.remove_ads {
            drafts.into_iter().filter(|d| !is_ad(&d.content)).collect()
        } else {
            drafts
        };
        stats.after_ads = drafts.len();
        info!(before = stats.after_length, after = stats.after_ads, "Ad pass");

        let opinions: Vec<CleanOpinion> = drafts
            .into_iter()
            .filter_map(|draft| self.finish(draft))
            .collect();
        stats.final_count = opinions.len();
        info!(
            before = stats.after_ads,
            after = stats.final_count,
            retention = format!("{:.1}%", stats.retention_rate()).as_str(),
            "Normalize pass"
        );

        (opinions, stats)
    }

    /// Drop empty posts, then keep the first post for each distinct content.
    fn dedup(&self, posts: Vec<SourcedPost>) -> Vec<Draft> {
        let mut seen = HashSet::new();
        posts
            .into_iter()
            .filter_map(|SourcedPost { platform, post }| {
                let content = post.content().to_string();
                if content.is_empty() {
                    return None;
                }
                if self.config.remove_duplicates && !seen.insert(content_hash(&content)) {
                    return None;
                }
                Some(Draft {
                    platform,
                    content,
                    post,
                })
            })
            .collect()
    }

    fn filter_length(&self, drafts: Vec<Draft>, truncated: &mut usize) -> Vec<Draft> {
        drafts
            .into_iter()
            .filter(|d| d.content.chars().count() >= self.config.min_length)
            .map(|mut d| {
                let cut = d.content.char_indices().nth(self.config.max_length);
                if let Some((cut, _)) = cut {
                    d.content.truncate(cut);
                    *truncated += 1;
                }
                d
            })
            .collect()
    }

    fn finish(&self, draft: Draft) -> Option<CleanOpinion> {
        let content = normalize(&draft.content, &self.config);
        if content.is_empty() {
            return None;
        }
        Some(CleanOpinion {
            content_hash: content_hash(&content),
            platform: draft.platform,
            keywords: draft.post.keywords(),
            source_url: draft.post.source_url().to_string(),
            crawl_time: draft.post.crawl_time(),
            content,
        })
    }
}
