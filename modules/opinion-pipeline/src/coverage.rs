//! Collected volume against the configured per-platform targets and the
//! crawl date window.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use opinion_common::{CleanOpinion, DateRangeConfig, Platform, TargetsConfig};
use serde::Serialize;

use crate::report::pct;

const KNOWN_PLATFORMS: [Platform; 3] = [Platform::Weibo, Platform::Zhihu, Platform::Xiaohongshu];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformCoverage {
    pub platform: String,
    pub count: usize,
    pub target: Option<usize>,
    /// Share of the target reached; may exceed 100.
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverage {
    pub platforms: Vec<PlatformCoverage>,
    pub total: usize,
    pub total_target: usize,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub in_range: usize,
    pub out_of_range: usize,
    /// No parseable crawl time.
    pub undated: usize,
}

impl Coverage {
    pub fn total_percent(&self) -> f64 {
        pct(self.total, self.total_target)
    }
}

/// Calendar date of a crawler timestamp: `YYYY-MM-DD...` text or unix
/// seconds/milliseconds.
pub fn crawl_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(date) = raw
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
    {
        return Some(date);
    }
    let stamp: i64 = raw.parse().ok()?;
    let time = if stamp > 1_000_000_000_000 {
        DateTime::from_timestamp_millis(stamp)?
    } else {
        DateTime::from_timestamp(stamp, 0)?
    };
    Some(time.date_naive())
}

pub fn coverage(
    opinions: &[CleanOpinion],
    targets: &TargetsConfig,
    range: &DateRangeConfig,
) -> Coverage {
    let mut counts: HashMap<&Platform, usize> = HashMap::new();
    let (mut in_range, mut out_of_range, mut undated) = (0, 0, 0);
    for opinion in opinions {
        *counts.entry(&opinion.platform).or_default() += 1;
        match crawl_date(&opinion.crawl_time) {
            Some(date) if range.contains(date) => in_range += 1,
            Some(_) => out_of_range += 1,
            None => undated += 1,
        }
    }

    let mut platforms: Vec<PlatformCoverage> = KNOWN_PLATFORMS
        .iter()
        .map(|p| row(p, counts.get(p).copied().unwrap_or(0), targets))
        .collect();
    let mut others: Vec<PlatformCoverage> = counts
        .into_iter()
        .filter(|(p, _)| !KNOWN_PLATFORMS.contains(*p))
        .map(|(p, n)| row(p, n, targets))
        .collect();
    others.sort_by(|a, b| a.platform.cmp(&b.platform));
    platforms.extend(others);

    Coverage {
        platforms,
        total: opinions.len(),
        total_target: targets.total,
        range_start: range.start,
        range_end: range.end,
        in_range,
        out_of_range,
        undated,
    }
}

fn row(platform: &Platform, count: usize, targets: &TargetsConfig) -> PlatformCoverage {
    let target = targets.for_platform(platform);
    PlatformCoverage {
        platform: platform.as_str().to_string(),
        count,
        target,
        percent: target.map(|t| pct(count, t)),
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Collection Coverage ===")?;
        for p in &self.platforms {
            match (p.target, p.percent) {
                (Some(target), Some(percent)) => writeln!(
                    f,
                    "{:<12} {:>6} / {:<6} ({percent:.1}%)",
                    p.platform, p.count, target
                )?,
                _ => writeln!(f, "{:<12} {:>6}", p.platform, p.count)?,
            }
        }
        writeln!(
            f,
            "{:<12} {:>6} / {:<6} ({:.1}%)",
            "total",
            self.total,
            self.total_target,
            self.total_percent()
        )?;
        writeln!(
            f,
            "Window {} .. {}: {} inside, {} outside, {} undated",
            self.range_start, self.range_end, self.in_range, self.out_of_range, self.undated
        )
    }
}
