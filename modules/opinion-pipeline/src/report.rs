//! Aggregate metrics over labeled opinions.
//!
//! Everything here is a pure function of `&[OpinionAnalysis]`. Percentages
//! are computed unrounded and rounded to one decimal only for presentation.

use std::collections::HashMap;
use std::fmt;

use opinion_common::display::translate;
use opinion_common::{Dimension, Label, OpinionAnalysis, RiskLevel, Sentiment};
use serde::Serialize;

pub(crate) fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

// =============================================================================
// Distribution
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

/// Label counts, most frequent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub dimension: Option<Dimension>,
    pub total: usize,
    pub buckets: Vec<Bucket>,
}

impl Distribution {
    fn from_labels<I: IntoIterator<Item = String>>(dimension: Option<Dimension>, labels: I) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut total = 0;
        for label in labels {
            *counts.entry(label).or_default() += 1;
            total += 1;
        }
        let mut buckets: Vec<Bucket> = counts
            .into_iter()
            .map(|(label, count)| Bucket {
                label,
                count,
                percent: 0.0,
            })
            .collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        assign_tenths(&mut buckets, total);
        Self {
            dimension,
            total,
            buckets,
        }
    }

    pub fn top(&self, n: usize) -> &[Bucket] {
        &self.buckets[..n.min(self.buckets.len())]
    }

    pub fn count(&self, label: &str) -> usize {
        self.buckets
            .iter()
            .find(|b| b.label == label)
            .map_or(0, |b| b.count)
    }

    /// Rounded percentages in bucket order.
    pub fn percentages(&self) -> Vec<(String, f64)> {
        self.buckets
            .iter()
            .map(|b| (b.label.clone(), b.percent))
            .collect()
    }

    /// Unrounded share of `label`.
    pub fn share(&self, label: &str) -> f64 {
        pct(self.count(label), self.total)
    }

    pub fn counted(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Largest-remainder rounding to one decimal: the rounded percentages of a
/// non-empty distribution add up to exactly 100.0.
fn assign_tenths(buckets: &mut [Bucket], total: usize) {
    if total == 0 {
        return;
    }
    const WHOLE: usize = 1000;
    let mut tenths: Vec<usize> = buckets.iter().map(|b| b.count * WHOLE / total).collect();
    let mut leftover = WHOLE - tenths.iter().sum::<usize>();

    // Buckets are already in display order, so ties go to the larger bucket.
    let mut by_remainder: Vec<usize> = (0..buckets.len()).collect();
    by_remainder.sort_by_key(|&i| std::cmp::Reverse(buckets[i].count * WHOLE % total));
    for i in by_remainder {
        if leftover == 0 {
            break;
        }
        tenths[i] += 1;
        leftover -= 1;
    }

    for (bucket, t) in buckets.iter_mut().zip(tenths) {
        bucket.percent = t as f64 / 10.0;
    }
}

/// One bucket per raw label; composite labels count as their own value.
pub fn distribution(records: &[OpinionAnalysis], dim: Dimension) -> Distribution {
    Distribution::from_labels(Some(dim), records.iter().map(|r| r.label(dim)))
}

/// Composite labels count once per component. `total` is the number of
/// components, not records.
pub fn split_distribution(records: &[OpinionAnalysis], dim: Dimension) -> Distribution {
    Distribution::from_labels(Some(dim), records.iter().flat_map(|r| r.components(dim)))
}

// =============================================================================
// Crosstab
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crosstab {
    pub row_dim: Dimension,
    pub col_dim: Dimension,
    /// Row labels, largest row first.
    pub rows: Vec<String>,
    /// Column labels, largest column first.
    pub cols: Vec<String>,
    /// `cells[r][c]` counts records with row label `rows[r]` and column label `cols[c]`.
    pub cells: Vec<Vec<usize>>,
    pub row_totals: Vec<usize>,
    pub col_totals: Vec<usize>,
    pub total: usize,
}

impl Crosstab {
    pub fn get(&self, row: &str, col: &str) -> usize {
        let r = self.rows.iter().position(|l| l == row);
        let c = self.cols.iter().position(|l| l == col);
        match (r, c) {
            (Some(r), Some(c)) => self.cells[r][c],
            _ => 0,
        }
    }
}

/// Count records by row label × column label. With `split_rows`, a composite
/// row label contributes one count per component.
pub fn crosstab(
    records: &[OpinionAnalysis],
    row_dim: Dimension,
    col_dim: Dimension,
    split_rows: bool,
) -> Crosstab {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for record in records {
        let col = record.label(col_dim);
        let rows = if split_rows {
            record.components(row_dim)
        } else {
            vec![record.label(row_dim)]
        };
        pairs.extend(rows.into_iter().map(|row| (row, col.clone())));
    }

    let rows = ordered_labels(pairs.iter().map(|(r, _)| r));
    let cols = ordered_labels(pairs.iter().map(|(_, c)| c));
    let mut cells = vec![vec![0usize; cols.len()]; rows.len()];
    for (row, col) in &pairs {
        if let (Some(r), Some(c)) = (
            rows.iter().position(|l| l == row),
            cols.iter().position(|l| l == col),
        ) {
            cells[r][c] += 1;
        }
    }

    let row_totals: Vec<usize> = cells.iter().map(|row| row.iter().sum()).collect();
    let col_totals: Vec<usize> = (0..cols.len())
        .map(|c| cells.iter().map(|row| row[c]).sum())
        .collect();

    Crosstab {
        row_dim,
        col_dim,
        total: row_totals.iter().sum(),
        rows,
        cols,
        cells,
        row_totals,
        col_totals,
    }
}

fn ordered_labels<'a>(labels: impl Iterator<Item = &'a String>) -> Vec<String> {
    Distribution::from_labels(None, labels.cloned())
        .buckets
        .into_iter()
        .map(|b| b.label)
        .collect()
}

// =============================================================================
// Confidence
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceStats {
    pub sentiment: f64,
    pub topic: f64,
    pub pattern: f64,
    pub risk: f64,
    pub actor: f64,
    /// Mean over all five dimensions.
    pub overall: f64,
}

impl ConfidenceStats {
    pub fn get(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Sentiment => self.sentiment,
            Dimension::Topic => self.topic,
            Dimension::Pattern => self.pattern,
            Dimension::Risk => self.risk,
            Dimension::Actor => self.actor,
        }
    }
}

pub fn confidence_stats(records: &[OpinionAnalysis]) -> ConfidenceStats {
    let per = |dim: Dimension| mean(records.iter().map(|r| r.confidence(dim)));
    ConfidenceStats {
        sentiment: per(Dimension::Sentiment),
        topic: per(Dimension::Topic),
        pattern: per(Dimension::Pattern),
        risk: per(Dimension::Risk),
        actor: per(Dimension::Actor),
        overall: mean(records.iter().map(OpinionAnalysis::mean_confidence)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupConfidence {
    pub label: String,
    pub count: usize,
    pub mean: f64,
}

/// Mean of `conf`'s confidence grouped by the raw label on `dim`, largest
/// group first.
pub fn confidence_by(
    records: &[OpinionAnalysis],
    dim: Dimension,
    conf: Dimension,
) -> Vec<GroupConfidence> {
    let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
    for record in records {
        groups
            .entry(record.label(dim))
            .or_default()
            .push(record.confidence(conf));
    }
    let mut out: Vec<GroupConfidence> = groups
        .into_iter()
        .map(|(label, values)| GroupConfidence {
            count: values.len(),
            mean: mean(values.into_iter()),
            label,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

// =============================================================================
// Risk and sentiment headline numbers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSummary {
    pub high_risk_count: usize,
    pub high_risk_pct: f64,
    pub negative_pct: f64,
    pub neutral_pct: f64,
    pub positive_pct: f64,
}

/// Opinions labeled critical or high.
pub fn high_risk(records: &[OpinionAnalysis]) -> RiskSummary {
    let total = records.len();
    let sentiment = |s: Sentiment| {
        records
            .iter()
            .filter(|r| r.sentiment.as_single() == Some(&s))
            .count()
    };

    let high_risk_count = records.iter().filter(|r| r.is_high_risk()).count();
    RiskSummary {
        high_risk_count,
        high_risk_pct: pct(high_risk_count, total),
        negative_pct: pct(sentiment(Sentiment::Negative), total),
        neutral_pct: pct(sentiment(Sentiment::Neutral), total),
        positive_pct: pct(sentiment(Sentiment::Positive), total),
    }
}

// =============================================================================
// Topics and actors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStat {
    pub topic: String,
    /// Number of opinions on the topic.
    pub heat: usize,
    /// Percent of the topic's opinions that are critical or high risk.
    pub risk_index: f64,
    pub negative_pct: f64,
    pub neutral_pct: f64,
    pub positive_pct: f64,
    /// `0.6 · risk_index + 0.4 · negative_pct`.
    pub sensitivity: f64,
}

pub fn topic_stats(records: &[OpinionAnalysis]) -> Vec<TopicStat> {
    let mut by_topic: HashMap<String, Vec<&OpinionAnalysis>> = HashMap::new();
    for record in records {
        by_topic
            .entry(record.label(Dimension::Topic))
            .or_default()
            .push(record);
    }

    let mut stats: Vec<TopicStat> = by_topic
        .into_iter()
        .map(|(topic, group)| {
            let owned: Vec<OpinionAnalysis> = group.into_iter().cloned().collect();
            let summary = high_risk(&owned);
            TopicStat {
                topic,
                heat: owned.len(),
                risk_index: summary.high_risk_pct,
                negative_pct: summary.negative_pct,
                neutral_pct: summary.neutral_pct,
                positive_pct: summary.positive_pct,
                sensitivity: 0.6 * summary.high_risk_pct + 0.4 * summary.negative_pct,
            }
        })
        .collect();
    stats.sort_by(|a, b| b.heat.cmp(&a.heat).then_with(|| a.topic.cmp(&b.topic)));
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorProfile {
    pub actor: String,
    pub count: usize,
    pub avg_confidence: f64,
    pub negative_pct: f64,
    pub high_risk_pct: f64,
    pub top_topics: Vec<Bucket>,
    pub top_patterns: Vec<Bucket>,
}

/// One profile per actor component; an opinion tagged `consumer|government`
/// appears in both profiles.
pub fn actor_profiles(records: &[OpinionAnalysis]) -> Vec<ActorProfile> {
    let mut by_actor: HashMap<String, Vec<OpinionAnalysis>> = HashMap::new();
    for record in records {
        for actor in record.components(Dimension::Actor) {
            by_actor.entry(actor).or_default().push(record.clone());
        }
    }

    let mut profiles: Vec<ActorProfile> = by_actor
        .into_iter()
        .map(|(actor, group)| {
            let summary = high_risk(&group);
            ActorProfile {
                count: group.len(),
                avg_confidence: mean(group.iter().map(|r| r.actor_confidence)),
                negative_pct: summary.negative_pct,
                high_risk_pct: summary.high_risk_pct,
                top_topics: distribution(&group, Dimension::Topic).top(5).to_vec(),
                top_patterns: distribution(&group, Dimension::Pattern).top(5).to_vec(),
                actor,
            }
        })
        .collect();
    profiles.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.actor.cmp(&b.actor)));
    profiles
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Calm,
    Moderate,
    Heated,
}

impl Temperature {
    pub fn from_negative_pct(negative_pct: f64) -> Self {
        if negative_pct < 20.0 {
            Temperature::Calm
        } else if negative_pct < 40.0 {
            Temperature::Moderate
        } else {
            Temperature::Heated
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Temperature::Calm => "平稳",
            Temperature::Moderate => "温和",
            Temperature::Heated => "激烈",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub negative_pct: f64,
    pub low_risk_pct: f64,
    pub dominant_topic: Option<String>,
    pub dominant_topic_share: f64,
    pub temperature: Temperature,
}

pub fn health(records: &[OpinionAnalysis]) -> Health {
    let negative_pct = high_risk(records).negative_pct;
    let low = records
        .iter()
        .filter(|r| r.risk_level.as_single() == Some(&RiskLevel::Low))
        .count();
    let topics = distribution(records, Dimension::Topic);
    let dominant = topics.buckets.first();

    Health {
        negative_pct,
        low_risk_pct: pct(low, records.len()),
        dominant_topic: dominant.map(|b| b.label.clone()),
        dominant_topic_share: dominant.map_or(0.0, |b| topics.share(&b.label)),
        temperature: Temperature::from_negative_pct(negative_pct),
    }
}

// =============================================================================
// Filtering
// =============================================================================

/// Label filters match any component of a composite label. The keyword is a
/// case-insensitive substring match on the opinion text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub sentiment: Option<String>,
    pub risk: Option<String>,
    pub topic: Option<String>,
    pub actor: Option<String>,
    pub pattern: Option<String>,
    pub keyword: Option<String>,
}

impl Filter {
    pub fn matches(&self, record: &OpinionAnalysis) -> bool {
        let label_ok = |want: &Option<String>, dim: Dimension| match want {
            Some(want) => record
                .components(dim)
                .iter()
                .any(|c| c.eq_ignore_ascii_case(want.trim())),
            None => true,
        };
        let keyword_ok = match &self.keyword {
            Some(kw) => record
                .source_text
                .to_lowercase()
                .contains(&kw.trim().to_lowercase()),
            None => true,
        };

        label_ok(&self.sentiment, Dimension::Sentiment)
            && label_ok(&self.risk, Dimension::Risk)
            && label_ok(&self.topic, Dimension::Topic)
            && label_ok(&self.actor, Dimension::Actor)
            && label_ok(&self.pattern, Dimension::Pattern)
            && keyword_ok
    }

    pub fn apply<'a>(&self, records: &'a [OpinionAnalysis]) -> Vec<&'a OpinionAnalysis> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// The first `limit` records, in order.
pub fn sample<'a>(records: &[&'a OpinionAnalysis], limit: usize) -> Vec<&'a OpinionAnalysis> {
    records.iter().take(limit).copied().collect()
}

// =============================================================================
// Report
// =============================================================================

/// Every dashboard metric in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total: usize,
    pub sentiment: Distribution,
    pub topic: Distribution,
    pub pattern: Distribution,
    pub risk: Distribution,
    pub actor: Distribution,
    pub confidence: ConfidenceStats,
    pub risk_confidence_by_level: Vec<GroupConfidence>,
    pub pattern_confidence_by_pattern: Vec<GroupConfidence>,
    pub risk_summary: RiskSummary,
    pub topics: Vec<TopicStat>,
    pub actors: Vec<ActorProfile>,
    pub actor_by_sentiment: Crosstab,
    pub pattern_by_topic: Crosstab,
    pub risk_by_sentiment: Crosstab,
    pub health: Health,
}

impl Report {
    pub fn build(records: &[OpinionAnalysis]) -> Self {
        let mut risk_confidence_by_level = confidence_by(records, Dimension::Risk, Dimension::Risk);
        risk_confidence_by_level.sort_by_key(|g| RiskLevel::parse(&g.label).rank());

        Self {
            total: records.len(),
            sentiment: distribution(records, Dimension::Sentiment),
            topic: distribution(records, Dimension::Topic),
            pattern: distribution(records, Dimension::Pattern),
            risk: distribution(records, Dimension::Risk),
            actor: split_distribution(records, Dimension::Actor),
            confidence: confidence_stats(records),
            risk_confidence_by_level,
            pattern_confidence_by_pattern: confidence_by(
                records,
                Dimension::Pattern,
                Dimension::Pattern,
            ),
            risk_summary: high_risk(records),
            topics: topic_stats(records),
            actors: actor_profiles(records),
            actor_by_sentiment: crosstab(records, Dimension::Actor, Dimension::Sentiment, true),
            pattern_by_topic: crosstab(records, Dimension::Pattern, Dimension::Topic, false),
            risk_by_sentiment: crosstab(records, Dimension::Risk, Dimension::Sentiment, false),
            health: health(records),
        }
    }
}

fn write_distribution(f: &mut fmt::Formatter<'_>, title: &str, dist: &Distribution, limit: usize) -> fmt::Result {
    writeln!(f, "\n{title}:")?;
    let dim = dist.dimension.unwrap_or(Dimension::Sentiment);
    for bucket in dist.top(limit) {
        writeln!(
            f,
            "  {:<16} {:>5} ({:>5.1}%)",
            translate(dim, &bucket.label),
            bucket.count,
            bucket.percent
        )?;
    }
    Ok(())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== 跨境电商税收舆论报告 ===")?;
        writeln!(f, "样本总数:   {}", self.total)?;
        writeln!(
            f,
            "高风险:     {} ({:.1}%)",
            self.risk_summary.high_risk_count, self.risk_summary.high_risk_pct
        )?;
        writeln!(f, "负面占比:   {:.1}%", self.risk_summary.negative_pct)?;
        writeln!(f, "中立占比:   {:.1}%", self.risk_summary.neutral_pct)?;
        writeln!(f, "平均置信度: {:.3}", self.confidence.overall)?;
        writeln!(f, "舆论温度:   {}", self.health.temperature)?;

        write_distribution(f, "情感分布", &self.sentiment, usize::MAX)?;
        write_distribution(f, "话题 Top 5", &self.topic, 5)?;
        write_distribution(f, "模式分布", &self.pattern, usize::MAX)?;
        write_distribution(f, "风险等级", &self.risk, usize::MAX)?;
        write_distribution(f, "参与方", &self.actor, usize::MAX)?;

        if !self.topics.is_empty() {
            writeln!(f, "\n话题敏感度:")?;
            for t in &self.topics {
                writeln!(
                    f,
                    "  {:<16} 热度 {:>4}  风险指数 {:>5.1}  负面 {:>5.1}%  敏感度 {:>5.1}",
                    translate(Dimension::Topic, &t.topic),
                    t.heat,
                    t.risk_index,
                    t.negative_pct,
                    t.sensitivity
                )?;
            }
        }

        if !self.actors.is_empty() {
            writeln!(f, "\n参与方画像:")?;
            for a in &self.actors {
                let topic = a
                    .top_topics
                    .first()
                    .map(|b| translate(Dimension::Topic, &b.label))
                    .unwrap_or_default();
                writeln!(
                    f,
                    "  {:<16} {:>4} 条  置信度 {:.2}  负面 {:>5.1}%  高风险 {:>5.1}%  主要话题 {}",
                    translate(Dimension::Actor, &a.actor),
                    a.count,
                    a.avg_confidence,
                    a.negative_pct,
                    a.high_risk_pct,
                    topic
                )?;
            }
        }
        Ok(())
    }
}

/// Short post-run summary: sentiment, top topics, risk, mean confidence.
pub fn run_summary(records: &[OpinionAnalysis]) -> String {
    struct Summary<'a>(&'a [OpinionAnalysis]);

    impl fmt::Display for Summary<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "\n=== Labeling Summary ===")?;
            writeln!(f, "Records: {}", self.0.len())?;
            write_distribution(f, "情感分布", &distribution(self.0, Dimension::Sentiment), usize::MAX)?;
            write_distribution(f, "话题 Top 5", &distribution(self.0, Dimension::Topic), 5)?;
            write_distribution(f, "风险等级", &distribution(self.0, Dimension::Risk), usize::MAX)?;
            writeln!(f, "\n平均置信度: {:.3}", confidence_stats(self.0).overall)
        }
    }

    Summary(records).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opinion_common::LabelSet;

    fn rec(sentiment: &str, topic: &str, risk: &str, actor: &str) -> OpinionAnalysis {
        OpinionAnalysis {
            sentiment: LabelSet::parse(sentiment),
            topic: LabelSet::parse(topic),
            risk_level: LabelSet::parse(risk),
            actor: LabelSet::parse(actor),
            pattern: LabelSet::parse("9610"),
            sentiment_confidence: 0.8,
            topic_confidence: 0.6,
            pattern_confidence: 0.4,
            risk_confidence: 1.0,
            actor_confidence: 0.2,
            ..Default::default()
        }
    }

    fn sample_records() -> Vec<OpinionAnalysis> {
        vec![
            rec("negative", "tax_policy", "high", "cross_border_seller"),
            rec("negative", "tax_policy", "critical", "consumer|government"),
            rec("neutral", "compliance", "low", "enterprise"),
            rec("positive", "tax_policy", "medium", "consumer"),
        ]
    }

    #[test]
    fn distribution_orders_by_count_then_label() {
        let dist = distribution(&sample_records(), Dimension::Sentiment);
        let labels: Vec<&str> = dist.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["negative", "neutral", "positive"]);
        assert_eq!(dist.count("negative"), 2);
        assert_eq!(dist.top(1)[0].percent, 50.0);
        assert_eq!(dist.counted(), dist.total);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let records: Vec<_> = (0..7)
            .map(|i| rec(["negative", "neutral", "positive"][i % 3], "other", "low", "consumer"))
            .collect();
        let dist = distribution(&records, Dimension::Sentiment);
        let sum: f64 = dist.buckets.iter().map(|b| dist.share(&b.label)).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        let rounded: Vec<f64> = dist.percentages().into_iter().map(|(_, p)| p).collect();
        assert_eq!(rounded, vec![42.8, 28.6, 28.6]);
    }

    #[test]
    fn many_small_buckets_still_round_to_one_hundred() {
        let records: Vec<_> = (0..22)
            .map(|i| rec("neutral", "other", "low", &format!("actor_{i}")))
            .collect();
        let dist = distribution(&records, Dimension::Actor);
        assert_eq!(dist.buckets.len(), 22);

        let tenths: usize = dist.buckets.iter().map(|b| (b.percent * 10.0).round() as usize).sum();
        assert_eq!(tenths, 1000);
        for bucket in &dist.buckets {
            assert!((bucket.percent - dist.share(&bucket.label)).abs() <= 0.1);
        }
    }

    #[test]
    fn split_distribution_counts_components() {
        let dist = split_distribution(&sample_records(), Dimension::Actor);
        assert_eq!(dist.total, 5);
        assert_eq!(dist.count("consumer"), 2);
        assert_eq!(dist.count("government"), 1);

        let raw = distribution(&sample_records(), Dimension::Actor);
        assert_eq!(raw.count("consumer|government"), 1);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let report = Report::build(&[]);
        assert_eq!(report.total, 0);
        assert!(report.sentiment.is_empty());
        assert_eq!(report.confidence.overall, 0.0);
        assert_eq!(report.health.temperature, Temperature::Calm);
        assert!(report.health.dominant_topic.is_none());
        assert!(report.to_string().contains("样本总数"));
    }

    #[test]
    fn crosstab_totals() {
        let records = sample_records();
        let split = crosstab(&records, Dimension::Actor, Dimension::Sentiment, true);
        assert_eq!(split.total, 5);
        assert_eq!(split.get("consumer", "negative"), 1);
        assert_eq!(split.get("consumer", "positive"), 1);

        let plain = crosstab(&records, Dimension::Risk, Dimension::Sentiment, false);
        assert_eq!(plain.total, records.len());
        assert_eq!(plain.row_totals.iter().sum::<usize>(), plain.col_totals.iter().sum::<usize>());
        assert_eq!(plain.get("nope", "negative"), 0);
    }

    #[test]
    fn confidence_means() {
        let stats = confidence_stats(&sample_records());
        assert!((stats.sentiment - 0.8).abs() < 1e-9);
        assert!((stats.overall - 0.6).abs() < 1e-9);

        let by = confidence_by(&sample_records(), Dimension::Topic, Dimension::Risk);
        assert_eq!(by[0].label, "tax_policy");
        assert_eq!(by[0].count, 3);
    }

    #[test]
    fn topic_sensitivity() {
        let stats = topic_stats(&sample_records());
        let tax = &stats[0];
        assert_eq!(tax.topic, "tax_policy");
        assert_eq!(tax.heat, 3);
        // 2 of 3 high/critical, 2 of 3 negative
        let two_thirds = 200.0 / 3.0;
        assert!((tax.risk_index - two_thirds).abs() < 1e-9);
        assert!((tax.sensitivity - two_thirds).abs() < 1e-9);
    }

    #[test]
    fn actor_profiles_split_composites() {
        let profiles = actor_profiles(&sample_records());
        let consumer = profiles.iter().find(|p| p.actor == "consumer").unwrap();
        assert_eq!(consumer.count, 2);
        assert_eq!(consumer.high_risk_pct, 50.0);
        assert_eq!(consumer.top_topics[0].label, "tax_policy");
    }

    #[test]
    fn health_temperature_thresholds() {
        assert_eq!(Temperature::from_negative_pct(19.9), Temperature::Calm);
        assert_eq!(Temperature::from_negative_pct(20.0), Temperature::Moderate);
        assert_eq!(Temperature::from_negative_pct(40.0), Temperature::Heated);

        let h = health(&sample_records());
        assert_eq!(h.temperature, Temperature::Heated);
        assert_eq!(h.low_risk_pct, 25.0);
        assert_eq!(h.dominant_topic.as_deref(), Some("tax_policy"));
    }

    #[test]
    fn filter_matches_components_and_keywords() {
        let mut records = sample_records();
        records[1].source_text = "Temu 补税 太难了".into();

        let by_actor = Filter {
            actor: Some("government".into()),
            ..Default::default()
        };
        assert_eq!(by_actor.apply(&records).len(), 1);

        let by_keyword = Filter {
            keyword: Some("temu".into()),
            sentiment: Some("negative".into()),
            ..Default::default()
        };
        let hits = by_keyword.apply(&records);
        assert_eq!(hits.len(), 1);
        assert_eq!(sample(&hits, 0).len(), 0);
    }
}
