//! Chinese display names for label values.
//!
//! Composite labels are translated per component and joined with `/`.
//! Values without a known translation pass through unchanged.

fn translate_with(raw: &str, table: &[(&str, &str)]) -> String {
    raw.split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            table
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(part))
                .map(|(_, name)| *name)
                .unwrap_or(part)
        })
        .collect::<Vec<_>>()
        .join("/")
}

const SENTIMENT: &[(&str, &str)] = &[
    ("positive", "正面"),
    ("negative", "负面"),
    ("neutral", "中立"),
    ("unknown", "未知"),
];

const RISK: &[(&str, &str)] = &[
    ("critical", "严重"),
    ("high", "高"),
    ("medium", "中"),
    ("low", "低"),
    ("unknown", "未知"),
];

const TOPIC: &[(&str, &str)] = &[
    ("tax_policy", "税收政策"),
    ("business_risk", "商业风险"),
    ("price_impact", "价格影响"),
    ("compliance", "合规性"),
    ("advocacy", "诉求建议"),
    ("other", "其他"),
    ("unknown", "未知"),
];

const ACTOR: &[(&str, &str)] = &[
    ("consumer", "消费者"),
    ("enterprise", "企业"),
    ("cross_border_seller", "跨境卖家"),
    ("general_public", "社会公众"),
    ("government", "政府"),
    ("media", "媒体"),
    ("other", "其他"),
    ("multiple", "多方"),
    ("student", "学生"),
    ("individual", "个人"),
    ("graduate", "研究生"),
    ("unknown", "未知"),
];

pub fn translate_sentiment(raw: &str) -> String {
    translate_with(raw, SENTIMENT)
}

pub fn translate_risk(raw: &str) -> String {
    translate_with(raw, RISK)
}

pub fn translate_topic(raw: &str) -> String {
    translate_with(raw, TOPIC)
}

pub fn translate_actor(raw: &str) -> String {
    translate_with(raw, ACTOR)
}

/// Patterns are customs codes and read the same in both languages.
pub fn translate_pattern(raw: &str) -> String {
    translate_with(raw, &[("multiple", "多种模式"), ("unknown", "未知")])
}

pub fn translate(dim: crate::labels::Dimension, raw: &str) -> String {
    use crate::labels::Dimension;
    match dim {
        Dimension::Sentiment => translate_sentiment(raw),
        Dimension::Topic => translate_topic(raw),
        Dimension::Pattern => translate_pattern(raw),
        Dimension::Risk => translate_risk(raw),
        Dimension::Actor => translate_actor(raw),
    }
}
