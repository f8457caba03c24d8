use std::collections::HashSet;
use std::fmt;

use opinion_common::{Dimension, OpinionAnalysis};
use serde::Serialize;

use crate::report::{crosstab, distribution, high_risk, split_distribution};

/// Float noise allowed when summing percentages.
const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn new(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyReport {
    pub total: usize,
    pub checks: Vec<Check>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Consistency Checks ({} records) ===", self.total)?;
        for check in &self.checks {
            let mark = if check.passed { "ok  " } else { "FAIL" };
            writeln!(f, "[{mark}] {:<36} {}", check.name, check.detail)?;
        }
        let failed = self.failures().count();
        writeln!(
            f,
            "\n{} passed, {} failed",
            self.checks.len() - failed,
            failed
        )
    }
}

/// Recompute the report metrics from scratch and cross-check them.
pub fn verify(records: &[OpinionAnalysis]) -> VerifyReport {
    let total = records.len();
    let mut checks = Vec::new();

    for dim in Dimension::ALL {
        let dist = distribution(records, dim);
        checks.push(Check::new(
            format!("{dim} counts sum to total"),
            dist.counted() == total,
            format!("{} of {total}", dist.counted()),
        ));

        if total > 0 {
            let exact: f64 = dist.buckets.iter().map(|b| dist.share(&b.label)).sum();
            let rounded: f64 = dist.percentages().iter().map(|(_, p)| p).sum();
            checks.push(Check::new(
                format!("{dim} percentages sum to 100"),
                (exact - 100.0).abs() <= EPSILON && (rounded - 100.0).abs() <= EPSILON,
                format!("{exact:.6} unrounded, {rounded:.1} shown"),
            ));
        }
    }

    let actors = split_distribution(records, Dimension::Actor);
    let components: usize = records.iter().map(|r| r.components(Dimension::Actor).len()).sum();
    checks.push(Check::new(
        "actor components sum to split total",
        actors.counted() == components && actors.total == components,
        format!("{} of {components}", actors.counted()),
    ));

    let out_of_range = records
        .iter()
        .flat_map(|r| Dimension::ALL.map(|d| r.confidence(d)))
        .filter(|c| !(0.0..=1.0).contains(c))
        .count();
    checks.push(Check::new(
        "confidences within [0, 1]",
        out_of_range == 0,
        format!("{out_of_range} out of range"),
    ));

    let risk = distribution(records, Dimension::Risk);
    let summary = high_risk(records);
    let from_dist = risk.count("critical") + risk.count("high");
    checks.push(Check::new(
        "high-risk count matches risk distribution",
        summary.high_risk_count == from_dist,
        format!("{} vs {from_dist}", summary.high_risk_count),
    ));

    for (rows, cols) in [
        (Dimension::Risk, Dimension::Sentiment),
        (Dimension::Pattern, Dimension::Topic),
        (Dimension::Actor, Dimension::Sentiment),
    ] {
        let table = crosstab(records, rows, cols, false);
        let row_sum: usize = table.row_totals.iter().sum();
        let col_sum: usize = table.col_totals.iter().sum();
        checks.push(Check::new(
            format!("{rows} x {cols} crosstab totals"),
            table.total == total && row_sum == total && col_sum == total,
            format!("{} of {total}", table.total),
        ));
    }

    let mut seen = HashSet::new();
    let duplicates = records.iter().filter(|r| !seen.insert(r.index)).count();
    checks.push(Check::new(
        "indexes unique",
        duplicates == 0,
        format!("{duplicates} duplicated"),
    ));

    VerifyReport { total, checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opinion_common::LabelSet;

    fn rec(index: usize, risk: &str, actor: &str) -> OpinionAnalysis {
        OpinionAnalysis {
            index,
            sentiment: LabelSet::parse("negative"),
            risk_level: LabelSet::parse(risk),
            actor: LabelSet::parse(actor),
            risk_confidence: 0.9,
            ..Default::default()
        }
    }

    #[test]
    fn consistent_records_pass() {
        let records = vec![
            rec(1, "high", "consumer|government"),
            rec(2, "low", "enterprise"),
            rec(3, "critical", "consumer"),
        ];
        let report = verify(&records);
        assert!(report.passed(), "{report}");
        assert_eq!(report.total, 3);
    }

    #[test]
    fn many_distinct_labels_pass() {
        let records: Vec<_> = (0..22)
            .map(|i| rec(i + 1, "low", &format!("actor_{i}")))
            .collect();
        let report = verify(&records);
        assert!(report.passed(), "{report}");
    }

    #[test]
    fn empty_input_passes() {
        assert!(verify(&[]).passed());
    }

    #[test]
    fn duplicate_indexes_and_bad_confidences_fail() {
        let mut records = vec![rec(1, "high", "consumer"), rec(1, "low", "consumer")];
        records[0].topic_confidence = 1.5;

        let report = verify(&records);
        assert!(!report.passed());
        let failed: Vec<&str> = report.failures().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, vec!["confidences within [0, 1]", "indexes unique"]);
    }
}
