//! Raw crawler files → clean → label → results file → report/verify, all on
//! a temp directory with the mock labeler.

use std::path::Path;
use std::time::Duration;

use opinion_common::{CleanConfig, Dimension, FileConfig, Platform};
use opinion_pipeline::analyzer::{select_pending, AnalyzeOptions, Analyzer};
use opinion_pipeline::export::{
    read_clean_json, read_opinion_lines, write_analysis_csv, write_clean_csv, write_clean_json,
    write_txt,
};
use opinion_pipeline::results::{check_progress, load_analysis, load_analysis_or_default, ProgressStatus};
use opinion_pipeline::testing::{analysis, MockLabeler};
use opinion_pipeline::{coverage, sources, verify, Cleaner, FileSink, Filter, Report};
use tokio::sync::watch;

const SELLER: &str = "9610模式下跨境卖家要补缴增值税，小卖家压力很大，不知道怎么办";
const CONSUMER: &str = "Temu上买东西以后会不会变贵？消费者其实挺关心这个问题的";
const GOV: &str = "海关总署发布新规，1039市场采购贸易的合规要求更明确了";

fn write_raw(dir: &Path) {
    let weibo = dir.join("weibo");
    let xhs = dir.join("xhs");
    std::fs::create_dir_all(&weibo).unwrap();
    std::fs::create_dir_all(&xhs).unwrap();

    std::fs::write(
        weibo.join("run1.json"),
        serde_json::json!([
            { "content": SELLER, "keyword": "9610", "crawl_time": "2025-07-01 10:00:00" },
            { "content": SELLER },
            { "content": "扫码进群，日赚五百，日赚一千" },
            { "text": GOV, "url": "https://weibo.com/1" },
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        xhs.join("notes.json"),
        serde_json::json!({ "data": [{ "desc": format!("{CONSUMER} [笑哭R]"), "tag_list": ["Temu"] }] })
            .to_string(),
    )
    .unwrap();
}

fn options() -> AnalyzeOptions {
    AnalyzeOptions::builder()
        .retry_backoff(Duration::from_millis(1))
        .pause(Duration::ZERO)
        .build()
}

fn labeler() -> MockLabeler {
    MockLabeler::new()
        .on_text(SELLER, analysis("negative", "tax_policy", "9610", "high", "cross_border_seller"))
        .on_text(CONSUMER, analysis("neutral", "price_impact", "Temu", "medium", "consumer"))
        .on_text(GOV, analysis("positive", "compliance", "1039", "low", "government|enterprise"))
}

#[tokio::test]
async fn end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = FileConfig::default();
    config.paths.raw_dir = dir.path().join("raw");
    config.paths.clean_dir = dir.path().join("clean");
    config.paths.analysis_dir = dir.path().join("analysis");
    write_raw(&config.paths.raw_dir);

    // clean
    let load = sources::load_platform_dirs(&config.paths.raw_dir).unwrap();
    assert_eq!(load.posts.len(), 5);
    let (opinions, stats) = Cleaner::new(CleanConfig::default()).run(load.posts);
    assert_eq!(stats.total_raw, 5);
    assert_eq!(stats.after_dedup, 4);
    assert_eq!(stats.after_ads, 3);
    assert_eq!(stats.final_count, 3);

    write_txt(&config.paths.clean_txt(), &opinions).unwrap();
    write_clean_json(&config.paths.clean_json(), &opinions).unwrap();
    let clean = read_clean_json(&config.paths.clean_json()).unwrap();
    assert_eq!(clean.total, 3);
    let xhs = clean.data.iter().find(|o| o.platform == Platform::Xiaohongshu).unwrap();
    assert_eq!(xhs.content, CONSUMER);

    write_clean_csv(&config.paths.clean_csv(), &opinions).unwrap();
    let csv_rows = std::fs::read_to_string(config.paths.clean_csv()).unwrap().lines().count();
    assert_eq!(csv_rows, 4);

    let collected = coverage(&clean.data, &config.targets, &config.date_range);
    assert_eq!(collected.platforms[0].count, 2);
    assert_eq!(collected.platforms[2].count, 1);
    assert_eq!(collected.in_range, 1);
    assert_eq!(collected.undated, 2);

    // label
    let lines = read_opinion_lines(&config.paths.clean_txt()).unwrap();
    let output = config.paths.analysis_json();
    assert_eq!(check_progress(&output), ProgressStatus::NotStarted);

    let existing = load_analysis_or_default(&output).unwrap();
    let pending = select_pending(&lines, Some(&existing), &options());
    assert_eq!(pending.len(), 3);

    let labeler = labeler();
    let mut sink = FileSink::new(&output, existing, "mock");
    let (_tx, rx) = watch::channel(false);
    let outcome = Analyzer::new(options(), rx)
        .run(&labeler, pending, &mut sink)
        .await
        .unwrap();
    assert_eq!(outcome.counts.succeeded, 3);

    // results on disk
    let file = load_analysis(&output).unwrap();
    assert_eq!(file.metadata.total, 3);
    assert_eq!(file.metadata.model, "mock");
    assert_eq!(file.metadata.success_rate, Some(100.0));
    assert!(matches!(
        check_progress(&output),
        ProgressStatus::Completed { total: 3, .. }
    ));

    // report
    let report = Report::build(&file.data);
    assert_eq!(report.total, 3);
    assert_eq!(report.risk_summary.high_risk_count, 1);
    assert_eq!(report.actor.total, 4);
    let sum: f64 = report.sentiment.percentages().iter().map(|(_, p)| p).sum();
    assert!((sum - 100.0).abs() <= 0.5);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total"], 3);

    assert!(verify(&file.data).passed());

    write_analysis_csv(&config.paths.analysis_csv(), &file.data).unwrap();
    let exported = std::fs::read_to_string(config.paths.analysis_csv()).unwrap();
    assert!(exported.contains("government|enterprise"));

    let hits = Filter {
        actor: Some("enterprise".into()),
        ..Default::default()
    };
    let found = hits.apply(&file.data);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].label(Dimension::Pattern), "1039");
}

#[tokio::test]
async fn resume_skips_labeled_opinions() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("analysis.json");
    let lines: Vec<String> = [SELLER, CONSUMER, GOV].iter().map(|s| s.to_string()).collect();

    // first run labels only the first opinion
    let first = AnalyzeOptions::builder()
        .sample_size(1)
        .retry_backoff(Duration::from_millis(1))
        .pause(Duration::ZERO)
        .build();
    let pending = select_pending(&lines, None, &first);
    let mut sink = FileSink::new(&output, Default::default(), "mock");
    let (_tx, rx) = watch::channel(false);
    Analyzer::new(first, rx.clone())
        .run(&labeler(), pending, &mut sink)
        .await
        .unwrap();

    // second run resumes
    let existing = load_analysis(&output).unwrap();
    let mut resume = options();
    resume.resume = true;
    let pending = select_pending(&lines, Some(&existing), &resume);
    assert_eq!(pending.iter().map(|p| p.index).collect::<Vec<_>>(), vec![2, 3]);

    let labeler = labeler();
    let mut sink = FileSink::new(&output, existing, "mock");
    Analyzer::new(resume, rx)
        .run(&labeler, pending, &mut sink)
        .await
        .unwrap();
    assert_eq!(labeler.calls(), 2);

    let file = load_analysis(&output).unwrap();
    let indexes: Vec<usize> = file.data.iter().map(|r| r.index).collect();
    assert_eq!(indexes, vec![1, 2, 3]);
}
