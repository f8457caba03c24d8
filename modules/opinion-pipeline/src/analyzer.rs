//! Batch labeling of clean opinions.
//!
//! Work is pulled through a bounded `buffer_unordered` stream. Every item is
//! retried with exponential backoff; items that still fail are counted and
//! skipped. A watch channel carries cancellation: once it flips, no new item
//! is started and whatever finished is saved.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use opinion_common::{AnalysisFile, LlmConfig, OpinionAnalysis, OpinionError};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::labeler::{LabelError, Labeler};

#[derive(Debug, Clone, TypedBuilder)]
pub struct AnalyzeOptions {
    /// Skip this many opinions from the start of the clean file.
    #[builder(default)]
    pub start_idx: usize,
    /// Label at most this many opinions.
    #[builder(default, setter(strip_option))]
    pub sample_size: Option<usize>,
    /// Skip opinions whose text already has a result.
    #[builder(default)]
    pub resume: bool,
    #[builder(default = 1)]
    pub concurrency: usize,
    #[builder(default = 3)]
    pub retry_times: u32,
    #[builder(default = Duration::from_secs(1))]
    pub retry_backoff: Duration,
    #[builder(default = 10)]
    pub pause_every: usize,
    #[builder(default = Duration::from_secs(1))]
    pub pause: Duration,
    #[builder(default = 5)]
    pub progress_every: usize,
    #[builder(default = 50)]
    pub checkpoint_every: usize,
}

impl AnalyzeOptions {
    pub fn from_config(llm: &LlmConfig) -> Self {
        Self::builder()
            .concurrency(llm.concurrency.max(1))
            .retry_times(llm.retry_times)
            .retry_backoff(Duration::from_millis(llm.retry_backoff_ms))
            .pause_every(llm.pause_every)
            .pause(Duration::from_millis(llm.pause_ms))
            .progress_every(llm.progress_every)
            .checkpoint_every(llm.checkpoint_every)
            .build()
    }
}

/// An opinion waiting to be labeled. `index` is its 1-based line in the
/// clean file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOpinion {
    pub index: usize,
    pub text: String,
}

/// Apply `start_idx`, then `sample_size`, then `resume`.
pub fn select_pending(
    opinions: &[String],
    existing: Option<&AnalysisFile>,
    options: &AnalyzeOptions,
) -> Vec<PendingOpinion> {
    let done: HashSet<&str> = match existing {
        Some(file) if options.resume => file.data.iter().map(|a| a.source_text.as_str()).collect(),
        _ => HashSet::new(),
    };

    opinions
        .iter()
        .enumerate()
        .skip(options.start_idx)
        .take(options.sample_size.unwrap_or(usize::MAX))
        .filter(|(_, text)| !done.contains(text.as_str()))
        .map(|(i, text)| PendingOpinion {
            index: i + 1,
            text: text.clone(),
        })
        .collect()
}

// =============================================================================
// Outcome
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunCounts {
    pub succeeded: usize,
    pub failed: usize,
}

impl RunCounts {
    /// Percentage of attempted opinions that were labeled.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.succeeded + self.failed;
        if attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 / attempted as f64 * 100.0
    }
}

#[derive(Debug, Default)]
pub struct AnalyzeOutcome {
    /// Successful analyses, ordered by index.
    pub results: Vec<OpinionAnalysis>,
    pub counts: RunCounts,
    pub failed_indexes: Vec<usize>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl AnalyzeOutcome {
    pub fn success_rate(&self) -> f64 {
        self.counts.success_rate()
    }
}

/// Where results go while a run is in flight.
pub trait ResultSink: Send {
    /// Persist everything labeled so far. Called on checkpoints and once at
    /// the end of the run, with results ordered by index.
    fn save(&mut self, results: &[OpinionAnalysis], counts: RunCounts)
        -> opinion_common::Result<()>;
}

// =============================================================================
// Analyzer
// =============================================================================

pub struct Analyzer {
    options: AnalyzeOptions,
    cancel: watch::Receiver<bool>,
}

impl Analyzer {
    pub fn new(options: AnalyzeOptions, cancel: watch::Receiver<bool>) -> Self {
        Self { options, cancel }
    }

    pub async fn run(
        &self,
        labeler: &dyn Labeler,
        pending: Vec<PendingOpinion>,
        sink: &mut dyn ResultSink,
    ) -> opinion_common::Result<AnalyzeOutcome> {
        let opts = &self.options;
        let total = pending.len();
        let started = Instant::now();
        let mut outcome = AnalyzeOutcome::default();
        let mut done = 0usize;

        info!(total, model = labeler.model(), concurrency = opts.concurrency, "Labeling started");

        let cancel = self.cancel.clone();
        let mut results = stream::iter(pending)
            .take_while(move |_| futures::future::ready(!*cancel.borrow()))
            .map(|item| {
                let cancel = self.cancel.clone();
                async move {
                    let result = label_with_retry(labeler, &item, opts, cancel).await;
                    (item, result)
                }
            })
            .buffer_unordered(opts.concurrency.max(1));

        while let Some((item, result)) = results.next().await {
            done += 1;
            match result {
                Ok(analysis) => {
                    outcome.results.push(analysis);
                    outcome.counts.succeeded += 1;
                    if opts.checkpoint_every > 0
                        && outcome.counts.succeeded % opts.checkpoint_every == 0
                    {
                        outcome.results.sort_by_key(|a| a.index);
                        match sink.save(&outcome.results, outcome.counts) {
                            Ok(()) => info!(saved = outcome.results.len(), "Checkpoint saved"),
                            Err(e) => warn!(error = %e, "Checkpoint failed"),
                        }
                    }
                }
                Err(LabelError::Reply(OpinionError::Cancelled)) => {}
                Err(e) => {
                    warn!(index = item.index, error = %e, "Opinion skipped");
                    outcome.counts.failed += 1;
                    outcome.failed_indexes.push(item.index);
                }
            }

            if opts.progress_every > 0 && done % opts.progress_every == 0 {
                log_progress(done, total, outcome.counts, started.elapsed());
            }

            if opts.pause_every > 0 && done % opts.pause_every == 0 && done < total {
                tokio::time::sleep(opts.pause).await;
            }
        }
        drop(results);

        outcome.cancelled = *self.cancel.borrow();
        outcome.elapsed = started.elapsed();
        outcome.results.sort_by_key(|a| a.index);
        outcome.failed_indexes.sort_unstable();

        if outcome.cancelled {
            warn!(labeled = outcome.results.len(), "Run cancelled, saving partial results");
        }
        sink.save(&outcome.results, outcome.counts)?;

        info!(
            succeeded = outcome.counts.succeeded,
            failed = outcome.counts.failed,
            success_rate = format!("{:.1}%", outcome.success_rate()).as_str(),
            elapsed_secs = outcome.elapsed.as_secs(),
            "Labeling finished"
        );
        Ok(outcome)
    }
}

fn log_progress(done: usize, total: usize, counts: RunCounts, elapsed: Duration) {
    let minutes = elapsed.as_secs_f64() / 60.0;
    let rate = if minutes > 0.0 { done as f64 / minutes } else { 0.0 };
    let eta_minutes = if rate > 0.0 {
        (total - done) as f64 / rate
    } else {
        0.0
    };
    info!(
        done,
        total,
        succeeded = counts.succeeded,
        failed = counts.failed,
        per_minute = format!("{rate:.1}").as_str(),
        eta_minutes = format!("{eta_minutes:.1}").as_str(),
        "Labeling progress"
    );
}

/// Label one opinion, retrying transient failures with `backoff · 2^attempt`.
async fn label_with_retry(
    labeler: &dyn Labeler,
    item: &PendingOpinion,
    opts: &AnalyzeOptions,
    mut cancel: watch::Receiver<bool>,
) -> Result<OpinionAnalysis, LabelError> {
    let attempts = opts.retry_times.max(1);
    let mut attempt = 0;
    loop {
        match labeler.label(&item.text).await {
            Ok(mut analysis) => {
                analysis.index = item.index;
                analysis.source_text = item.text.clone();
                return Ok(analysis);
            }
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = opts.retry_backoff.saturating_mul(1u32 << attempt.min(16));
                warn!(index = item.index, attempt = attempt + 1, error = %e, "Labeling failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    Ok(_) = cancel.wait_for(|stop| *stop) => {
                        return Err(LabelError::Reply(OpinionError::Cancelled));
                    }
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A cancellation receiver that flips when Ctrl-C is pressed.
pub fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight requests");
            let _ = tx.send(true);
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use opinion_common::AnalysisMetadata;

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("opinion {i}")).collect()
    }

    #[test]
    fn select_applies_start_sample_then_resume() {
        let opinions = lines(10);
        let existing = AnalysisFile::new(
            AnalysisMetadata::default(),
            vec![OpinionAnalysis {
                source_text: "opinion 4".into(),
                ..Default::default()
            }],
        );

        let opts = AnalyzeOptions::builder()
            .start_idx(2)
            .sample_size(4)
            .resume(true)
            .build();
        let pending = select_pending(&opinions, Some(&existing), &opts);
        let indexes: Vec<usize> = pending.iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![3, 5, 6]);
        assert_eq!(pending[0].text, "opinion 3");
    }

    #[test]
    fn resume_off_ignores_existing() {
        let opinions = lines(3);
        let existing = AnalysisFile::new(
            AnalysisMetadata::default(),
            vec![OpinionAnalysis {
                source_text: "opinion 1".into(),
                ..Default::default()
            }],
        );
        let opts = AnalyzeOptions::builder().build();
        assert_eq!(select_pending(&opinions, Some(&existing), &opts).len(), 3);
    }

    #[test]
    fn options_follow_config() {
        let llm = LlmConfig {
            concurrency: 0,
            retry_backoff_ms: 250,
            ..Default::default()
        };
        let opts = AnalyzeOptions::from_config(&llm);
        assert_eq!(opts.concurrency, 1);
        assert_eq!(opts.retry_backoff, Duration::from_millis(250));
        assert_eq!(opts.checkpoint_every, 50);
    }

    #[test]
    fn success_rate_handles_empty_runs() {
        assert_eq!(RunCounts::default().success_rate(), 0.0);
        let counts = RunCounts {
            succeeded: 3,
            failed: 1,
        };
        assert_eq!(counts.success_rate(), 75.0);
    }
}
