// Test doubles for the labeling pipeline.
//
// - MockLabeler (Labeler): HashMap text→analysis, scripted transient failures
// - MemorySink (ResultSink): records every save
//
// Plus `analysis()` for building labeled records tersely.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ai_client::AiError;
use async_trait::async_trait;
use opinion_common::{LabelSet, OpinionAnalysis, OpinionError};

use crate::analyzer::{ResultSink, RunCounts};
use crate::labeler::{LabelError, Labeler};

// ---------------------------------------------------------------------------
// MockLabeler
// ---------------------------------------------------------------------------

/// Returns registered analyses by exact text. Unregistered text fails with a
/// non-retryable error unless a default is set.
pub struct MockLabeler {
    results: HashMap<String, OpinionAnalysis>,
    default_result: Option<OpinionAnalysis>,
    /// Remaining transient failures per text.
    flaky: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl MockLabeler {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            default_result: None,
            flaky: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on_text(mut self, text: &str, result: OpinionAnalysis) -> Self {
        self.results.insert(text.to_string(), result);
        self
    }

    pub fn with_default(mut self, result: OpinionAnalysis) -> Self {
        self.default_result = Some(result);
        self
    }

    /// Fail `times` times with a network error before answering for `text`.
    pub fn flaky(self, text: &str, times: usize) -> Self {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert(text.to_string(), times);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockLabeler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Labeler for MockLabeler {
    async fn label(&self, text: &str) -> Result<OpinionAnalysis, LabelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut flaky) = self.flaky.lock() {
            if let Some(left) = flaky.get_mut(text).filter(|left| **left > 0) {
                *left -= 1;
                return Err(AiError::Network("connection reset".into()).into());
            }
        }

        self.results
            .get(text)
            .or(self.default_result.as_ref())
            .cloned()
            .ok_or_else(|| {
                AiError::Api {
                    status: 400,
                    message: format!("no mock for {text}"),
                }
                .into()
            })
    }

    fn model(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySink {
    pub saves: Vec<(Vec<OpinionAnalysis>, RunCounts)>,
    /// Fail every save with this message.
    pub fail_with: Option<String>,
}

impl MemorySink {
    pub fn last(&self) -> Option<&[OpinionAnalysis]> {
        self.saves.last().map(|(results, _)| results.as_slice())
    }
}

impl ResultSink for MemorySink {
    fn save(&mut self, results: &[OpinionAnalysis], counts: RunCounts) -> opinion_common::Result<()> {
        if let Some(msg) = &self.fail_with {
            return Err(OpinionError::Validation(msg.clone()));
        }
        self.saves.push((results.to_vec(), counts));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A record with the given raw labels and every confidence at 0.8.
pub fn analysis(sentiment: &str, topic: &str, pattern: &str, risk: &str, actor: &str) -> OpinionAnalysis {
    OpinionAnalysis {
        sentiment: LabelSet::parse(sentiment),
        sentiment_confidence: 0.8,
        topic: LabelSet::parse(topic),
        topic_confidence: 0.8,
        pattern: LabelSet::parse(pattern),
        pattern_confidence: 0.8,
        risk_level: LabelSet::parse(risk),
        risk_confidence: 0.8,
        actor: LabelSet::parse(actor),
        actor_confidence: 0.8,
        ..Default::default()
    }
}
