//! Five-dimension labeling of a single opinion through a chat model.

use std::sync::LazyLock;

use ai_client::{extract_json_object, strip_code_blocks, AiError, ChatModel, ChatOptions, Message, Zhipu};
use async_trait::async_trait;
use opinion_common::{
    Actor, LlmConfig, OpinionAnalysis, OpinionError, Pattern, RiskLevel, Sentiment, Topic,
};
use thiserror::Error;
use tracing::debug;

/// Instructions sent as the system turn of every labeling request.
pub static SYSTEM_PROMPT: LazyLock<String> = LazyLock::new(build_system_prompt);

fn build_system_prompt() -> String {
    let options = |known: &[&str]| known.join("|");
    format!(
        "你是一个专业的跨境电商税收舆论分析系统。请对用户提供的舆论进行以下5个维度的结构化分析。\n\
         \n\
         分析维度：\n\
         1. sentiment（情感倾向）: {sentiment}\n\
         2. topic（核心话题）: {topic}\n\
         3. pattern（涉及的贸易模式）: {pattern}\n\
         4. risk_level（舆情风险等级）: {risk}\n\
         5. actor（主要涉及方）: {actor}\n\
         \n\
         每个维度给出0到1之间的置信度。涉及多个取值时用|连接，例如 consumer|government。\n\
         \n\
         只返回一个有效的JSON对象：\n\
         {{\n  \"sentiment\": \"negative\",\n  \"sentiment_confidence\": 0.85,\n  \
         \"topic\": \"tax_policy\",\n  \"topic_confidence\": 0.90,\n  \
         \"pattern\": \"9610\",\n  \"pattern_confidence\": 0.75,\n  \
         \"risk_level\": \"medium\",\n  \"risk_confidence\": 0.88,\n  \
         \"actor\": \"cross_border_seller\",\n  \"actor_confidence\": 0.80,\n  \
         \"key_phrase\": \"关键短语\",\n  \"brief_summary\": \"简短总结\"\n}}",
        sentiment = options(Sentiment::KNOWN),
        topic = options(Topic::KNOWN),
        pattern = options(Pattern::KNOWN),
        risk = options(RiskLevel::KNOWN),
        actor = options(Actor::KNOWN),
    )
}

pub fn user_prompt(text: &str) -> String {
    format!("分析这条舆论：{text}")
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("model call failed: {0}")]
    Model(#[from] AiError),

    #[error(transparent)]
    Reply(#[from] OpinionError),
}

impl LabelError {
    /// Bad credentials and malformed requests fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            LabelError::Model(e) => e.is_retryable() || matches!(e, AiError::Parse(_)),
            LabelError::Reply(_) => true,
        }
    }
}

// =============================================================================
// Reply parsing
// =============================================================================

/// Parse a model reply into an analysis of `text`.
///
/// Tolerates code fences, prose around the JSON object, numeric strings for
/// confidences and missing keys. A reply without any label is rejected.
pub fn parse_analysis(reply: &str, text: &str) -> opinion_common::Result<OpinionAnalysis> {
    let body = strip_code_blocks(reply);
    let json = extract_json_object(body)
        .ok_or_else(|| OpinionError::Labeling(format!("no JSON object in reply: {}", preview(reply))))?;

    let mut analysis: OpinionAnalysis = serde_json::from_str(json)
        .map_err(|e| OpinionError::Labeling(format!("malformed analysis JSON: {e}")))?;

    if analysis.sentiment.is_empty()
        && analysis.topic.is_empty()
        && analysis.pattern.is_empty()
        && analysis.risk_level.is_empty()
        && analysis.actor.is_empty()
    {
        return Err(OpinionError::Labeling(format!(
            "reply carries no labels: {}",
            preview(reply)
        )));
    }

    analysis.clamp_confidences();
    analysis.source_text = text.to_string();
    Ok(analysis)
}

fn preview(reply: &str) -> String {
    reply.chars().take(80).collect()
}

// =============================================================================
// Labeler
// =============================================================================

#[async_trait]
pub trait Labeler: Send + Sync {
    async fn label(&self, text: &str) -> Result<OpinionAnalysis, LabelError>;
    fn model(&self) -> &str;
}

/// Labels opinions with any chat model, GLM by default.
pub struct LlmLabeler<M: ChatModel = Zhipu> {
    chat: M,
    options: ChatOptions,
}

impl<M: ChatModel> LlmLabeler<M> {
    pub fn new(chat: M, config: &LlmConfig) -> Self {
        let options = ChatOptions::default()
            .temperature(config.temperature)
            .top_p(config.top_p)
            .max_tokens(config.max_tokens)
            .json_mode(true);
        Self { chat, options }
    }
}

#[async_trait]
impl<M: ChatModel> Labeler for LlmLabeler<M> {
    async fn label(&self, text: &str) -> Result<OpinionAnalysis, LabelError> {
        let messages = [
            Message::system(SYSTEM_PROMPT.as_str()),
            Message::user(user_prompt(text)),
        ];
        let reply = self.chat.chat(&messages, &self.options).await?;
        debug!(chars = reply.len(), "Labeling reply");
        Ok(parse_analysis(&reply, text)?)
    }

    fn model(&self) -> &str {
        self.chat.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opinion_common::{Dimension, LabelSet};
    use std::sync::Mutex;

    #[test]
    fn prompt_lists_every_known_value() {
        for value in Sentiment::KNOWN
            .iter()
            .chain(Topic::KNOWN)
            .chain(Pattern::KNOWN)
            .chain(RiskLevel::KNOWN)
            .chain(Actor::KNOWN)
        {
            assert!(SYSTEM_PROMPT.contains(value), "missing {value}");
        }
        assert_eq!(user_prompt("补税"), "分析这条舆论：补税");
    }

    #[test]
    fn parses_fenced_reply_with_prose() {
        let reply = "以下是分析结果：\n```json\n{\"sentiment\": \"negative\", \"sentiment_confidence\": \"0.9\", \
                     \"risk_level\": \"high\", \"actor\": \"consumer|government\", \"brief_summary\": \"担心{补税}\"}\n```";
        let analysis = parse_analysis(reply, "原文").unwrap();

        assert_eq!(analysis.sentiment, LabelSet::single(Sentiment::Negative));
        assert!((analysis.sentiment_confidence - 0.9).abs() < 1e-9);
        assert_eq!(analysis.components(Dimension::Actor), vec!["consumer", "government"]);
        assert_eq!(analysis.brief_summary, "担心{补税}");
        assert_eq!(analysis.source_text, "原文");
        assert_eq!(analysis.topic_confidence, 0.0);
    }

    #[test]
    fn rejects_replies_without_labels() {
        assert!(matches!(
            parse_analysis("抱歉，我无法分析", "x"),
            Err(OpinionError::Labeling(_))
        ));
        assert!(parse_analysis("{\"key_phrase\": \"无\"}", "x").is_err());
        assert!(parse_analysis("{\"sentiment\": ", "x").is_err());
    }

    struct CannedChat {
        replies: Mutex<Vec<Result<String, AiError>>>,
        seen: Mutex<Vec<ChatOptions>>,
    }

    #[async_trait]
    impl ChatModel for CannedChat {
        fn model(&self) -> &str {
            "canned"
        }

        async fn chat(&self, messages: &[Message], options: &ChatOptions) -> ai_client::Result<String> {
            assert_eq!(messages.len(), 2);
            self.seen.lock().unwrap().push(options.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn llm_labeler_sends_config_and_parses() {
        let chat = CannedChat {
            replies: Mutex::new(vec![
                Ok("{\"sentiment\": \"neutral\", \"pattern\": 9610}".to_string()),
                Err(AiError::Api {
                    status: 401,
                    message: "bad key".into(),
                }),
            ]),
            seen: Mutex::new(Vec::new()),
        };
        let labeler = LlmLabeler::new(chat, &LlmConfig::default());
        assert_eq!(labeler.model(), "canned");

        let analysis = labeler.label("9610模式").await.unwrap();
        assert_eq!(analysis.label(Dimension::Pattern), "9610");

        let err = labeler.label("again").await.unwrap_err();
        assert!(!err.is_retryable());

        let seen = labeler.chat.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, Some(0.3));
        assert_eq!(seen[0].max_tokens, Some(500));
        assert!(seen[0].json_mode);
    }

    #[test]
    fn reply_errors_are_retryable() {
        let err = LabelError::from(OpinionError::Labeling("garbled".into()));
        assert!(err.is_retryable());
        let err = LabelError::from(AiError::Network("reset".into()));
        assert!(err.is_retryable());
    }
}
