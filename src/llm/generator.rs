//! 邮件主题 / 正文生成
//!
//! 主题与正文分别请求，互不影响；未配置凭据、远端报错、超时或空回复时使用固定默认文案。
//! 失败只写日志，不向操作者暴露。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::LlmSection;
use crate::conversation::SlotStore;
use crate::llm::{LlmClient, Message, OpenAiClient};

pub const DEFAULT_SUBJECT: &str = "AI Agent Task - [Your Name]";

pub const DEFAULT_BODY: &str =
    "Dear Manager,\n\nI would like to apply for leave from next Monday to Wednesday.\n\nBest regards,\n[Your Name]";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// 文本来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Generated,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedText {
    pub text: String,
    pub source: TextSource,
}

impl GeneratedText {
    fn fallback(text: &str) -> Self {
        Self {
            text: text.to_string(),
            source: TextSource::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedContent {
    pub subject: GeneratedText,
    pub body: GeneratedText,
}

impl GeneratedContent {
    pub fn defaults() -> Self {
        Self {
            subject: GeneratedText::fallback(DEFAULT_SUBJECT),
            body: GeneratedText::fallback(DEFAULT_BODY),
        }
    }
}

#[derive(Clone, Copy)]
enum Part {
    Subject,
    Body,
}

impl Part {
    fn name(self) -> &'static str {
        match self {
            Part::Subject => "subject",
            Part::Body => "body",
        }
    }

    fn prompt(self, ctx: &str) -> String {
        match self {
            Part::Subject => format!(
                "Generate a professional email subject for the following context: {}",
                ctx
            ),
            Part::Body => format!(
                "Write a professional email body for the following context: {}",
                ctx
            ),
        }
    }

    fn default_text(self) -> &'static str {
        match self {
            Part::Subject => DEFAULT_SUBJECT,
            Part::Body => DEFAULT_BODY,
        }
    }
}

pub struct TextGenerator {
    client: Option<Arc<dyn LlmClient>>,
    timeout: Duration,
}

impl TextGenerator {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self {
            client: Some(client),
            timeout,
        }
    }

    /// 无客户端：始终返回默认文案
    pub fn offline() -> Self {
        Self {
            client: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn from_config(section: &LlmSection) -> Self {
        match OpenAiClient::from_config(section) {
            Some(client) => Self::new(Arc::new(client), section.timeout()),
            None => {
                tracing::warn!("no API key configured, generated text will use defaults");
                Self::offline()
            }
        }
    }

    pub async fn generate(&self, slots: &SlotStore) -> GeneratedContent {
        let ctx = slots.generation_context();
        let subject = self.request(Part::Subject, &ctx).await;
        let body = self.request(Part::Body, &ctx).await;
        if let Some(client) = &self.client {
            let (prompt, completion, total) = client.token_usage();
            tracing::debug!(prompt, completion, total, "llm token usage");
        }
        GeneratedContent { subject, body }
    }

    async fn request(&self, part: Part, ctx: &str) -> GeneratedText {
        let Some(client) = &self.client else {
            return GeneratedText::fallback(part.default_text());
        };

        let messages = [Message::system(SYSTEM_PROMPT), Message::user(part.prompt(ctx))];
        let reply = match tokio::time::timeout(self.timeout, client.complete(&messages)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(part = part.name(), error = %e, "generation failed, using default");
                return GeneratedText::fallback(part.default_text());
            }
            Err(_) => {
                tracing::warn!(part = part.name(), timeout_secs = self.timeout.as_secs(), "generation timed out, using default");
                return GeneratedText::fallback(part.default_text());
            }
        };

        let text = reply.trim();
        if text.is_empty() {
            tracing::warn!(part = part.name(), "empty generation, using default");
            return GeneratedText::fallback(part.default_text());
        }
        GeneratedText {
            text: text.to_string(),
            source: TextSource::Generated,
        }
    }
}
