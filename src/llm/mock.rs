//! Mock LLM 客户端（用于测试，无需 API）

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// 脚本化客户端：按顺序返回预设回复，用完后回显最后一条 User 消息
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<Vec<String>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            ..Self::default()
        }
    }

    /// 每次回复前等待（用于超时测试）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 收到过的全部请求
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reply) = self.replies.lock().ok().and_then(|mut r| r.pop()) {
            return Ok(reply);
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

/// 总是失败的客户端（模拟网络错误或缺少凭据）
#[derive(Debug, Clone)]
pub struct FailingLlmClient {
    reason: String,
}

impl FailingLlmClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        Err(self.reason.clone())
    }
}
