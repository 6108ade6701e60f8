//! LLM 客户端抽象
//!
//! 后端（OpenAI 兼容 / Mock）实现 LlmClient；错误以字符串返回，由调用方决定回退。

use async_trait::async_trait;

use crate::llm::Message;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回首条回复文本
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 累计 token 使用：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
