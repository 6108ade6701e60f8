//! LLM 层：客户端抽象、OpenAI 兼容实现、Mock，以及邮件文本生成

pub mod generator;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use generator::{
    GeneratedContent, GeneratedText, TextGenerator, TextSource, DEFAULT_BODY, DEFAULT_SUBJECT,
};
pub use message::{Message, Role};
pub use mock::{FailingLlmClient, MockLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;
