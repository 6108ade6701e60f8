//! 对话层：槽位收集、消息协议、编排器

pub mod message;
pub mod orchestrator;
pub mod slots;

pub use message::{ChatMessage, Sender};
pub use orchestrator::{ConversationOrchestrator, Turn};
pub use slots::{SlotKey, SlotStore};
