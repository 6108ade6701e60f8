//! 网关：WebSocket 接入
//!
//! 每个操作者连接对应一个 ConversationOrchestrator；消息格式见 `conversation::message`。

mod hub;

pub use hub::{Hub, HubConfig, BUSY, UNREADABLE_FRAME};
