//! 对话消息协议：每个 WebSocket 文本帧一个 JSON 对象
//!
//! `{"sender": "agent"|"operator", "text": "...", "screenshot": "data:image/png;base64,..."|null}`
//! 入站解析宽松：sender 可省略（默认 operator，`user` 视为 operator），text 缺省为空串。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Agent,
    #[default]
    #[serde(alias = "user")]
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl ChatMessage {
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
            screenshot: None,
        }
    }

    pub fn operator(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Operator,
            text: text.into(),
            screenshot: None,
        }
    }

    /// 附带截图（data URI）
    pub fn with_screenshot(mut self, data_uri: Option<String>) -> Self {
        self.screenshot = data_uri;
        self
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_text_frame_is_operator_message() {
        let msg = ChatMessage::from_json(r#"{"text": "me@gmail.com"}"#).unwrap();
        assert_eq!(msg, ChatMessage::operator("me@gmail.com"));
    }

    #[test]
    fn test_user_alias_and_missing_text() {
        let msg = ChatMessage::from_json(r#"{"sender": "user", "extra": 1}"#).unwrap();
        assert_eq!(msg.sender, Sender::Operator);
        assert_eq!(msg.text, "");
    }

    #[test]
    fn test_agent_message_serializes_null_screenshot() {
        let json = ChatMessage::agent("What's your Gmail email?").to_json().unwrap();
        assert_eq!(
            json,
            r#"{"sender":"agent","text":"What's your Gmail email?","screenshot":null}"#
        );
    }

    #[test]
    fn test_malformed_frame_is_rejected() {
        assert!(ChatMessage::from_json("hello").is_err());
        assert!(ChatMessage::from_json(r#"{"sender": "robot"}"#).is_err());
    }
}
