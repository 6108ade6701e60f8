//! 槽位存储：逐项收集的必填信息
//!
//! 键是固定枚举，按固定顺序提问；值为空（或全空白）视为未填。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 必填字段（顺序即提问顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    Email,
    Password,
    Recipient,
    Purpose,
    LeaveDates,
    ManagerEmail,
}

impl SlotKey {
    /// 规范顺序
    pub const ORDER: [SlotKey; 6] = [
        SlotKey::Email,
        SlotKey::Password,
        SlotKey::Recipient,
        SlotKey::Purpose,
        SlotKey::LeaveDates,
        SlotKey::ManagerEmail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKey::Email => "email",
            SlotKey::Password => "password",
            SlotKey::Recipient => "recipient",
            SlotKey::Purpose => "purpose",
            SlotKey::LeaveDates => "leave_dates",
            SlotKey::ManagerEmail => "manager_email",
        }
    }

    /// 给操作者的固定提示语
    pub fn prompt(&self) -> &'static str {
        match self {
            SlotKey::Email => "What's your Gmail email?",
            SlotKey::Password => "Password for this account? (Use a test account)",
            SlotKey::Recipient => "Who should receive the email? (Recipient's email)",
            SlotKey::Purpose => "What is the purpose of the email?",
            SlotKey::LeaveDates => "When will you take leave?",
            SlotKey::ManagerEmail => "Manager's email address?",
        }
    }

    /// 是否属于敏感信息（不写日志、不送入文本生成）
    pub fn is_secret(&self) -> bool {
        matches!(self, SlotKey::Password)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotKey::ORDER
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown field: {}", s))
    }
}

/// 会话内的槽位存储（不持久化）
#[derive(Debug, Clone, Default)]
pub struct SlotStore {
    values: HashMap<SlotKey, String>,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 无条件覆盖，不做格式校验（由消费该字段的阶段负责）
    pub fn update(&mut self, key: SlotKey, value: impl Into<String>) {
        let value = value.into();
        if key.is_secret() {
            tracing::debug!(field = %key, "slot updated");
        } else {
            tracing::debug!(field = %key, value = %value, "slot updated");
        }
        self.values.insert(key, value);
    }

    pub fn get(&self, key: SlotKey) -> Option<&str> {
        self.values
            .get(&key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn is_satisfied(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }

    /// 按规范顺序返回第一个未填字段
    pub fn next_missing(&self) -> Option<SlotKey> {
        SlotKey::ORDER.iter().copied().find(|k| !self.is_satisfied(*k))
    }

    pub fn is_complete(&self) -> bool {
        self.next_missing().is_none()
    }

    pub fn prompt_for(key: SlotKey) -> &'static str {
        key.prompt()
    }

    /// 供文本生成使用的上下文（不含密码），按规范顺序逐行 `key: value`
    pub fn generation_context(&self) -> String {
        SlotKey::ORDER
            .iter()
            .filter(|k| !k.is_secret())
            .filter_map(|k| self.get(*k).map(|v| format!("{}: {}", k, v.trim())))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
