//! 错误类型：浏览器协作方错误与阶段失败原因
//!
//! DriverError 来自浏览器驱动（超时、动作失败、进程启动失败等）；
//! StageFailure 是各阶段对外的失败原因，Display 文本直接作为给操作者的状态消息。

use std::time::Duration;

use thiserror::Error;

/// 浏览器驱动返回的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Timed out after {}ms waiting for {locator}", .timeout.as_millis())]
    Timeout { locator: String, timeout: Duration },

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Action failed on {locator}: {reason}")]
    Action { locator: String, reason: String },

    #[error("Key press failed: {0}")]
    KeyPress(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Browser session is not open")]
    NotLaunched,

    #[error("Task join: {0}")]
    Join(String),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

/// 阶段失败原因（对操作者可见，不含内部诊断）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    #[error("Could not start the browser: {0}")]
    Launch(String),

    #[error("Could not open Gmail: {0}")]
    Navigation(String),

    #[error("Login error → {0}")]
    AuthFailed(String),

    #[error("Could not launch compose window.")]
    ComposeUnavailable,

    #[error("Recipient email '{0}' is not valid.")]
    InvalidRecipient(String),

    #[error("Recipient field not found.")]
    RecipientFieldNotFound,

    #[error("Subject field not found.")]
    SubjectFieldNotFound,

    #[error("Body field not found.")]
    BodyFieldNotFound,

    #[error("Compose/send error → {0}")]
    SendFailed(String),

    #[error("Browser did not close cleanly: {0}")]
    CloseFailed(String),
}
