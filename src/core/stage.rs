//! 阶段与会话状态定义
//!
//! 每个阶段以显式的 StageResult 返回（成功 / 失败原因 / 超时），不靠异常传递失败。

use std::fmt;

use serde::Serialize;

use crate::browser::Checkpoint;
use crate::core::StageFailure;

/// 工作流阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Launch,
    Navigate,
    Authenticate,
    Compose,
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Launch => "launch",
            Stage::Navigate => "navigate",
            Stage::Authenticate => "authenticate",
            Stage::Compose => "compose",
            Stage::Close => "close",
        };
        f.write_str(s)
    }
}

/// 会话状态（线性推进，带失败出口）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Launched,
    Navigated,
    Authenticating,
    Authenticated,
    AuthFailed,
    Composing,
    Sent,
    SendFailed,
    Closed,
}

impl SessionState {
    /// 合法转移；Closed 可从任意非 Idle 状态到达
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Launched) => true,
            (Idle, _) | (Closed, _) => false,
            (_, Closed) => true,
            (Launched, Navigated)
            | (Navigated, Authenticating)
            | (Authenticating, Authenticated)
            | (Authenticating, AuthFailed)
            | (Authenticated, Composing)
            | (Composing, Sent)
            | (Composing, SendFailed) => true,
            _ => false,
        }
    }
}

/// 单个阶段的结局
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Succeeded,
    Failed(StageFailure),
    TimedOut,
}

/// 阶段结果：结局 + 阶段结束时的检查点
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub checkpoint: Option<Checkpoint>,
}

impl StageResult {
    pub fn succeeded(stage: Stage, checkpoint: Option<Checkpoint>) -> Self {
        Self {
            stage,
            outcome: StageOutcome::Succeeded,
            checkpoint,
        }
    }

    pub fn failed(stage: Stage, failure: StageFailure, checkpoint: Option<Checkpoint>) -> Self {
        Self {
            stage,
            outcome: StageOutcome::Failed(failure),
            checkpoint,
        }
    }

    pub fn timed_out(stage: Stage, checkpoint: Option<Checkpoint>) -> Self {
        Self {
            stage,
            outcome: StageOutcome::TimedOut,
            checkpoint,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StageOutcome::Succeeded)
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.outcome {
            StageOutcome::Failed(f) => Some(f),
            _ => None,
        }
    }

    pub fn checkpoint_name(&self) -> Option<&str> {
        self.checkpoint.as_ref().map(|c| c.name.as_str())
    }
}

/// 一次完整会话的最终结局
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Sent,
    SendFailed(StageFailure),
    AuthFailed(StageFailure),
    /// 启动或导航失败，未进入登录
    Aborted(String),
}

impl WorkflowOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, WorkflowOutcome::Sent)
    }
}

/// 发送一封邮件所需的全部输入
#[derive(Clone)]
pub struct EmailJob {
    pub email: String,
    pub password: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl fmt::Debug for EmailJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailJob")
            .field("email", &self.email)
            .field("password", &"***")
            .field("recipient", &self.recipient)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// 收件人粗校验：同时包含 `@` 与 `.`
pub fn is_plausible_recipient(recipient: &str) -> bool {
    recipient.contains('@') && recipient.contains('.')
}
