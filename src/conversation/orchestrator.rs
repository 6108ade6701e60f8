//! 对话编排：逐项收集槽位，齐全后生成文本并驱动会话状态机
//!
//! 任一时刻至多一个待回答的提示（outstanding）；操作者的下一条消息总是填入该字段。
//! 工作流跑完后编排器进入结束态，之后的消息一律忽略。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::browser::BrowserLauncher;
use crate::conversation::{ChatMessage, Sender, SlotKey, SlotStore};
use crate::core::{
    EmailJob, SessionConfig, SessionStateMachine, Stage, StageObserver, StageOutcome, StageResult,
    WorkflowOutcome,
};
use crate::llm::TextGenerator;

pub const LOGIN_FAILED_HINT: &str =
    "Login failed. Please check your credentials or for additional verification.";
pub const SENT_BANNER: &str = "✓ Email sent successfully!";
pub const NOT_SENT_NOTICE: &str = "Session closed. The email was not sent.";
pub const BROWSER_STARTED: &str = "Browser started.";
pub const BROWSER_CLOSED: &str = "Browser closed.";

/// 一轮处理的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    AwaitingInput,
    Finished(WorkflowOutcome),
}

/// 把阶段进度转成给操作者的状态消息
struct StatusReporter {
    outbound: mpsc::UnboundedSender<ChatMessage>,
    /// 浏览器未启动成功时不报告关闭
    launched: bool,
}

impl StatusReporter {
    fn emit(&self, text: impl Into<String>, result: Option<&StageResult>) {
        let screenshot = result
            .and_then(|r| r.checkpoint.as_ref())
            .map(|c| c.to_data_uri());
        if self
            .outbound
            .send(ChatMessage::agent(text).with_screenshot(screenshot))
            .is_err()
        {
            tracing::debug!("operator disconnected, status dropped");
        }
    }
}

impl StageObserver for StatusReporter {
    fn stage_started(&mut self, stage: Stage) {
        match stage {
            Stage::Authenticate => self.emit("Logging in to Gmail...", None),
            Stage::Compose => self.emit("Composing and sending email...", None),
            _ => {}
        }
    }

    fn stage_finished(&mut self, result: &StageResult) {
        if result.stage == Stage::Close && !self.launched {
            return;
        }
        let text = match (&result.outcome, result.stage) {
            (StageOutcome::Succeeded, Stage::Launch) => {
                self.launched = true;
                BROWSER_STARTED.to_string()
            }
            (StageOutcome::Succeeded, Stage::Navigate) => "Opening Gmail...".to_string(),
            (StageOutcome::Succeeded, Stage::Authenticate) => "Login successful.".to_string(),
            (StageOutcome::Succeeded, Stage::Compose) => "Email sent successfully.".to_string(),
            (StageOutcome::Succeeded, Stage::Close) => BROWSER_CLOSED.to_string(),
            (StageOutcome::TimedOut, stage) => format!("The {} step timed out.", stage),
            (StageOutcome::Failed(failure), _) => failure.to_string(),
        };
        self.emit(text, Some(result));
    }
}

pub struct ConversationOrchestrator {
    id: String,
    slots: SlotStore,
    outstanding: Option<SlotKey>,
    finished: Option<WorkflowOutcome>,
    generator: Arc<TextGenerator>,
    launcher: Arc<dyn BrowserLauncher>,
    session_config: SessionConfig,
    outbound: mpsc::UnboundedSender<ChatMessage>,
}

impl ConversationOrchestrator {
    pub fn new(
        id: impl Into<String>,
        generator: Arc<TextGenerator>,
        launcher: Arc<dyn BrowserLauncher>,
        session_config: SessionConfig,
        outbound: mpsc::UnboundedSender<ChatMessage>,
    ) -> Self {
        Self {
            id: id.into(),
            slots: SlotStore::new(),
            outstanding: None,
            finished: None,
            generator,
            launcher,
            session_config,
            outbound,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn slots(&self) -> &SlotStore {
        &self.slots
    }

    /// 当前等待回答的字段
    pub fn outstanding(&self) -> Option<SlotKey> {
        self.outstanding
    }

    fn send(&self, msg: ChatMessage) {
        if self.outbound.send(msg).is_err() {
            tracing::debug!(session = %self.id, "operator disconnected, message dropped");
        }
    }

    fn prompt(&mut self, key: SlotKey) {
        self.outstanding = Some(key);
        self.send(ChatMessage::agent(SlotStore::prompt_for(key)));
    }

    /// 发出第一个提示（email）
    pub fn start(&mut self) {
        if let Some(key) = self.slots.next_missing() {
            tracing::info!(session = %self.id, "conversation started");
            self.prompt(key);
        }
    }

    /// 处理一条入站消息
    pub async fn handle(&mut self, message: &ChatMessage) -> Turn {
        if let Some(outcome) = &self.finished {
            tracing::debug!(session = %self.id, "message after finish ignored");
            return Turn::Finished(outcome.clone());
        }
        if message.sender == Sender::Agent {
            tracing::debug!(session = %self.id, "agent-sent frame ignored");
            return Turn::AwaitingInput;
        }

        // 原样保存（密码可能含首尾空格）；空白回答由 SlotStore 视为未填
        if let Some(key) = self.outstanding.or_else(|| self.slots.next_missing()) {
            self.slots.update(key, message.text.as_str());
        }

        if let Some(next) = self.slots.next_missing() {
            self.prompt(next);
            return Turn::AwaitingInput;
        }
        self.outstanding = None;

        let outcome = self.run_workflow().await;
        self.finished = Some(outcome.clone());
        Turn::Finished(outcome)
    }

    async fn run_workflow(&mut self) -> WorkflowOutcome {
        tracing::info!(session = %self.id, "all fields collected, starting workflow");
        let content = self.generator.generate(&self.slots).await;
        tracing::info!(
            session = %self.id,
            subject_source = ?content.subject.source,
            body_source = ?content.body.source,
            "email content ready"
        );

        let field = |key| self.slots.get(key).unwrap_or_default().to_string();
        let job = EmailJob {
            email: field(SlotKey::Email),
            password: field(SlotKey::Password),
            recipient: field(SlotKey::Recipient),
            subject: content.subject.text,
            body: content.body.text,
        };

        let mut machine = SessionStateMachine::new(
            self.id.clone(),
            Arc::clone(&self.launcher),
            self.session_config.clone(),
        );
        let mut reporter = StatusReporter {
            outbound: self.outbound.clone(),
            launched: false,
        };
        let outcome = machine.run(&job, &mut reporter).await;

        let last_shot = machine.checkpoints().last().map(|c| c.to_data_uri());
        let closing = match &outcome {
            WorkflowOutcome::Sent => ChatMessage::agent(SENT_BANNER).with_screenshot(last_shot),
            WorkflowOutcome::AuthFailed(_) => ChatMessage::agent(LOGIN_FAILED_HINT).with_screenshot(last_shot),
            WorkflowOutcome::SendFailed(_) | WorkflowOutcome::Aborted(_) => ChatMessage::agent(NOT_SENT_NOTICE),
        };
        self.send(closing);
        outcome
    }
}
