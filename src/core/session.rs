//! 会话状态机：启动 → 导航 → 登录 → 撰写并发送 → 关闭
//!
//! 每个交互点都经过 ElementResolver，每个阶段结束都截图；
//! 阶段失败以 StageResult 返回，`run` 在任何出口都会调用 `close` 释放浏览器。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::browser::{
    Action, BrowserDriver, BrowserLauncher, Checkpoint, CheckpointRecorder, ElementResolver,
    GmailLocators, LaunchOptions,
};
use crate::config::AppConfig;
use crate::core::stage::{is_plausible_recipient, EmailJob, SessionState, Stage, StageOutcome, StageResult, WorkflowOutcome};
use crate::core::{DriverError, StageFailure};

/// 各交互点的等待上限
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    pub navigation: Duration,
    pub field: Duration,
    pub click: Duration,
    pub interstitial: Duration,
    pub overlay: Duration,
    pub landmark: Duration,
    pub compose: Duration,
    pub send: Duration,
}

/// 页面过渡的固定等待
#[derive(Debug, Clone, Default)]
pub struct StageDelays {
    pub after_next: Duration,
    pub after_compose_open: Duration,
    pub after_send: Duration,
}

/// 状态机配置（由 AppConfig 转换而来）
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub launch: LaunchOptions,
    pub target_url: String,
    pub timeouts: StageTimeouts,
    pub delays: StageDelays,
    pub checkpoint_dir: PathBuf,
}

impl From<&AppConfig> for SessionConfig {
    fn from(cfg: &AppConfig) -> Self {
        let b = &cfg.browser;
        let ms = Duration::from_millis;
        Self {
            launch: LaunchOptions {
                headless: b.headless,
                executable_path: b.executable_path.clone(),
                user_agent: b.user_agent.clone(),
                window_size: (b.window_width, b.window_height),
                ..LaunchOptions::default()
            },
            target_url: b.target_url.clone(),
            timeouts: StageTimeouts {
                navigation: ms(b.timeouts.navigation_ms),
                field: ms(b.timeouts.field_ms),
                click: ms(b.timeouts.click_ms),
                interstitial: ms(b.timeouts.interstitial_ms),
                overlay: ms(b.timeouts.overlay_ms),
                landmark: ms(b.timeouts.landmark_ms),
                compose: ms(b.timeouts.compose_ms),
                send: ms(b.timeouts.send_ms),
            },
            delays: StageDelays {
                after_next: ms(b.delays.after_next_ms),
                after_compose_open: ms(b.delays.after_compose_open_ms),
                after_send: ms(b.delays.after_send_ms),
            },
            checkpoint_dir: cfg.app.checkpoint_dir.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl SessionConfig {
    /// 去掉固定等待（测试与 mock 浏览器用）
    pub fn without_delays(mut self) -> Self {
        self.delays = StageDelays::default();
        self
    }
}

/// 阶段进度回调（如推送给操作者）
pub trait StageObserver: Send {
    fn stage_started(&mut self, _stage: Stage) {}

    fn stage_finished(&mut self, result: &StageResult);
}

/// 单个阶段执行期间借用的资源
struct StageContext<'a> {
    driver: &'a mut dyn BrowserDriver,
    recorder: &'a mut CheckpointRecorder,
    resolver: ElementResolver,
    locators: &'a GmailLocators,
    timeouts: &'a StageTimeouts,
    delays: &'a StageDelays,
}

impl StageContext<'_> {
    async fn capture(&mut self, label: &str) -> Option<Checkpoint> {
        self.recorder.capture(self.driver, label).await
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// 登录子流程；任何一步失败返回原因文本
async fn login_steps(ctx: &mut StageContext<'_>, email: &str, password: &str) -> Result<(), String> {
    let (l, t) = (ctx.locators, ctx.timeouts);

    ctx.resolver
        .resolve_and_act(ctx.driver, &l.email_field, Action::Fill(email), t.field)
        .await
        .map_err(|u| format!("email field not found ({})", u))?;
    ctx.capture("email_filled").await;

    if let Err(u) = ctx
        .resolver
        .resolve_and_act(ctx.driver, &l.identifier_next, Action::Click, t.click)
        .await
    {
        tracing::warn!(reason = %u, "next button not clicked after email, continuing");
    }
    pause(ctx.delays.after_next).await;

    // 可选的「更快登录 / 通行密钥」插页，失败忽略
    let _ = ctx
        .resolver
        .resolve_and_act(ctx.driver, &l.not_now, Action::Click, t.interstitial)
        .await;

    ctx.resolver
        .resolve_and_act(ctx.driver, &l.password_field, Action::Fill(password), t.field)
        .await
        .map_err(|u| format!("password field not found ({})", u))?;
    ctx.capture("password_filled").await;

    if let Err(u) = ctx
        .resolver
        .resolve_and_act(ctx.driver, &l.password_next, Action::Click, t.click)
        .await
    {
        tracing::warn!(reason = %u, "next button not clicked after password, continuing");
    }

    ctx.resolver
        .wait_any(ctx.driver, &l.inbox_landmark, t.landmark)
        .await
        .map_err(|_| format!("inbox did not load within {}s", t.landmark.as_secs()))?;
    Ok(())
}

/// 撰写并发送；成功返回发送后的检查点
async fn compose_steps(
    ctx: &mut StageContext<'_>,
    recipient: &str,
    subject: &str,
    body: &str,
) -> Result<Option<Checkpoint>, (StageFailure, Option<Checkpoint>)> {
    let (l, t) = (ctx.locators, ctx.timeouts);

    // 关闭遮挡界面的功能介绍弹层，失败忽略
    let _ = ctx
        .resolver
        .resolve_and_act(ctx.driver, &l.overlays, Action::Click, t.overlay)
        .await;

    if ctx
        .resolver
        .resolve_and_act(ctx.driver, &l.compose_button, Action::Click, t.compose)
        .await
        .is_err()
    {
        tracing::info!(shortcut = %l.compose_shortcut, "compose button not found, using keyboard shortcut");
        if let Err(e) = ctx.driver.press_key(&l.compose_shortcut).await {
            tracing::warn!(error = %e, "compose shortcut failed");
            let cp = ctx.capture("compose_unavailable").await;
            return Err((StageFailure::ComposeUnavailable, cp));
        }
    }
    pause(ctx.delays.after_compose_open).await;

    let recipient = recipient.trim();
    if !is_plausible_recipient(recipient) {
        let cp = ctx.capture("recipient_invalid").await;
        return Err((StageFailure::InvalidRecipient(recipient.to_string()), cp));
    }

    let fields = [
        ("recipient", &l.to_field, recipient, StageFailure::RecipientFieldNotFound),
        ("subject", &l.subject_field, subject, StageFailure::SubjectFieldNotFound),
        ("body", &l.body_field, body, StageFailure::BodyFieldNotFound),
    ];
    for (label, chain, text, not_found) in fields {
        match ctx
            .resolver
            .resolve_and_act(ctx.driver, chain, Action::Fill(text), t.compose)
            .await
        {
            Ok(resolved) => {
                ctx.capture(&format!("{}_filled_{}", label, resolved.locator.query()))
                    .await;
            }
            Err(u) => {
                tracing::warn!(field = label, reason = %u, "compose field not found");
                let cp = ctx.capture(&format!("{}_not_found", label)).await;
                return Err((not_found, cp));
            }
        }
    }

    if ctx
        .resolver
        .resolve_and_act(ctx.driver, &l.send_button, Action::Click, t.send)
        .await
        .is_err()
    {
        tracing::info!(shortcut = %l.send_shortcut, "send button not found, using keyboard shortcut");
        if let Err(e) = ctx.driver.press_key(&l.send_shortcut).await {
            let cp = ctx.capture("gmail_compose_error").await;
            return Err((StageFailure::SendFailed(e.to_string()), cp));
        }
    }
    pause(ctx.delays.after_send).await;

    Ok(ctx.capture("sent_confirmation").await)
}

/// 阶段结果的简短描述（用于 Aborted）
fn describe(result: &StageResult) -> String {
    match &result.outcome {
        StageOutcome::Succeeded => format!("{} succeeded", result.stage),
        StageOutcome::Failed(f) => f.to_string(),
        StageOutcome::TimedOut => format!("{} timed out", result.stage),
    }
}

/// 单会话状态机：独占一个浏览器句柄
pub struct SessionStateMachine {
    id: String,
    launcher: Arc<dyn BrowserLauncher>,
    driver: Option<Box<dyn BrowserDriver>>,
    state: SessionState,
    config: SessionConfig,
    locators: GmailLocators,
    resolver: ElementResolver,
    recorder: CheckpointRecorder,
}

impl SessionStateMachine {
    pub fn new(id: impl Into<String>, launcher: Arc<dyn BrowserLauncher>, config: SessionConfig) -> Self {
        let id = id.into();
        let recorder = CheckpointRecorder::new(&config.checkpoint_dir, &id);
        Self {
            id,
            launcher,
            driver: None,
            state: SessionState::Idle,
            config,
            locators: GmailLocators::default(),
            resolver: ElementResolver::new(),
            recorder,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 本会话已拍下的全部检查点
    pub fn checkpoints(&self) -> &[Checkpoint] {
        self.recorder.history()
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.can_transition_to(next) {
            tracing::info!(session = %self.id, from = ?self.state, to = ?next, "session transition");
        } else {
            tracing::warn!(session = %self.id, from = ?self.state, to = ?next, "unexpected session transition");
        }
        self.state = next;
    }

    fn context(&mut self) -> Option<StageContext<'_>> {
        let driver = self.driver.as_deref_mut()?;
        Some(StageContext {
            driver,
            recorder: &mut self.recorder,
            resolver: self.resolver,
            locators: &self.locators,
            timeouts: &self.config.timeouts,
            delays: &self.config.delays,
        })
    }

    /// 启动浏览器；失败对本会话是致命的，不重试
    pub async fn launch(&mut self) -> StageResult {
        if self.state != SessionState::Idle {
            return StageResult::failed(
                Stage::Launch,
                StageFailure::Launch("session was already started".to_string()),
                None,
            );
        }
        match self.launcher.launch(&self.config.launch).await {
            Ok(driver) => {
                self.driver = Some(driver);
                self.transition(SessionState::Launched);
                StageResult::succeeded(Stage::Launch, None)
            }
            Err(e) => {
                tracing::error!(session = %self.id, error = %e, "browser launch failed");
                StageResult::failed(Stage::Launch, StageFailure::Launch(e.to_string()), None)
            }
        }
    }

    /// 打开目标地址；无论成败都截图
    pub async fn navigate(&mut self) -> StageResult {
        let url = self.config.target_url.clone();
        let timeout = self.config.timeouts.navigation;
        let Some(mut ctx) = self.context() else {
            return StageResult::failed(
                Stage::Navigate,
                StageFailure::Navigation(DriverError::NotLaunched.to_string()),
                None,
            );
        };

        let navigated = ctx.driver.navigate(&url, timeout).await;
        let cp = ctx.capture("gmail_homepage").await;

        match navigated {
            Ok(()) => {
                self.transition(SessionState::Navigated);
                StageResult::succeeded(Stage::Navigate, cp)
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(session = %self.id, url = %url, "navigation timed out");
                StageResult::timed_out(Stage::Navigate, cp)
            }
            Err(e) => StageResult::failed(Stage::Navigate, StageFailure::Navigation(e.to_string()), cp),
        }
    }

    /// 登录；所有失败都转为 AuthFailed（带截图），不向上抛
    pub async fn authenticate(&mut self, email: &str, password: &str) -> StageResult {
        if self.state != SessionState::Navigated {
            return StageResult::failed(
                Stage::Authenticate,
                StageFailure::AuthFailed(format!("session is {:?}, not ready to log in", self.state)),
                None,
            );
        }
        self.transition(SessionState::Authenticating);

        let Some(mut ctx) = self.context() else {
            self.transition(SessionState::AuthFailed);
            return StageResult::failed(
                Stage::Authenticate,
                StageFailure::AuthFailed(DriverError::NotLaunched.to_string()),
                None,
            );
        };

        match login_steps(&mut ctx, email, password).await {
            Ok(()) => {
                let cp = ctx.capture("inbox_loaded").await;
                self.transition(SessionState::Authenticated);
                StageResult::succeeded(Stage::Authenticate, cp)
            }
            Err(reason) => {
                let cp = ctx.capture("gmail_login_error").await;
                tracing::warn!(session = %self.id, reason = %reason, "login failed");
                self.transition(SessionState::AuthFailed);
                StageResult::failed(Stage::Authenticate, StageFailure::AuthFailed(reason), cp)
            }
        }
    }

    /// 撰写并发送；任一字段找不到即中止，不做部分发送
    pub async fn compose(&mut self, recipient: &str, subject: &str, body: &str) -> StageResult {
        if self.state != SessionState::Authenticated {
            return StageResult::failed(
                Stage::Compose,
                StageFailure::SendFailed(format!("session is {:?}, not logged in", self.state)),
                None,
            );
        }
        self.transition(SessionState::Composing);

        let Some(mut ctx) = self.context() else {
            self.transition(SessionState::SendFailed);
            return StageResult::failed(
                Stage::Compose,
                StageFailure::SendFailed(DriverError::NotLaunched.to_string()),
                None,
            );
        };

        match compose_steps(&mut ctx, recipient, subject, body).await {
            Ok(cp) => {
                self.transition(SessionState::Sent);
                StageResult::succeeded(Stage::Compose, cp)
            }
            Err((failure, cp)) => {
                tracing::warn!(session = %self.id, failure = %failure, "compose failed");
                self.transition(SessionState::SendFailed);
                StageResult::failed(Stage::Compose, failure, cp)
            }
        }
    }

    /// 释放浏览器；可重复调用，任何非 Idle 状态都可到达
    pub async fn close(&mut self) -> StageResult {
        let Some(mut driver) = self.driver.take() else {
            if !matches!(self.state, SessionState::Idle | SessionState::Closed) {
                self.transition(SessionState::Closed);
            }
            return StageResult::succeeded(Stage::Close, None);
        };

        let closed = driver.close().await;
        drop(driver);
        self.transition(SessionState::Closed);
        match closed {
            Ok(()) => StageResult::succeeded(Stage::Close, None),
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "browser close reported an error");
                StageResult::failed(Stage::Close, StageFailure::CloseFailed(e.to_string()), None)
            }
        }
    }

    /// 顺序执行全部阶段，遇到第一个失败即停止；返回前总会关闭浏览器
    pub async fn run(&mut self, job: &EmailJob, observer: &mut dyn StageObserver) -> WorkflowOutcome {
        let outcome = self.run_stages(job, observer).await;

        observer.stage_started(Stage::Close);
        let closed = self.close().await;
        observer.stage_finished(&closed);

        tracing::info!(session = %self.id, outcome = ?outcome, "session finished");
        outcome
    }

    async fn run_stages(&mut self, job: &EmailJob, observer: &mut dyn StageObserver) -> WorkflowOutcome {
        observer.stage_started(Stage::Launch);
        let launched = self.launch().await;
        observer.stage_finished(&launched);
        if !launched.is_success() {
            return WorkflowOutcome::Aborted(describe(&launched));
        }

        observer.stage_started(Stage::Navigate);
        let navigated = self.navigate().await;
        observer.stage_finished(&navigated);
        if !navigated.is_success() {
            return WorkflowOutcome::Aborted(describe(&navigated));
        }

        observer.stage_started(Stage::Authenticate);
        let authed = self.authenticate(&job.email, &job.password).await;
        observer.stage_finished(&authed);
        if let Some(failure) = authed.failure() {
            return WorkflowOutcome::AuthFailed(failure.clone());
        }

        observer.stage_started(Stage::Compose);
        let composed = self.compose(&job.recipient, &job.subject, &job.body).await;
        observer.stage_finished(&composed);
        match composed.failure() {
            None => WorkflowOutcome::Sent,
            Some(failure) => WorkflowOutcome::SendFailed(failure.clone()),
        }
    }
}

impl Drop for SessionStateMachine {
    fn drop(&mut self) {
        if self.driver.is_some() {
            // 驱动自身的 Drop 会结束浏览器进程
            tracing::warn!(session = %self.id, "session dropped without close, releasing browser");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{KeyChord, Locator, MockBrowser, MockCall, MockLauncher};

    /// 登录与撰写全部可用的 Gmail 页面
    fn gmail_page() -> MockBrowser {
        MockBrowser::new().with_elements([
            Locator::css(r#"input[type="email"]"#),
            Locator::css("#identifierNext"),
            Locator::css(r#"input[type="password"]"#),
            Locator::css("#passwordNext"),
            Locator::css(r#"[gh="cm"], [data-tooltip*="Compose"]"#),
            Locator::css(r#"div[gh="cm"]"#),
            Locator::css(r#"textarea[name="to"]"#),
            Locator::css(r#"input[name="subjectbox"]"#),
            Locator::css(r#"div[aria-label="Message Body"]"#),
            Locator::css(r#"div[role="button"][data-tooltip^="Send"]"#),
        ])
    }

    fn job(recipient: &str) -> EmailJob {
        EmailJob {
            email: "me@gmail.com".into(),
            password: "secret".into(),
            recipient: recipient.into(),
            subject: "Leave request".into(),
            body: "Dear Manager,".into(),
        }
    }

    fn machine(launcher: MockLauncher, dir: &std::path::Path) -> (SessionStateMachine, Arc<MockLauncher>) {
        let launcher = Arc::new(launcher);
        let config = SessionConfig {
            checkpoint_dir: dir.to_path_buf(),
            ..SessionConfig::default()
        }
        .without_delays();
        let m = SessionStateMachine::new("test", launcher.clone(), config);
        (m, launcher)
    }

    struct Collect(Vec<StageResult>);

    impl StageObserver for Collect {
        fn stage_finished(&mut self, result: &StageResult) {
            self.0.push(result.clone());
        }
    }

    fn names(m: &SessionStateMachine) -> Vec<String> {
        m.checkpoints().iter().map(|c| c.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_full_run_sends_and_closes() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut m, launcher) = machine(MockLauncher::new(gmail_page()), tmp.path());
        let mut seen = Collect(Vec::new());

        let outcome = m.run(&job("boss@company.com"), &mut seen).await;

        assert_eq!(outcome, WorkflowOutcome::Sent);
        assert_eq!(m.state(), SessionState::Closed);
        let stages: Vec<Stage> = seen.0.iter().map(|r| r.stage).collect();
        assert_eq!(
            stages,
            vec![Stage::Launch, Stage::Navigate, Stage::Authenticate, Stage::Compose, Stage::Close]
        );
        assert_eq!(
            names(&m),
            vec![
                "gmail_homepage",
                "email_filled",
                "password_filled",
                "inbox_loaded",
                "recipient_filled_textarea_name__to__",
                "subject_filled_input_name__subjectbox__",
                "body_filled_div_aria-label__Message_Body__",
                "sent_confirmation",
            ]
        );
        let calls = launcher.calls();
        assert!(calls.contains(&MockCall::Navigate("https://mail.google.com".into())));
        assert!(calls.contains(&MockCall::Fill(Locator::css(r#"textarea[name="to"]"#), "boss@company.com".into())));
        assert_eq!(calls.last(), Some(&MockCall::Close));
    }

    #[tokio::test]
    async fn test_missing_landmark_fails_auth_and_skips_compose() {
        let tmp = tempfile::tempdir().unwrap();
        let page = gmail_page().without_element(&Locator::css(r#"[gh="cm"], [data-tooltip*="Compose"]"#));
        let (mut m, launcher) = machine(MockLauncher::new(page), tmp.path());
        let mut seen = Collect(Vec::new());

        let outcome = m.run(&job("boss@company.com"), &mut seen).await;

        assert!(matches!(outcome, WorkflowOutcome::AuthFailed(StageFailure::AuthFailed(_))));
        assert!(!seen.0.iter().any(|r| r.stage == Stage::Compose));
        assert_eq!(seen.0.last().map(|r| r.stage), Some(Stage::Close));
        assert_eq!(names(&m).last().map(String::as_str), Some("gmail_login_error"));
        assert!(!launcher
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::Click(l) if l == &Locator::css(r#"div[gh="cm"]"#))));
        assert_eq!(m.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_before_any_field_fill() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut m, launcher) = machine(MockLauncher::new(gmail_page()), tmp.path());
        let mut seen = Collect(Vec::new());

        let outcome = m.run(&job("boss.company.com"), &mut seen).await;

        assert_eq!(
            outcome,
            WorkflowOutcome::SendFailed(StageFailure::InvalidRecipient("boss.company.com".into()))
        );
        let compose = seen.0.iter().find(|r| r.stage == Stage::Compose).unwrap();
        assert_eq!(compose.checkpoint_name(), Some("recipient_invalid"));
        // 只有登录阶段的两次填写
        let fills: Vec<_> = launcher
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::Fill(..)))
            .collect();
        assert_eq!(fills.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_subject_field_aborts_without_send() {
        let tmp = tempfile::tempdir().unwrap();
        let page = gmail_page().without_element(&Locator::css(r#"input[name="subjectbox"]"#));
        let (mut m, launcher) = machine(MockLauncher::new(page), tmp.path());

        let outcome = m.run(&job("boss@company.com"), &mut Collect(Vec::new())).await;

        assert_eq!(outcome, WorkflowOutcome::SendFailed(StageFailure::SubjectFieldNotFound));
        assert_eq!(names(&m).last().map(String::as_str), Some("subject_not_found"));
        let calls = launcher.calls();
        assert!(!calls.iter().any(|c| matches!(c, MockCall::Fill(l, _) if l.query().contains("Message Body"))));
        assert!(!calls.contains(&MockCall::PressKey(KeyChord::parse("Control+Enter"))));
    }

    #[tokio::test]
    async fn test_keyboard_fallbacks_for_compose_and_send() {
        let tmp = tempfile::tempdir().unwrap();
        let page = gmail_page()
            .without_element(&Locator::css(r#"div[gh="cm"]"#))
            .without_element(&Locator::css(r#"div[role="button"][data-tooltip^="Send"]"#));
        let (mut m, launcher) = machine(MockLauncher::new(page), tmp.path());

        let outcome = m.run(&job("boss@company.com"), &mut Collect(Vec::new())).await;

        assert!(outcome.is_sent());
        let calls = launcher.calls();
        assert!(calls.contains(&MockCall::PressKey(KeyChord::key("c"))));
        assert!(calls.contains(&MockCall::PressKey(KeyChord::parse("Control+Enter"))));
        assert_eq!(names(&m).last().map(String::as_str), Some("sent_confirmation"));
    }

    #[tokio::test]
    async fn test_launch_failure_aborts_without_other_stages() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut m, _) = machine(MockLauncher::failing("no chrome"), tmp.path());
        let mut seen = Collect(Vec::new());

        let outcome = m.run(&job("boss@company.com"), &mut seen).await;

        assert!(matches!(outcome, WorkflowOutcome::Aborted(ref r) if r.contains("no chrome")));
        let stages: Vec<Stage> = seen.0.iter().map(|r| r.stage).collect();
        assert_eq!(stages, vec![Stage::Launch, Stage::Close]);
        assert_eq!(m.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_navigation_timeout_still_checkpoints_and_closes() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut m, launcher) = machine(MockLauncher::new(gmail_page().failing_navigation()), tmp.path());
        let mut seen = Collect(Vec::new());

        let outcome = m.run(&job("boss@company.com"), &mut seen).await;

        assert!(matches!(outcome, WorkflowOutcome::Aborted(_)));
        let nav = seen.0.iter().find(|r| r.stage == Stage::Navigate).unwrap();
        assert_eq!(nav.outcome, StageOutcome::TimedOut);
        assert_eq!(nav.checkpoint_name(), Some("gmail_homepage"));
        assert_eq!(launcher.calls().last(), Some(&MockCall::Close));
    }

    #[tokio::test]
    async fn test_screenshot_failures_do_not_break_workflow() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut m, _) = machine(MockLauncher::new(gmail_page().failing_screenshots()), tmp.path());

        let outcome = m.run(&job("boss@company.com"), &mut Collect(Vec::new())).await;

        assert!(outcome.is_sent());
        assert!(m.checkpoints().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut m, launcher) = machine(MockLauncher::new(gmail_page()), tmp.path());
        assert!(m.launch().await.is_success());

        assert!(m.close().await.is_success());
        assert!(m.close().await.is_success());
        let closes = launcher.calls().into_iter().filter(|c| *c == MockCall::Close).count();
        assert_eq!(closes, 1);
        assert_eq!(m.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_compose_requires_login() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut m, launcher) = machine(MockLauncher::new(gmail_page()), tmp.path());
        m.launch().await;
        m.navigate().await;

        let result = m.compose("boss@company.com", "s", "b").await;
        assert!(matches!(result.failure(), Some(StageFailure::SendFailed(_))));
        assert!(!launcher.calls().iter().any(|c| matches!(c, MockCall::Fill(..))));
        m.close().await;
    }

    #[tokio::test]
    async fn test_launch_passes_anti_detection_options() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut m, launcher) = machine(MockLauncher::new(gmail_page()), tmp.path());

        assert!(m.launch().await.is_success());
        let options = launcher.last_options().unwrap();
        assert_eq!(options.user_agent, crate::config::DEFAULT_USER_AGENT);
        assert!(options
            .extra_args
            .iter()
            .any(|a| a == "--disable-blink-features=AutomationControlled"));
        m.close().await;
    }

    #[tokio::test]
    async fn test_compose_unavailable_when_button_and_shortcut_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let mut page = gmail_page().failing_keys();
        for locator in GmailLocators::default().compose_button.candidates() {
            page = page.without_element(locator);
        }
        let (mut m, launcher) = machine(MockLauncher::new(page), tmp.path());

        let outcome = m.run(&job("boss@company.com"), &mut Collect(Vec::new())).await;

        assert_eq!(outcome, WorkflowOutcome::SendFailed(StageFailure::ComposeUnavailable));
        assert_eq!(names(&m).last().map(String::as_str), Some("compose_unavailable"));
        let calls = launcher.calls();
        assert!(calls.contains(&MockCall::PressKey(KeyChord::key("c"))));
        // 只有登录阶段的两次填写
        assert_eq!(calls.iter().filter(|c| matches!(c, MockCall::Fill(..))).count(), 2);
        assert_eq!(calls.last(), Some(&MockCall::Close));
    }

    #[tokio::test]
    async fn test_send_shortcut_failure_reports_send_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut page = gmail_page().failing_keys();
        for locator in GmailLocators::default().send_button.candidates() {
            page = page.without_element(locator);
        }
        let (mut m, launcher) = machine(MockLauncher::new(page), tmp.path());
        let mut seen = Collect(Vec::new());

        let outcome = m.run(&job("boss@company.com"), &mut seen).await;

        assert!(matches!(outcome, WorkflowOutcome::SendFailed(StageFailure::SendFailed(_))));
        let compose = seen.0.iter().find(|r| r.stage == Stage::Compose).unwrap();
        assert_eq!(compose.checkpoint_name(), Some("gmail_compose_error"));
        assert!(!names(&m).contains(&"sent_confirmation".to_string()));
        assert_eq!(launcher.calls().last(), Some(&MockCall::Close));
    }

    #[tokio::test]
    async fn test_failed_dismissals_do_not_stop_the_flow() {
        let tmp = tempfile::tempdir().unwrap();
        let locators = GmailLocators::default();
        let mut page = gmail_page();
        for locator in locators.not_now.candidates().iter().chain(locators.overlays.candidates()) {
            page = page.with_broken_element(locator.clone());
        }
        let (mut m, launcher) = machine(MockLauncher::new(page), tmp.path());

        let outcome = m.run(&job("boss@company.com"), &mut Collect(Vec::new())).await;

        assert!(outcome.is_sent());
        let calls = launcher.calls();
        let first_not_now = locators.not_now.candidates()[0].clone();
        let first_overlay = locators.overlays.candidates()[0].clone();
        assert!(calls.contains(&MockCall::Click(first_not_now)));
        assert!(calls.contains(&MockCall::Click(first_overlay)));
    }
}
