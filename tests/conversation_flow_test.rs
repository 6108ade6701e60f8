//! 对话到发信的端到端测试（mock 浏览器 + mock LLM）

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mailpilot::browser::{KeyChord, Locator, MockBrowser, MockCall, MockLauncher};
    use mailpilot::conversation::{ChatMessage, ConversationOrchestrator, Turn};
    use mailpilot::core::{SessionConfig, StageFailure, WorkflowOutcome};
    use mailpilot::llm::{FailingLlmClient, MockLlmClient, TextGenerator, DEFAULT_BODY, DEFAULT_SUBJECT};
    use tokio::sync::mpsc;

    const LANDMARK: &str = r#"[gh="cm"], [data-tooltip*="Compose"]"#;

    fn gmail_page() -> MockBrowser {
        MockBrowser::new().with_elements([
            Locator::css(r#"input[type="email"]"#),
            Locator::css("#identifierNext"),
            Locator::css(r#"input[type="password"]"#),
            Locator::css("#passwordNext"),
            Locator::css(LANDMARK),
            Locator::css(r#"div[gh="cm"]"#),
            Locator::css(r#"textarea[name="to"]"#),
            Locator::css(r#"input[name="subjectbox"]"#),
            Locator::css(r#"div[aria-label="Message Body"]"#),
            Locator::css(r#"div[role="button"][data-tooltip^="Send"]"#),
        ])
    }

    struct Harness {
        orch: ConversationOrchestrator,
        rx: mpsc::UnboundedReceiver<ChatMessage>,
        launcher: Arc<MockLauncher>,
        _tmp: tempfile::TempDir,
    }

    fn harness(page: MockBrowser, generator: TextGenerator) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let launcher = Arc::new(MockLauncher::new(page));
        let config = SessionConfig {
            checkpoint_dir: tmp.path().to_path_buf(),
            ..SessionConfig::default()
        }
        .without_delays();
        let orch = ConversationOrchestrator::new("e2e", Arc::new(generator), launcher.clone(), config, tx);
        Harness {
            orch,
            rx,
            launcher,
            _tmp: tmp,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ChatMessage>) -> Vec<ChatMessage> {
        let mut out = Vec::new();
        while let Ok(m) = rx.try_recv() {
            out.push(m);
        }
        out
    }

    async fn answer_all(h: &mut Harness, recipient: &str) -> Turn {
        answer_with_password(h, "test-password", recipient).await
    }

    async fn answer_with_password(h: &mut Harness, password: &str, recipient: &str) -> Turn {
        let answers = [
            "me@gmail.com",
            password,
            recipient,
            "leave application",
            "Next Monday to Wednesday",
            "manager@company.com",
        ];
        let mut turn = Turn::AwaitingInput;
        for a in answers {
            turn = h.orch.handle(&ChatMessage::operator(a)).await;
        }
        turn
    }

    #[tokio::test]
    async fn test_happy_path_sends_and_reports_each_stage() {
        let mut h = harness(gmail_page(), TextGenerator::offline());
        h.orch.start();

        let turn = answer_all(&mut h, "  boss@company.com ").await;
        assert_eq!(turn, Turn::Finished(WorkflowOutcome::Sent));

        let messages = drain(&mut h.rx);
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            &texts[..6],
            &[
                "What's your Gmail email?",
                "Password for this account? (Use a test account)",
                "Who should receive the email? (Recipient's email)",
                "What is the purpose of the email?",
                "When will you take leave?",
                "Manager's email address?",
            ]
        );
        assert_eq!(
            &texts[6..],
            &[
                "Browser started.",
                "Opening Gmail...",
                "Logging in to Gmail...",
                "Login successful.",
                "Composing and sending email...",
                "Email sent successfully.",
                "Browser closed.",
                "✓ Email sent successfully!",
            ]
        );
        // 阶段状态附带截图
        let opening = &messages[7];
        assert!(opening
            .screenshot
            .as_deref()
            .is_some_and(|s| s.starts_with("data:image/png;base64,")));

        let calls = h.launcher.calls();
        assert!(calls.contains(&MockCall::Fill(
            Locator::css(r#"textarea[name="to"]"#),
            "boss@company.com".into()
        )));
        assert!(calls.contains(&MockCall::Fill(
            Locator::css(r#"input[name="subjectbox"]"#),
            DEFAULT_SUBJECT.into()
        )));
        assert!(calls.contains(&MockCall::Fill(
            Locator::css(r#"div[aria-label="Message Body"]"#),
            DEFAULT_BODY.into()
        )));
        assert_eq!(calls.last(), Some(&MockCall::Close));
        assert_eq!(h.launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_recipient_touches_no_compose_field() {
        let mut h = harness(gmail_page(), TextGenerator::offline());
        h.orch.start();

        let turn = answer_all(&mut h, "not-an-address").await;
        assert_eq!(
            turn,
            Turn::Finished(WorkflowOutcome::SendFailed(StageFailure::InvalidRecipient(
                "not-an-address".into()
            )))
        );

        let calls = h.launcher.calls();
        let compose_fills = calls
            .iter()
            .filter(|c| matches!(c, MockCall::Fill(l, _) if !l.query().contains("type=")))
            .count();
        assert_eq!(compose_fills, 0);
        assert!(!calls.contains(&MockCall::PressKey(KeyChord::parse("Control+Enter"))));
        assert_eq!(calls.last(), Some(&MockCall::Close));

        let texts: Vec<String> = drain(&mut h.rx).into_iter().map(|m| m.text).collect();
        assert!(texts.contains(&"Recipient email 'not-an-address' is not valid.".to_string()));
        assert!(h._tmp.path().join("e2e").join("recipient_invalid.png").exists());
    }

    #[tokio::test]
    async fn test_login_landmark_missing_closes_without_compose() {
        let page = gmail_page().without_element(&Locator::css(LANDMARK));
        let mut h = harness(page, TextGenerator::offline());
        h.orch.start();

        let turn = answer_all(&mut h, "boss@company.com").await;
        assert!(matches!(
            turn,
            Turn::Finished(WorkflowOutcome::AuthFailed(StageFailure::AuthFailed(_)))
        ));

        let calls = h.launcher.calls();
        assert!(!calls.iter().any(|c| matches!(c, MockCall::Click(l) if l == &Locator::css(r#"div[gh="cm"]"#))));
        assert!(!calls.contains(&MockCall::PressKey(KeyChord::key("c"))));
        assert_eq!(calls.last(), Some(&MockCall::Close));

        let texts: Vec<String> = drain(&mut h.rx).into_iter().map(|m| m.text).collect();
        assert!(texts.iter().any(|t| t.starts_with("Login error → ")));
        assert_eq!(
            texts.last().map(String::as_str),
            Some("Login failed. Please check your credentials or for additional verification.")
        );
        assert!(!texts.iter().any(|t| t == "Composing and sending email..."));
    }

    #[tokio::test]
    async fn test_generation_failure_still_sends_default_text() {
        let generator = TextGenerator::new(Arc::new(FailingLlmClient::new("connection refused")), Duration::from_secs(1));
        let mut h = harness(gmail_page(), generator);
        h.orch.start();

        let turn = answer_all(&mut h, "boss@company.com").await;
        assert_eq!(turn, Turn::Finished(WorkflowOutcome::Sent));
        assert!(h.launcher.calls().contains(&MockCall::Fill(
            Locator::css(r#"input[name="subjectbox"]"#),
            DEFAULT_SUBJECT.into()
        )));
        // 生成失败不告知操作者
        let texts: Vec<String> = drain(&mut h.rx).into_iter().map(|m| m.text).collect();
        assert!(!texts.iter().any(|t| t.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_generated_text_is_typed_into_compose() {
        let generator = TextGenerator::new(
            Arc::new(MockLlmClient::with_replies(["Leave Request", "Dear Boss, ..."])),
            Duration::from_secs(1),
        );
        let mut h = harness(gmail_page(), generator);
        h.orch.start();

        answer_all(&mut h, "boss@company.com").await;
        let calls = h.launcher.calls();
        assert!(calls.contains(&MockCall::Fill(
            Locator::css(r#"input[name="subjectbox"]"#),
            "Leave Request".into()
        )));
        assert!(calls.contains(&MockCall::Fill(
            Locator::css(r#"div[aria-label="Message Body"]"#),
            "Dear Boss, ...".into()
        )));
    }

    #[tokio::test]
    async fn test_password_is_typed_exactly_as_given() {
        let mut h = harness(gmail_page(), TextGenerator::offline());
        h.orch.start();

        let turn = answer_with_password(&mut h, "  pass word  ", "boss@company.com").await;
        assert_eq!(turn, Turn::Finished(WorkflowOutcome::Sent));

        let typed: Vec<String> = h
            .launcher
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Fill(l, text) if l == Locator::css(r#"input[type="password"]"#) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(typed, vec!["  pass word  ".to_string()]);
    }
}
