//! 单次运行：从 JSON 槽位文件读取全部字段，直接执行一次发信流程
//!
//! 运行方式：
//! ```bash
//! cargo run --bin mailpilot-run --features browser -- slots.json [config.toml]
//! ```
//! slots.json 示例：
//! `{"email": "...", "password": "...", "recipient": "...", "purpose": "...", "leave_dates": "...", "manager_email": "..."}`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use mailpilot::browser::ChromeLauncher;
use mailpilot::config::load_config;
use mailpilot::conversation::{SlotKey, SlotStore};
use mailpilot::core::{
    EmailJob, SessionConfig, SessionStateMachine, Stage, StageObserver, StageOutcome, StageResult,
};
use mailpilot::llm::TextGenerator;

/// 把每个阶段结果打印到终端
struct ConsoleObserver;

impl StageObserver for ConsoleObserver {
    fn stage_started(&mut self, stage: Stage) {
        tracing::info!(%stage, "stage started");
    }

    fn stage_finished(&mut self, result: &StageResult) {
        let status = match &result.outcome {
            StageOutcome::Succeeded => "ok".to_string(),
            StageOutcome::TimedOut => "timed out".to_string(),
            StageOutcome::Failed(f) => f.to_string(),
        };
        match &result.checkpoint {
            Some(cp) if !cp.persisted => println!(
                "[{}] {} (screenshot of {} bytes could not be saved)",
                result.stage,
                status,
                cp.size()
            ),
            Some(cp) => println!("[{}] {} (see {})", result.stage, status, cp.path.display()),
            None => println!("[{}] {}", result.stage, status),
        }
    }
}

fn read_slots(path: &PathBuf) -> anyhow::Result<SlotStore> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read slot file {}", path.display()))?;
    let values: HashMap<SlotKey, String> =
        serde_json::from_str(&raw).context("Slot file must be a JSON object of field → text")?;

    let mut slots = SlotStore::new();
    for (key, value) in values {
        slots.update(key, value);
    }
    if let Some(missing) = slots.next_missing() {
        bail!("Slot file is missing '{}' ({})", missing, missing.prompt());
    }
    Ok(slots)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mailpilot::observability::init();

    let mut args = std::env::args().skip(1);
    let Some(slot_path) = args.next().map(PathBuf::from) else {
        bail!("usage: mailpilot-run <slots.json> [config.toml]");
    };
    let cfg = load_config(args.next().map(PathBuf::from)).context("Failed to load configuration")?;
    let slots = read_slots(&slot_path)?;

    let content = TextGenerator::from_config(&cfg.llm).generate(&slots).await;
    println!("Subject ({:?}): {}", content.subject.source, content.subject.text);

    let field = |key| slots.get(key).unwrap_or_default().to_string();
    let job = EmailJob {
        email: field(SlotKey::Email),
        password: field(SlotKey::Password),
        recipient: field(SlotKey::Recipient),
        subject: content.subject.text,
        body: content.body.text,
    };

    let session_id = format!("run-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
    let mut machine = SessionStateMachine::new(session_id, Arc::new(ChromeLauncher), SessionConfig::from(&cfg));
    let outcome = machine.run(&job, &mut ConsoleObserver).await;

    println!("Outcome: {:?}", outcome);
    if !outcome.is_sent() {
        std::process::exit(1);
    }
    Ok(())
}
