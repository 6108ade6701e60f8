//! 检查点（截图）记录器
//!
//! 每个关键步骤后整页截图，按标签生成确定的文件名写入 `<checkpoint_dir>/<session_id>/`。
//! 截图仅用于诊断：截图或写盘失败只记日志，不影响流程。

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::browser::BrowserDriver;

/// 文件名中需要替换的字符
fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*^\[\]= ]"#).expect("static regex"))
}

/// 把任意标签（常含定位器字符串）变成安全文件名片段
pub fn sanitize_label(label: &str) -> String {
    unsafe_chars().replace_all(label, "_").into_owned()
}

/// 一次截图
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// 产物名（不含扩展名）
    pub name: String,
    pub path: PathBuf,
    /// 是否成功落盘
    pub persisted: bool,
    pub captured_at: DateTime<Utc>,
    png: Arc<[u8]>,
}

impl Checkpoint {
    /// 传输用编码：`data:image/png;base64,...`
    pub fn to_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }

    pub fn size(&self) -> usize {
        self.png.len()
    }
}

pub struct CheckpointRecorder {
    dir: PathBuf,
    history: Vec<Checkpoint>,
}

impl CheckpointRecorder {
    pub fn new(root: impl AsRef<Path>, session_id: &str) -> Self {
        Self {
            dir: root.as_ref().join(sanitize_label(session_id)),
            history: Vec::new(),
        }
    }

    /// 截图并写盘；截图失败返回 None，写盘失败仍返回（persisted = false）
    pub async fn capture(&mut self, driver: &mut dyn BrowserDriver, label: &str) -> Option<Checkpoint> {
        let name = sanitize_label(label);
        let png = match driver.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(checkpoint = %name, error = %e, "screenshot failed, continuing");
                return None;
            }
        };

        let path = self.dir.join(format!("{}.png", name));
        let persisted = match self.persist(&path, &png).await {
            Ok(()) => {
                tracing::info!(checkpoint = %name, path = %path.display(), bytes = png.len(), "checkpoint saved");
                true
            }
            Err(e) => {
                tracing::warn!(checkpoint = %name, path = %path.display(), error = %e, "checkpoint write failed, continuing");
                false
            }
        };

        let checkpoint = Checkpoint {
            name,
            path,
            persisted,
            captured_at: Utc::now(),
            png: Arc::from(png),
        };
        self.history.push(checkpoint.clone());
        Some(checkpoint)
    }

    async fn persist(&self, path: &Path, png: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, png).await
    }

    /// 本会话所有检查点（按时间顺序）
    pub fn history(&self) -> &[Checkpoint] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::MockBrowser;

    #[test]
    fn test_sanitize_label_replaces_unsafe_chars() {
        assert_eq!(
            sanitize_label(r#"recipient_filled_textarea[name="to"]"#),
            "recipient_filled_textarea_name__to__"
        );
        assert_eq!(sanitize_label("a b/c\\d:e*f?g|h<i>j^k"), "a_b_c_d_e_f_g_h_i_j_k");
        assert_eq!(sanitize_label("gmail_homepage"), "gmail_homepage");
    }

    #[tokio::test]
    async fn test_capture_writes_deterministic_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut recorder = CheckpointRecorder::new(tmp.path(), "session-1");
        let mut browser = MockBrowser::new();

        let cp = recorder.capture(&mut browser, "email_filled").await.unwrap();

        assert!(cp.persisted);
        assert_eq!(cp.path, tmp.path().join("session-1").join("email_filled.png"));
        assert!(cp.path.exists());
        assert!(cp.to_data_uri().starts_with("data:image/png;base64,"));
        assert_eq!(recorder.history().len(), 1);
    }

    #[tokio::test]
    async fn test_screenshot_failure_is_non_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut recorder = CheckpointRecorder::new(tmp.path(), "s");
        let mut browser = MockBrowser::new().failing_screenshots();

        assert!(recorder.capture(&mut browser, "inbox_loaded").await.is_none());
        assert!(recorder.history().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_encoded_copy() {
        let tmp = tempfile::tempdir().unwrap();
        // 用普通文件占住会话目录的位置，使 create_dir_all 失败
        let blocker = tmp.path().join("blocked");
        std::fs::write(&blocker, b"x").unwrap();
        let mut recorder = CheckpointRecorder::new(tmp.path(), "blocked");
        let mut browser = MockBrowser::new();

        let cp = recorder.capture(&mut browser, "sent_confirmation").await.unwrap();
        assert!(!cp.persisted);
        assert!(cp.size() > 0);
    }
}
