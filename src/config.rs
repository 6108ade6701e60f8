//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 `.env`（如 OPENAI_API_KEY），再读 TOML 文件，
//! 最后用环境变量 `MAILPILOT__*` 覆盖（双下划线表示嵌套，如 `MAILPILOT__BROWSER__HEADLESS=true`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 默认 UA：桌面版 Chrome，避免暴露 HeadlessChrome
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub gateway: GatewaySection,
    pub browser: BrowserSection,
    pub llm: LlmSection,
}

/// [app] 段：应用名、截图目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 检查点根目录，每个会话一个子目录
    pub checkpoint_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            checkpoint_dir: PathBuf::from("checkpoints"),
        }
    }
}

/// [gateway] 段：监听地址与并发会话上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub bind_addr: String,
    /// 同时运行的浏览器会话上限（每个会话一个 Chrome 进程）
    pub max_sessions: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".to_string(),
            max_sessions: 4,
        }
    }
}

/// [browser] 段：启动参数、目标地址、超时与等待
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub headless: bool,
    pub executable_path: Option<PathBuf>,
    pub user_agent: String,
    pub target_url: String,
    pub window_width: u32,
    pub window_height: u32,
    pub timeouts: TimeoutsSection,
    pub delays: DelaysSection,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: false,
            executable_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            target_url: "https://mail.google.com".to_string(),
            window_width: 1280,
            window_height: 900,
            timeouts: TimeoutsSection::default(),
            delays: DelaysSection::default(),
        }
    }
}

/// [browser.timeouts] 段（毫秒）：每个候选定位器的等待上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    pub navigation_ms: u64,
    /// 邮箱 / 密码输入框
    pub field_ms: u64,
    /// 普通按钮（下一步）
    pub click_ms: u64,
    /// 「Not now」之类的插页对话框
    pub interstitial_ms: u64,
    /// 功能介绍弹层
    pub overlay_ms: u64,
    /// 登录后的收件箱地标
    pub landmark_ms: u64,
    /// 撰写按钮与撰写窗口内的输入框
    pub compose_ms: u64,
    pub send_ms: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            field_ms: 10_000,
            click_ms: 4_000,
            interstitial_ms: 3_000,
            overlay_ms: 1_500,
            landmark_ms: 30_000,
            compose_ms: 6_000,
            send_ms: 4_000,
        }
    }
}

/// [browser.delays] 段（毫秒）：页面过渡动画的固定等待
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelaysSection {
    pub after_next_ms: u64,
    pub after_compose_open_ms: u64,
    pub after_send_ms: u64,
}

impl Default for DelaysSection {
    fn default() -> Self {
        Self {
            after_next_ms: 2_000,
            after_compose_open_ms: 1_500,
            after_send_ms: 2_000,
        }
    }
}

/// [llm] 段：OpenAI 兼容端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY；两者都没有则使用固定默认文案
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl LlmSection {
    /// 配置中的 key 优先，其次 OPENAI_API_KEY；空串视为未配置
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 从 config 目录加载配置，环境变量 MAILPILOT__* 可覆盖
///
/// 1. 加载 `.env`（不存在则忽略）
/// 2. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 3. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 4. 最后叠加环境变量 MAILPILOT__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let _ = dotenvy::dotenv();

    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MAILPILOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
