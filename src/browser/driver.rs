//! 浏览器协作方契约
//!
//! 核心流程只消费这些原语：启动、导航、等待元素、填写、点击、按键、截图、关闭。
//! 真实实现见 `chrome`（feature "browser"），测试用脚本化实现见 `mock`。

use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{KeyChord, Locator};
use crate::core::DriverError;

/// 启动参数：无头与否、身份伪装（UA、禁用自动化标记）
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub executable_path: Option<std::path::PathBuf>,
    pub user_agent: String,
    pub window_size: (u32, u32),
    /// 追加的 Chrome 命令行参数
    pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            executable_path: None,
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            window_size: (1280, 900),
            extra_args: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

/// 浏览器启动器：每次调用产生一个独占的会话句柄
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserDriver>, DriverError>;
}

/// 一个已启动的浏览器会话（独占所有权，`close` 后不可再用）
#[async_trait]
pub trait BrowserDriver: Send {
    /// 打开 URL 并等待页面加载完成
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// 等待元素出现且可见；超时返回 `DriverError::Timeout`
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<(), DriverError>;

    /// 清空并填入文本（input / textarea / contenteditable）
    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<(), DriverError>;

    async fn click(&mut self, locator: &Locator) -> Result<(), DriverError>;

    async fn press_key(&mut self, chord: &KeyChord) -> Result<(), DriverError>;

    /// 整页截图，返回 PNG 字节
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    /// 释放浏览器进程；重复调用应为空操作
    async fn close(&mut self) -> Result<(), DriverError>;
}
