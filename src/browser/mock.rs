//! Mock 浏览器（用于测试，无需 Chrome）
//!
//! 预先声明页面上「存在」的定位器；wait_for 命中则成功，否则立即返回超时。
//! 所有调用记录到共享日志，驱动被状态机独占后测试仍可检查。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{BrowserDriver, BrowserLauncher, KeyChord, LaunchOptions, Locator};
use crate::core::DriverError;

/// 最小合法 PNG 头，足够让截图链路走通
const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// 记录的一次驱动调用
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Navigate(String),
    WaitFor(Locator),
    Fill(Locator, String),
    Click(Locator),
    PressKey(KeyChord),
    Screenshot,
    Close,
}

/// 脚本化浏览器
#[derive(Debug, Clone, Default)]
pub struct MockBrowser {
    present: HashSet<Locator>,
    hidden: HashSet<Locator>,
    broken: HashSet<Locator>,
    values: HashMap<Locator, String>,
    fail_screenshots: bool,
    fail_navigation: bool,
    fail_keys: bool,
    log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 该定位器在页面上存在且可交互
    pub fn with_element(mut self, locator: Locator) -> Self {
        self.present.insert(locator);
        self
    }

    pub fn with_elements(mut self, locators: impl IntoIterator<Item = Locator>) -> Self {
        self.present.extend(locators);
        self
    }

    /// 可找到但点击/填写会报错
    pub fn with_broken_element(mut self, locator: Locator) -> Self {
        self.present.insert(locator.clone());
        self.broken.insert(locator);
        self
    }

    /// 在 DOM 中但不可见：wait_for 超时
    pub fn with_hidden_element(mut self, locator: Locator) -> Self {
        self.present.insert(locator.clone());
        self.hidden.insert(locator);
        self
    }

    pub fn without_element(mut self, locator: &Locator) -> Self {
        self.present.remove(locator);
        self
    }

    pub fn failing_screenshots(mut self) -> Self {
        self.fail_screenshots = true;
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn failing_keys(mut self) -> Self {
        self.fail_keys = true;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// 按顺序列出 wait_for 过的定位器
    pub fn waited_for(&self) -> Vec<Locator> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::WaitFor(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn value_of(&self, locator: &Locator) -> Option<String> {
        self.values.get(locator).cloned()
    }

    fn record(&self, call: MockCall) {
        if let Ok(mut log) = self.log.lock() {
            log.push(call);
        }
    }

    fn check_usable(&self, locator: &Locator) -> Result<(), DriverError> {
        if !self.present.contains(locator) {
            return Err(DriverError::Action {
                locator: locator.to_string(),
                reason: "element not found".to_string(),
            });
        }
        if self.broken.contains(locator) {
            return Err(DriverError::Action {
                locator: locator.to_string(),
                reason: "element is detached".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        self.record(MockCall::Navigate(url.to_string()));
        if self.fail_navigation {
            return Err(DriverError::Timeout {
                locator: url.to_string(),
                timeout,
            });
        }
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<(), DriverError> {
        self.record(MockCall::WaitFor(locator.clone()));
        if self.present.contains(locator) && !self.hidden.contains(locator) {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                locator: locator.to_string(),
                timeout,
            })
        }
    }

    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        self.record(MockCall::Fill(locator.clone(), text.to_string()));
        self.check_usable(locator)?;
        self.values.insert(locator.clone(), text.to_string());
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), DriverError> {
        self.record(MockCall::Click(locator.clone()));
        self.check_usable(locator)
    }

    async fn press_key(&mut self, chord: &KeyChord) -> Result<(), DriverError> {
        self.record(MockCall::PressKey(chord.clone()));
        if self.fail_keys {
            return Err(DriverError::KeyPress(chord.to_string()));
        }
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.record(MockCall::Screenshot);
        if self.fail_screenshots {
            return Err(DriverError::Screenshot("capture unavailable".to_string()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.record(MockCall::Close);
        Ok(())
    }
}

/// Mock 启动器：每次启动克隆模板浏览器（共享调用日志）
#[derive(Debug, Default)]
pub struct MockLauncher {
    template: MockBrowser,
    fail_with: Option<String>,
    launches: Mutex<Vec<LaunchOptions>>,
}

impl MockLauncher {
    pub fn new(template: MockBrowser) -> Self {
        Self {
            template,
            fail_with: None,
            launches: Mutex::new(Vec::new()),
        }
    }

    /// 启动总是失败
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.template.calls()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn last_options(&self) -> Option<LaunchOptions> {
        self.launches.lock().ok().and_then(|l| l.last().cloned())
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserDriver>, DriverError> {
        if let Ok(mut launches) = self.launches.lock() {
            launches.push(options.clone());
        }
        if let Some(reason) = &self.fail_with {
            return Err(DriverError::Launch(reason.clone()));
        }
        Ok(Box::new(self.template.clone()))
    }
}
