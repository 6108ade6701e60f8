//! Chrome 驱动：使用 Headless Chrome（DevTools 协议）实现 BrowserDriver
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。
//! headless_chrome 的调用是阻塞的，统一放到 `spawn_blocking` 中执行。
//!
//! 反自动化检测：自定义 UA、`--disable-blink-features=AutomationControlled`、
//! stealth 模式隐藏 `navigator.webdriver`。

use std::ffi::{OsStr, OsString};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::browser::tab::ModifierKey;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::util::Timeout as ChromeTimeout;
use headless_chrome::{Browser, Element, LaunchOptions as ChromeLaunchOptions, Tab};
use serde_json::json;

use crate::browser::{BrowserDriver, BrowserLauncher, KeyChord, LaunchOptions, Locator, Modifier};
use crate::core::DriverError;

/// 填写输入框 / textarea / contenteditable，并派发 input 与 change 事件
const FILL_JS: &str = r#"
function(value) {
    this.scrollIntoView({ behavior: 'instant', block: 'center' });
    this.focus();
    if (this.isContentEditable) {
        this.innerText = value;
    } else {
        this.value = value;
    }
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
}
"#;

/// 元素有布局盒且未被样式隐藏
const VISIBLE_JS: &str = r#"
function() {
    const style = window.getComputedStyle(this);
    return this.getClientRects().length > 0
        && style.visibility !== 'hidden'
        && style.display !== 'none';
}
"#;

/// document 加载完成前返回 -1，之后返回已请求的资源数
const RESOURCE_COUNT_JS: &str =
    "document.readyState === 'complete' ? performance.getEntriesByType('resource').length : -1";

/// 资源数保持不变多久视为网络空闲
const NETWORK_QUIET: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 浏览器进程空闲多久被视为失联
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

/// 在阻塞线程池上执行 DevTools 调用
async fn blocking<T, F>(tab: Arc<Tab>, f: F) -> Result<T, DriverError>
where
    T: Send + 'static,
    F: FnOnce(Arc<Tab>) -> Result<T, DriverError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(tab))
        .await
        .map_err(|e| DriverError::Join(e.to_string()))?
}

fn is_visible(element: &Element<'_>) -> bool {
    element
        .call_js_fn(VISIBLE_JS, vec![], false)
        .ok()
        .and_then(|r| r.value)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// 轮询直到出现一个可见的匹配元素（CSS 或 XPath）。
/// Gmail 常有隐藏的同名副本，只在 DOM 中存在的节点不算命中。
fn find_visible<'a>(tab: &'a Tab, locator: &Locator, timeout: Duration) -> Result<Element<'a>, DriverError> {
    let deadline = Instant::now() + timeout;
    loop {
        let candidates = match locator {
            Locator::Css(q) => tab.find_elements(q),
            Locator::XPath(q) => tab.find_elements_by_xpath(q),
        }
        .unwrap_or_default();
        if let Some(element) = candidates.into_iter().find(is_visible) {
            return Ok(element);
        }
        if Instant::now() >= deadline {
            return Err(DriverError::Timeout {
                locator: locator.to_string(),
                timeout,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// 导航错误分类：等待超时映射为 Timeout，其余为 Navigation
fn navigation_error(url: &str, timeout: Duration, e: anyhow::Error) -> DriverError {
    if e.downcast_ref::<ChromeTimeout>().is_some() {
        DriverError::Timeout {
            locator: url.to_string(),
            timeout,
        }
    } else {
        DriverError::Navigation(format!("{}: {}", url, e))
    }
}

/// 等待页面加载完成且资源请求数在 NETWORK_QUIET 内不再增长，最多等到 deadline
fn wait_for_network_quiet(tab: &Tab, url: &str, deadline: Instant, timeout: Duration) -> Result<(), DriverError> {
    let mut stable_since: Option<(i64, Instant)> = None;
    loop {
        let now = Instant::now();
        let count = tab
            .evaluate(RESOURCE_COUNT_JS, false)
            .ok()
            .and_then(|r| r.value)
            .and_then(|v| v.as_i64())
            .unwrap_or(-1);
        match stable_since {
            Some((prev, since)) if prev == count && count >= 0 => {
                if now.duration_since(since) >= NETWORK_QUIET {
                    return Ok(());
                }
            }
            _ => stable_since = Some((count, now)),
        }
        if now >= deadline {
            return Err(DriverError::Timeout {
                locator: url.to_string(),
                timeout,
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn to_modifier(m: Modifier) -> ModifierKey {
    match m {
        Modifier::Alt => ModifierKey::Alt,
        Modifier::Control => ModifierKey::Ctrl,
        Modifier::Meta => ModifierKey::Meta,
        Modifier::Shift => ModifierKey::Shift,
    }
}

/// 整页尺寸；拿不到时返回 None（退化为视口截图）
fn page_extent(tab: &Tab) -> Option<(f64, f64)> {
    let read = |expr: &str| {
        tab.evaluate(expr, false)
            .ok()
            .and_then(|r| r.value)
            .and_then(|v| v.as_f64())
    };
    let width = read("document.documentElement.scrollWidth")?;
    let height = read("document.documentElement.scrollHeight")?;
    Some((width, height))
}

/// Chrome 启动器
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeLauncher;

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let options = options.clone();
        tracing::info!(headless = options.headless, "launching chrome");

        let (browser, tab) = tokio::task::spawn_blocking(move || {
            let args: Vec<OsString> = options.extra_args.iter().map(OsString::from).collect();
            let arg_refs: Vec<&OsStr> = args.iter().map(|a| a.as_os_str()).collect();

            let launch = ChromeLaunchOptions::default_builder()
                .headless(options.headless)
                .sandbox(false)
                .window_size(Some(options.window_size))
                .path(options.executable_path.clone())
                .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
                .args(arg_refs)
                .build()
                .map_err(|e| DriverError::Launch(format!("Invalid launch options: {}", e)))?;

            let browser = Browser::new(launch)
                .map_err(|e| DriverError::Launch(format!("Chrome launch failed: {}. Install Chrome/Chromium.", e)))?;
            let tab = browser
                .new_tab()
                .map_err(|e| DriverError::Launch(format!("Browser tab failed: {}", e)))?;

            tab.set_user_agent(&options.user_agent, None, None)
                .map_err(|e| DriverError::Launch(format!("Set user agent failed: {}", e)))?;
            if let Err(e) = tab.enable_stealth_mode() {
                tracing::warn!(error = %e, "stealth mode unavailable");
            }

            Ok::<_, DriverError>((browser, tab))
        })
        .await
        .map_err(|e| DriverError::Join(e.to_string()))??;

        Ok(Box::new(ChromeDriver {
            browser: Some(browser),
            tab: Some(tab),
        }))
    }
}

/// 一个 Chrome 会话：独占浏览器进程；Drop 时进程随 Browser 一起退出
pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl ChromeDriver {
    fn tab(&self) -> Result<Arc<Tab>, DriverError> {
        self.tab.as_ref().map(Arc::clone).ok_or(DriverError::NotLaunched)
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let url = url.to_string();
        tracing::info!(url = %url, "browser navigate");
        blocking(self.tab()?, move |tab| {
            let deadline = Instant::now() + timeout;
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map_err(|e| navigation_error(&url, timeout, e))?;
            wait_for_network_quiet(&tab, &url, deadline, timeout)
        })
        .await
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<(), DriverError> {
        let locator = locator.clone();
        blocking(self.tab()?, move |tab| find_visible(&tab, &locator, timeout).map(|_| ()))
        .await
    }

    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        let locator = locator.clone();
        let text = text.to_string();
        blocking(self.tab()?, move |tab| {
            // wait_for 已确认元素可见，这里只给很短的重新查找时间
            let element = find_visible(&tab, &locator, Duration::from_millis(500))?;
            element
                .call_js_fn(FILL_JS, vec![json!(text)], false)
                .map_err(|e| DriverError::Action {
                    locator: locator.to_string(),
                    reason: e.to_string(),
                })?;
            Ok(())
        })
        .await
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), DriverError> {
        let locator = locator.clone();
        blocking(self.tab()?, move |tab| {
            let element = find_visible(&tab, &locator, Duration::from_millis(500))?;
            element.click().map_err(|e| DriverError::Action {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        })
        .await
    }

    async fn press_key(&mut self, chord: &KeyChord) -> Result<(), DriverError> {
        let chord = chord.clone();
        blocking(self.tab()?, move |tab| {
            let result = if chord.modifiers.is_empty() {
                tab.press_key(&chord.key).map(|_| ())
            } else {
                let modifiers: Vec<ModifierKey> = chord.modifiers.iter().copied().map(to_modifier).collect();
                tab.press_key_with_modifiers(&chord.key, Some(modifiers.as_slice()))
                    .map(|_| ())
            };
            result.map_err(|e| DriverError::KeyPress(format!("{}: {}", chord, e)))
        })
        .await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        blocking(self.tab()?, move |tab| {
            let clip = page_extent(&tab).map(|(width, height)| Page::Viewport {
                x: 0.0,
                y: 0.0,
                width,
                height,
                scale: 1.0,
            });
            tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, clip, true)
                .map_err(|e| DriverError::Screenshot(e.to_string()))
        })
        .await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let tab = self.tab.take();
        let browser = self.browser.take();
        if tab.is_none() && browser.is_none() {
            return Ok(());
        }
        tokio::task::spawn_blocking(move || {
            if let Some(tab) = tab {
                if let Err(e) = tab.close(true) {
                    tracing::debug!(error = %e, "tab close failed, dropping browser anyway");
                }
            }
            // Browser 的 Drop 负责结束 Chrome 进程
            drop(browser);
        })
        .await
        .map_err(|e| DriverError::Join(e.to_string()))?;
        tracing::info!("browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_wait_timeout_maps_to_timeout() {
        let err = navigation_error("https://mail.google.com", Duration::from_secs(30), anyhow::Error::new(ChromeTimeout));
        assert!(err.is_timeout());
        assert_eq!(
            err,
            DriverError::Timeout {
                locator: "https://mail.google.com".into(),
                timeout: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn test_other_navigation_errors_stay_navigation() {
        let err = navigation_error(
            "https://mail.google.com",
            Duration::from_secs(30),
            anyhow::anyhow!("net::ERR_NAME_NOT_RESOLVED"),
        );
        assert!(!err.is_timeout());
        assert!(matches!(err, DriverError::Navigation(ref m) if m.contains("ERR_NAME_NOT_RESOLVED")));
    }
}
