//! 元素解析器：按定位器链逐个尝试，直到某个候选可用并成功执行动作
//!
//! 第三方页面的结构与文案随时变化，单一定位器不可靠；
//! 因此依赖「冗余候选 + 每个候选短超时」，而不是一次长等待。
//! 动作失败（元素已找到但点击/填写报错）与查找超时同等对待：继续下一个候选。

use std::fmt;
use std::time::{Duration, Instant};

use crate::browser::{BrowserDriver, Locator, LocatorChain};

/// 对已定位元素执行的动作
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    Click,
    Fill(&'a str),
}

impl fmt::Display for Action<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // 不输出填写内容（可能是密码）
            Action::Click => write!(f, "click"),
            Action::Fill(_) => write!(f, "fill"),
        }
    }
}

/// 单个候选的尝试记录
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub locator: Locator,
    /// None 表示成功
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// 解析成功：命中的候选 + 之前所有尝试
#[derive(Debug, Clone)]
pub struct Resolved {
    pub locator: Locator,
    pub attempts: Vec<Attempt>,
}

/// 候选全部耗尽
#[derive(Debug, Clone)]
pub struct Unresolved {
    pub target: String,
    pub attempts: Vec<Attempt>,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no candidate for '{}' became available ({} tried)",
            self.target,
            self.attempts.len()
        )
    }
}

/// 无状态解析器；每个调用点传入自己的超时
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementResolver;

impl ElementResolver {
    pub fn new() -> Self {
        Self
    }

    /// 依次等待每个候选（至多 `timeout`），可用即执行 `action` 并立即返回
    pub async fn resolve_and_act(
        &self,
        driver: &mut dyn BrowserDriver,
        chain: &LocatorChain,
        action: Action<'_>,
        timeout: Duration,
    ) -> Result<Resolved, Unresolved> {
        let mut attempts = Vec::with_capacity(chain.len());

        for locator in chain.candidates() {
            let start = Instant::now();
            let outcome = match driver.wait_for(locator, timeout).await {
                Ok(()) => match action {
                    Action::Click => driver.click(locator).await,
                    Action::Fill(text) => driver.fill(locator, text).await,
                },
                Err(e) => Err(e),
            };
            let elapsed = start.elapsed();

            match outcome {
                Ok(()) => {
                    tracing::info!(target_name = %chain.name(), %locator, %action, "✓ resolved");
                    attempts.push(Attempt {
                        locator: locator.clone(),
                        error: None,
                        elapsed,
                    });
                    return Ok(Resolved {
                        locator: locator.clone(),
                        attempts,
                    });
                }
                Err(e) => {
                    tracing::debug!(target_name = %chain.name(), %locator, error = %e, "✗ candidate failed");
                    attempts.push(Attempt {
                        locator: locator.clone(),
                        error: Some(e.to_string()),
                        elapsed,
                    });
                }
            }
        }

        tracing::warn!(
            target_name = %chain.name(),
            tried = attempts.len(),
            "all candidates exhausted"
        );
        Err(Unresolved {
            target: chain.name().to_string(),
            attempts,
        })
    }

    /// 只等待，不执行动作（如登录后的页面地标）
    pub async fn wait_any(
        &self,
        driver: &mut dyn BrowserDriver,
        chain: &LocatorChain,
        timeout: Duration,
    ) -> Result<Resolved, Unresolved> {
        let mut attempts = Vec::with_capacity(chain.len());
        for locator in chain.candidates() {
            let start = Instant::now();
            let result = driver.wait_for(locator, timeout).await;
            let elapsed = start.elapsed();
            match result {
                Ok(()) => {
                    attempts.push(Attempt {
                        locator: locator.clone(),
                        error: None,
                        elapsed,
                    });
                    return Ok(Resolved {
                        locator: locator.clone(),
                        attempts,
                    });
                }
                Err(e) => attempts.push(Attempt {
                    locator: locator.clone(),
                    error: Some(e.to_string()),
                    elapsed,
                }),
            }
        }
        Err(Unresolved {
            target: chain.name().to_string(),
            attempts,
        })
    }
}
