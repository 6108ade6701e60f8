//! 浏览器层：协作方契约、定位器链、元素解析器、检查点、Gmail 定位器
//!
//! - **driver**: BrowserLauncher / BrowserDriver 契约
//! - **locator**: Locator（CSS / XPath）与有序的 LocatorChain、KeyChord
//! - **resolver**: 按链逐个尝试的 ElementResolver
//! - **checkpoint**: 截图落盘与 data URI 编码
//! - **gmail**: Gmail 流程的全部定位器
//! - **chrome**: Headless Chrome 实现（feature "browser"）
//! - **mock**: 脚本化实现（测试用）

pub mod checkpoint;
#[cfg(feature = "browser")]
pub mod chrome;
pub mod driver;
pub mod gmail;
pub mod locator;
pub mod mock;
pub mod resolver;

pub use checkpoint::{sanitize_label, Checkpoint, CheckpointRecorder};
#[cfg(feature = "browser")]
pub use chrome::{ChromeDriver, ChromeLauncher};
pub use driver::{BrowserDriver, BrowserLauncher, LaunchOptions};
pub use gmail::GmailLocators;
pub use locator::{KeyChord, Locator, LocatorChain, Modifier};
pub use mock::{MockBrowser, MockCall, MockLauncher};
pub use resolver::{Action, Attempt, ElementResolver, Resolved, Unresolved};
