//! Gmail 页面的定位器集合
//!
//! 每个交互点一条定位器链；按可靠性从高到低排列。文本匹配类的候选用 XPath 表达。

use crate::browser::{KeyChord, Locator, LocatorChain};

/// 登录、撰写、发送流程用到的全部定位器
#[derive(Debug, Clone)]
pub struct GmailLocators {
    pub email_field: LocatorChain,
    pub identifier_next: LocatorChain,
    pub not_now: LocatorChain,
    pub password_field: LocatorChain,
    pub password_next: LocatorChain,
    /// 登录成功后的页面地标（撰写入口）
    pub inbox_landmark: LocatorChain,
    pub overlays: LocatorChain,
    pub compose_button: LocatorChain,
    pub compose_shortcut: KeyChord,
    pub to_field: LocatorChain,
    pub subject_field: LocatorChain,
    pub body_field: LocatorChain,
    pub send_button: LocatorChain,
    pub send_shortcut: KeyChord,
}

fn chain(name: &str, candidates: Vec<Locator>) -> LocatorChain {
    // 以下每条链都有候选，不会为空
    LocatorChain::new(name, candidates).unwrap_or_else(|| LocatorChain::single(name, Locator::css("body")))
}

fn next_button(primary: &str) -> Vec<Locator> {
    vec![
        Locator::css(primary),
        Locator::css(r#"button[jsname="LgbsSe"]"#),
        Locator::xpath(r#"//button[normalize-space(.)="Next"]"#),
        Locator::xpath(r#"//div[@role="button"][contains(., "Next")]"#),
    ]
}

impl Default for GmailLocators {
    fn default() -> Self {
        Self {
            email_field: LocatorChain::single("email field", Locator::css(r#"input[type="email"]"#)),
            identifier_next: chain("identifier next", next_button("#identifierNext")),
            not_now: chain(
                "not now dialog",
                vec![
                    Locator::xpath(r#"//button[contains(., "Not now")]"#),
                    Locator::xpath(r#"//div[@role="button"][contains(., "Not now")]"#),
                    Locator::xpath(r#"//*[contains(@class, "VfPpkd-LgbsSe")][contains(., "Not now")]"#),
                ],
            ),
            password_field: LocatorChain::single(
                "password field",
                Locator::css(r#"input[type="password"]"#),
            ),
            password_next: chain("password next", next_button("#passwordNext")),
            inbox_landmark: LocatorChain::single(
                "inbox landmark",
                Locator::css(r#"[gh="cm"], [data-tooltip*="Compose"]"#),
            ),
            overlays: chain(
                "overlay dismiss",
                vec![
                    Locator::xpath(r#"//button[contains(., "Got it")]"#),
                    Locator::xpath(r#"//span[contains(., "Got it")]"#),
                    Locator::xpath(r#"//button[normalize-space(.)="OK"]"#),
                    Locator::xpath(r#"//button[normalize-space(.)="Ok"]"#),
                    Locator::xpath(r#"//button[contains(., "Dismiss")]"#),
                    Locator::xpath(r#"//div[@role="button"][contains(., "Done")]"#),
                ],
            ),
            compose_button: chain(
                "compose button",
                vec![
                    Locator::css(r#"div[gh="cm"]"#),
                    Locator::css(r#"[data-tooltip="Compose"]"#),
                    Locator::css(r#"[data-tooltip^="Compose"]"#),
                    Locator::xpath(r#"//div[@role="button"][contains(., "Compose")]"#),
                    Locator::css(".T-I.T-I-KE.L3"),
                ],
            ),
            compose_shortcut: KeyChord::key("c"),
            to_field: chain(
                "recipient",
                vec![
                    Locator::css(r#"textarea[name="to"]"#),
                    Locator::css(r#"input[name="to"]"#),
                    Locator::css(r#"input[aria-label^="To"]"#),
                    Locator::css(r#"textarea[aria-label^="To"]"#),
                    Locator::css(r#"div[aria-label="To"] div[contenteditable="true"]"#),
                    Locator::css(".aoD.az6 input"),
                    Locator::css(".vO"),
                ],
            ),
            subject_field: chain(
                "subject",
                vec![
                    Locator::css(r#"input[name="subjectbox"]"#),
                    Locator::css(r#"input[aria-label^="Subject"]"#),
                    Locator::css(".aoT input"),
                ],
            ),
            body_field: chain(
                "body",
                vec![
                    Locator::css(r#"div[aria-label="Message Body"]"#),
                    Locator::css(r#"div[role="textbox"]"#),
                    Locator::css(".Am.Al.editable"),
                ],
            ),
            send_button: chain(
                "send button",
                vec![
                    Locator::css(r#"div[role="button"][data-tooltip^="Send"]"#),
                    Locator::xpath(r#"//div[@role="button"][contains(., "Send")]"#),
                    Locator::css(".T-I.J-J5-Ji.aoO.v7.T-I-atl"),
                ],
            ),
            send_shortcut: KeyChord::parse("Control+Enter"),
        }
    }
}
