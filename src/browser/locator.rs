//! 定位器链（Locator Chain）
//!
//! 同一个逻辑目标（如「收件人输入框」「发送按钮」）的多种等价定位方式，按偏好排序。
//! 靠后的候选被认为更不可靠，只作为兜底。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 单个定位表达式（浏览器原生查询语言）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "query", rename_all = "lowercase")]
pub enum Locator {
    /// CSS 选择器，如 `input[type="email"]`
    Css(String),
    /// XPath 表达式，用于按可见文本匹配，如 `//button[contains(., "Not now")]`
    XPath(String),
}

impl Locator {
    pub fn css(query: impl Into<String>) -> Self {
        Locator::Css(query.into())
    }

    pub fn xpath(query: impl Into<String>) -> Self {
        Locator::XPath(query.into())
    }

    /// 原始查询串（不带类型前缀），用于截图命名
    pub fn query(&self) -> &str {
        match self {
            Locator::Css(q) | Locator::XPath(q) => q,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(q) => write!(f, "css:{}", q),
            Locator::XPath(q) => write!(f, "xpath:{}", q),
        }
    }
}

/// 定位器链：非空、有序（只能经 `new` / `single` 构造）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatorChain {
    name: String,
    candidates: Vec<Locator>,
}

impl LocatorChain {
    /// 空候选列表返回 None
    pub fn new(name: impl Into<String>, candidates: Vec<Locator>) -> Option<Self> {
        if candidates.is_empty() {
            return None;
        }
        Some(Self {
            name: name.into(),
            candidates,
        })
    }

    /// 只有一个候选的链
    pub fn single(name: impl Into<String>, locator: Locator) -> Self {
        Self {
            name: name.into(),
            candidates: vec![locator],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn candidates(&self) -> &[Locator] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// 修饰键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Alt,
    Control,
    Meta,
    Shift,
}

/// 按键组合，如 `c`、`Control+Enter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: String,
    pub modifiers: Vec<Modifier>,
}

impl KeyChord {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Vec::new(),
        }
    }

    /// 解析 `Control+Enter` 形式；无法识别的修饰键名原样当作按键
    pub fn parse(chord: &str) -> Self {
        let mut parts: Vec<&str> = chord.split('+').map(str::trim).collect();
        let key = parts.pop().unwrap_or_default().to_string();
        let mut modifiers = Vec::new();
        for part in parts {
            match part.to_ascii_lowercase().as_str() {
                "alt" => modifiers.push(Modifier::Alt),
                "control" | "ctrl" => modifiers.push(Modifier::Control),
                "meta" | "cmd" => modifiers.push(Modifier::Meta),
                "shift" => modifiers.push(Modifier::Shift),
                other => tracing::warn!(modifier = %other, chord = %chord, "unknown modifier ignored"),
            }
        }
        Self { key, modifiers }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{:?}+", m)?;
        }
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain_rejected() {
        assert!(LocatorChain::new("send", vec![]).is_none());
        let chain = LocatorChain::new("send", vec![Locator::css("#a")]).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.name(), "send");
    }

    #[test]
    fn test_locator_display_and_query() {
        let l = Locator::xpath(r#"//button[contains(., "OK")]"#);
        assert_eq!(l.to_string(), r#"xpath://button[contains(., "OK")]"#);
        assert_eq!(l.query(), r#"//button[contains(., "OK")]"#);
    }

    #[test]
    fn test_key_chord_parse() {
        let chord = KeyChord::parse("Control+Enter");
        assert_eq!(chord.key, "Enter");
        assert_eq!(chord.modifiers, vec![Modifier::Control]);
        assert_eq!(chord.to_string(), "Control+Enter");

        let plain = KeyChord::parse("c");
        assert_eq!(plain, KeyChord::key("c"));
    }
}
