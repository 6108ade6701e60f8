//! Mailpilot - 对话式 Gmail 发信代理
//!
//! 模块划分：
//! - **browser**: 浏览器契约、定位器链、元素解析器、检查点、Gmail 定位器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **conversation**: 槽位收集、消息协议、对话编排器
//! - **core**: 错误类型、阶段定义、会话状态机、优雅关闭
//! - **gateway**: WebSocket 接入（feature "gateway"）
//! - **llm**: LLM 客户端抽象与邮件文本生成
//! - **observability**: 日志初始化

pub mod browser;
pub mod config;
pub mod conversation;
pub mod core;
#[cfg(feature = "gateway")]
pub mod gateway;
pub mod llm;
pub mod observability;
