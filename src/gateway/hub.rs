//! WebSocket Hub：每个连接一个对话编排器
//!
//! 读半边在连接任务里循环；写半边交给独立的写任务，
//! 编排器的出站消息与控制帧（Pong / Close）经 mpsc 汇入写任务。

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::browser::BrowserLauncher;
use crate::config::GatewaySection;
use crate::conversation::{ChatMessage, ConversationOrchestrator, Turn};
use crate::core::SessionConfig;
use crate::llm::TextGenerator;

pub const UNREADABLE_FRAME: &str = "Sorry, I couldn't read that message. Please send plain text.";
pub const BUSY: &str = "All sessions are busy right now. Please try again later.";

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub bind_addr: String,
    /// 同时运行的会话上限
    pub max_sessions: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from(&GatewaySection::default())
    }
}

impl From<&GatewaySection> for HubConfig {
    fn from(section: &GatewaySection) -> Self {
        Self {
            bind_addr: section.bind_addr.clone(),
            max_sessions: section.max_sessions.max(1),
        }
    }
}

/// 所有连接共享的只读依赖
struct Shared {
    generator: Arc<TextGenerator>,
    launcher: Arc<dyn BrowserLauncher>,
    session_config: SessionConfig,
    sessions: Arc<Semaphore>,
}

pub struct Hub {
    config: HubConfig,
    shared: Arc<Shared>,
}

impl Hub {
    pub fn new(
        config: HubConfig,
        generator: TextGenerator,
        launcher: Arc<dyn BrowserLauncher>,
        session_config: SessionConfig,
    ) -> Self {
        let sessions = Arc::new(Semaphore::new(config.max_sessions));
        Self {
            config,
            shared: Arc::new(Shared {
                generator: Arc::new(generator),
                launcher,
                session_config,
                sessions,
            }),
        }
    }

    pub async fn bind(&self) -> Result<TcpListener, String> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e| format!("Invalid bind address: {}", e))?;
        TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind {}: {}", addr, e))
    }

    /// 绑定并服务，直到 token 取消
    pub async fn run(&self, token: CancellationToken) -> Result<(), String> {
        let listener = self.bind().await?;
        self.serve(listener, token).await
    }

    /// 在已绑定的监听器上接受连接；取消后等待进行中的会话收尾
    pub async fn serve(&self, listener: TcpListener, token: CancellationToken) -> Result<(), String> {
        let local = listener
            .local_addr()
            .map_err(|e| format!("Listener address unavailable: {}", e))?;
        tracing::info!("Gateway listening on ws://{}", local);

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let shared = Arc::clone(&self.shared);
                        let token = token.clone();
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, shared, token).await {
                                tracing::error!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => tracing::error!("Accept error: {}", e),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        tracing::info!(open = connections.len(), "gateway stopping, waiting for sessions to close");
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    shared: Arc<Shared>,
    token: CancellationToken,
) -> Result<(), String> {
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| format!("WebSocket handshake failed: {}", e))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel::<ChatMessage>();
    let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel::<WsMessage>();

    let writer = tokio::spawn(async move {
        loop {
            // 先清空对话消息，再发控制帧，保证 Close 在最后一条状态之后
            let frame = tokio::select! {
                biased;
                Some(msg) = chat_rx.recv() => match msg.to_json() {
                    Ok(json) => WsMessage::Text(json),
                    Err(e) => {
                        tracing::warn!("Serialize error: {}", e);
                        continue;
                    }
                },
                Some(ctl) = ctl_rx.recv() => ctl,
                else => break,
            };
            let closing = matches!(frame, WsMessage::Close(_));
            if ws_tx.send(frame).await.is_err() || closing {
                break;
            }
        }
    });

    let session_id = format!("ws-{}", uuid::Uuid::new_v4());
    tracing::info!(session = %session_id, peer = %addr, "New WebSocket connection");

    let permit = match Arc::clone(&shared.sessions).try_acquire_owned() {
        Ok(p) => Some(p),
        Err(_) => {
            tracing::warn!(session = %session_id, "session limit reached, rejecting");
            let _ = chat_tx.send(ChatMessage::agent(BUSY));
            None
        }
    };

    if permit.is_some() {
        let mut orchestrator = ConversationOrchestrator::new(
            session_id.clone(),
            Arc::clone(&shared.generator),
            Arc::clone(&shared.launcher),
            shared.session_config.clone(),
            chat_tx.clone(),
        );
        orchestrator.start();

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(session = %session_id, "shutdown while waiting for operator");
                    break;
                }
                next = ws_rx.next() => next,
            };
            let frame = match next {
                Some(Ok(f)) => f,
                Some(Err(e)) => {
                    tracing::warn!(session = %session_id, "WebSocket receive error: {}", e);
                    break;
                }
                None => break,
            };

            match frame {
                WsMessage::Text(text) => {
                    let message = match ChatMessage::from_json(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::debug!(session = %session_id, error = %e, "unparsable frame");
                            let _ = chat_tx.send(ChatMessage::agent(UNREADABLE_FRAME));
                            continue;
                        }
                    };
                    if let Turn::Finished(outcome) = orchestrator.handle(&message).await {
                        tracing::info!(session = %session_id, sent = outcome.is_sent(), "workflow finished");
                        break;
                    }
                }
                WsMessage::Ping(payload) => {
                    let _ = ctl_tx.send(WsMessage::Pong(payload));
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    }
    drop(permit);

    let _ = ctl_tx.send(WsMessage::Close(None));
    drop(chat_tx);
    drop(ctl_tx);
    let _ = writer.await;

    tracing::info!(session = %session_id, "WebSocket connection closed: {}", addr);
    Ok(())
}
