//! Discord Gateway Session - Command Intake over WebSocket
//!
//! Holds one gateway session: Hello, Identify, heartbeats, and
//! MESSAGE_CREATE dispatches. Messages matching the command trigger
//! are handed to the `InvocationHandler` on their own tokio task, so
//! slow TVL runs never stall the heartbeat or other invocations.
//! Reconnects automatically on disconnect, like the market feeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

use crate::usecases::tvl_command::CommandInvocation;

use super::auth::DiscordAuth;
use super::types::{
    opcode, GatewayPayload, Hello, Identify, IdentifyProperties, MessageCreate, OutgoingPayload,
    Ready, DEFAULT_INTENTS,
};

/// Delay before reconnecting after a dropped session.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Receives matched command invocations.
#[async_trait]
pub trait InvocationHandler: Send + Sync + 'static {
    async fn on_command(&self, invocation: CommandInvocation);
}

/// Recognizes the zero-argument prefix command (e.g. `?tvl`).
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    trigger: String,
}

impl CommandMatcher {
    pub fn new(prefix: &str, name: &str) -> Self {
        Self {
            trigger: format!("{prefix}{name}"),
        }
    }

    /// Exact, case-sensitive match ignoring surrounding whitespace.
    pub fn matches(&self, content: &str) -> bool {
        content.trim() == self.trigger
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }
}

/// What the session loop should do after one inbound frame.
#[derive(Debug)]
pub enum GatewayAction {
    Ignore,
    /// Server asked for an immediate heartbeat.
    Heartbeat,
    HeartbeatAck,
    /// Server asked us to reconnect (or invalidated the session).
    Reconnect,
    /// A user triggered the command.
    Command(CommandInvocation),
}

/// Interpret one inbound text frame, updating the last sequence number.
pub fn interpret_frame(text: &str, matcher: &CommandMatcher, seq: &mut Option<u64>) -> Result<GatewayAction> {
    let payload: GatewayPayload = serde_json::from_str(text).context("Invalid gateway frame")?;
    if payload.s.is_some() {
        *seq = payload.s;
    }

    let action = match payload.op {
        opcode::HEARTBEAT => GatewayAction::Heartbeat,
        opcode::HEARTBEAT_ACK => GatewayAction::HeartbeatAck,
        opcode::RECONNECT | opcode::INVALID_SESSION => GatewayAction::Reconnect,
        opcode::DISPATCH => match payload.t.as_deref() {
            Some("READY") => {
                let ready: Ready = serde_json::from_value(payload.d).context("Invalid READY")?;
                info!(user = %ready.user.username, session = %ready.session_id, "Discord session ready");
                GatewayAction::Ignore
            }
            Some("MESSAGE_CREATE") => {
                let msg: MessageCreate =
                    serde_json::from_value(payload.d).context("Invalid MESSAGE_CREATE")?;
                if !msg.author.bot && matcher.matches(&msg.content) {
                    GatewayAction::Command(CommandInvocation::new(msg.channel_id, msg.author.username))
                } else {
                    GatewayAction::Ignore
                }
            }
            _ => GatewayAction::Ignore,
        },
        _ => GatewayAction::Ignore,
    };
    Ok(action)
}

/// Parse the first frame of a session, which must be a Hello with a
/// non-zero heartbeat interval.
pub fn parse_hello(text: &str) -> Result<Hello> {
    let payload: GatewayPayload = serde_json::from_str(text).context("Invalid gateway frame")?;
    anyhow::ensure!(payload.op == opcode::HELLO, "Expected Hello, got op {}", payload.op);
    let hello: Hello = serde_json::from_value(payload.d).context("Invalid Hello")?;
    anyhow::ensure!(hello.heartbeat_interval > 0, "Hello carried a zero heartbeat interval");
    Ok(hello)
}

/// Long-lived Discord gateway client.
pub struct DiscordGateway<H: InvocationHandler> {
    /// Gateway WebSocket URL.
    url: String,
    /// Bot credentials.
    auth: Arc<DiscordAuth>,
    /// Command trigger.
    matcher: CommandMatcher,
    /// Invocation sink.
    handler: Arc<H>,
    /// Session status for readiness probes.
    connected: Arc<AtomicBool>,
}

impl<H: InvocationHandler> DiscordGateway<H> {
    pub fn new(
        url: impl Into<String>,
        auth: Arc<DiscordAuth>,
        matcher: CommandMatcher,
        handler: Arc<H>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            url: url.into(),
            auth,
            matcher,
            handler,
            connected,
        }
    }

    /// Run the session loop with auto-reconnect until shutdown.
    #[instrument(skip(self, shutdown_rx), fields(trigger = %self.matcher.trigger()))]
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(url = %self.url, "Connecting to Discord gateway");

        loop {
            let result = self.connect_and_stream(&mut shutdown_rx).await;
            self.connected.store(false, Ordering::Relaxed);

            match result {
                Ok(()) => {
                    info!("Discord gateway shut down gracefully");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Discord gateway disconnected, reconnecting in 5s");
                    tokio::select! {
                        _ = shutdown_rx.recv() => return Ok(()),
                        () = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }

    /// Single session: connect, Hello, Identify, stream until error or shutdown.
    async fn connect_and_stream(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> Result<()> {
        let (ws_stream, _) = connect_async(&self.url)
            .await
            .context("Discord gateway connection failed")?;

        let (mut write, mut read) = ws_stream.split();

        let hello = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => break parse_hello(&text)?,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(anyhow::anyhow!("WebSocket error before Hello: {e}")),
                None => return Err(anyhow::anyhow!("Gateway closed before Hello")),
            }
        };

        let identify = OutgoingPayload {
            op: opcode::IDENTIFY,
            d: Identify {
                token: self.auth.token(),
                intents: DEFAULT_INTENTS,
                properties: IdentifyProperties::default(),
            },
        };
        write
            .send(Message::Text(serde_json::to_string(&identify)?))
            .await
            .context("Failed to send Identify")?;

        self.connected.store(true, Ordering::Relaxed);
        info!(heartbeat_ms = hello.heartbeat_interval, "Discord gateway identified");

        let mut heartbeat = tokio::time::interval(Duration::from_millis(hello.heartbeat_interval));
        heartbeat.tick().await;

        let mut seq: Option<u64> = None;
        let mut awaiting_ack = false;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received in Discord gateway");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    anyhow::ensure!(!awaiting_ack, "Heartbeat not acknowledged, session is zombied");
                    send_heartbeat(&mut write, seq).await?;
                    awaiting_ack = true;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match interpret_frame(&text, &self.matcher, &mut seq) {
                                Ok(GatewayAction::Command(invocation)) => self.dispatch(invocation),
                                Ok(GatewayAction::Heartbeat) => send_heartbeat(&mut write, seq).await?,
                                Ok(GatewayAction::HeartbeatAck) => awaiting_ack = false,
                                Ok(GatewayAction::Reconnect) => {
                                    return Err(anyhow::anyhow!("Gateway requested reconnect"));
                                }
                                Ok(GatewayAction::Ignore) => {}
                                Err(e) => debug!(error = %e, "Failed to interpret gateway frame"),
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return Err(anyhow::anyhow!("Gateway closed the connection: {frame:?}"));
                        }
                        Some(Err(e)) => {
                            return Err(anyhow::anyhow!("WebSocket error: {e}"));
                        }
                        None => {
                            return Err(anyhow::anyhow!("WebSocket stream ended"));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Run the handler on its own task.
    fn dispatch(&self, invocation: CommandInvocation) {
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            handler.on_command(invocation).await;
        });
    }
}

async fn send_heartbeat<S>(write: &mut S, seq: Option<u64>) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let frame = OutgoingPayload {
        op: opcode::HEARTBEAT,
        d: seq,
    };
    write
        .send(Message::Text(serde_json::to_string(&frame)?))
        .await
        .context("Failed to send heartbeat")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> CommandMatcher {
        CommandMatcher::new("?", "tvl")
    }

    fn message(content: &str, bot: bool) -> String {
        serde_json::json!({
            "op": 0,
            "s": 12,
            "t": "MESSAGE_CREATE",
            "d": {
                "id": "1",
                "channel_id": "42",
                "content": content,
                "author": { "id": "7", "username": "alice", "bot": bot }
            }
        })
        .to_string()
    }

    #[test]
    fn test_matcher_accepts_only_exact_trigger() {
        let m = matcher();
        assert!(m.matches("?tvl"));
        assert!(m.matches("  ?tvl \n"));
        assert!(!m.matches("?tvlx"));
        assert!(!m.matches("?TVL"));
        assert!(!m.matches("!tvl"));
        assert!(!m.matches("?tvl now"));
    }

    #[test]
    fn test_command_frame_yields_invocation_and_sequence() {
        let mut seq = None;
        let action = interpret_frame(&message("?tvl", false), &matcher(), &mut seq).unwrap();

        assert_eq!(seq, Some(12));
        match action {
            GatewayAction::Command(inv) => {
                assert_eq!(inv.channel_id, "42");
                assert_eq!(inv.author, "alice");
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn test_bot_authors_and_other_text_ignored() {
        let mut seq = None;
        assert!(matches!(
            interpret_frame(&message("?tvl", true), &matcher(), &mut seq).unwrap(),
            GatewayAction::Ignore
        ));
        assert!(matches!(
            interpret_frame(&message("hello", false), &matcher(), &mut seq).unwrap(),
            GatewayAction::Ignore
        ));
    }

    #[test]
    fn test_hello_requires_positive_interval() {
        let hello = parse_hello(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#).unwrap();
        assert_eq!(hello.heartbeat_interval, 41_250);

        assert!(parse_hello(r#"{"op":10,"d":{"heartbeat_interval":0}}"#).is_err());
        assert!(parse_hello(r#"{"op":11}"#).is_err());
    }

    #[test]
    fn test_control_opcodes() {
        let mut seq = Some(3);
        assert!(matches!(
            interpret_frame(r#"{"op":11}"#, &matcher(), &mut seq).unwrap(),
            GatewayAction::HeartbeatAck
        ));
        assert!(matches!(
            interpret_frame(r#"{"op":1,"d":null}"#, &matcher(), &mut seq).unwrap(),
            GatewayAction::Heartbeat
        ));
        assert!(matches!(
            interpret_frame(r#"{"op":7,"d":null}"#, &matcher(), &mut seq).unwrap(),
            GatewayAction::Reconnect
        ));
        assert!(matches!(
            interpret_frame(r#"{"op":9,"d":false}"#, &matcher(), &mut seq).unwrap(),
            GatewayAction::Reconnect
        ));
        assert_eq!(seq, Some(3));
    }
}
