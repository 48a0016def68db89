//! Discord wire types for the gateway and REST API.

use serde::{Deserialize, Serialize};

use crate::ports::responder::{Embed, Reply};

/// Gateway opcodes used by the bot.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway intents: GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT.
pub const DEFAULT_INTENTS: u64 = (1 << 9) | (1 << 12) | (1 << 15);

/// Incoming gateway frame.
#[derive(Debug, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: serde_json::Value,
    pub s: Option<u64>,
    pub t: Option<String>,
}

/// `d` of a Hello frame.
#[derive(Debug, Deserialize)]
pub struct Hello {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

/// Message author.
#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// `d` of a READY dispatch.
#[derive(Debug, Deserialize)]
pub struct Ready {
    pub user: Author,
    pub session_id: String,
}

/// `d` of a MESSAGE_CREATE dispatch.
#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: Author,
}

/// Outgoing gateway frame.
#[derive(Debug, Serialize)]
pub struct OutgoingPayload<T: Serialize> {
    pub op: u8,
    pub d: T,
}

#[derive(Debug, Serialize)]
pub struct Identify<'a> {
    pub token: &'a str,
    pub intents: u64,
    pub properties: IdentifyProperties,
}

#[derive(Debug, Serialize)]
pub struct IdentifyProperties {
    pub os: &'static str,
    pub browser: &'static str,
    pub device: &'static str,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS,
            browser: "vault-tvl-bot",
            device: "vault-tvl-bot",
        }
    }
}

/// Body of a create/edit message request.
///
/// Both keys are always sent so an edit fully replaces the placeholder.
#[derive(Debug, Serialize, PartialEq)]
pub struct MessageBody {
    pub content: String,
    pub embeds: Vec<RestEmbed>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RestEmbed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<RestEmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<RestEmbedFooter>,
    /// ISO-8601 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RestEmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RestEmbedFooter {
    pub text: String,
}

/// Subset of the message object returned by create.
#[derive(Debug, Deserialize)]
pub struct CreatedMessage {
    pub id: String,
}

/// Body of a 429 response.
#[derive(Debug, Deserialize)]
pub struct RateLimited {
    /// Seconds to wait.
    pub retry_after: f64,
}

impl From<&Embed> for RestEmbed {
    fn from(embed: &Embed) -> Self {
        Self {
            title: embed.title.clone(),
            color: embed.color,
            fields: embed
                .fields
                .iter()
                .map(|f| RestEmbedField {
                    name: f.name.clone(),
                    value: f.value.clone(),
                    inline: f.inline,
                })
                .collect(),
            footer: embed.footer.as_ref().map(|text| RestEmbedFooter { text: text.clone() }),
            timestamp: embed.timestamp.map(|ts| ts.to_rfc3339()),
        }
    }
}

impl From<&Reply> for MessageBody {
    fn from(reply: &Reply) -> Self {
        match reply {
            Reply::Text(content) => Self {
                content: content.clone(),
                embeds: Vec::new(),
            },
            Reply::Embed(embed) => Self {
                content: String::new(),
                embeds: vec![RestEmbed::from(embed)],
            },
        }
    }
}
