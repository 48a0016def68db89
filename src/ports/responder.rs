//! Chat Responder Port - Channel Message Delivery
//!
//! The command handler produces exactly one of: a plain-text reply, a
//! rich embed, or an edit of its own in-progress placeholder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Platform message identifier.
pub type MessageId = String;

/// One named field of a rich embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
  pub name: String,
  pub value: String,
  pub inline: bool,
}

/// Rich message with a title, named fields and a footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
  pub title: String,
  /// RGB color.
  pub color: u32,
  pub fields: Vec<EmbedField>,
  pub footer: Option<String>,
  pub timestamp: Option<DateTime<Utc>>,
}

/// Body of a message sent or edited by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
  Text(String),
  Embed(Embed),
}

impl Reply {
  /// Convenience constructor for plain-text replies.
  pub fn text(content: impl Into<String>) -> Self {
    Self::Text(content.into())
  }
}

/// Trait for posting replies to the originating channel.
#[async_trait]
pub trait ChatResponder: Send + Sync + 'static {
  /// Send a new message, returning its id.
  async fn send(&self, channel: &str, reply: &Reply) -> anyhow::Result<MessageId>;

  /// Replace the body of a message previously sent by the bot.
  async fn edit(&self, channel: &str, message: &str, reply: &Reply) -> anyhow::Result<()>;
}
