//! Discord Bot Authentication: Token from the Environment
//!
//! The bot token comes from `DISCORD_TOKEN` (set in `.env`, never
//! committed) and is used both for the gateway Identify and for the
//! `Authorization` header of REST calls.

use anyhow::{Context, Result};

/// Environment variable holding the bot token.
pub const DISCORD_TOKEN_ENV: &str = "DISCORD_TOKEN";

/// Discord bot credentials.
pub struct DiscordAuth {
    /// Bot token (never logged).
    token: String,
}

impl DiscordAuth {
    /// Load the bot token from `DISCORD_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(DISCORD_TOKEN_ENV)
            .with_context(|| format!("{DISCORD_TOKEN_ENV} not set"))?;
        Self::new(token)
    }

    /// Wrap an explicit token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        anyhow::ensure!(!token.trim().is_empty(), "Discord bot token is empty");
        Ok(Self { token })
    }

    /// Raw token for the gateway Identify payload.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value of the REST `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bot {}", self.token)
    }
}

impl std::fmt::Debug for DiscordAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordAuth").field("token", &"<redacted>").finish()
    }
}
