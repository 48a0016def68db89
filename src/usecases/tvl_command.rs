//! TVL Command Use Case - One Chat Invocation End to End
//!
//! Sends an in-progress placeholder, runs the valuation, then edits the
//! placeholder into either the TVL embed or a failure message. Every
//! failure is caught here; nothing propagates into the chat session.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::registry::Deployment;
use crate::domain::error::TvlError;
use crate::domain::format::{clip, format_abbreviated, format_usd};
use crate::domain::valuation::TvlReport;
use crate::ports::responder::{ChatResponder, Embed, EmbedField, Reply};

use super::tvl_service::TvlCalculator;

/// Text of the in-progress placeholder.
pub const PLACEHOLDER_TEXT: &str = "Calculating TVL...";

/// Generic failure text; the cause is appended when exposed.
pub const FAILURE_TEXT: &str = "Unable to calculate TVL at the moment";

/// Discord's limit on message `content`.
pub const MAX_CONTENT_LEN: usize = 2000;

/// Embed color (Discord "blue").
pub const EMBED_COLOR: u32 = 0x3498DB;

/// One triggered command.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
  /// Correlation id for logs.
  pub id: Uuid,
  /// Channel the command was sent in; the reply goes there.
  pub channel_id: String,
  /// Display name of the invoking user.
  pub author: String,
}

impl CommandInvocation {
  pub fn new(channel_id: impl Into<String>, author: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4(),
      channel_id: channel_id.into(),
      author: author.into(),
    }
  }
}

/// What one invocation produced, for metrics.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
  Reported(TvlReport),
  Failed(TvlError),
}

/// How reports are rendered.
#[derive(Debug, Clone)]
pub struct Presentation {
  pub title: String,
  pub footer: String,
  /// Append the failure cause to the user-facing message.
  pub expose_error_detail: bool,
}

impl Presentation {
  /// Footer names the data sources the deployment reads from.
  pub fn for_deployment(title: impl Into<String>, deployment: &Deployment, expose_error_detail: bool) -> Self {
    let events = deployment.portfolios.iter().any(|p| p.is_event_sourced());
    let balances = deployment.portfolios.iter().any(|p| !p.is_event_sourced());
    let footer = match (events, balances) {
      (true, true) => "Calculated from deposit events and vault balances",
      (true, false) => "Calculated from deposit events",
      _ => "Calculated from vault balances",
    };

    Self {
      title: title.into(),
      footer: footer.to_string(),
      expose_error_detail,
    }
  }
}

/// Render a report as an embed.
///
/// A single portfolio shows one "Current TVL" field; several show one
/// field each plus "Total TVL".
pub fn render_embed(report: &TvlReport, presentation: &Presentation) -> Embed {
  let value = |usd: f64| format!("{} ({})", format_usd(usd), format_abbreviated(usd));

  let fields = if report.subtotals.len() == 1 {
    vec![EmbedField {
      name: "Current TVL".to_string(),
      value: value(report.total),
      inline: false,
    }]
  } else {
    report
      .subtotals
      .iter()
      .map(|s| EmbedField {
        name: s.name.clone(),
        value: value(s.usd),
        inline: true,
      })
      .chain(std::iter::once(EmbedField {
        name: "Total TVL".to_string(),
        value: value(report.total),
        inline: false,
      }))
      .collect()
  };

  Embed {
    title: presentation.title.clone(),
    color: EMBED_COLOR,
    fields,
    footer: Some(presentation.footer.clone()),
    timestamp: Some(report.computed_at),
  }
}

/// User-facing failure text, clipped to fit one chat message.
pub fn failure_message(err: &TvlError, expose_detail: bool) -> String {
  if expose_detail {
    clip(&format!("{FAILURE_TEXT}: {err}"), MAX_CONTENT_LEN)
  } else {
    format!("{FAILURE_TEXT}.")
  }
}

/// Handles the TVL command for any calculator and responder.
pub struct TvlCommand<S: TvlCalculator, R: ChatResponder> {
  calculator: Arc<S>,
  responder: Arc<R>,
  presentation: Presentation,
}

impl<S: TvlCalculator, R: ChatResponder> TvlCommand<S, R> {
  pub fn new(calculator: Arc<S>, responder: Arc<R>, presentation: Presentation) -> Self {
    Self {
      calculator,
      responder,
      presentation,
    }
  }

  /// Run one invocation and deliver exactly one final reply.
  #[instrument(skip(self), fields(invocation_id = %invocation.id, channel = %invocation.channel_id))]
  pub async fn handle(&self, invocation: &CommandInvocation) -> CommandOutcome {
    info!(author = %invocation.author, "TVL command received");

    let placeholder = match self
      .responder
      .send(&invocation.channel_id, &Reply::text(PLACEHOLDER_TEXT))
      .await
    {
      Ok(message_id) => Some(message_id),
      Err(e) => {
        warn!(error = %e, "Failed to send placeholder, will reply with a new message");
        None
      }
    };

    let (reply, outcome) = match self.calculator.calculate().await {
      Ok(report) => (
        Reply::Embed(render_embed(&report, &self.presentation)),
        CommandOutcome::Reported(report),
      ),
      Err(e) => {
        error!(error = %e, kind = e.kind(), "TVL calculation failed");
        (
          Reply::text(failure_message(&e, self.presentation.expose_error_detail)),
          CommandOutcome::Failed(e),
        )
      }
    };

    self.deliver(&invocation.channel_id, placeholder.as_deref(), &reply).await;
    outcome
  }

  /// Edit the placeholder, or send a new message when there is none
  /// or the edit fails.
  async fn deliver(&self, channel: &str, placeholder: Option<&str>, reply: &Reply) {
    if let Some(message_id) = placeholder {
      match self.responder.edit(channel, message_id, reply).await {
        Ok(()) => return,
        Err(e) => warn!(error = %e, "Failed to edit placeholder, sending new message"),
      }
    }

    if let Err(e) = self.responder.send(channel, reply).await {
      error!(error = %e, "Failed to deliver TVL reply");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::valuation::Subtotal;
  use chrono::Utc;

  fn presentation() -> Presentation {
    Presentation {
      title: "StoneBeraVault TVL".into(),
      footer: "Calculated from deposit events".into(),
      expose_error_detail: true,
    }
  }

  fn subtotal(name: &str, usd: f64) -> Subtotal {
    Subtotal {
      name: name.into(),
      usd,
      breakdown: vec![],
    }
  }

  #[test]
  fn test_single_portfolio_embed() {
    let report = TvlReport {
      subtotals: vec![subtotal("Vault", 2_340_000.0)],
      total: 2_340_000.0,
      computed_at: Utc::now(),
    };
    let embed = render_embed(&report, &presentation());

    assert_eq!(embed.title, "StoneBeraVault TVL");
    assert_eq!(embed.fields.len(), 1);
    assert_eq!(embed.fields[0].name, "Current TVL");
    assert_eq!(embed.fields[0].value, "$2,340,000.00 ($2.3M)");
    assert_eq!(embed.footer.as_deref(), Some("Calculated from deposit events"));
  }

  #[test]
  fn test_multi_portfolio_embed_has_total() {
    let report = TvlReport {
      subtotals: vec![subtotal("A", 1_000_000_000.0), subtotal("B", 500_000_000.0)],
      total: 1_500_000_000.0,
      computed_at: Utc::now(),
    };
    let embed = render_embed(&report, &presentation());

    assert_eq!(embed.fields.len(), 3);
    assert_eq!(embed.fields[2].name, "Total TVL");
    assert_eq!(embed.fields[2].value, "$1,500,000,000.00 ($1.5B)");
  }

  #[test]
  fn test_failure_message_detail_toggle() {
    let err = TvlError::connectivity("eth_blockNumber", "connection refused");
    assert_eq!(
      failure_message(&err, true),
      "Unable to calculate TVL at the moment: eth_blockNumber: connection refused"
    );
    assert_eq!(failure_message(&err, false), "Unable to calculate TVL at the moment.");
  }

  #[test]
  fn test_failure_message_fits_one_message() {
    let body = format!("<html>{}</html>", "x".repeat(3000));
    let err = TvlError::connectivity("price index GET /simple/price", format!("HTTP 429 Too Many Requests: {body}"));

    let text = failure_message(&err, true);
    assert!(text.len() <= MAX_CONTENT_LEN);
    assert!(text.starts_with("Unable to calculate TVL at the moment: price index GET /simple/price: HTTP 429"));
  }
}
