//! Currency rendering for chat replies.

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use rust_decimal_macros::dec;

/// Render a USD amount as `$1,234,567.89`.
///
/// Rounds half away from zero on the exact decimal value, so
/// binary-float noise never shows up at the cent.
pub fn format_usd(value: f64) -> String {
    let Some(decimal) = Decimal::from_f64(value) else {
        return format!("${value}");
    };

    let rounded = decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded < dec!(0) { "-" } else { "" };
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    format!("{sign}${}.{cents}", group_thousands(whole))
}

/// Render a USD amount scaled to billions or millions, one decimal.
///
/// Values under a million still use the million scale (`$0.5M`).
pub fn format_abbreviated(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("${:.1}B", value / 1_000_000_000.0)
    } else {
        format!("${:.1}M", value / 1_000_000.0)
    }
}

/// Shorten `text` to at most `max_bytes`, cutting on a char boundary
/// and marking the cut with `...`.
pub fn clip(text: &str, max_bytes: usize) -> String {
    const MARK: &str = "...";
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes.saturating_sub(MARK.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{MARK}", &text[..end])
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
