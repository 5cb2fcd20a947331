// 8.0: signal parser. channel message text in, Signal out.
// two message shapes are recognised: "long opened" (buy) and "position closed" (sell).
// matching is case-insensitive; the message may carry any prefix (e.g. a "TOP 5" banner).

use crate::types::{parse_decimal, Side};
use rust_decimal::Decimal;
use tracing::{debug, info};

const QUOTE_SUFFIX: &str = "/USDT";
const PRICE_LABEL: &str = "AVERAGE PRICE:";
const PRICE_UNIT: &str = "USDT";

/// A recognised trade signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    // concatenated, upper-case, e.g. "BTCUSDT"
    pub symbol: String,
    pub side: Side,
    // the average price announced in the message, if it parsed
    pub price: Option<Decimal>,
}

// 8.1: one message shape. every phrase is matched against upper-cased text.
struct Template {
    name: &'static str,
    start: &'static str,
    venue: &'static str,
    status_marker: &'static str,
    status: &'static str,
    price_marker: &'static str,
    side: Side,
}

const TEMPLATES: [Template; 2] = [
    Template {
        name: "long_opened",
        start: "\u{1F680}",
        venue: "LONG ON BINANCE",
        status_marker: "\u{2705}",
        status: "BUYING COMPLETED",
        price_marker: "\u{1F4C8}",
        side: Side::Buy,
    },
    Template {
        name: "position_closed",
        start: "\u{274C}",
        venue: "ON BINANCE",
        status_marker: "\u{1F191}",
        status: "POSITION CLOSED",
        price_marker: "\u{1F4C9}",
        side: Side::Sell,
    },
];

pub fn parse_signal(text: &str) -> Option<Signal> {
    // ascii upper-casing keeps byte offsets, so slices line up with the input
    let upper = text.to_ascii_uppercase();
    let signal = TEMPLATES.iter().find_map(|t| {
        t.match_in(&upper).map(|s| {
            debug!(template = t.name, "signal template matched");
            s
        })
    });
    if let Some(s) = &signal {
        info!(symbol = %s.symbol, side = %s.side, price = ?s.price, "signal recognised");
    }
    signal
}

impl Template {
    fn match_in(&self, text: &str) -> Option<Signal> {
        text.match_indices(self.start)
            .find_map(|(at, _)| self.match_from(&text[at + self.start.len()..]))
    }

    fn match_from(&self, text: &str) -> Option<Signal> {
        let (symbol, rest) = self.symbol(skip_blank(text))?;
        let rest = after_phrase(rest, self.status_marker, self.status)?;
        let rest = after_phrase(rest, self.price_marker, PRICE_LABEL)?;
        let price = announced_price(rest)?;
        Some(Signal {
            symbol,
            side: self.side,
            price,
        })
    }

    // shortest "<base>/USDT" that is followed by whitespace and the venue phrase
    fn symbol<'t>(&self, text: &'t str) -> Option<(String, &'t str)> {
        text.match_indices(QUOTE_SUFFIX).find_map(|(at, _)| {
            let tail = &text[at + QUOTE_SUFFIX.len()..];
            if !tail.starts_with(char::is_whitespace) {
                return None;
            }
            let rest = tail.trim_start().strip_prefix(self.venue)?;
            let base: String = text[..at]
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect();
            if base.is_empty() {
                return None;
            }
            Some((format!("{base}USDT"), rest))
        })
    }
}

// emoji may carry a trailing variation selector
fn skip_blank(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{FE0F}')
}

fn after_phrase<'t>(text: &'t str, marker: &str, phrase: &str) -> Option<&'t str> {
    text.match_indices(marker).find_map(|(at, _)| {
        skip_blank(&text[at + marker.len()..]).strip_prefix(phrase)
    })
}

// None: the price block is missing. Some(None): present but unparsable.
fn announced_price(text: &str) -> Option<Option<Decimal>> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    let (raw, tail) = text.split_at(end);
    if !tail.starts_with(char::is_whitespace) || !tail.trim_start().starts_with(PRICE_UNIT) {
        return None;
    }
    Some(parse_decimal(&raw.replace(',', ".")).filter(|p| *p > Decimal::ZERO))
}
