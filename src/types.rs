// 1.0: shared primitives. side, order intent, fill, lenient decimal parsing.
// every price/qty/pnl value in the crate is a rust_decimal::Decimal, never a float.

use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// Buy opens longs / closes shorts. Sell closes longs / opens shorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }

    // case-insensitive. "long" and "close" are accepted as channel vocabulary.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Some(Side::Buy),
            "sell" | "close" | "short" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 1.1: how much to trade. quote amount (e.g. USDT to spend) or base quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSizing {
    Notional(Decimal),
    Base(Decimal),
}

/// Normalized order intent handed to the venue and to the fill resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub sizing: OrderSizing,
    /// Price the caller already knows (e.g. from the signal). Used before a quote lookup.
    pub price_hint: Option<Decimal>,
}

impl OrderIntent {
    pub fn new(symbol: impl Into<String>, side: Side, sizing: OrderSizing) -> Self {
        Self {
            symbol: symbol.into().to_ascii_uppercase(),
            side,
            sizing,
            price_hint: None,
        }
    }

    pub fn with_price_hint(mut self, price: Option<Decimal>) -> Self {
        self.price_hint = price.filter(|p| *p > Decimal::ZERO);
        self
    }
}

// 1.2: one execution, reported by the venue or inferred by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub price: Decimal,
    pub qty: Decimal,
    pub fee: Decimal,
    pub fee_currency: Option<String>,
    pub order_id: Option<String>,
}

impl Fill {
    pub fn new(price: Decimal, qty: Decimal) -> Self {
        Self {
            price,
            qty,
            fee: Decimal::ZERO,
            fee_currency: None,
            order_id: None,
        }
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_order_id(mut self, order_id: Option<String>) -> Self {
        self.order_id = order_id;
        self
    }

    // zero-qty fills must never reach the ledger
    pub fn is_executable(&self) -> bool {
        self.qty > Decimal::ZERO
    }
}

// 1.3: lenient parsing. venue payloads mix strings and json numbers.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains(['e', 'E']) {
        return Decimal::from_scientific(raw).ok();
    }
    Decimal::from_str(raw).ok()
}

pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        // serde_json prints the shortest round-trip form, so no binary float artifacts leak in
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

pub fn decimal_or_zero(value: &Value) -> Decimal {
    decimal_from_value(value).unwrap_or(Decimal::ZERO)
}
