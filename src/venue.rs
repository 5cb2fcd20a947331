// 6.0: the venue seam. quotes, wallet balances and order placement.
// responses come back as untyped json trees; nothing here promises a schema.
// 6.1 PaperVenue is an in-process venue with bybit-shaped replies (mocked).

use crate::types::{OrderIntent, OrderSizing, Side};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VenueError {
    #[error("no quote available for {0}")]
    NoQuote(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("venue unavailable: {0}")]
    Unavailable(String),
}

/// Read-only market quote lookup.
pub trait QuoteSource {
    /// Best price to trade `side` at: the bid for a sell, the ask (or last trade) for a buy.
    fn best_price(&self, symbol: &str, side: Side) -> Result<Decimal, VenueError>;
}

/// Everything the executor needs from a venue. Calls block; timeouts belong to the implementor.
pub trait Venue: QuoteSource {
    fn wallet_balance(&self, coin: &str) -> Result<Value, VenueError>;

    fn place_order(&mut self, intent: &OrderIntent) -> Result<Value, VenueError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperQuote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
}

impl PaperQuote {
    pub fn flat(price: Decimal) -> Self {
        Self {
            bid: price,
            ask: price,
            last: price,
        }
    }
}

// what kind of reply the paper venue sends back after a fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStyle {
    // result.list of executions with price/qty/fee
    Executions,
    // only an order id, like a real market-order ack
    Ack,
}

#[derive(Debug, Clone)]
pub struct PaperVenue {
    quote_coin: String,
    quotes: HashMap<String, PaperQuote>,
    balances: HashMap<String, Decimal>,
    fee_rate: Decimal,
    reply_style: ReplyStyle,
    next_order_id: u64,
    outage: Option<String>,
}

impl PaperVenue {
    pub fn new(quote_coin: impl Into<String>) -> Self {
        Self {
            quote_coin: quote_coin.into().to_ascii_uppercase(),
            quotes: HashMap::new(),
            balances: HashMap::new(),
            fee_rate: dec!(0.001), // 10 bps taker
            reply_style: ReplyStyle::Executions,
            next_order_id: 1,
            outage: None,
        }
    }

    pub fn with_quote(mut self, symbol: &str, quote: PaperQuote) -> Self {
        self.set_quote(symbol, quote);
        self
    }

    pub fn with_balance(mut self, coin: &str, amount: Decimal) -> Self {
        self.balances.insert(coin.to_ascii_uppercase(), amount);
        self
    }

    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_reply_style(mut self, style: ReplyStyle) -> Self {
        self.reply_style = style;
        self
    }

    pub fn set_quote(&mut self, symbol: &str, quote: PaperQuote) {
        self.quotes.insert(symbol.to_ascii_uppercase(), quote);
    }

    // every call fails until cleared
    pub fn set_outage(&mut self, reason: Option<String>) {
        self.outage = reason;
    }

    pub fn balance(&self, coin: &str) -> Decimal {
        self.balances
            .get(&coin.to_ascii_uppercase())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn base_coin<'s>(&self, symbol: &'s str) -> &'s str {
        symbol
            .strip_suffix(self.quote_coin.as_str())
            .unwrap_or(symbol)
    }

    fn check_outage(&self) -> Result<(), VenueError> {
        match &self.outage {
            Some(reason) => Err(VenueError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn credit(&mut self, coin: &str, delta: Decimal) {
        let balance = self.balances.entry(coin.to_string()).or_insert(Decimal::ZERO);
        *balance = balance.saturating_add(delta);
    }
}

impl QuoteSource for PaperVenue {
    fn best_price(&self, symbol: &str, side: Side) -> Result<Decimal, VenueError> {
        self.check_outage()?;
        let quote = self
            .quotes
            .get(&symbol.to_ascii_uppercase())
            .ok_or_else(|| VenueError::NoQuote(symbol.to_string()))?;
        let price = match side {
            Side::Sell => quote.bid,
            Side::Buy if quote.ask > Decimal::ZERO => quote.ask,
            Side::Buy => quote.last,
        };
        if price > Decimal::ZERO {
            Ok(price)
        } else {
            Err(VenueError::NoQuote(symbol.to_string()))
        }
    }
}

impl Venue for PaperVenue {
    fn wallet_balance(&self, coin: &str) -> Result<Value, VenueError> {
        self.check_outage()?;
        let amount = self.balance(coin).to_string();
        Ok(json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "list": [{
                    "accountType": "UNIFIED",
                    "coin": [{
                        "coin": coin.to_ascii_uppercase(),
                        "walletBalance": amount,
                        "availableToWithdraw": amount,
                    }]
                }]
            }
        }))
    }

    // 6.1: fills the whole order at the touch. notional buys spend quote coin.
    fn place_order(&mut self, intent: &OrderIntent) -> Result<Value, VenueError> {
        let price = self.best_price(&intent.symbol, intent.side)?;
        let base = self.base_coin(&intent.symbol).to_string();
        let quote_coin = self.quote_coin.clone();

        let out_of_range = || VenueError::Rejected("order size out of range".to_string());
        let qty = match intent.sizing {
            OrderSizing::Base(qty) => qty,
            OrderSizing::Notional(amount) => amount
                .checked_div(price)
                .ok_or_else(out_of_range)?
                .round_dp_with_strategy(8, RoundingStrategy::ToZero),
        };
        if qty <= Decimal::ZERO {
            return Err(VenueError::Rejected("order qty must be positive".to_string()));
        }
        let notional = qty.checked_mul(price).ok_or_else(out_of_range)?;
        let fee = notional
            .checked_mul(self.fee_rate)
            .ok_or_else(out_of_range)?
            .round_dp(8);

        match intent.side {
            Side::Buy => {
                let cost = notional.checked_add(fee).ok_or_else(out_of_range)?;
                if self.balance(&quote_coin) < cost {
                    return Err(VenueError::Rejected(format!("insufficient {quote_coin}")));
                }
                self.credit(&quote_coin, -cost);
                self.credit(&base, qty);
            }
            Side::Sell => {
                if self.balance(&base) < qty {
                    return Err(VenueError::Rejected(format!("insufficient {base}")));
                }
                self.credit(&base, -qty);
                self.credit(&quote_coin, notional - fee);
            }
        }

        let order_id = format!("paper-{}", self.next_order_id);
        self.next_order_id += 1;

        Ok(match self.reply_style {
            ReplyStyle::Executions => json!({
                "retCode": 0,
                "retMsg": "OK",
                "result": {
                    "orderId": order_id,
                    "list": [{
                        "symbol": intent.symbol,
                        "side": intent.side.as_str(),
                        "execPrice": price.to_string(),
                        "execQty": qty.to_string(),
                        "execFee": fee.to_string(),
                        "feeCurrency": quote_coin,
                        "orderId": order_id,
                    }]
                }
            }),
            ReplyStyle::Ack => json!({
                "retCode": 0,
                "retMsg": "OK",
                "result": { "orderId": order_id, "orderLinkId": "" }
            }),
        })
    }
}
