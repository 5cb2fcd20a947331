//! Buy and close flows.

use super::core::Executor;
use super::results::{ExecError, SignalOutcome};
use crate::audit::{AuditSink, Note};
use crate::balance::{base_balance, quote_balance};
use crate::resolver::FillResolver;
use crate::signal::Signal;
use crate::types::{OrderIntent, OrderSizing, Side};
use crate::venue::Venue;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{info, warn};

impl<V: Venue, A: AuditSink> Executor<V, A> {
    /// Quote amount for a buy: the configured trade amount, or a buffered share
    /// of the balance when the balance is smaller. Truncated to cents.
    pub fn buy_amount(&self, balance: Decimal) -> Decimal {
        if balance < self.config.trade_amount {
            (balance * self.config.balance_buffer)
                .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        } else {
            self.config.trade_amount
        }
    }

    // 10.2: market buy for a quote amount
    pub(super) fn open_long(&mut self, signal: &Signal) -> Result<SignalOutcome, ExecError> {
        // no money moves while the ledger cannot take the fill
        self.ledger.ensure_readable()?;

        let quote_coin = self.config.quote_coin.clone();
        let balance = match self.venue.wallet_balance(&quote_coin) {
            Ok(tree) => quote_balance(&tree, &quote_coin),
            Err(e) => {
                warn!(coin = %quote_coin, error = %e, "balance lookup failed, treating as zero");
                Decimal::ZERO
            }
        };
        info!(symbol = %signal.symbol, %balance, coin = %quote_coin, "available balance");

        let amount = if balance > Decimal::ZERO {
            self.buy_amount(balance)
        } else {
            Decimal::ZERO
        };
        if amount <= Decimal::ZERO {
            warn!(symbol = %signal.symbol, "no balance to buy with");
            return self.skip(&signal.symbol, Side::Buy, None, Note::NoBalance);
        }

        let intent = OrderIntent::new(&signal.symbol, Side::Buy, OrderSizing::Notional(amount))
            .with_price_hint(signal.price);
        info!(symbol = %intent.symbol, %amount, "placing market buy");
        let response = self.venue.place_order(&intent)?;

        let resolution = FillResolver::new(&self.config.precision).resolve(&response, &intent, &self.venue);
        self.apply_resolution(&intent, resolution, Note::Ok)
    }

    // 10.4: sell everything we hold. local lots first, the venue balance otherwise.
    pub(super) fn close_long(&mut self, signal: &Signal) -> Result<SignalOutcome, ExecError> {
        let symbol = signal.symbol.as_str();
        let mut qty = self.ledger.long_qty(symbol)?;

        if qty <= Decimal::ZERO {
            let base = self.config.base_coin(symbol);
            qty = match self.venue.wallet_balance(base) {
                Ok(tree) => base_balance(&tree, base),
                Err(e) => {
                    warn!(coin = %base, error = %e, "base balance lookup failed, treating as zero");
                    Decimal::ZERO
                }
            };
            if qty > Decimal::ZERO {
                info!(%symbol, %qty, "no local longs, closing venue balance");
            }
        }

        if qty <= Decimal::ZERO {
            info!(%symbol, "nothing to close");
            return self.skip(symbol, Side::Sell, None, Note::NothingToClose);
        }

        let rounded = self.config.precision.round(symbol, qty);
        if rounded.is_zero() {
            info!(%symbol, %qty, "close qty rounds to zero, no order sent");
            return self.skip(symbol, Side::Sell, None, Note::ZeroQtyAfterRounding);
        }

        let intent = OrderIntent::new(symbol, Side::Sell, OrderSizing::Base(rounded));
        info!(%symbol, qty = %rounded, "placing market sell");
        let response = self.venue.place_order(&intent)?;

        let resolution = FillResolver::new(&self.config.precision).resolve(&response, &intent, &self.venue);
        self.apply_resolution(&intent, resolution, Note::ClosedBySignal)
    }
}
