// 3.0: FIFO lot ledger. one InstrumentLedger per symbol, two queues of open lots.
// 3.1 has the matching walk. realized pnl = sum over closed slices, net of fees.
//
// state per instrument: EMPTY -> LONG -> EMPTY -> SHORT -> ...
// a fill always drains the opposing queue before opening lots on its own side,
// so longs and shorts are never both non-empty.

use crate::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::store::decimal_str;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    #[serde(default, with = "decimal_str")]
    pub qty: Decimal,
    #[serde(default, with = "decimal_str")]
    pub price: Decimal,
}

impl Lot {
    pub fn new(qty: Decimal, price: Decimal) -> Self {
        Self { qty, price }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("pnl overflow applying {side} {qty} @ {price}")]
    Overflow {
        side: Side,
        price: Decimal,
        qty: Decimal,
    },
}

/// How fees are charged against realized pnl when a fill spans several lots.
///
/// `PerMatchedLot` subtracts the fill's fee once for every lot it closes into,
/// which is what the deployed bot has always done. `PerFill` subtracts it once.
/// Neither charges a fee for a fill that only opens a new lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeePolicy {
    #[default]
    PerMatchedLot,
    PerFill,
}

impl FeePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "per_matched_lot" | "per_lot" => Some(FeePolicy::PerMatchedLot),
            "per_fill" => Some(FeePolicy::PerFill),
            _ => None,
        }
    }
}

/// What one fill did to an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillApplication {
    pub closed_qty: Decimal,
    pub opened_qty: Decimal,
    pub matched_lots: usize,
    pub realized_delta: Decimal,
    pub realized_total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentLedger {
    #[serde(default)]
    pub longs: VecDeque<Lot>,
    #[serde(default)]
    pub shorts: VecDeque<Lot>,
    #[serde(default, with = "decimal_str")]
    pub realized_pnl_total: Decimal,
}

impl InstrumentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // saturating: lots come from a file and from venue replies
    pub fn long_qty(&self) -> Decimal {
        total_qty(&self.longs)
    }

    pub fn short_qty(&self) -> Decimal {
        total_qty(&self.shorts)
    }

    pub fn is_flat(&self) -> bool {
        self.longs.is_empty() && self.shorts.is_empty()
    }

    // the one-direction invariant. only a hand-edited file can break it.
    pub fn is_consistent(&self) -> bool {
        self.longs.is_empty() || self.shorts.is_empty()
    }

    // 3.1: close opposing lots oldest-first, open the remainder on our side.
    // on overflow nothing is changed.
    pub fn apply(
        &mut self,
        side: Side,
        price: Decimal,
        qty: Decimal,
        fee: Decimal,
        fee_policy: FeePolicy,
    ) -> Result<FillApplication, LedgerError> {
        debug_assert!(qty > Decimal::ZERO, "fill qty must be positive");

        let mut next = self.clone();
        let applied = next
            .walk(side, price, qty, fee, fee_policy)
            .ok_or(LedgerError::Overflow { side, price, qty })?;
        *self = next;
        Ok(applied)
    }

    fn walk(
        &mut self,
        side: Side,
        price: Decimal,
        qty: Decimal,
        fee: Decimal,
        fee_policy: FeePolicy,
    ) -> Option<FillApplication> {
        let (opposing, same) = match side {
            Side::Buy => (&mut self.shorts, &mut self.longs),
            Side::Sell => (&mut self.longs, &mut self.shorts),
        };

        let mut remaining = qty;
        let mut realized_delta = Decimal::ZERO;
        let mut matched_lots = 0usize;

        while remaining > Decimal::ZERO {
            let Some(lot) = opposing.front_mut() else {
                break;
            };
            let close_qty = lot.qty.min(remaining);
            let spread = match side {
                // buying back a short: profit when we pay less than we sold for
                Side::Buy => lot.price.checked_sub(price)?,
                Side::Sell => price.checked_sub(lot.price)?,
            };
            realized_delta = realized_delta.checked_add(spread.checked_mul(close_qty)?)?;
            if fee_policy == FeePolicy::PerMatchedLot {
                realized_delta = realized_delta.checked_sub(fee)?;
            }
            matched_lots += 1;
            remaining -= close_qty;
            lot.qty -= close_qty;
            if lot.qty <= Decimal::ZERO {
                opposing.pop_front();
            }
        }

        if fee_policy == FeePolicy::PerFill && matched_lots > 0 {
            realized_delta = realized_delta.checked_sub(fee)?;
        }

        let opened_qty = remaining.max(Decimal::ZERO);
        if opened_qty > Decimal::ZERO {
            same.push_back(Lot::new(opened_qty, price));
        }

        self.realized_pnl_total = self.realized_pnl_total.checked_add(realized_delta)?;

        Some(FillApplication {
            closed_qty: qty - opened_qty,
            opened_qty,
            matched_lots,
            realized_delta,
            realized_total: self.realized_pnl_total,
        })
    }

    // drops lots a damaged file may carry (qty <= 0) and clamps negative prices
    pub(crate) fn normalize(&mut self) {
        for queue in [&mut self.longs, &mut self.shorts] {
            queue.retain(|lot| lot.qty > Decimal::ZERO);
            for lot in queue.iter_mut() {
                if lot.price < Decimal::ZERO {
                    lot.price = Decimal::ZERO;
                }
            }
        }
    }
}

/// Every instrument the deployment has ever traded, keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerStore {
    instruments: BTreeMap<String, InstrumentLedger>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&InstrumentLedger> {
        self.instruments.get(symbol)
    }

    pub fn entry(&mut self, symbol: &str) -> &mut InstrumentLedger {
        self.instruments.entry(symbol.to_string()).or_default()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.instruments.keys()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn realized_pnl(&self, symbol: &str) -> Decimal {
        self.get(symbol)
            .map(|l| l.realized_pnl_total)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn apply_fill(
        &mut self,
        symbol: &str,
        side: Side,
        price: Decimal,
        qty: Decimal,
        fee: Decimal,
        fee_policy: FeePolicy,
    ) -> Result<FillApplication, LedgerError> {
        self.entry(symbol).apply(side, price, qty, fee, fee_policy)
    }

    pub(crate) fn normalize(&mut self) {
        for ledger in self.instruments.values_mut() {
            ledger.normalize();
        }
    }
}

fn total_qty(lots: &VecDeque<Lot>) -> Decimal {
    lots.iter()
        .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.qty))
}
