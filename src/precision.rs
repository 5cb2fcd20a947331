// 2.0: quantity truncation. always toward zero so a sell never asks for more than we hold.
// 2.1 PrecisionTable resolves the digit count per symbol.

use crate::types::parse_decimal;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

// rust_decimal cannot represent more fractional digits than this
const MAX_SCALE: i64 = 28;

// 2.0: truncate to `precision` fractional digits. precision <= 0 means integer.
// negative input collapses to zero: a zero qty blocks the order downstream.
pub fn round_down(value: Decimal, precision: i64) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let dp = precision.clamp(0, MAX_SCALE) as u32;
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

pub fn round_down_str(raw: &str, precision: i64) -> Decimal {
    parse_decimal(raw)
        .map(|v| round_down(v, precision))
        .unwrap_or(Decimal::ZERO)
}

pub const DEFAULT_BASE_PRECISION: u32 = 3;

/// Per-symbol fractional digit counts with a global fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecisionTable {
    overrides: HashMap<String, u32>,
    default_precision: u32,
}

impl Default for PrecisionTable {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PRECISION)
    }
}

impl PrecisionTable {
    pub fn new(default_precision: u32) -> Self {
        Self {
            overrides: HashMap::new(),
            default_precision,
        }
    }

    /// Parses `"BTCUSDT:6,ETHUSDT:4"`. Entries that don't parse are skipped.
    pub fn parse(raw: &str, default_precision: u32) -> Self {
        let mut table = Self::new(default_precision);
        for pair in raw.split(',') {
            let Some((symbol, digits)) = pair.split_once(':') else {
                continue;
            };
            let symbol = symbol.trim();
            if symbol.is_empty() {
                continue;
            }
            if let Ok(digits) = digits.trim().parse::<u32>() {
                table.set(symbol, digits);
            }
        }
        table
    }

    pub fn set(&mut self, symbol: &str, digits: u32) {
        self.overrides.insert(symbol.to_ascii_uppercase(), digits);
    }

    pub fn default_precision(&self) -> u32 {
        self.default_precision
    }

    pub fn for_symbol(&self, symbol: &str) -> u32 {
        self.overrides
            .get(&symbol.to_ascii_uppercase())
            .copied()
            .unwrap_or(self.default_precision)
    }

    pub fn round(&self, symbol: &str, value: Decimal) -> Decimal {
        round_down(value, self.for_symbol(symbol) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn truncates_never_rounds_up() {
        assert_eq!(round_down(dec!(1.23456), 3), dec!(1.234));
        assert_eq!(round_down(dec!(1.9999), 2), dec!(1.99));
        assert_eq!(round_down(dec!(0.0009), 3), Decimal::ZERO);
    }

    #[test]
    fn zero_precision_truncates_to_integer() {
        assert_eq!(round_down(dec!(7.99), 0), dec!(7));
        assert_eq!(round_down(dec!(7.99), -2), dec!(7));
    }

    #[test]
    fn negative_and_malformed_become_zero() {
        assert_eq!(round_down(dec!(-1.5), 3), Decimal::ZERO);
        assert_eq!(round_down_str("not a number", 3), Decimal::ZERO);
        assert_eq!(round_down_str("2.71828", 2), dec!(2.71));
    }

    #[test]
    fn oversized_precision_is_clamped() {
        assert_eq!(round_down(dec!(1.5), 100), dec!(1.5));
    }

    #[test]
    fn table_overrides_and_default() {
        let table = PrecisionTable::parse("btcusdt:6, ETHUSDT:4,bad,XRPUSDT:x,:2", 3);
        assert_eq!(table.for_symbol("BTCUSDT"), 6);
        assert_eq!(table.for_symbol("ethusdt"), 4);
        assert_eq!(table.for_symbol("XRPUSDT"), 3);
        assert_eq!(table.for_symbol("ADAUSDT"), 3);
        assert_eq!(table.round("BTCUSDT", dec!(0.12345678)), dec!(0.123456));
    }
}
