// 9.0 config.rs: all executor settings in one place.
// loaded from the process environment (a .env file is honoured), validated once at startup.

use crate::ledger::FeePolicy;
use crate::precision::{PrecisionTable, DEFAULT_BASE_PRECISION};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SPOT_SYMBOLS: [&str; 4] = ["BTCUSDT", "ETHUSDT", "XRPUSDT", "ADAUSDT"];

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    // instruments we are allowed to trade; anything else is ignored
    pub spot_symbols: Vec<String>,
    // quote amount spent per buy signal
    pub trade_amount: Decimal,
    pub quote_coin: String,
    pub precision: PrecisionTable,
    // share of the balance spent when it is below trade_amount
    pub balance_buffer: Decimal,
    pub fee_policy: FeePolicy,
    pub trades_csv: PathBuf,
    pub positions_json: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            spot_symbols: DEFAULT_SPOT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            trade_amount: dec!(1000),
            quote_coin: "USDT".to_string(),
            precision: PrecisionTable::new(DEFAULT_BASE_PRECISION),
            balance_buffer: dec!(0.99),
            fee_policy: FeePolicy::default(),
            trades_csv: PathBuf::from("trades.csv"),
            positions_json: PathBuf::from("positions.json"),
        }
    }
}

impl ExecutorConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // a missing .env is normal
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // 9.1: unset or blank variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("SPOT_SYMBOLS") {
            config.spot_symbols = raw
                .split(',')
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(raw) = get("TRADE_AMOUNT_USD") {
            config.trade_amount = Decimal::from_str(&raw).map_err(|_| ConfigError::InvalidValue {
                key: "TRADE_AMOUNT_USD",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get("QUOTE_COIN") {
            config.quote_coin = raw.to_ascii_uppercase();
        }

        let default_precision = match get("DEFAULT_BASE_PRECISION") {
            Some(raw) => raw.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: "DEFAULT_BASE_PRECISION",
                value: raw.clone(),
            })?,
            None => DEFAULT_BASE_PRECISION,
        };
        config.precision = PrecisionTable::parse(&get("SPOT_DECIMALS").unwrap_or_default(), default_precision);

        if let Some(raw) = get("FEE_POLICY") {
            config.fee_policy = FeePolicy::parse(&raw).ok_or(ConfigError::InvalidValue {
                key: "FEE_POLICY",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get("TRADES_CSV") {
            config.trades_csv = PathBuf::from(raw);
        }
        if let Some(raw) = get("POSITIONS_JSON") {
            config.positions_json = PathBuf::from(raw);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spot_symbols.is_empty() {
            return Err(ConfigError::InvalidSymbols {
                reason: "at least one spot symbol is required".to_string(),
            });
        }

        if let Some(bad) = self
            .spot_symbols
            .iter()
            .find(|s| !s.ends_with(self.quote_coin.as_str()) || s.len() == self.quote_coin.len())
        {
            return Err(ConfigError::InvalidSymbols {
                reason: format!("{bad} is not a {} pair", self.quote_coin),
            });
        }

        if self.trade_amount <= Decimal::ZERO {
            return Err(ConfigError::InvalidSizing {
                reason: "trade amount must be positive".to_string(),
            });
        }

        // buffer in (0, 1]
        if self.balance_buffer <= Decimal::ZERO || self.balance_buffer > Decimal::ONE {
            return Err(ConfigError::InvalidSizing {
                reason: "balance buffer must be in (0, 1]".to_string(),
            });
        }

        if self.precision.default_precision() > 28 {
            return Err(ConfigError::InvalidPrecision {
                reason: "default precision above 28 digits".to_string(),
            });
        }

        Ok(())
    }

    pub fn is_tradable(&self, symbol: &str) -> bool {
        self.spot_symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    // "BTCUSDT" -> "BTC"
    pub fn base_coin<'s>(&self, symbol: &'s str) -> &'s str {
        symbol
            .strip_suffix(self.quote_coin.as_str())
            .unwrap_or(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid symbols: {reason}")]
    InvalidSymbols { reason: String },

    #[error("invalid sizing: {reason}")]
    InvalidSizing { reason: String },

    #[error("invalid precision: {reason}")]
    InvalidPrecision { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_valid() {
        let config = ExecutorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_tradable("btcusdt"));
        assert_eq!(config.base_coin("ETHUSDT"), "ETH");
    }

    #[test]
    fn test_env_overrides() {
        let config = ExecutorConfig::from_lookup(lookup(&[
            ("SPOT_SYMBOLS", " solusdt, BTCUSDT ,,"),
            ("TRADE_AMOUNT_USD", "250.5"),
            ("DEFAULT_BASE_PRECISION", "2"),
            ("SPOT_DECIMALS", "BTCUSDT:6,junk"),
            ("FEE_POLICY", "per_fill"),
            ("POSITIONS_JSON", "/tmp/p.json"),
        ]))
        .unwrap();

        assert_eq!(config.spot_symbols, vec!["SOLUSDT", "BTCUSDT"]);
        assert_eq!(config.trade_amount, dec!(250.5));
        assert_eq!(config.precision.for_symbol("BTCUSDT"), 6);
        assert_eq!(config.precision.for_symbol("SOLUSDT"), 2);
        assert_eq!(config.fee_policy, FeePolicy::PerFill);
        assert_eq!(config.positions_json, PathBuf::from("/tmp/p.json"));
        assert_eq!(config.trades_csv, PathBuf::from("trades.csv"));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = ExecutorConfig::from_lookup(lookup(&[("TRADE_AMOUNT_USD", "  ")])).unwrap();
        assert_eq!(config.trade_amount, dec!(1000));
    }

    #[test]
    fn test_bad_values_rejected() {
        let result = ExecutorConfig::from_lookup(lookup(&[("TRADE_AMOUNT_USD", "lots")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "TRADE_AMOUNT_USD", .. })));

        let result = ExecutorConfig::from_lookup(lookup(&[("TRADE_AMOUNT_USD", "-5")]));
        assert!(matches!(result, Err(ConfigError::InvalidSizing { .. })));

        let result = ExecutorConfig::from_lookup(lookup(&[("SPOT_SYMBOLS", "BTCEUR")]));
        assert!(matches!(result, Err(ConfigError::InvalidSymbols { .. })));

        let result = ExecutorConfig::from_lookup(lookup(&[("FEE_POLICY", "sometimes")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "FEE_POLICY", .. })));
    }
}
