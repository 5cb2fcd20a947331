// 6.2: wallet balance extraction from untyped balance replies.
// account-level totals first, then the coin's own entry anywhere in the tree.

use crate::types::decimal_from_value;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

const ACCOUNT_TOTAL_KEYS: [&str; 3] = [
    "totalAvailableBalance",
    "totalWalletBalance",
    "totalMarginBalance",
];

const COIN_BALANCE_KEYS: [&str; 8] = [
    "availableBalance",
    "available",
    "availableToWithdraw",
    "walletBalance",
    "equity",
    "balance",
    "totalBalance",
    "usdValue",
];

// account totals live on `result` or on the first account in `result.list`
pub fn account_total(tree: &Value) -> Option<Decimal> {
    let result = tree.get("result").unwrap_or(tree);
    let from_map = |map: &Map<String, Value>| {
        ACCOUNT_TOTAL_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(decimal_from_value))
    };

    result
        .as_object()
        .and_then(from_map)
        .or_else(|| {
            result
                .get("list")
                .and_then(Value::as_array)
                .and_then(|list| list.first())
                .and_then(Value::as_object)
                .and_then(from_map)
        })
}

/// Balance of one coin: the first node tagged with that coin (`coin` or `currency`)
/// that carries a parsable balance field. Zero entries don't stop the search.
pub fn coin_balance(tree: &Value, coin: &str) -> Option<Decimal> {
    match tree {
        Value::Object(map) => {
            if tagged_with(map, coin) {
                let found = COIN_BALANCE_KEYS
                    .iter()
                    .find_map(|k| map.get(*k).and_then(decimal_from_value));
                if let Some(amount) = found.filter(|a| !a.is_zero()) {
                    return Some(amount);
                }
            }
            map.values().find_map(|v| coin_balance(v, coin))
        }
        Value::Array(items) => items.iter().find_map(|v| coin_balance(v, coin)),
        _ => None,
    }
}

fn tagged_with(map: &Map<String, Value>, coin: &str) -> bool {
    ["coin", "currency"].iter().any(|k| {
        map.get(*k)
            .and_then(Value::as_str)
            .is_some_and(|c| c.eq_ignore_ascii_case(coin))
    })
}

// quote coin: account totals win. base coins: only the coin entry counts.
pub fn quote_balance(tree: &Value, quote_coin: &str) -> Decimal {
    account_total(tree)
        .or_else(|| coin_balance(tree, quote_coin))
        .unwrap_or(Decimal::ZERO)
}

pub fn base_balance(tree: &Value, base_coin: &str) -> Decimal {
    coin_balance(tree, base_coin).unwrap_or(Decimal::ZERO)
}
