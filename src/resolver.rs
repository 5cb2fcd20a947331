// 5.0: fill resolver. turns a venue response of unknown shape into fills.
// the response is an untyped json tree; no venue schema is assumed.
// 5.1 node search, 5.2 field extraction, 5.3 order id, 5.4 quote fallback.

use crate::precision::PrecisionTable;
use crate::types::{decimal_from_value, Fill, OrderIntent, OrderSizing};
use crate::venue::QuoteSource;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use tracing::{debug, warn};

// alias lists are in priority order. first usable alias wins.
pub const PRICE_KEYS: [&str; 3] = ["price", "execPrice", "avgPrice"];
pub const NOTIONAL_KEY: &str = "filledNotional";
pub const QTY_KEYS: [&str; 5] = ["qty", "execQty", "filledQty", "orderQty", "cumExecQty"];
const FEE_KEYS: [&str; 5] = ["execFee", "fee", "cumExecFee", "tradingFee", "commission"];
const FEE_CURRENCY_KEYS: [&str; 3] = ["feeCurrency", "feeCoin", "commissionAsset"];
const FILL_ORDER_ID_KEYS: [&str; 3] = ["orderId", "order_id", "orderLinkId"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSource {
    // execution detail was in the response
    Reported,
    // inferred from a quote and the order sizing
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Fills {
        fills: Vec<Fill>,
        source: FillSource,
        order_id: Option<String>,
    },
    /// No price could be found, not even from a quote. Nothing may be applied.
    Unresolved { order_id: Option<String> },
}

impl Resolution {
    pub fn fills(&self) -> &[Fill] {
        match self {
            Resolution::Fills { fills, .. } => fills,
            Resolution::Unresolved { .. } => &[],
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            Resolution::Fills { order_id, .. } | Resolution::Unresolved { order_id } => {
                order_id.as_deref()
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Fills { .. })
    }
}

/// Resolves fills for one placed order.
#[derive(Debug, Clone, Copy)]
pub struct FillResolver<'a> {
    precision: &'a PrecisionTable,
}

impl<'a> FillResolver<'a> {
    pub fn new(precision: &'a PrecisionTable) -> Self {
        Self { precision }
    }

    pub fn resolve(
        &self,
        response: &Value,
        intent: &OrderIntent,
        quotes: &dyn QuoteSource,
    ) -> Resolution {
        let order_id = resolve_order_id(response);
        let fills = extract_fills(response);

        if !fills.is_empty() {
            debug!(symbol = %intent.symbol, count = fills.len(), "fills reported by venue");
            let fills = fills
                .into_iter()
                .map(|f| {
                    if f.order_id.is_some() {
                        f
                    } else {
                        f.with_order_id(order_id.clone())
                    }
                })
                .collect();
            return Resolution::Fills {
                fills,
                source: FillSource::Reported,
                order_id,
            };
        }

        self.fallback(intent, quotes, order_id)
    }

    // 5.4: no usable fill node. price from hint or quote, qty from the sizing.
    fn fallback(
        &self,
        intent: &OrderIntent,
        quotes: &dyn QuoteSource,
        order_id: Option<String>,
    ) -> Resolution {
        let price = intent
            .price_hint
            .filter(|p| *p > Decimal::ZERO)
            .or_else(|| match quotes.best_price(&intent.symbol, intent.side) {
                Ok(p) if p > Decimal::ZERO => Some(p),
                Ok(p) => {
                    warn!(symbol = %intent.symbol, price = %p, "quote returned non-positive price");
                    None
                }
                Err(e) => {
                    warn!(symbol = %intent.symbol, error = %e, "quote lookup failed");
                    None
                }
            });

        let Some(price) = price else {
            return Resolution::Unresolved { order_id };
        };

        let raw_qty = match intent.sizing {
            OrderSizing::Notional(amount) => amount.checked_div(price).unwrap_or(Decimal::ZERO),
            OrderSizing::Base(qty) => qty,
        };
        let qty = self.precision.round(&intent.symbol, raw_qty);
        debug!(symbol = %intent.symbol, %price, %raw_qty, %qty, "derived fill from quote");

        Resolution::Fills {
            fills: vec![Fill::new(price, qty).with_order_id(order_id.clone())],
            source: FillSource::Derived,
            order_id,
        }
    }
}

// 5.1: every map that carries a price-like and a qty-like key is one candidate.
// candidates are not searched below.
pub fn find_fill_nodes(tree: &Value) -> Vec<&Map<String, Value>> {
    let mut found = Vec::new();
    collect_fill_nodes(tree, &mut found);
    found
}

fn collect_fill_nodes<'v>(value: &'v Value, found: &mut Vec<&'v Map<String, Value>>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_fill_nodes(item, found);
            }
        }
        Value::Object(map) => {
            if is_fill_node(map) {
                found.push(map);
            } else {
                for child in map.values() {
                    collect_fill_nodes(child, found);
                }
            }
        }
        _ => {}
    }
}

fn is_fill_node(map: &Map<String, Value>) -> bool {
    let has = |k: &str| map.keys().any(|key| key.eq_ignore_ascii_case(k));
    let priced = PRICE_KEYS.iter().any(|&k| has(k)) || has(NOTIONAL_KEY);
    priced && QTY_KEYS.iter().any(|&k| has(k))
}

pub fn extract_fills(tree: &Value) -> Vec<Fill> {
    find_fill_nodes(tree)
        .into_iter()
        .filter_map(extract_fill)
        .collect()
}

// 5.2: price/qty by alias priority. filledNotional / qty when no price alias is usable.
pub fn extract_fill(node: &Map<String, Value>) -> Option<Fill> {
    let qty = first_positive(node, &QTY_KEYS)?;
    let price = first_positive(node, &PRICE_KEYS).or_else(|| {
        let notional = get_ci(node, NOTIONAL_KEY)
            .and_then(decimal_from_value)
            .filter(|n| *n > Decimal::ZERO)?;
        notional.checked_div(qty)
    })?;

    let fee = FEE_KEYS
        .iter()
        .find_map(|k| get_ci(node, k).and_then(decimal_from_value))
        .or_else(|| {
            node.iter()
                .filter(|(k, _)| {
                    let k = k.to_ascii_lowercase();
                    k.contains("fee") && !k.contains("rate") && !k.contains("currency")
                })
                .find_map(|(_, v)| decimal_from_value(v))
        })
        .unwrap_or(Decimal::ZERO);

    let fee_currency = FEE_CURRENCY_KEYS
        .iter()
        .find_map(|k| get_ci(node, k).and_then(non_empty_str))
        .or_else(|| {
            node.iter()
                .filter(|(k, _)| {
                    let k = k.to_ascii_lowercase();
                    k.contains("feecurrency") || k.contains("feecoin")
                })
                .find_map(|(_, v)| non_empty_str(v))
        })
        .map(str::to_string);

    let order_id = FILL_ORDER_ID_KEYS
        .iter()
        .find_map(|k| get_ci(node, k).and_then(scalar_string))
        .or_else(|| {
            node.iter()
                .filter(|(k, _)| {
                    let k = k.to_ascii_lowercase();
                    k.contains("order") && k.contains("id")
                })
                .find_map(|(_, v)| scalar_string(v))
        });

    Some(Fill {
        price,
        qty,
        fee,
        fee_currency,
        order_id,
    })
}

// 5.3: order id from anywhere in the tree. breadth-first so shallow keys win ties.
// direct scalars beat nested objects; among scalars orderId > *order*id > id.
pub fn resolve_order_id(tree: &Value) -> Option<String> {
    let mut best: Option<(u8, String)> = None;
    let mut nested: Option<String> = None;
    let mut queue: VecDeque<&Value> = VecDeque::from([tree]);

    while let Some(value) = queue.pop_front() {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let lk = key.to_ascii_lowercase();
                    let rank = if lk == "orderid" {
                        Some(0)
                    } else if lk.contains("order") && lk.ends_with("id") {
                        Some(1)
                    } else if lk == "id" {
                        Some(2)
                    } else {
                        None
                    };

                    if let Some(rank) = rank {
                        if let Some(id) = scalar_string(child) {
                            if best.as_ref().map_or(true, |(r, _)| rank < *r) {
                                best = Some((rank, id));
                            }
                        }
                    }

                    if nested.is_none() && lk.contains("order") {
                        if let Value::Object(inner) = child {
                            nested = Some(nested_order_id(inner, child));
                        }
                    }

                    if child.is_object() || child.is_array() {
                        queue.push_back(child);
                    }
                }
            }
            Value::Array(items) => queue.extend(items.iter()),
            _ => {}
        }
    }

    best.map(|(_, id)| id).or(nested)
}

fn nested_order_id(inner: &Map<String, Value>, whole: &Value) -> String {
    get_ci(inner, "orderId")
        .or_else(|| get_ci(inner, "id"))
        .and_then(scalar_string)
        .unwrap_or_else(|| whole.to_string())
}

fn get_ci<'m>(map: &'m Map<String, Value>, key: &str) -> Option<&'m Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn first_positive(map: &Map<String, Value>, aliases: &[&str]) -> Option<Decimal> {
    aliases
        .iter()
        .filter_map(|k| get_ci(map, k).and_then(decimal_from_value))
        .find(|v| *v > Decimal::ZERO)
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use crate::venue::VenueError;
    use rust_decimal_macros::dec;
    use serde_json::json;

    struct FixedQuote(Option<Decimal>);

    impl QuoteSource for FixedQuote {
        fn best_price(&self, symbol: &str, _side: Side) -> Result<Decimal, VenueError> {
            self.0.ok_or_else(|| VenueError::NoQuote(symbol.to_string()))
        }
    }

    fn buy_intent(notional: Decimal) -> OrderIntent {
        OrderIntent::new("BTCUSDT", Side::Buy, OrderSizing::Notional(notional))
    }

    #[test]
    fn finds_fill_nodes_in_nested_lists() {
        let resp = json!({
            "retCode": 0,
            "result": {
                "list": [
                    {"execPrice": "100.5", "execQty": "0.2", "execFee": "0.01", "orderId": "A1"},
                    {"execPrice": "100.7", "execQty": "0.1", "execFee": "0.005", "orderId": "A1"}
                ]
            }
        });
        let fills = extract_fills(&resp);
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].price, dec!(100.5));
        assert_eq!(fills[0].qty, dec!(0.2));
        assert_eq!(fills[0].fee, dec!(0.01));
        assert_eq!(fills[1].order_id.as_deref(), Some("A1"));
    }

    #[test]
    fn node_is_not_reported_twice() {
        let resp = json!({"result": {"price": "10", "qty": "1"}, "data": null});
        assert_eq!(find_fill_nodes(&resp).len(), 1);
    }

    #[test]
    fn price_alias_priority() {
        let node = json!({"avgPrice": "99", "price": "101", "qty": "1"});
        let fill = extract_fill(node.as_object().unwrap()).unwrap();
        assert_eq!(fill.price, dec!(101));

        // market orders report an empty or zero price; the next alias is used
        let node = json!({"price": "", "avgPrice": "99", "qty": "1"});
        assert_eq!(extract_fill(node.as_object().unwrap()).unwrap().price, dec!(99));
        let node = json!({"price": "0", "avgPrice": "98", "qty": "1"});
        assert_eq!(extract_fill(node.as_object().unwrap()).unwrap().price, dec!(98));
    }

    #[test]
    fn keys_match_case_insensitively() {
        let node = json!({"EXECPRICE": 5, "ExecQty": 2});
        let fill = extract_fill(node.as_object().unwrap()).unwrap();
        assert_eq!(fill.price, dec!(5));
        assert_eq!(fill.qty, dec!(2));
    }

    #[test]
    fn price_from_notional_when_no_price_alias() {
        let node = json!({"filledNotional": "250", "filledQty": "2.5"});
        let fill = extract_fill(node.as_object().unwrap()).unwrap();
        assert_eq!(fill.price, dec!(100));
    }

    #[test]
    fn fee_and_currency_extraction() {
        let node = json!({"price": "10", "qty": "1", "feeRate": "0.001", "feeCurrency": "BTC", "cumExecFee": "0.0002"});
        let fill = extract_fill(node.as_object().unwrap()).unwrap();
        assert_eq!(fill.fee, dec!(0.0002));
        assert_eq!(fill.fee_currency.as_deref(), Some("BTC"));

        let node = json!({"price": "10", "qty": "1", "execFeeCurrency": "USDT"});
        let fill = extract_fill(node.as_object().unwrap()).unwrap();
        assert_eq!(fill.fee, Decimal::ZERO);
        assert_eq!(fill.fee_currency.as_deref(), Some("USDT"));
    }

    #[test]
    fn order_id_ranking() {
        assert_eq!(
            resolve_order_id(&json!({"id": "req-1", "result": {"orderId": "O-9"}})),
            Some("O-9".to_string())
        );
        assert_eq!(
            resolve_order_id(&json!({"result": {"orderLinkId": "link-1", "side": "Buy"}})),
            Some("link-1".to_string())
        );
        assert_eq!(
            resolve_order_id(&json!({"order": {"id": 77, "status": "new"}})),
            Some("77".to_string())
        );
        assert_eq!(resolve_order_id(&json!({"retMsg": "OK"})), None);
    }

    #[test]
    fn direct_id_beats_nested_order_object() {
        assert_eq!(
            resolve_order_id(&json!({"order": {"id": 1}, "result": {"orderId": "X"}})),
            Some("X".to_string())
        );
        assert_eq!(
            resolve_order_id(&json!({"order": {"status": "new"}, "orderLinkId": "L-2"})),
            Some("L-2".to_string())
        );
    }

    #[test]
    fn nested_order_without_id_is_serialized() {
        let resp = json!({"order": {"status": "new"}});
        assert_eq!(resolve_order_id(&resp), Some(r#"{"status":"new"}"#.to_string()));
    }

    #[test]
    fn reported_fills_inherit_resolved_order_id() {
        let table = PrecisionTable::default();
        let resp = json!({"result": {"orderId": "X1", "fills": [{"price": "10", "qty": "3"}]}});
        let res = FillResolver::new(&table).resolve(&resp, &buy_intent(dec!(30)), &FixedQuote(None));
        assert_eq!(res.fills().len(), 1);
        assert_eq!(res.fills()[0].order_id.as_deref(), Some("X1"));
        assert!(matches!(res, Resolution::Fills { source: FillSource::Reported, .. }));
    }

    #[test]
    fn fallback_divides_notional_and_rounds_down() {
        let mut table = PrecisionTable::new(3);
        table.set("BTCUSDT", 4);
        let resp = json!({"retCode": 0, "result": {"orderId": "B7"}});

        let res = FillResolver::new(&table).resolve(&resp, &buy_intent(dec!(1000)), &FixedQuote(Some(dec!(30000))));

        let fills = res.fills();
        assert_eq!(fills.len(), 1);
        // 1000 / 30000 = 0.03333.. -> 0.0333
        assert_eq!(fills[0].qty, dec!(0.0333));
        assert_eq!(fills[0].price, dec!(30000));
        assert_eq!(fills[0].order_id.as_deref(), Some("B7"));
        assert!(matches!(res, Resolution::Fills { source: FillSource::Derived, .. }));
    }

    #[test]
    fn fallback_prefers_price_hint() {
        let table = PrecisionTable::default();
        let intent = buy_intent(dec!(100)).with_price_hint(Some(dec!(40)));
        let res = FillResolver::new(&table).resolve(&json!({}), &intent, &FixedQuote(Some(dec!(50))));
        assert_eq!(res.fills()[0].price, dec!(40));
        assert_eq!(res.fills()[0].qty, dec!(2.5));
    }

    #[test]
    fn base_sizing_fallback_keeps_quantity() {
        let table = PrecisionTable::new(2);
        let intent = OrderIntent::new("ETHUSDT", Side::Sell, OrderSizing::Base(dec!(1.239)));
        let res = FillResolver::new(&table).resolve(&json!(null), &intent, &FixedQuote(Some(dec!(2000))));
        assert_eq!(res.fills()[0].qty, dec!(1.23));
        assert_eq!(res.fills()[0].price, dec!(2000));
    }

    #[test]
    fn no_price_anywhere_is_unresolved() {
        let table = PrecisionTable::default();
        let resp = json!({"result": {"orderId": "Z"}});
        let res = FillResolver::new(&table).resolve(&resp, &buy_intent(dec!(10)), &FixedQuote(None));
        assert!(!res.is_resolved());
        assert!(res.fills().is_empty());
        assert_eq!(res.order_id(), Some("Z"));

        let res = FillResolver::new(&table).resolve(&resp, &buy_intent(dec!(10)), &FixedQuote(Some(Decimal::ZERO)));
        assert!(!res.is_resolved());
    }

    #[test]
    fn node_without_usable_values_falls_back() {
        let table = PrecisionTable::default();
        let resp = json!({"result": {"price": "", "qty": "0"}});
        let res = FillResolver::new(&table).resolve(&resp, &buy_intent(dec!(10)), &FixedQuote(Some(dec!(5))));
        assert!(matches!(res, Resolution::Fills { source: FillSource::Derived, .. }));
        assert_eq!(res.fills()[0].qty, dec!(2));
    }
}
