//! Property-based tests for the ledger and rounding math.
//!
//! These tests verify invariants hold under random fill sequences.

use proptest::prelude::*;
use rust_decimal::Decimal;
use spot_executor::*;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $0.01 to $100,000
}

fn qty_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 4)) // 0.0001 to 100
}

fn fee_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..500i64).prop_map(|x| Decimal::new(x, 2)) // $0 to $5
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn fill_strategy() -> impl Strategy<Value = (Side, Decimal, Decimal)> {
    (side_strategy(), price_strategy(), qty_strategy())
}

fn signed(side: Side, qty: Decimal) -> Decimal {
    match side {
        Side::Buy => qty,
        Side::Sell => -qty,
    }
}

proptest! {
    /// Longs and shorts never coexist, and every queued lot is positive.
    #[test]
    fn one_direction_invariant(fills in prop::collection::vec(fill_strategy(), 1..40)) {
        let mut ledger = InstrumentLedger::new();
        for (side, price, qty) in fills {
            ledger.apply(side, price, qty, Decimal::ZERO, FeePolicy::PerMatchedLot).unwrap();
            prop_assert!(ledger.is_consistent());
            prop_assert!(ledger.longs.iter().chain(ledger.shorts.iter()).all(|l| l.qty > Decimal::ZERO));
        }
    }

    /// Net open quantity equals bought minus sold.
    #[test]
    fn net_quantity_conserved(fills in prop::collection::vec(fill_strategy(), 1..40)) {
        let mut ledger = InstrumentLedger::new();
        let mut net = Decimal::ZERO;
        for (side, price, qty) in fills {
            let applied = ledger.apply(side, price, qty, Decimal::ZERO, FeePolicy::PerFill).unwrap();
            prop_assert_eq!(applied.closed_qty + applied.opened_qty, qty);
            net += signed(side, qty);
        }
        prop_assert_eq!(ledger.long_qty() - ledger.short_qty(), net);
    }

    /// Buying then selling the same quantity realizes exactly (exit - entry) * qty.
    #[test]
    fn round_trip_pnl_exact(
        entry in price_strategy(),
        exit in price_strategy(),
        qty in qty_strategy(),
    ) {
        let mut ledger = InstrumentLedger::new();
        ledger.apply(Side::Buy, entry, qty, Decimal::ZERO, FeePolicy::PerMatchedLot).unwrap();
        let applied = ledger.apply(Side::Sell, exit, qty, Decimal::ZERO, FeePolicy::PerMatchedLot).unwrap();

        prop_assert_eq!(applied.realized_delta, (exit - entry) * qty);
        prop_assert!(ledger.is_flat());
    }

    /// Realized total is the sum of per-fill deltas.
    #[test]
    fn realized_total_is_running_sum(
        fills in prop::collection::vec(fill_strategy(), 1..30),
        fee in fee_strategy(),
    ) {
        let mut ledger = InstrumentLedger::new();
        let mut sum = Decimal::ZERO;
        for (side, price, qty) in fills {
            let applied = ledger.apply(side, price, qty, fee, FeePolicy::PerMatchedLot).unwrap();
            sum += applied.realized_delta;
            prop_assert_eq!(applied.realized_total, sum);
        }
        prop_assert_eq!(ledger.realized_pnl_total, sum);
    }

    /// Fee policies agree when a fill closes at most one lot.
    #[test]
    fn fee_policies_agree_on_single_match(
        entry in price_strategy(),
        exit in price_strategy(),
        qty in qty_strategy(),
        fee in fee_strategy(),
    ) {
        let mut per_lot = InstrumentLedger::new();
        let mut per_fill = InstrumentLedger::new();
        per_lot.apply(Side::Buy, entry, qty, fee, FeePolicy::PerMatchedLot).unwrap();
        per_fill.apply(Side::Buy, entry, qty, fee, FeePolicy::PerFill).unwrap();

        let a = per_lot.apply(Side::Sell, exit, qty, fee, FeePolicy::PerMatchedLot).unwrap();
        let b = per_fill.apply(Side::Sell, exit, qty, fee, FeePolicy::PerFill).unwrap();
        prop_assert_eq!(a.realized_delta, b.realized_delta);
        prop_assert_eq!(a.realized_delta, (exit - entry) * qty - fee);
    }

    /// Fills at any representable price or size either apply or leave the ledger as it was.
    #[test]
    fn extreme_fills_never_panic(
        entry in any::<i64>(),
        exit in any::<i64>(),
        qty in 1i64..i64::MAX,
        scale in 0u32..4u32,
    ) {
        let mut ledger = InstrumentLedger::new();
        let big = |x: i64| Decimal::from(x).abs() * Decimal::new(1_000_000_000, 0);
        let first = ledger.apply(Side::Buy, big(entry), big(qty), Decimal::ZERO, FeePolicy::PerMatchedLot);
        prop_assert!(first.is_ok());

        let before = ledger.clone();
        match ledger.apply(Side::Sell, Decimal::new(exit, scale), big(qty), Decimal::ZERO, FeePolicy::PerMatchedLot) {
            Ok(applied) => prop_assert_eq!(ledger.realized_pnl_total, applied.realized_total),
            Err(LedgerError::Overflow { .. }) => prop_assert_eq!(&ledger, &before),
        }
    }

    /// Truncation never rounds up and loses less than one unit in the last place.
    #[test]
    fn round_down_bounds(
        raw in 0i64..1_000_000_000_000i64,
        scale in 0u32..12u32,
        precision in 0i64..10i64,
    ) {
        let value = Decimal::new(raw, scale);
        let rounded = round_down(value, precision);
        let unit = Decimal::new(1, precision as u32);
        prop_assert!(rounded <= value);
        prop_assert!(value - rounded < unit);
        prop_assert!(rounded.scale() <= precision as u32);
    }

    /// Saving then loading gives back the same ledger.
    #[test]
    fn save_load_idempotent(fills in prop::collection::vec(("[A-Z]{3}USDT", fill_strategy()), 1..20)) {
        let mut store = LedgerStore::new();
        for (symbol, (side, price, qty)) in &fills {
            store.apply_fill(symbol, *side, *price, *qty, Decimal::ZERO, FeePolicy::PerMatchedLot).unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let file = LedgerFile::new(dir.path().join("positions.json"));
        file.save(&store).unwrap();
        let loaded = file.load().unwrap();
        prop_assert_eq!(&loaded, &store);

        file.save(&loaded).unwrap();
        prop_assert_eq!(file.load().unwrap(), store);
    }
}
