use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{round2, FALLBACK_PRICE, MAX_UPDATE_SHOCK, MOVEMENT_STEP, SEED_PRICES};

/// Price of one symbol inside a [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
}

/// Requested symbols mapped to their current price, rounded to 2 decimals.
pub type Snapshot = BTreeMap<String, Quote>;

/// Outcome of a single simulated price change.
///
/// `new_price` is the rounded price now stored in the table; `step` is the raw
/// fractional change (`+0.01` or `-0.01`). Callers decide up/down from the
/// sign of `step`, never from the rounded price difference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub new_price: f64,
    pub step: f64,
}

impl Movement {
    pub fn is_up(&self) -> bool {
        self.step > 0.0
    }

    pub fn is_down(&self) -> bool {
        self.step < 0.0
    }
}

/// Symbol → price table with a pluggable random source.
pub struct Market<R = StdRng> {
    prices: BTreeMap<String, f64>,
    rng: R,
}

impl Market<StdRng> {
    /// Seeded price table with an entropy-backed generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Seeded price table whose movements are reproducible for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for Market<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Market<R> {
    pub fn with_rng(rng: R) -> Self {
        Self::with_prices(SEED_PRICES, rng)
    }

    /// Market starting from an arbitrary price table instead of the seed set.
    pub fn with_prices<I, S>(prices: I, rng: R) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            prices: prices
                .into_iter()
                .map(|(symbol, price)| (symbol.into(), price))
                .collect(),
            rng,
        }
    }

    /// Current price of `symbol`, or [`FALLBACK_PRICE`] if it has never been seen.
    pub fn get_price(&self, symbol: &str) -> f64 {
        self.prices.get(symbol).copied().unwrap_or(FALLBACK_PRICE)
    }

    pub fn get_snapshot<I, S>(&self, symbols: I) -> Snapshot
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        symbols
            .into_iter()
            .map(|symbol| {
                let symbol = symbol.as_ref();
                let price = round2(self.get_price(symbol));
                (symbol.to_string(), Quote { price })
            })
            .collect()
    }

    /// Snapshot of every symbol currently in the table.
    pub fn snapshot_all(&self) -> Snapshot {
        self.prices
            .iter()
            .map(|(symbol, price)| (symbol.clone(), Quote { price: round2(*price) }))
            .collect()
    }

    /// Move one symbol up or down by exactly 1% with equal probability.
    ///
    /// Unseen symbols start from the fallback price and are added to the table.
    pub fn simulate_movement(&mut self, symbol: &str) -> Movement {
        let price = self.get_price(symbol);
        let step = if self.rng.gen_bool(0.5) {
            MOVEMENT_STEP
        } else {
            -MOVEMENT_STEP
        };
        let new_price = round2(price * (1.0 + step));
        self.prices.insert(symbol.to_string(), new_price);

        tracing::debug!(symbol, price, new_price, step, "simulated movement");

        Movement { new_price, step }
    }

    /// Apply an independent uniform shock in [-2%, +2%] to every known symbol.
    pub fn update_prices(&mut self) {
        for price in self.prices.values_mut() {
            let shock = self.rng.gen_range(-MAX_UPDATE_SHOCK..=MAX_UPDATE_SHOCK);
            *price = round2(*price * (1.0 + shock));
        }

        tracing::debug!(symbols = self.prices.len(), "updated all prices");
    }

    /// Known symbols in ascending order.
    pub fn symbols(&self) -> Vec<String> {
        self.prices.keys().cloned().collect()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.prices.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn always_up() -> Market<StepRng> {
        Market::with_rng(StepRng::new(0, 0))
    }

    fn always_down() -> Market<StepRng> {
        Market::with_rng(StepRng::new(u64::MAX, 0))
    }

    #[test]
    fn test_seed_prices() {
        let market = Market::seeded(1);
        assert_eq!(market.len(), 8);
        assert_eq!(market.get_price("AAPL"), 180.0);
        assert_eq!(market.get_price("BTC"), 65000.0);
        assert_eq!(market.get_price("DOGE"), 0.15);
    }

    #[test]
    fn test_unknown_symbol_uses_fallback() {
        let market = Market::seeded(1);
        assert_eq!(market.get_price("ZZZ"), FALLBACK_PRICE);
        assert_eq!(market.get_price(""), FALLBACK_PRICE);
        assert_eq!(market.get_price("aapl"), FALLBACK_PRICE);
        // Reads never grow the table
        assert!(!market.contains("ZZZ"));
        assert_eq!(market.len(), 8);
    }

    #[test]
    fn test_snapshot_with_unknown_symbol() {
        let market = Market::with_prices([("AAPL", 180.0), ("BTC", 65000.0)], StepRng::new(0, 0));
        let snapshot = market.get_snapshot(["AAPL", "BTC", "ZZZ"]);

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot["AAPL"], Quote { price: 180.0 });
        assert_eq!(snapshot["BTC"], Quote { price: 65000.0 });
        assert_eq!(snapshot["ZZZ"], Quote { price: 100.0 });
    }

    #[test]
    fn test_snapshot_matches_rounded_price() {
        let mut market = Market::with_prices([("XYZ", 12.3456)], StepRng::new(0, 0));
        let snapshot = market.get_snapshot(["XYZ"]);
        assert_eq!(snapshot["XYZ"].price, round2(market.get_price("XYZ")));
        assert_eq!(snapshot["XYZ"].price, 12.35);

        market.update_prices();
        let snapshot = market.get_snapshot(vec!["XYZ".to_string()]);
        assert_eq!(snapshot["XYZ"].price, round2(market.get_price("XYZ")));
    }

    #[test]
    fn test_snapshot_ignores_order_and_empty_input() {
        let market = Market::seeded(7);
        let a = market.get_snapshot(["BTC", "AAPL", "TSLA"]);
        let b = market.get_snapshot(["TSLA", "BTC", "AAPL"]);
        assert_eq!(a, b);

        let empty: [&str; 0] = [];
        assert!(market.get_snapshot(empty).is_empty());
    }

    #[test]
    fn test_snapshot_serializes_as_price_objects() {
        let market = Market::seeded(1);
        let json = serde_json::to_value(market.get_snapshot(["AAPL"])).unwrap();
        assert_eq!(json, serde_json::json!({ "AAPL": { "price": 180.0 } }));
    }

    #[test]
    fn test_movement_up_from_seed_price() {
        let mut market = always_up();
        let movement = market.simulate_movement("AAPL");

        assert_eq!(movement.step, 0.01);
        assert!(movement.is_up());
        assert_eq!(movement.new_price, round2(180.0 * 1.01));
        assert_eq!(market.get_price("AAPL"), movement.new_price);
    }

    #[test]
    fn test_movement_down_from_seed_price() {
        let mut market = always_down();
        let movement = market.simulate_movement("AAPL");

        assert_eq!(movement.step, -0.01);
        assert!(movement.is_down());
        assert_eq!(movement.new_price, round2(180.0 * 0.99));
    }

    #[test]
    fn test_movement_compounds_from_stored_price() {
        let mut market = always_up();
        let first = market.simulate_movement("AAPL");
        let second = market.simulate_movement("AAPL");

        assert_eq!(second.new_price, round2(first.new_price * 1.01));
        assert_ne!(second.new_price, first.new_price);
    }

    #[test]
    fn test_movement_step_is_exactly_one_percent() {
        let mut market = Market::seeded(42);
        for _ in 0..100 {
            let before = market.get_price("AAPL");
            let movement = market.simulate_movement("AAPL");
            assert!(movement.step == 0.01 || movement.step == -0.01);
            assert_eq!(movement.new_price, round2(before * (1.0 + movement.step)));
        }
    }

    #[test]
    fn test_movement_only_touches_one_symbol() {
        let mut market = Market::seeded(3);
        let before = market.get_snapshot(market.symbols());
        market.simulate_movement("TSLA");
        let after = market.get_snapshot(market.symbols());

        for (symbol, quote) in &before {
            if symbol != "TSLA" {
                assert_eq!(after[symbol], *quote);
            }
        }
    }

    #[test]
    fn test_movement_adds_unknown_symbol_from_fallback() {
        let mut market = always_down();
        let movement = market.simulate_movement("NEW");

        assert_eq!(movement.new_price, 99.0);
        assert!(market.contains("NEW"));
        assert_eq!(market.get_price("NEW"), 99.0);
        assert_eq!(market.len(), 9);
    }

    #[test]
    fn test_movement_coin_flip_is_balanced() {
        let mut market = Market::seeded(2024);
        let ups = (0..10_000)
            .filter(|_| market.simulate_movement("BTC").is_up())
            .count();

        // ±6 standard deviations around 5000
        assert!((4_700..=5_300).contains(&ups), "ups = {ups}");
    }

    #[test]
    fn test_update_prices_bounded_and_no_new_symbols() {
        let mut market = Market::seeded(99);
        for _ in 0..50 {
            let before: Vec<(String, f64)> = market
                .symbols()
                .into_iter()
                .map(|s| {
                    let p = market.get_price(&s);
                    (s, p)
                })
                .collect();

            market.update_prices();

            assert_eq!(market.len(), before.len());
            for (symbol, old) in before {
                let new = market.get_price(&symbol);
                // 2% shock plus at most half a cent of rounding
                assert!(
                    (new - old).abs() <= old * MAX_UPDATE_SHOCK + 0.005 + 1e-9,
                    "{symbol}: {old} -> {new}"
                );
            }
        }
    }

    #[test]
    fn test_update_prices_leaves_unknown_symbols_alone() {
        let mut market = Market::seeded(5);
        market.update_prices();
        assert!(!market.contains("ZZZ"));
        assert_eq!(market.get_price("ZZZ"), FALLBACK_PRICE);
    }

    #[test]
    fn test_update_prices_on_empty_market() {
        let empty: [(&str, f64); 0] = [];
        let mut market = Market::with_prices(empty, StepRng::new(0, 1));
        market.update_prices();
        assert!(market.is_empty());
    }

    #[test]
    fn test_seeded_markets_are_reproducible() {
        let mut a = Market::seeded(11);
        let mut b = Market::seeded(11);
        for _ in 0..20 {
            assert_eq!(a.simulate_movement("ETH"), b.simulate_movement("ETH"));
        }
        a.update_prices();
        b.update_prices();
        assert_eq!(a.snapshot_all(), b.snapshot_all());
    }
}
