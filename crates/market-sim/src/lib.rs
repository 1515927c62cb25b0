//! In-memory market price simulator.
//!
//! A [`Market`] owns a symbol → price table seeded with a handful of equities
//! and cryptocurrencies. Lookups are total: any symbol the table has never
//! seen reads as [`FALLBACK_PRICE`]. Prices move either one symbol at a time
//! with a ±1% coin flip ([`Market::simulate_movement`]) or all at once with a
//! uniform ±2% shock ([`Market::update_prices`]).
//!
//! [`SharedMarket`] wraps a market in a single mutex so request handlers
//! running on a multi-threaded runtime observe and mutate one shared table.

pub mod market;
pub mod shared;

pub use market::{Market, Movement, Quote, Snapshot};
pub use shared::SharedMarket;

/// Price reported for any symbol not present in the table.
pub const FALLBACK_PRICE: f64 = 100.0;

/// Fractional step applied by a single simulated movement.
pub const MOVEMENT_STEP: f64 = 0.01;

/// Largest fractional shock applied by a global price update.
pub const MAX_UPDATE_SHOCK: f64 = 0.02;

/// Starting prices for every new market.
pub const SEED_PRICES: [(&str, f64); 8] = [
    ("AAPL", 180.0),
    ("TSLA", 250.0),
    ("INFY", 1600.0),
    ("TCS", 3700.0),
    ("RELI", 2900.0),
    ("BTC", 65000.0),
    ("ETH", 3500.0),
    ("DOGE", 0.15),
];

/// Round to 2 decimal places (half away from zero).
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Round to `places` decimal places (half away from zero).
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
