use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::Rng;

use crate::market::{Market, Movement, Snapshot};

/// Clonable handle to one market shared by every request handler.
///
/// All access goes through a single mutex. The guard is scoped to each call,
/// so it is never held across an `.await` in async callers.
pub struct SharedMarket<R = StdRng> {
    inner: Arc<Mutex<Market<R>>>,
}

impl<R> Clone for SharedMarket<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Rng> SharedMarket<R> {
    pub fn new(market: Market<R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(market)),
        }
    }

    // Mutations are single-entry writes, so a poisoned table is still consistent.
    fn lock(&self) -> MutexGuard<'_, Market<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_price(&self, symbol: &str) -> f64 {
        self.lock().get_price(symbol)
    }

    pub fn get_snapshot<I, S>(&self, symbols: I) -> Snapshot
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock().get_snapshot(symbols)
    }

    pub fn snapshot_all(&self) -> Snapshot {
        self.lock().snapshot_all()
    }

    pub fn simulate_movement(&self, symbol: &str) -> Movement {
        self.lock().simulate_movement(symbol)
    }

    pub fn update_prices(&self) {
        self.lock().update_prices()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.lock().symbols()
    }
}

impl Default for SharedMarket<StdRng> {
    fn default() -> Self {
        Self::new(Market::new())
    }
}
