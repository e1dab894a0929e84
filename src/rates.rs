//! Exchange rate snapshots and cross-rate conversion.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::source::RatesResponse;

/// A complete set of quotes against a single base currency, as observed at
/// one point in time. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub base: String,
    /// 1 unit of `base` expressed in each quoted currency. `base` itself is
    /// never a key.
    pub quotes: HashMap<String, f64>,
    pub fetched_at_millis: i64,
}

impl RateSnapshot {
    /// An empty snapshot for the given base, used before the first fetch.
    pub fn empty(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quotes: HashMap::new(),
            fetched_at_millis: 0,
        }
    }

    /// Builds a snapshot from an API response, stamped with the given receipt
    /// time. The base currency is stripped from the quote map.
    pub fn from_response(resp: RatesResponse, fetched_at_millis: i64) -> Self {
        let mut quotes = resp.rates;
        quotes.remove(&resp.base);
        Self {
            base: resp.base,
            quotes,
            fetched_at_millis,
        }
    }
}

/// Converts `amount` from one currency to another through the snapshot's base.
///
/// Returns `None` when either currency has no usable rate. A quote of exactly
/// zero on the `from` leg counts as unusable (it would divide by zero); a zero
/// quote on the `to` leg yields `0.0`, which is a valid result. Identical
/// currencies convert to themselves even on an empty snapshot.
pub fn convert(amount: f64, from: &str, to: &str, snapshot: &RateSnapshot) -> Option<f64> {
    if from == to {
        return Some(amount);
    }
    let in_base = to_base(amount, from, snapshot)?;
    from_base(in_base, to, snapshot)
}

fn to_base(value: f64, code: &str, snapshot: &RateSnapshot) -> Option<f64> {
    if code == snapshot.base {
        return Some(value);
    }
    match snapshot.quotes.get(code) {
        Some(&rate) if rate != 0.0 => Some(value / rate),
        _ => None,
    }
}

fn from_base(value: f64, code: &str, snapshot: &RateSnapshot) -> Option<f64> {
    if code == snapshot.base {
        return Some(value);
    }
    snapshot.quotes.get(code).map(|rate| value * rate)
}

/// Holds the latest snapshot. Written only by the rate poller; everyone else
/// reads clones.
pub struct RateStore {
    inner: RwLock<RateSnapshot>,
}

impl RateStore {
    pub fn new(initial: RateSnapshot) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub fn get(&self) -> RateSnapshot {
        self.inner.read().clone()
    }

    /// Replaces the snapshot wholesale. Later writes always win; quotes are
    /// never merged across fetches.
    pub fn replace(&self, snapshot: RateSnapshot) {
        *self.inner.write() = snapshot;
    }
}
