//! The balance ledger: who holds how much of what.

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;

use crate::rates::{self, RateSnapshot};

/// Currency balances with a single serialized mutation point. Every stored
/// value is kept at or above zero; currencies without an entry count as zero.
pub struct BalanceLedger {
    inner: Mutex<HashMap<String, f64>>,
}

impl BalanceLedger {
    pub fn new(initial: HashMap<String, f64>) -> Self {
        Self {
            inner: Mutex::new(sanitize(initial)),
        }
    }

    /// A snapshot copy of all balances.
    pub fn balances(&self) -> HashMap<String, f64> {
        self.inner.lock().clone()
    }

    pub fn balance_of(&self, code: &str) -> f64 {
        self.inner.lock().get(code).copied().unwrap_or(0.0)
    }

    /// Whether an exchange request is well-formed and covered by the current
    /// sell balance. Advisory only; `perform_exchange` re-checks at commit.
    pub fn can_exchange(&self, amount: f64, sell: &str, buy: &str) -> bool {
        if amount <= 0.0 {
            return false;
        }
        if sell == buy {
            return false;
        }
        amount <= self.balance_of(sell)
    }

    /// Converts and commits an exchange, or refuses without touching anything.
    ///
    /// The sufficiency check runs against the balance as it is at commit time,
    /// under the same lock as the write, so concurrent exchanges cannot
    /// interleave or observe partial state.
    pub fn perform_exchange(
        &self,
        amount: f64,
        sell: &str,
        buy: &str,
        snapshot: &RateSnapshot,
    ) -> bool {
        let Some(received) = rates::convert(amount, sell, buy, snapshot) else {
            return false;
        };

        let mut balances = self.inner.lock();
        let new_sell = balances.get(sell).copied().unwrap_or(0.0) - amount;
        if new_sell < 0.0 {
            return false;
        }

        // max() only soaks up float underflow at the zero boundary
        balances.insert(sell.to_string(), new_sell.max(0.0));
        let new_buy = balances.get(buy).copied().unwrap_or(0.0) + received;
        balances.insert(buy.to_string(), new_buy.max(0.0));

        info!(
            amount,
            sell, buy, received, "Exchange committed"
        );
        true
    }

    /// Replaces all balances wholesale, clamping each value to zero or above.
    pub fn replace(&self, balances: HashMap<String, f64>) {
        *self.inner.lock() = sanitize(balances);
    }
}

fn sanitize(balances: HashMap<String, f64>) -> HashMap<String, f64> {
    balances
        .into_iter()
        .map(|(code, value)| (code, value.max(0.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(entries: &[(&str, f64)]) -> BalanceLedger {
        BalanceLedger::new(
            entries
                .iter()
                .map(|(code, value)| (code.to_string(), *value))
                .collect(),
        )
    }

    fn snapshot(base: &str, quotes: &[(&str, f64)]) -> RateSnapshot {
        RateSnapshot {
            base: base.to_string(),
            quotes: quotes
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
            fetched_at_millis: 0,
        }
    }

    #[test]
    fn test_can_exchange_rules() {
        let ledger = ledger(&[("EUR", 100.0)]);

        assert!(!ledger.can_exchange(0.0, "EUR", "USD"));
        assert!(!ledger.can_exchange(-5.0, "EUR", "USD"));
        assert!(!ledger.can_exchange(10.0, "EUR", "EUR"));
        assert!(!ledger.can_exchange(150.0, "EUR", "USD"));
        assert!(ledger.can_exchange(50.0, "EUR", "USD"));
        assert!(ledger.can_exchange(100.0, "EUR", "USD"));
        // absent currency counts as zero
        assert!(!ledger.can_exchange(1.0, "USD", "EUR"));
    }

    #[test]
    fn test_successful_exchange() {
        let ledger = ledger(&[("EUR", 100.0), ("USD", 0.0)]);
        let snap = snapshot("EUR", &[("USD", 1.5)]);

        assert!(ledger.perform_exchange(10.0, "EUR", "USD", &snap));

        let balances = ledger.balances();
        assert_eq!(balances.get("EUR"), Some(&90.0));
        assert_eq!(balances.get("USD"), Some(&15.0));
    }

    #[test]
    fn test_exchange_into_absent_currency() {
        let ledger = ledger(&[("EUR", 100.0)]);
        let snap = snapshot("EUR", &[("JPY", 160.0)]);

        assert!(ledger.perform_exchange(25.0, "EUR", "JPY", &snap));
        assert_eq!(ledger.balance_of("JPY"), 4000.0);
        assert_eq!(ledger.balance_of("EUR"), 75.0);
    }

    #[test]
    fn test_insufficient_funds_leaves_ledger_untouched() {
        let ledger = ledger(&[("EUR", 5.0), ("USD", 0.0)]);
        let snap = snapshot("EUR", &[("USD", 1.2)]);

        assert!(!ledger.perform_exchange(10.0, "EUR", "USD", &snap));

        let balances = ledger.balances();
        assert_eq!(balances.get("EUR"), Some(&5.0));
        assert_eq!(balances.get("USD"), Some(&0.0));
    }

    #[test]
    fn test_missing_rate_leaves_ledger_untouched() {
        let ledger = ledger(&[("EUR", 100.0)]);
        let snap = snapshot("EUR", &[("USD", 1.2)]);

        assert!(!ledger.perform_exchange(10.0, "EUR", "CHF", &snap));
        assert_eq!(ledger.balance_of("EUR"), 100.0);
        assert_eq!(ledger.balance_of("CHF"), 0.0);
    }

    #[test]
    fn test_full_balance_drains_to_zero() {
        let ledger = ledger(&[("EUR", 100.0)]);
        let snap = snapshot("EUR", &[("USD", 1.1)]);

        assert!(ledger.perform_exchange(100.0, "EUR", "USD", &snap));
        assert_eq!(ledger.balance_of("EUR"), 0.0);
        assert_eq!(ledger.balance_of("USD"), 110.0);
    }

    #[test]
    fn test_balances_stay_non_negative_across_sequences() {
        let ledger = ledger(&[("EUR", 50.0)]);
        let snap = snapshot("EUR", &[("USD", 1.5), ("JPY", 160.0)]);

        // mix of succeeding and failing requests
        let requests = [
            (20.0, "EUR", "USD"),
            (100.0, "EUR", "JPY"),
            (30.0, "EUR", "JPY"),
            (45.0, "USD", "EUR"),
            (10.0, "USD", "JPY"),
            (9999.0, "JPY", "USD"),
        ];
        for (amount, sell, buy) in requests {
            ledger.perform_exchange(amount, sell, buy, &snap);
        }

        for (code, value) in ledger.balances() {
            assert!(value >= 0.0, "{code} went negative: {value}");
        }
    }

    #[test]
    fn test_replace_clamps_negative_values() {
        let ledger = ledger(&[("EUR", 10.0)]);
        ledger.replace(
            [("EUR".to_string(), -3.0), ("USD".to_string(), 7.0)]
                .into_iter()
                .collect(),
        );

        assert_eq!(ledger.balance_of("EUR"), 0.0);
        assert_eq!(ledger.balance_of("USD"), 7.0);
    }

    #[test]
    fn test_new_clamps_negative_values() {
        let ledger = ledger(&[("EUR", -1.0)]);
        assert_eq!(ledger.balance_of("EUR"), 0.0);
    }
}
