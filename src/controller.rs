//! Orchestration between the rates feed, the ledger, and the presentation
//! layer.
//!
//! The controller owns the canonical ledger and rate store and publishes
//! immutable [`ControllerState`] snapshots through a watch channel. All of its
//! operations are synchronous; the only background work is the rate poller and
//! the connectivity watcher started by [`ExchangeController::start`].

use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::AppConfig;
use crate::connectivity::ConnectivityObserver;
use crate::ledger::BalanceLedger;
use crate::poller::{FetchObserver, PollerHandle, RatePoller};
use crate::rates::{self, RateSnapshot, RateStore};
use crate::source::{FetchError, RatesSource};

/// What the presentation layer sees. A derived snapshot; the ledger and the
/// rate store stay canonical.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub balances: HashMap<String, f64>,
    pub sell_currency: String,
    pub buy_currency: String,
    pub input_amount: String,
    pub rates_base: String,
    pub rates: HashMap<String, f64>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_updated_millis: Option<i64>,
    pub show_network_dialog: bool,
    pub network_available: bool,
}

struct Inner {
    ledger: BalanceLedger,
    store: Arc<RateStore>,
    connectivity: Arc<dyn ConnectivityObserver>,
    state: watch::Sender<ControllerState>,
    refresh: Arc<Notify>,
}

/// Binds user intents to the ledger and the rates feed.
pub struct ExchangeController {
    inner: Arc<Inner>,
    source: Arc<dyn RatesSource>,
    poll_interval: Duration,
    poller: Mutex<Option<PollerHandle>>,
    connectivity_task: Mutex<Option<JoinHandle<()>>>,
}

impl ExchangeController {
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn RatesSource>,
        connectivity: Arc<dyn ConnectivityObserver>,
    ) -> Self {
        let ledger = BalanceLedger::new(config.balances.clone());
        let store = Arc::new(RateStore::new(RateSnapshot::empty(&config.sell_currency)));

        let initial = ControllerState {
            balances: ledger.balances(),
            sell_currency: config.sell_currency.clone(),
            buy_currency: config.buy_currency.clone(),
            input_amount: String::new(),
            rates_base: config.sell_currency.clone(),
            rates: HashMap::new(),
            is_loading: false,
            error: None,
            last_updated_millis: None,
            show_network_dialog: false,
            network_available: connectivity.is_available(),
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                ledger,
                store,
                connectivity,
                state,
                refresh: Arc::new(Notify::new()),
            }),
            source,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poller: Mutex::new(None),
            connectivity_task: Mutex::new(None),
        }
    }

    /// Starts the rate poller and the connectivity watcher. A second call
    /// restarts both.
    pub fn start(&self) {
        self.stop();

        let poller = RatePoller::new(
            Arc::clone(&self.source),
            Arc::clone(&self.inner.store),
            Arc::new(StateSink(Arc::clone(&self.inner))) as Arc<dyn FetchObserver>,
            self.poll_interval,
            Arc::clone(&self.inner.refresh),
        );
        *self.poller.lock() = Some(poller.spawn());

        let inner = Arc::clone(&self.inner);
        // Subscribe before spawning so no transition can slip past in between
        let mut changes = inner.connectivity.observe_changes();
        *self.connectivity_task.lock() = Some(tokio::spawn(async move {
            while let Some(connected) = changes.next().await {
                inner.state.send_modify(|s| {
                    s.network_available = connected;
                    if !connected {
                        s.show_network_dialog = true;
                    }
                });
            }
        }));

        info!("Exchange controller started");
    }

    /// Cancels background work at its next suspension point. Idempotent;
    /// nothing mutates state after this returns.
    pub fn stop(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.stop();
        }
        if let Some(task) = self.connectivity_task.lock().take() {
            task.abort();
        }
    }

    /// A receiver of state snapshots; one value per published change.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.inner.state.subscribe()
    }

    /// The current state snapshot.
    pub fn state(&self) -> ControllerState {
        self.inner.state.borrow().clone()
    }

    pub fn set_sell_currency(&self, code: &str) {
        let code = code.to_string();
        self.inner.state.send_modify(|s| s.sell_currency = code);
    }

    pub fn set_buy_currency(&self, code: &str) {
        let code = code.to_string();
        self.inner.state.send_modify(|s| s.buy_currency = code);
    }

    /// Accepts raw text input: `,` becomes `.`, anything that is not a digit
    /// or a dot is dropped. The result may still fail to parse; that is
    /// checked at point of use.
    pub fn set_input_amount(&self, raw: &str) {
        let sanitized: String = raw
            .replace(',', ".")
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        self.inner.state.send_modify(|s| s.input_amount = sanitized);
    }

    pub fn swap_currencies(&self) {
        self.inner.state.send_modify(|s| {
            std::mem::swap(&mut s.sell_currency, &mut s.buy_currency);
        });
    }

    /// Every 3-letter code seen in balances, quotes, or as the rates base,
    /// sorted and deduplicated.
    pub fn available_currencies(&self) -> Vec<String> {
        let state = self.state();
        let mut set: BTreeSet<String> = state.balances.keys().cloned().collect();
        set.extend(state.rates.keys().cloned());
        set.insert(state.rates_base);
        set.into_iter().filter(|code| code.len() == 3).collect()
    }

    /// Display form of one balance, e.g. `EUR 1,000.00`. Absent currencies
    /// show as zero.
    pub fn formatted_balance(&self, code: &str) -> String {
        let amount = self.inner.ledger.balance_of(code);
        format!("{code} {}", format_amount(amount))
    }

    /// What the current input would buy at the current rates. `None` when the
    /// input does not parse or a rate is missing.
    pub fn compute_quote(&self) -> Option<f64> {
        let state = self.state();
        let amount: f64 = state.input_amount.parse().ok()?;
        rates::convert(
            amount,
            &state.sell_currency,
            &state.buy_currency,
            &self.inner.store.get(),
        )
    }

    pub fn can_exchange(&self) -> bool {
        let state = self.state();
        let Ok(amount) = state.input_amount.parse::<f64>() else {
            return false;
        };
        if amount <= 0.0 {
            return false;
        }
        self.inner
            .ledger
            .can_exchange(amount, &state.sell_currency, &state.buy_currency)
    }

    /// Commits the exchange described by the current selection and input.
    /// Refused outright (with the connectivity dialog raised) when the
    /// network is known to be down. Returns whether the ledger changed.
    pub fn perform_exchange(&self) -> bool {
        if !self.inner.connectivity.is_available() || !self.state().network_available {
            self.inner
                .state
                .send_modify(|s| s.show_network_dialog = true);
            return false;
        }

        let state = self.state();
        let Ok(amount) = state.input_amount.parse::<f64>() else {
            return false;
        };
        if amount <= 0.0 {
            return false;
        }

        let snapshot = self.inner.store.get();
        let ok = self.inner.ledger.perform_exchange(
            amount,
            &state.sell_currency,
            &state.buy_currency,
            &snapshot,
        );
        if ok {
            let balances = self.inner.ledger.balances();
            self.inner.state.send_modify(|s| {
                s.balances = balances;
                s.input_amount.clear();
            });
        }
        ok
    }

    pub fn dismiss_network_dialog(&self) {
        self.inner
            .state
            .send_modify(|s| s.show_network_dialog = false);
    }

    /// Clears the dialog and fetches right away if the network is back;
    /// otherwise keeps the dialog up.
    pub fn retry_network_operation(&self) {
        if self.inner.connectivity.is_available() {
            self.inner
                .state
                .send_modify(|s| s.show_network_dialog = false);
            self.refresh_now();
        } else {
            self.inner
                .state
                .send_modify(|s| s.show_network_dialog = true);
        }
    }

    /// Asks the poller for an immediate extra fetch.
    pub fn refresh_now(&self) {
        self.inner.refresh.notify_one();
    }
}

/// Routes fetch outcomes into controller state.
struct StateSink(Arc<Inner>);

impl FetchObserver for StateSink {
    fn fetch_started(&self) {
        self.0.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    fn fetch_succeeded(&self, snapshot: &RateSnapshot) {
        let snapshot = snapshot.clone();
        self.0.state.send_modify(|s| {
            s.rates_base = snapshot.base;
            s.rates = snapshot.quotes;
            s.last_updated_millis = Some(snapshot.fetched_at_millis);
            s.is_loading = false;
            s.error = None;
        });
    }

    fn fetch_failed(&self, error: &FetchError) {
        // A known-offline transport failure raises the dialog instead of
        // echoing a technical message
        if error.is_transport() && !self.0.connectivity.is_available() {
            self.0.state.send_modify(|s| {
                s.is_loading = false;
                s.error = None;
                s.show_network_dialog = true;
            });
        } else {
            let message = error.to_string();
            self.0.state.send_modify(|s| {
                s.is_loading = false;
                s.error = Some(message);
            });
        }
    }
}

/// Formats an amount with thousands separators and two decimals, e.g.
/// `1234567.891` -> `1,234,567.89`.
pub fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let rounded = format!("{:.2}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').expect("two decimals");

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}
