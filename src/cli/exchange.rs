use anyhow::{Result, bail};
use std::time::Duration;

use super::ui;
use crate::controller::{ExchangeController, format_amount};

/// Waits for a first rate snapshot, performs one exchange, prints the result.
pub async fn run(
    controller: ExchangeController,
    amount: f64,
    sell: &str,
    buy: &str,
) -> Result<()> {
    controller.start();

    let mut rx = controller.subscribe();
    let first = tokio::time::timeout(
        Duration::from_secs(30),
        rx.wait_for(|s| s.last_updated_millis.is_some() || s.error.is_some()),
    )
    .await;

    let outcome = match first {
        Ok(Ok(state)) => state.clone(),
        Ok(Err(_)) => {
            controller.stop();
            bail!("Controller state channel closed unexpectedly");
        }
        Err(_) => {
            controller.stop();
            bail!("Timed out waiting for exchange rates");
        }
    };
    if let Some(error) = outcome.error {
        controller.stop();
        bail!("Could not fetch rates: {error}");
    }

    controller.set_sell_currency(sell);
    controller.set_buy_currency(buy);
    controller.set_input_amount(&amount.to_string());

    let quote = controller.compute_quote();
    if !controller.can_exchange() {
        controller.stop();
        bail!(
            "Cannot exchange {} {sell} to {buy}: check the amount, the currencies, and the balance",
            format_amount(amount)
        );
    }

    let committed = controller.perform_exchange();
    let state = controller.state();
    controller.stop();

    if !committed {
        bail!("Exchange of {} {sell} to {buy} was refused", format_amount(amount));
    }

    if let Some(received) = quote {
        println!(
            "Exchanged {} {sell} for {} {buy}\n",
            format_amount(amount),
            ui::style_text(&format_amount(received), ui::StyleType::Value)
        );
    }
    println!("{}", ui::balances_table(&state.balances));

    Ok(())
}
