use anyhow::Result;
use console::style;

use super::ui;
use crate::controller::{ControllerState, ExchangeController, format_amount};

/// Follows controller state until Ctrl-C, printing a line per change.
pub async fn run(controller: ExchangeController) -> Result<()> {
    controller.start();
    let mut rx = controller.subscribe();

    println!(
        "{} (Ctrl-C to quit)\n",
        ui::style_text("Watching balances and rates", ui::StyleType::Title)
    );
    print_state(&rx.borrow_and_update().clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                print_state(&rx.borrow_and_update().clone());
            }
        }
    }

    controller.stop();
    println!("\nStopped.");
    Ok(())
}

fn print_state(state: &ControllerState) {
    let mut codes: Vec<&String> = state.balances.keys().collect();
    codes.sort();
    let balances = codes
        .iter()
        .map(|code| format!("{code} {}", format_amount(state.balances[*code])))
        .collect::<Vec<_>>()
        .join("  |  ");

    let status = if let Some(error) = &state.error {
        ui::style_text(error, ui::StyleType::Error)
    } else if state.show_network_dialog {
        ui::style_text("no network connection", ui::StyleType::Error)
    } else if state.is_loading {
        ui::style_text("fetching rates...", ui::StyleType::Subtle)
    } else {
        format!(
            "{} quotes against {}",
            state.rates.len(),
            style(&state.rates_base).bold()
        )
    };

    println!("{balances}  [{status}]");
}
