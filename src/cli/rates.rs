use anyhow::{Result, anyhow};
use comfy_table::Cell;

use super::ui;
use crate::source::RatesSource;

/// Fetches the rate table once and prints it.
pub async fn run(source: &dyn RatesSource) -> Result<()> {
    let resp = source
        .fetch_rates()
        .await
        .map_err(|e| anyhow!("Could not fetch rates: {e}"))?;

    let mut codes: Vec<&String> = resp.rates.keys().collect();
    codes.sort();

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Rate (1 {})", resp.base)),
    ]);
    for code in codes {
        table.add_row(vec![
            Cell::new(code),
            ui::amount_cell(resp.rates[code]),
        ]);
    }

    println!(
        "Exchange rates for {} on {}\n",
        ui::style_text(&resp.base, ui::StyleType::Title),
        resp.date
    );
    println!("{table}");

    Ok(())
}
