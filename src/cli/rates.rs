use super::ui;
use crate::core::config::AppConfig;
use crate::core::convert::ConversionEngine;
use crate::core::rates::{RateSnapshot, RateTable};
use crate::service::refresh_once;
use anyhow::Result;
use comfy_table::Cell;
use serde_json::{Map, Value, json};

fn crypto_table(snapshot: &RateSnapshot, engine: &ConversionEngine) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Price (USDT)"),
        ui::header_cell("Value (USD)"),
    ]);
    for (code, rate) in snapshot.crypto.iter() {
        table.add_row(vec![
            Cell::new(code),
            ui::rate_cell(rate.value()),
            ui::rate_cell(engine.rate_in_usd(code).ok()),
        ]);
    }
    table.to_string()
}

fn fiat_table(snapshot: &RateSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Value (USD)")]);
    for (code, rate) in snapshot.fiat.iter() {
        table.add_row(vec![Cell::new(code), ui::rate_cell(rate.value())]);
    }
    table.to_string()
}

/// Plain `code -> number` view with `-1` for unavailable rates.
fn legacy_map(table: &RateTable) -> Value {
    let map: Map<String, Value> = table
        .iter()
        .map(|(code, rate)| (code.clone(), json!(rate.legacy_value())))
        .collect();
    Value::Object(map)
}

pub fn snapshot_json(snapshot: &RateSnapshot) -> Value {
    json!({
        "generation": snapshot.generation,
        "updated_at": snapshot.updated_at.to_rfc3339(),
        "crypto": legacy_map(&snapshot.crypto),
        "fiat": legacy_map(&snapshot.fiat),
    })
}

/// Fetches fresh rates once and prints both tables.
pub async fn run(config: &AppConfig, as_json: bool) -> Result<()> {
    let pb = ui::new_spinner("Fetching rates...");
    let (engine, report) = refresh_once(config).await?;
    pb.finish_and_clear();

    let snapshot = engine.snapshot();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&snapshot_json(&snapshot))?);
        return Ok(());
    }

    println!("{}\n", ui::style_text("Crypto", ui::StyleType::Title));
    println!("{}\n", crypto_table(&snapshot, &engine));
    println!("{}\n", ui::style_text("Fiat", ui::StyleType::Title));
    println!("{}\n", fiat_table(&snapshot));
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Updated {} from {} crypto and {} fiat samples, {} source failures",
                snapshot.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.crypto_samples,
                report.fiat_samples,
                report.failures
            ),
            ui::StyleType::Subtle
        )
    );
    Ok(())
}
