use super::ui;
use crate::core::config::AppConfig;
use crate::core::error::ConversionError;
use crate::service::refresh_once;
use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

/// Fetches fresh rates once and converts `value` of `from` into `to`.
pub async fn run(config: &AppConfig, from: &str, to: &str, value: f64, as_json: bool) -> Result<()> {
    let from = from.trim().to_uppercase();
    let to = to.trim().to_uppercase();

    // Reject bad amounts before paying for a fetch cycle
    if !value.is_finite() || value <= 0.0 {
        return Err(ConversionError::InvalidAmount(value).into());
    }

    let pb = ui::new_spinner("Fetching rates...");
    let (engine, report) = refresh_once(config).await?;
    pb.finish_and_clear();

    if report.failures > 0 {
        warn!(
            failures = report.failures,
            "Some sources failed, rates are based on the remaining ones"
        );
    }

    let result = engine.convert(&from, &to, value)?;
    info!(%from, %to, value, result, "Conversion done");

    if as_json {
        println!("{}", json!({ "result": result }));
    } else {
        println!(
            "{} {} = {} {}",
            ui::format_amount(value),
            from,
            ui::style_text(&ui::format_amount(result), ui::StyleType::TotalValue),
            ui::style_text(&to, ui::StyleType::TotalLabel)
        );
    }
    Ok(())
}
