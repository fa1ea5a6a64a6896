use super::preferences::{PreferenceStore, UserPreferences};
use super::ui;
use crate::ConvertRequest;
use crate::core::currency::crypto_asset;
use crate::core::quote::round_for_display;
use crate::core::{CurrencyCode, CurrencyKind};
use crate::providers::{coingecko, frankfurter};
use crate::resolver::{RateResolver, Resolution};
use anyhow::Result;
use comfy_table::Cell;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, warn};

pub async fn run(
    resolver: &RateResolver<'_>,
    store: &PreferenceStore,
    request: ConvertRequest,
) -> Result<()> {
    if request.amount < Decimal::ZERO {
        anyhow::bail!("Amount must be zero or positive, got {}", request.amount);
    }

    let supported: HashSet<String> = resolver
        .supported_currencies()
        .await
        .into_iter()
        .map(|c| c.code.code().to_string())
        .collect();

    let saved = store.load();
    let (source, targets) = pick_currencies(&saved, &request, &supported);
    if let Some(preferences) = preferences_to_save(&saved, &request, &supported) {
        if let Err(e) = store.save(&preferences) {
            warn!(error = %e, "Failed to save preferences");
        }
    }

    if targets.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "Please select at least one currency to convert to (--to CODE,...).",
                ui::StyleType::Info
            )
        );
        return Ok(());
    }

    if targets.contains(&source) {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Source currency ({source}) is in your selected currencies. \
                     It will show as 1:1 conversion."
                ),
                ui::StyleType::Warning
            )
        );
    }

    let conversions: Vec<String> = targets.iter().filter(|t| **t != source).cloned().collect();
    if conversions.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "All selected currencies are the same as the source currency. \
                 Please select different currencies to convert to.",
                ui::StyleType::Info
            )
        );
        return Ok(());
    }

    debug!(%source, targets = ?conversions, "Converting {}", request.amount);
    let spinner = ui::new_spinner("Fetching latest exchange rates...");
    let resolution = resolver
        .resolve_codes(&source, &conversions, request.amount)
        .await;
    spinner.finish_and_clear();

    println!(
        "\n{}",
        ui::style_text(
            &format!("{} {}", ui::format_amount(request.amount), source),
            ui::StyleType::Title
        )
    );
    println!(
        "{}",
        display_resolution(&source, request.amount, &targets, &resolution)
    );

    match caption(&resolution) {
        Some(caption) => println!("{}", ui::style_text(&caption, ui::StyleType::Subtle)),
        None => println!(
            "{}",
            ui::style_text(
                "Unable to fetch exchange rates. Please try again later.",
                ui::StyleType::Error
            )
        ),
    }

    Ok(())
}

fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Source and targets for this run. Explicit arguments win; saved
/// selections only keep codes that are still supported.
fn pick_currencies(
    saved: &UserPreferences,
    request: &ConvertRequest,
    supported: &HashSet<String>,
) -> (String, Vec<String>) {
    let source = request
        .from
        .as_deref()
        .map(normalize)
        .unwrap_or_else(|| normalize(&saved.source_currency));

    let mut seen = HashSet::new();
    let targets = if request.to.is_empty() {
        saved
            .selected_currencies
            .iter()
            .map(|c| normalize(c))
            .filter(|c| supported.contains(c))
            .filter(|c| seen.insert(c.clone()))
            .collect()
    } else {
        request
            .to
            .iter()
            .map(|c| normalize(c))
            .filter(|c| !c.is_empty())
            .filter(|c| seen.insert(c.clone()))
            .collect()
    };

    (source, targets)
}

/// Preferences changed by explicit arguments, if any. Only given values
/// are replaced; unsupported codes are never persisted and a `--to` with
/// no supported code keeps the previous selection.
fn preferences_to_save(
    saved: &UserPreferences,
    request: &ConvertRequest,
    supported: &HashSet<String>,
) -> Option<UserPreferences> {
    if request.from.is_none() && request.to.is_empty() {
        return None;
    }

    let source_currency = request
        .from
        .as_deref()
        .map(normalize)
        .filter(|code| supported.contains(code))
        .unwrap_or_else(|| saved.source_currency.clone());

    let mut seen = HashSet::new();
    let selected: Vec<String> = request
        .to
        .iter()
        .map(|c| normalize(c))
        .filter(|c| supported.contains(c))
        .filter(|c| seen.insert(c.clone()))
        .collect();
    let selected_currencies = if selected.is_empty() {
        saved.selected_currencies.clone()
    } else {
        selected
    };

    let preferences = UserPreferences {
        source_currency,
        selected_currencies,
    };
    (preferences != *saved).then_some(preferences)
}

fn kind_of(code: &str) -> CurrencyKind {
    if crypto_asset(code).is_some() {
        CurrencyKind::Crypto
    } else {
        CurrencyKind::Fiat
    }
}

/// One row per target in request order; the source shows as 1:1.
fn display_resolution(
    source: &str,
    amount: Decimal,
    targets: &[String],
    resolution: &Resolution,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Amount"),
        ui::header_cell("Rate"),
        ui::header_cell("As of"),
    ]);

    for target in targets {
        if target == source {
            let code = CurrencyCode::new(source, kind_of(source));
            table.add_row(vec![
                Cell::new(code.code()),
                ui::amount_cell(round_for_display(amount, code.kind().display_places())),
                Cell::new("1"),
                ui::subtle_cell("Same currency"),
            ]);
        } else if let Some(result) = resolution
            .results
            .iter()
            .find(|r| r.target.code() == target)
        {
            table.add_row(vec![
                Cell::new(result.target.code()),
                ui::amount_cell(result.display_amount),
                Cell::new(result.quote.rate.normalize().to_string()),
                Cell::new(result.quote.as_of.to_string()),
            ]);
        } else if let Some(error) = resolution.errors.get(target) {
            table.add_row(vec![
                ui::error_cell(target),
                ui::error_cell(&error.to_string()),
                ui::na_cell(),
                ui::na_cell(),
            ]);
        }
    }

    table.to_string()
}

/// "as of" date and the services that supplied the successful rates.
fn caption(resolution: &Resolution) -> Option<String> {
    let as_of = resolution.as_of()?;

    let mut sources = Vec::new();
    let uses = |crypto: bool| {
        resolution
            .results
            .iter()
            .any(|r| (r.quote.base.is_crypto() || r.quote.target.is_crypto()) == crypto)
    };
    if uses(false) {
        sources.push(frankfurter::SERVICE);
    }
    if uses(true) {
        sources.push(coingecko::SERVICE);
    }

    Some(format!(
        "Exchange rates as of {as_of}. Rates from {}.",
        sources.join(" and ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConversionResult, RateError, RateQuote};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn supported() -> HashSet<String> {
        ["USD", "EUR", "GBP", "BTC"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn request(from: Option<&str>, to: &[&str]) -> ConvertRequest {
        ConvertRequest {
            amount: dec!(100),
            from: from.map(str::to_string),
            to: to.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn saved(source: &str, selected: &[&str]) -> UserPreferences {
        UserPreferences {
            source_currency: source.to_string(),
            selected_currencies: selected.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn result(
        base: CurrencyCode,
        target: CurrencyCode,
        rate: Decimal,
        day: u32,
    ) -> ConversionResult {
        let quote = RateQuote {
            base,
            target,
            rate,
            as_of: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
        };
        ConversionResult::new(dec!(100), quote).unwrap()
    }

    #[test]
    fn test_saved_selection_is_used_and_filtered() {
        let (source, targets) = pick_currencies(
            &saved("EUR", &["gbp", "XYZ", "BTC", "GBP"]),
            &request(None, &[]),
            &supported(),
        );
        assert_eq!(source, "EUR");
        assert_eq!(targets, vec!["GBP".to_string(), "BTC".to_string()]);
    }

    #[test]
    fn test_explicit_arguments_replace_saved_selection() {
        let (source, targets) = pick_currencies(
            &saved("EUR", &["GBP"]),
            &request(Some(" usd "), &["eur", "", "XYZ", "EUR"]),
            &supported(),
        );
        assert_eq!(source, "USD");
        // Unknown codes are still converted so they can be reported
        assert_eq!(targets, vec!["EUR".to_string(), "XYZ".to_string()]);
    }

    #[test]
    fn test_unsupported_codes_are_not_saved() {
        let previous = saved("EUR", &["GBP"]);

        let preferences =
            preferences_to_save(&previous, &request(Some("ABC"), &["btc", "XYZ"]), &supported());
        assert_eq!(preferences, Some(saved("EUR", &["BTC"])));

        let preferences =
            preferences_to_save(&previous, &request(Some("usd"), &["BTC", "XYZ"]), &supported());
        assert_eq!(preferences, Some(saved("USD", &["BTC"])));
    }

    #[test]
    fn test_saved_selection_kept_without_arguments() {
        // Codes missing from a degraded currency list must survive the run
        let previous = saved("USD", &["SEK", "NOK", "EUR", "BTC"]);
        assert_eq!(
            preferences_to_save(&previous, &request(None, &[]), &supported()),
            None
        );

        let (_, targets) = pick_currencies(&previous, &request(None, &[]), &supported());
        assert_eq!(targets, vec!["EUR".to_string(), "BTC".to_string()]);
    }

    #[test]
    fn test_only_unknown_targets_keep_saved_selection() {
        let previous = saved("USD", &["GBP", "BTC"]);

        assert_eq!(
            preferences_to_save(&previous, &request(None, &["XYZ", "ABC"]), &supported()),
            None
        );
        assert_eq!(
            preferences_to_save(&previous, &request(Some("EUR"), &["XYZ"]), &supported()),
            Some(saved("EUR", &["GBP", "BTC"]))
        );
    }

    #[test]
    fn test_table_lists_results_errors_and_source() {
        let mut resolution = Resolution::default();
        resolution.results.push(result(
            CurrencyCode::fiat("USD"),
            CurrencyCode::fiat("EUR"),
            dec!(0.92),
            2,
        ));
        resolution.errors.insert(
            "GBP".to_string(),
            RateError::upstream("Frankfurter", "HTTP error: 503"),
        );
        let targets: Vec<String> = ["EUR", "USD", "GBP"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        let table = display_resolution("USD", dec!(1234.5), &targets, &resolution);
        assert!(table.contains("92.00"));
        assert!(table.contains("0.92"));
        assert!(table.contains("2024-01-02"));
        assert!(table.contains("1,234.50"));
        assert!(table.contains("Same currency"));
        assert!(table.contains("Frankfurter unavailable: HTTP error: 503"));
    }

    #[test]
    fn test_caption_names_sources_and_latest_date() {
        let mut resolution = Resolution::default();
        assert!(caption(&resolution).is_none());

        resolution.results.push(result(
            CurrencyCode::fiat("USD"),
            CurrencyCode::fiat("EUR"),
            dec!(0.92),
            2,
        ));
        assert_eq!(
            caption(&resolution).unwrap(),
            "Exchange rates as of 2024-01-02. Rates from Frankfurter."
        );

        resolution.results.push(result(
            CurrencyCode::fiat("USD"),
            CurrencyCode::crypto("BTC"),
            dec!(0.00002),
            3,
        ));
        assert_eq!(
            caption(&resolution).unwrap(),
            "Exchange rates as of 2024-01-03. Rates from Frankfurter and CoinGecko."
        );
    }
}
