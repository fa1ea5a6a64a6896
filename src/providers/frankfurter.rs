use crate::core::cache::Cache;
use crate::core::config::NetworkConfig;
use crate::core::{CurrencyCode, CurrencyList, FiatRateProvider, FiatRates, RateError};
use crate::providers::util::{build_client, get_json};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const SERVICE: &str = "Frankfurter";

const CURRENCY_LIST_KEY: &str = "fiat-currency-list";
const CURRENCY_LIST_TTL_SECS: i64 = 3600;
/// The fallback table is kept briefly so one request does not wait on the
/// same unreachable endpoint several times.
const FALLBACK_LIST_TTL_SECS: i64 = 60;
const RATES_TTL_SECS: i64 = 300;

/// Offered when the currency list endpoint is unreachable.
const FALLBACK_CURRENCIES: &[(&str, &str)] = &[
    ("USD", "United States Dollar"),
    ("EUR", "Euro"),
    ("GBP", "British Pound"),
    ("JPY", "Japanese Yen"),
    ("AUD", "Australian Dollar"),
    ("CAD", "Canadian Dollar"),
    ("CHF", "Swiss Franc"),
    ("CNY", "Chinese Renminbi Yuan"),
];

pub fn fallback_currencies() -> CurrencyList {
    FALLBACK_CURRENCIES
        .iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    date: NaiveDate,
    rates: BTreeMap<String, Decimal>,
}

/// Fiat currencies and fiat→fiat rates from the Frankfurter API.
///
/// Rates are cached per base currency with the full table the service
/// returns; callers asking for different targets of the same base share one
/// upstream request.
pub struct FrankfurterProvider {
    base_url: String,
    client: reqwest::Client,
    network: NetworkConfig,
    currencies: Arc<Cache<String, CurrencyList>>,
    rates: Arc<Cache<String, FiatRates>>,
}

impl FrankfurterProvider {
    pub fn new(
        base_url: &str,
        network: &NetworkConfig,
        currencies: Arc<Cache<String, CurrencyList>>,
        rates: Arc<Cache<String, FiatRates>>,
    ) -> Result<Self> {
        let client = build_client(network).context("Failed to build Frankfurter HTTP client")?;
        Ok(FrankfurterProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            network: network.clone(),
            currencies,
            rates,
        })
    }

    async fn fetch_currencies(&self) -> Result<CurrencyList, RateError> {
        let url = format!("{}/currencies", self.base_url);
        let list: CurrencyList = get_json(&self.client, &url, &self.network, SERVICE).await?;
        if list.is_empty() {
            return Err(RateError::upstream(SERVICE, "Empty currency list"));
        }
        Ok(list)
    }

    async fn fetch_latest(&self, base: &str) -> Result<FiatRates, RateError> {
        let url = format!("{}/latest?base={}", self.base_url, base);
        let data: LatestResponse = get_json(&self.client, &url, &self.network, SERVICE).await?;

        if let Some((code, rate)) = data.rates.iter().find(|(_, rate)| **rate <= Decimal::ZERO) {
            return Err(RateError::upstream(
                SERVICE,
                format!("Non-positive rate {rate} for {base}/{code}"),
            ));
        }

        debug!(
            "Fetched {} rates for {} as of {}",
            data.rates.len(),
            base,
            data.date
        );
        Ok(FiatRates {
            as_of: data.date,
            rates: data.rates,
        })
    }
}

#[async_trait]
impl FiatRateProvider for FrankfurterProvider {
    async fn list_currencies(&self) -> CurrencyList {
        let result = self
            .currencies
            .get_or_try_fetch(
                CURRENCY_LIST_KEY.to_string(),
                Duration::seconds(CURRENCY_LIST_TTL_SECS),
                || self.fetch_currencies(),
            )
            .await;

        match result {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Failed to fetch currencies, using fallback list");
                let fallback = fallback_currencies();
                self.currencies
                    .put(
                        CURRENCY_LIST_KEY.to_string(),
                        fallback.clone(),
                        Duration::seconds(FALLBACK_LIST_TTL_SECS),
                    )
                    .await;
                fallback
            }
        }
    }

    #[instrument(
        name = "FrankfurterRates",
        skip(self, targets),
        fields(base = %base)
    )]
    async fn get_rates(
        &self,
        base: &CurrencyCode,
        targets: &[CurrencyCode],
    ) -> Result<FiatRates, RateError> {
        let known = self.list_currencies().await;
        for code in std::iter::once(base).chain(targets) {
            if code.is_crypto() || !known.contains_key(code.code()) {
                return Err(RateError::UnknownCurrency(code.to_string()));
            }
        }

        let all = self
            .rates
            .get_or_try_fetch(
                format!("fiat-rates:{}", base.code()),
                Duration::seconds(RATES_TTL_SECS),
                || self.fetch_latest(base.code()),
            )
            .await?;

        let rates = targets
            .iter()
            .filter_map(|target| {
                all.rates
                    .get(target.code())
                    .map(|rate| (target.code().to_string(), *rate))
            })
            .collect();

        Ok(FiatRates {
            as_of: all.as_of,
            rates,
        })
    }
}
