use crate::core::cache::Cache;
use crate::core::config::NetworkConfig;
use crate::core::currency::{CryptoAsset, crypto_asset};
use crate::core::{CryptoPrice, CryptoPriceProvider, CurrencyCode, RateError};
use crate::providers::util::{build_client, get_json};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const SERVICE: &str = "CoinGecko";

const PRICE_TTL_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct SimplePrice {
    last_updated_at: Option<i64>,
    #[serde(flatten)]
    prices: HashMap<String, Decimal>,
}

/// Coin prices from the CoinGecko simple-price API.
pub struct CoinGeckoProvider {
    base_url: String,
    client: reqwest::Client,
    network: NetworkConfig,
    cache: Arc<Cache<String, CryptoPrice>>,
}

impl CoinGeckoProvider {
    pub fn new(
        base_url: &str,
        network: &NetworkConfig,
        cache: Arc<Cache<String, CryptoPrice>>,
    ) -> Result<Self> {
        let client = build_client(network).context("Failed to build CoinGecko HTTP client")?;
        Ok(CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            network: network.clone(),
            cache,
        })
    }

    async fn fetch_price(
        &self,
        asset: &CryptoAsset,
        vs_currency: &CurrencyCode,
    ) -> Result<CryptoPrice, RateError> {
        let vs_id = vs_currency.code().to_lowercase();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}&include_last_updated_at=true",
            self.base_url, asset.coin_id, vs_id
        );
        let data: HashMap<String, SimplePrice> =
            get_json(&self.client, &url, &self.network, SERVICE).await?;

        let entry = data.get(asset.coin_id).ok_or_else(|| {
            RateError::upstream(SERVICE, format!("No price data for {}", asset.coin_id))
        })?;

        let rate = entry
            .prices
            .get(&vs_id)
            .copied()
            .ok_or_else(|| RateError::UnknownCurrency(vs_currency.to_string()))?;
        if rate <= Decimal::ZERO {
            return Err(RateError::upstream(
                SERVICE,
                format!("Non-positive price {rate} for {}/{}", asset.code, vs_currency),
            ));
        }

        let as_of = entry
            .last_updated_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|updated| updated.date_naive())
            .unwrap_or_else(|| {
                debug!(
                    "No last_updated_at for {}, falling back to current date",
                    asset.coin_id
                );
                Utc::now().date_naive()
            });

        Ok(CryptoPrice { as_of, rate })
    }
}

#[async_trait]
impl CryptoPriceProvider for CoinGeckoProvider {
    #[instrument(
        name = "CoinGeckoPrice",
        skip(self),
        fields(coin = %coin, vs = %vs_currency)
    )]
    async fn get_price(
        &self,
        coin: &CurrencyCode,
        vs_currency: &CurrencyCode,
    ) -> Result<CryptoPrice, RateError> {
        if !coin.is_crypto() || vs_currency.is_crypto() {
            return Err(RateError::UnsupportedPair {
                base: coin.to_string(),
                target: vs_currency.to_string(),
            });
        }
        let asset =
            crypto_asset(coin.code()).ok_or_else(|| RateError::UnknownCurrency(coin.to_string()))?;

        let key = format!(
            "crypto-price:{}:{}",
            asset.coin_id,
            vs_currency.code().to_lowercase()
        );
        self.cache
            .get_or_try_fetch(key, Duration::seconds(PRICE_TTL_SECS), || {
                self.fetch_price(asset, vs_currency)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::core::clock::ManualClock;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BTC_USD_JSON: &str = r#"{"bitcoin": {"usd": 50000, "last_updated_at": 1704153600}}"#;

    fn provider(server: &MockServer, clock: Arc<ManualClock>) -> CoinGeckoProvider {
        CoinGeckoProvider::new(
            &server.uri(),
            &NetworkConfig::default(),
            Arc::new(Cache::with_clock(clock)),
        )
        .unwrap()
    }

    async fn mount_price(server: &MockServer, body: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "bitcoin"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_price_fetch() {
        let server = MockServer::start().await;
        mount_price(&server, BTC_USD_JSON, 1).await;
        let provider = provider(&server, Arc::new(ManualClock::default()));

        let price = provider
            .get_price(&CurrencyCode::crypto("BTC"), &CurrencyCode::fiat("USD"))
            .await
            .unwrap();

        assert_eq!(price.rate, dec!(50000));
        // 1704153600 is 2024-01-02T00:00:00Z
        assert_eq!(price.as_of, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[tokio::test]
    async fn test_fractional_price_is_exact() {
        let server = MockServer::start().await;
        mount_price(
            &server,
            r#"{"bitcoin": {"usd": 43251.17, "last_updated_at": 1704153600}}"#,
            1,
        )
        .await;
        let provider = provider(&server, Arc::new(ManualClock::default()));

        let price = provider
            .get_price(&CurrencyCode::crypto("BTC"), &CurrencyCode::fiat("USD"))
            .await
            .unwrap();
        assert_eq!(price.rate, dec!(43251.17));
    }

    #[tokio::test]
    async fn test_price_is_cached_until_ttl() {
        let server = MockServer::start().await;
        mount_price(&server, BTC_USD_JSON, 2).await;
        let clock = Arc::new(ManualClock::default());
        let provider = provider(&server, clock.clone());
        let btc = CurrencyCode::crypto("BTC");
        let usd = CurrencyCode::fiat("USD");

        let first = provider.get_price(&btc, &usd).await.unwrap();
        let second = provider.get_price(&btc, &usd).await.unwrap();
        assert_eq!(first, second);

        clock.advance(Duration::seconds(300));
        provider.get_price(&btc, &usd).await.unwrap();
    }

    #[tokio::test]
    async fn test_crypto_vs_crypto_is_unsupported() {
        let server = MockServer::start().await;
        mount_price(&server, BTC_USD_JSON, 0).await;
        let provider = provider(&server, Arc::new(ManualClock::default()));

        let err = provider
            .get_price(&CurrencyCode::crypto("BTC"), &CurrencyCode::crypto("BTC"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPair);

        let err = provider
            .get_price(&CurrencyCode::fiat("USD"), &CurrencyCode::fiat("EUR"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPair);
    }

    #[tokio::test]
    async fn test_coin_outside_allow_list_is_unknown() {
        let server = MockServer::start().await;
        mount_price(&server, BTC_USD_JSON, 0).await;
        let provider = provider(&server, Arc::new(ManualClock::default()));

        let err = provider
            .get_price(&CurrencyCode::crypto("DOGE"), &CurrencyCode::fiat("USD"))
            .await
            .unwrap_err();
        assert_eq!(err, RateError::UnknownCurrency("DOGE".to_string()));
    }

    #[tokio::test]
    async fn test_missing_vs_currency_is_unknown() {
        let server = MockServer::start().await;
        mount_price(&server, r#"{"bitcoin": {"last_updated_at": 1704153600}}"#, 1).await;
        let provider = provider(&server, Arc::new(ManualClock::default()));

        let err = provider
            .get_price(&CurrencyCode::crypto("BTC"), &CurrencyCode::fiat("USD"))
            .await
            .unwrap_err();
        assert_eq!(err, RateError::UnknownCurrency("USD".to_string()));
    }

    #[tokio::test]
    async fn test_missing_timestamp_uses_current_date() {
        let server = MockServer::start().await;
        mount_price(&server, r#"{"bitcoin": {"usd": 50000}}"#, 1).await;
        let provider = provider(&server, Arc::new(ManualClock::default()));

        let price = provider
            .get_price(&CurrencyCode::crypto("BTC"), &CurrencyCode::fiat("USD"))
            .await
            .unwrap();
        assert_eq!(price.as_of, Utc::now().date_naive());
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        let provider = provider(&server, Arc::new(ManualClock::default()));

        let err = provider
            .get_price(&CurrencyCode::crypto("BTC"), &CurrencyCode::fiat("USD"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "CoinGecko unavailable: HTTP error: 429 Too Many Requests"
        );
    }
}
