//! Crypto pricing abstractions

use crate::core::currency::CurrencyCode;
use crate::core::error::RateError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Price of one coin in a fiat currency.
#[derive(Debug, Clone, PartialEq)]
pub struct CryptoPrice {
    pub as_of: NaiveDate,
    pub rate: Decimal,
}

#[async_trait]
pub trait CryptoPriceProvider: Send + Sync {
    async fn get_price(
        &self,
        coin: &CurrencyCode,
        vs_currency: &CurrencyCode,
    ) -> Result<CryptoPrice, RateError>;
}
