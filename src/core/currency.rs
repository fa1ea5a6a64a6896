//! Currency codes and fiat rate abstractions

use crate::core::error::RateError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Code → display name, as advertised by the fiat rate service.
pub type CurrencyList = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

impl CurrencyKind {
    /// Decimal places used when presenting an amount of this kind.
    pub fn display_places(&self) -> u32 {
        match self {
            CurrencyKind::Fiat => 2,
            CurrencyKind::Crypto => 8,
        }
    }
}

impl Display for CurrencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CurrencyKind::Fiat => "Fiat",
                CurrencyKind::Crypto => "Crypto",
            }
        )
    }
}

/// An upper-case currency code tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyCode {
    code: String,
    kind: CurrencyKind,
}

impl CurrencyCode {
    pub fn new(code: &str, kind: CurrencyKind) -> Self {
        Self {
            code: code.trim().to_uppercase(),
            kind,
        }
    }

    pub fn fiat(code: &str) -> Self {
        Self::new(code, CurrencyKind::Fiat)
    }

    pub fn crypto(code: &str) -> Self {
        Self::new(code, CurrencyKind::Crypto)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> CurrencyKind {
        self.kind
    }

    pub fn is_crypto(&self) -> bool {
        self.kind == CurrencyKind::Crypto
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoAsset {
    pub code: &'static str,
    /// Identifier used by the crypto price service.
    pub coin_id: &'static str,
    pub name: &'static str,
}

/// Crypto assets that can be quoted.
pub const CRYPTO_ASSETS: &[CryptoAsset] = &[CryptoAsset {
    code: "BTC",
    coin_id: "bitcoin",
    name: "Bitcoin",
}];

pub fn crypto_asset(code: &str) -> Option<&'static CryptoAsset> {
    CRYPTO_ASSETS
        .iter()
        .find(|asset| asset.code.eq_ignore_ascii_case(code.trim()))
}

/// Rates from one fiat base, dated by the upstream service.
#[derive(Debug, Clone, PartialEq)]
pub struct FiatRates {
    pub as_of: NaiveDate,
    pub rates: BTreeMap<String, Decimal>,
}

#[async_trait]
pub trait FiatRateProvider: Send + Sync {
    /// Currently advertised fiat currencies. Never fails: a degraded table is
    /// returned when the upstream list cannot be fetched.
    async fn list_currencies(&self) -> CurrencyList;

    async fn get_rates(
        &self,
        base: &CurrencyCode,
        targets: &[CurrencyCode],
    ) -> Result<FiatRates, RateError>;
}
