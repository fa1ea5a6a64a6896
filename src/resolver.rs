//! Turns (source, targets, amount) into converted amounts, choosing the fiat
//! or crypto client for every pair and isolating failures per target.

use crate::core::currency::{CRYPTO_ASSETS, CurrencyKind, CurrencyList, crypto_asset};
use crate::core::{
    ConversionResult, CryptoPriceProvider, CurrencyCode, FiatRateProvider, RateError, RateQuote,
};
use chrono::NaiveDate;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, instrument};

/// Outcome of one conversion request. Every target other than the source
/// ends up in exactly one of `results` or `errors`.
#[derive(Debug, Default)]
pub struct Resolution {
    /// In the order the targets were requested.
    pub results: Vec<ConversionResult>,
    pub errors: BTreeMap<String, RateError>,
}

impl Resolution {
    /// Most recent upstream date among the successful quotes.
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.results.iter().map(|r| r.quote.as_of).max()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupportedCurrency {
    pub code: CurrencyCode,
    pub name: String,
}

pub struct RateResolver<'a> {
    fiat: &'a dyn FiatRateProvider,
    crypto: &'a dyn CryptoPriceProvider,
}

impl<'a> RateResolver<'a> {
    pub fn new(fiat: &'a dyn FiatRateProvider, crypto: &'a dyn CryptoPriceProvider) -> Self {
        Self { fiat, crypto }
    }

    /// Fiat currencies currently advertised plus the crypto allow-list,
    /// sorted by code.
    pub async fn supported_currencies(&self) -> Vec<SupportedCurrency> {
        let mut currencies: Vec<SupportedCurrency> = self
            .fiat
            .list_currencies()
            .await
            .into_iter()
            .filter(|(code, _)| crypto_asset(code).is_none())
            .map(|(code, name)| SupportedCurrency {
                code: CurrencyCode::fiat(&code),
                name,
            })
            .collect();
        currencies.extend(CRYPTO_ASSETS.iter().map(|asset| SupportedCurrency {
            code: CurrencyCode::crypto(asset.code),
            name: asset.name.to_string(),
        }));
        currencies.sort_by(|a, b| a.code.code().cmp(b.code.code()));
        currencies
    }

    /// Tags a raw code with its kind.
    pub async fn classify(&self, code: &str) -> Result<CurrencyCode, RateError> {
        let known = self.fiat.list_currencies().await;
        classify_with(&known, code)
    }

    /// Classifies raw codes and resolves them. Codes that cannot be
    /// classified are reported as `UnknownCurrency`; an unknown source fails
    /// every target.
    pub async fn resolve_codes(
        &self,
        source: &str,
        targets: &[String],
        amount: Decimal,
    ) -> Resolution {
        let known = self.fiat.list_currencies().await;

        let source = match classify_with(&known, source) {
            Ok(code) => code,
            Err(e) => {
                let source = source.trim().to_uppercase();
                let errors = targets
                    .iter()
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| *t != source)
                    .map(|t| (t, e.clone()))
                    .collect();
                return Resolution {
                    results: Vec::new(),
                    errors,
                };
            }
        };

        let mut classified = Vec::with_capacity(targets.len());
        let mut unknown = BTreeMap::new();
        for target in targets {
            match classify_with(&known, target) {
                Ok(code) => classified.push(code),
                Err(e) => {
                    unknown.insert(target.trim().to_uppercase(), e);
                }
            }
        }

        let mut resolution = self.resolve(&source, &classified, amount).await;
        resolution.errors.extend(unknown);
        resolution
    }

    #[instrument(name = "Resolve", skip(self, targets), fields(source = %source))]
    pub async fn resolve(
        &self,
        source: &CurrencyCode,
        targets: &[CurrencyCode],
        amount: Decimal,
    ) -> Resolution {
        let mut seen = HashSet::new();
        let targets: Vec<&CurrencyCode> = targets
            .iter()
            .filter(|t| t.code() != source.code())
            .filter(|t| seen.insert(t.code()))
            .collect();

        let mut quotes: HashMap<String, Result<RateQuote, RateError>> = HashMap::new();

        // Fiat codes the rate service does not advertise fail on their own
        // instead of failing the whole batch.
        let mut candidates = Vec::with_capacity(targets.len());
        if targets.iter().any(|t| t.kind() == CurrencyKind::Fiat) {
            let known = self.fiat.list_currencies().await;
            for target in targets.iter().copied() {
                if target.kind() == CurrencyKind::Fiat && !known.contains_key(target.code()) {
                    quotes.insert(
                        target.code().to_string(),
                        Err(RateError::UnknownCurrency(target.to_string())),
                    );
                } else {
                    candidates.push(target);
                }
            }
        } else {
            candidates.extend(targets.iter().copied());
        }

        let source_is_fiat = source.kind() == CurrencyKind::Fiat;
        let (batched, individual): (Vec<&CurrencyCode>, Vec<&CurrencyCode>) = candidates
            .into_iter()
            .partition(|t| source_is_fiat && t.kind() == CurrencyKind::Fiat);
        debug!(
            batched = batched.len(),
            individual = individual.len(),
            "Resolving targets"
        );

        let (batched_quotes, individual_quotes) = futures::join!(
            self.quote_fiat_batch(source, &batched),
            join_all(individual.iter().map(|target| async move {
                (target.code().to_string(), self.quote(source, target).await)
            })),
        );
        quotes.extend(batched_quotes);
        quotes.extend(individual_quotes);

        let mut resolution = Resolution::default();
        for target in targets {
            let Some(quote) = quotes.remove(target.code()) else {
                continue;
            };
            match quote.and_then(|q| ConversionResult::new(amount, q)) {
                Ok(result) => resolution.results.push(result),
                Err(e) => {
                    debug!(currency = %target, error = %e, "Target failed");
                    resolution.errors.insert(target.code().to_string(), e);
                }
            }
        }
        resolution
    }

    /// Quote for a single pair, dispatched on the kinds of both sides.
    pub async fn quote(
        &self,
        source: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Result<RateQuote, RateError> {
        match (source.kind(), target.kind()) {
            (CurrencyKind::Fiat, CurrencyKind::Fiat) => {
                let rates = self
                    .fiat
                    .get_rates(source, std::slice::from_ref(target))
                    .await?;
                fiat_quote(source, target, &rates.rates, rates.as_of)
            }
            (CurrencyKind::Crypto, CurrencyKind::Fiat) => {
                let price = self.crypto.get_price(source, target).await?;
                Ok(RateQuote {
                    base: source.clone(),
                    target: target.clone(),
                    rate: price.rate,
                    as_of: price.as_of,
                })
            }
            (CurrencyKind::Fiat, CurrencyKind::Crypto) => {
                let price = self.crypto.get_price(target, source).await?;
                RateQuote {
                    base: target.clone(),
                    target: source.clone(),
                    rate: price.rate,
                    as_of: price.as_of,
                }
                .inverted()
            }
            (CurrencyKind::Crypto, CurrencyKind::Crypto) => Err(RateError::UnsupportedPair {
                base: source.to_string(),
                target: target.to_string(),
            }),
        }
    }

    /// One rate request for all fiat targets of a fiat source.
    async fn quote_fiat_batch(
        &self,
        source: &CurrencyCode,
        targets: &[&CurrencyCode],
    ) -> Vec<(String, Result<RateQuote, RateError>)> {
        if targets.is_empty() {
            return Vec::new();
        }

        let owned: Vec<CurrencyCode> = targets.iter().map(|t| (*t).clone()).collect();
        match self.fiat.get_rates(source, &owned).await {
            Ok(rates) => targets
                .iter()
                .map(|target| {
                    (
                        target.code().to_string(),
                        fiat_quote(source, target, &rates.rates, rates.as_of),
                    )
                })
                .collect(),
            Err(e) => targets
                .iter()
                .map(|target| (target.code().to_string(), Err(e.clone())))
                .collect(),
        }
    }
}

fn classify_with(known: &CurrencyList, code: &str) -> Result<CurrencyCode, RateError> {
    let normalized = code.trim().to_uppercase();
    if crypto_asset(&normalized).is_some() {
        Ok(CurrencyCode::crypto(&normalized))
    } else if known.contains_key(&normalized) {
        Ok(CurrencyCode::fiat(&normalized))
    } else {
        Err(RateError::UnknownCurrency(normalized))
    }
}

fn fiat_quote(
    source: &CurrencyCode,
    target: &CurrencyCode,
    rates: &BTreeMap<String, Decimal>,
    as_of: NaiveDate,
) -> Result<RateQuote, RateError> {
    let rate = rates
        .get(target.code())
        .copied()
        .ok_or_else(|| RateError::UnknownCurrency(target.to_string()))?;
    Ok(RateQuote {
        base: source.clone(),
        target: target.clone(),
        rate,
        as_of,
    })
}
