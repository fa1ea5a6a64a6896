//! Core types and abstractions for rate resolution

pub mod cache;
pub mod clock;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod price;
pub mod quote;

// Re-export main types for cleaner imports
pub use currency::{CurrencyCode, CurrencyKind, CurrencyList, FiatRateProvider, FiatRates};
pub use error::{ErrorKind, RateError};
pub use price::{CryptoPrice, CryptoPriceProvider};
pub use quote::{ConversionResult, RateQuote};
