//! Errors raised while resolving rates

use thiserror::Error;

/// Failure to produce a rate for one currency pair.
///
/// Clients fail fast with one of these; the resolver records them per
/// target instead of aborting the whole conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    /// Network failure, timeout, non-success status or unusable payload.
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: String, reason: String },

    /// Code is neither an advertised fiat currency nor an allowed crypto asset.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Unsupported currency pair: {base}/{target}")]
    UnsupportedPair { base: String, target: String },

    #[error("Converted amount out of range for {0}")]
    AmountOutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UpstreamUnavailable,
    UnknownCurrency,
    UnsupportedPair,
    AmountOutOfRange,
}

impl RateError {
    pub fn upstream(service: &str, reason: impl ToString) -> Self {
        RateError::UpstreamUnavailable {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RateError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            RateError::UnknownCurrency(_) => ErrorKind::UnknownCurrency,
            RateError::UnsupportedPair { .. } => ErrorKind::UnsupportedPair,
            RateError::AmountOutOfRange(_) => ErrorKind::AmountOutOfRange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RateError::upstream("Frankfurter", "HTTP error: 503 Service Unavailable");
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(
            err.to_string(),
            "Frankfurter unavailable: HTTP error: 503 Service Unavailable"
        );

        let err = RateError::UnsupportedPair {
            base: "BTC".to_string(),
            target: "ETH".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::UnsupportedPair);
        assert_eq!(err.to_string(), "Unsupported currency pair: BTC/ETH");
    }
}
