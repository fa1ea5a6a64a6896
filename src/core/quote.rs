use crate::core::currency::CurrencyCode;
use crate::core::error::RateError;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// A positive rate from `base` to `target`, dated by its upstream source.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub base: CurrencyCode,
    pub target: CurrencyCode,
    pub rate: Decimal,
    pub as_of: NaiveDate,
}

impl RateQuote {
    /// Quote in the opposite direction, using the exact reciprocal.
    pub fn inverted(&self) -> Result<RateQuote, RateError> {
        Ok(RateQuote {
            base: self.target.clone(),
            target: self.base.clone(),
            rate: reciprocal(self.rate, &self.base)?,
            as_of: self.as_of,
        })
    }
}

pub(crate) fn reciprocal(
    rate: Decimal,
    denominated_in: &CurrencyCode,
) -> Result<Decimal, RateError> {
    if rate <= Decimal::ZERO {
        return Err(RateError::AmountOutOfRange(denominated_in.to_string()));
    }
    Decimal::ONE
        .checked_div(rate)
        .ok_or_else(|| RateError::AmountOutOfRange(denominated_in.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub target: CurrencyCode,
    /// `amount * quote.rate`, unrounded.
    pub converted_amount: Decimal,
    /// Converted amount rounded to the target's display places, trailing
    /// zeros kept.
    pub display_amount: Decimal,
    pub quote: RateQuote,
}

impl ConversionResult {
    pub fn new(amount: Decimal, quote: RateQuote) -> Result<Self, RateError> {
        let converted_amount = amount
            .checked_mul(quote.rate)
            .ok_or_else(|| RateError::AmountOutOfRange(quote.target.to_string()))?;
        let display_amount =
            round_for_display(converted_amount, quote.target.kind().display_places());
        Ok(Self {
            target: quote.target.clone(),
            converted_amount,
            display_amount,
            quote,
        })
    }
}

/// Rounds half away from zero and pins the scale, so `0.002` at 8 places
/// renders as `0.00200000`.
pub fn round_for_display(value: Decimal, places: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    rounded
}
