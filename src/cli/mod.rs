pub mod convert;
pub mod currencies;
pub mod preferences;
pub mod setup;
pub mod ui;
