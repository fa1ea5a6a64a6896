pub mod coingecko;
pub mod frankfurter;
pub mod util;

pub use coingecko::CoinGeckoProvider;
pub use frankfurter::FrankfurterProvider;
