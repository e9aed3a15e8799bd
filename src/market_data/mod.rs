pub mod bar;
pub mod eastmoney;
pub mod resample;
pub mod source;
pub mod yahoo;

// Re-export the core data types for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar::{Bar, StockInfo};
pub use source::{fetch_with_retry, BarQuery, MarketDataSource, MarketRouter};
