//! Keiba Odds - real-time JRA odds capture
//!
//! This library provides:
//! - Browser navigation from the JRA top page to the odds tabs of one race
//! - Extraction of win, place, quinella, exacta, trio and trifecta odds
//! - Quinella axis selection
//!
//! # Example
//!
//! ```no_run
//! use keiba_odds::config::NavigatorConfig;
//! use keiba_odds::scraper::{ChromiumLauncher, Navigator};
//! use keiba_odds::fetch_race_odds;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = NavigatorConfig::from_env();
//!     let navigator = Navigator::new(ChromiumLauncher::new(&config), config);
//!
//!     let odds = fetch_race_odds(&navigator, "202505041007").await?;
//!     if let Some(axis) = odds.axis.axis {
//!         println!("Axis horse: {}", axis);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod odds;
pub mod race;
pub mod scraper;

// Re-export commonly used types
pub use config::NavigatorConfig;
pub use core::{format_pair, select_axis};
pub use error::{CaptureFailure, NavigationError, RaceIdError};
pub use models::{
    AxisRecommendation, BetType, Diagnostic, DiagnosticKind, Extraction, OddsSnapshot, Route,
};
pub use odds::{fetch_race_odds, RaceOdds};
pub use race::RaceId;
pub use scraper::Navigator;
