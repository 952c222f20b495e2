//! Odds capture and extraction for jra.go.jp
//!
//! The navigator drives a browser to the odds tabs of one race and keeps
//! the rendered HTML of each tab. The extractors turn those pages into
//! numeric mappings, dropping malformed rows instead of failing.
//!
//! # Example
//!
//! ```no_run
//! use keiba_odds::config::NavigatorConfig;
//! use keiba_odds::scraper::{extract_quinella_odds, ChromiumLauncher, Navigator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = NavigatorConfig::default();
//!     let navigator = Navigator::new(ChromiumLauncher::new(&config), config);
//!
//!     let snapshot = navigator.capture("202505041007").await?;
//!     let quinella = extract_quinella_odds(&snapshot);
//!     println!("Found {} combinations", quinella.odds.len());
//!
//!     Ok(())
//! }
//! ```

mod browser;
#[cfg(feature = "chromium")]
mod chromium;
mod combination;
mod navigator;
mod tanpuku;

pub use browser::{BrowserError, BrowserLauncher, BrowserSession, LinkQuery};
#[cfg(feature = "chromium")]
pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use combination::{
    extract_exacta_odds, extract_quinella_odds, extract_trifecta_odds, extract_trio_odds,
};
pub use navigator::{NavState, Navigator, BET_TAB_LIST};
pub use tanpuku::{extract_place_odds, extract_win_odds};

use crate::error::ScraperError;
use crate::models::{BetType, Diagnostic, DiagnosticKind, Extraction};
use scraper::{ElementRef, Selector};

/// Compile a CSS selector
pub(crate) fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::Selector(format!("{css}: {e}")))
}

/// Trimmed text content of an element
pub(crate) fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse an odds figure such as "1,234.5"
///
/// Scratched and not-yet-sold entries ("取消", "除外", "---") yield `None`,
/// as does anything that is not strictly positive.
pub fn parse_odds_text(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', "");
    let value = cleaned.parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Parse a horse number; zero is not a horse
pub fn parse_horse_number(text: &str) -> Option<u8> {
    text.trim().parse::<u8>().ok().filter(|&n| n > 0)
}

/// Zero-padded, comma-joined combination key: [1, 15] -> "01,15"
pub fn combination_key(horses: &[u8]) -> String {
    horses
        .iter()
        .map(|h| format!("{:02}", h))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of `combination_key`
pub fn parse_combination_key(key: &str) -> Option<Vec<u8>> {
    key.split(',').map(parse_horse_number).collect()
}

/// Accumulates a mapping and the diagnostics of one extraction run
pub(crate) struct Collector<T> {
    bet_type: BetType,
    odds: T,
    diagnostics: Vec<Diagnostic>,
}

impl<T: Default> Collector<T> {
    pub(crate) fn new(bet_type: BetType) -> Self {
        Self {
            bet_type,
            odds: T::default(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn odds_mut(&mut self) -> &mut T {
        &mut self.odds
    }

    pub(crate) fn skip(&mut self, kind: DiagnosticKind, context: impl Into<String>) {
        let diagnostic = Diagnostic {
            bet_type: self.bet_type,
            kind,
            context: context.into(),
        };
        tracing::warn!("Skipped: {}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn finish(self) -> Extraction<T> {
        Extraction {
            odds: self.odds,
            diagnostics: self.diagnostics,
        }
    }
}

/// Look up the page for `bet_type`, or produce the empty result for a
/// tab that was never captured
pub(crate) fn page_or_missing<'a, T: Default>(
    pages: &'a crate::models::OddsSnapshot,
    bet_type: BetType,
) -> Result<&'a str, Extraction<T>> {
    pages.get(bet_type).ok_or_else(|| {
        let available = pages
            .bet_types()
            .iter()
            .map(BetType::tag)
            .collect::<Vec<_>>()
            .join(", ");
        let diagnostic = Diagnostic {
            bet_type,
            kind: DiagnosticKind::MissingSnapshot,
            context: format!("no '{}' page captured (available: [{}])", bet_type, available),
        };
        tracing::warn!("{}", diagnostic);
        Extraction::empty(diagnostic)
    })
}

/// Turn a setup failure (bad selector or pattern) into an empty result
pub(crate) fn setup_failed<T: Default>(bet_type: BetType, err: ScraperError) -> Extraction<T> {
    let diagnostic = Diagnostic {
        bet_type,
        kind: DiagnosticKind::BadSelector,
        context: err.to_string(),
    };
    tracing::warn!("{}", diagnostic);
    Extraction::empty(diagnostic)
}
