//! Navigator configuration

use crate::models::BetType;
use std::path::PathBuf;
use std::time::Duration;

/// JRA top page the navigation starts from
pub const TOP_URL: &str = "https://www.jra.go.jp/keiba/";

/// Navigator configuration
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Page the navigation starts from
    pub top_url: String,
    /// Run Chromium without a window
    pub headless: bool,
    /// Pause before each click in milliseconds
    pub click_delay_ms: u64,
    /// Budget for the whole capture in seconds
    pub timeout_secs: u64,
    /// Upper bound for a single page transition in milliseconds
    pub page_wait_ms: u64,
    /// Tabs that are not captured
    pub skip_bet_types: Vec<BetType>,
    /// Chromium binary; autodetected when unset
    pub chrome_path: Option<PathBuf>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            top_url: TOP_URL.to_string(),
            headless: true,
            click_delay_ms: 1000,
            timeout_secs: 60,
            page_wait_ms: 15_000,
            skip_bet_types: vec![BetType::Wakuren, BetType::Wide],
            chrome_path: None,
        }
    }
}

impl NavigatorConfig {
    /// Defaults overlaid with `KEIBA_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("KEIBA_TOP_URL") {
            config.top_url = url;
        }
        if let Some(v) = lookup("KEIBA_HEADLESS") {
            match v.trim().to_lowercase().as_str() {
                "0" | "false" | "no" => config.headless = false,
                "1" | "true" | "yes" => config.headless = true,
                other => tracing::warn!("Ignoring KEIBA_HEADLESS={}", other),
            }
        }
        if let Some(v) = lookup("KEIBA_CLICK_DELAY_MS") {
            match v.trim().parse() {
                Ok(ms) => config.click_delay_ms = ms,
                Err(_) => tracing::warn!("Ignoring KEIBA_CLICK_DELAY_MS={}", v),
            }
        }
        if let Some(v) = lookup("KEIBA_TIMEOUT_SECS") {
            match v.trim().parse() {
                Ok(secs) => config.timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring KEIBA_TIMEOUT_SECS={}", v),
            }
        }
        if let Some(v) = lookup("KEIBA_SKIP") {
            config.skip_bet_types = parse_bet_type_list(&v);
        }
        if let Some(path) = lookup("KEIBA_CHROME_PATH") {
            config.chrome_path = Some(PathBuf::from(path));
        }

        config
    }

    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn page_wait(&self) -> Duration {
        Duration::from_millis(self.page_wait_ms)
    }
}

/// Parse "wakuren,wide" into bet types, dropping unknown tags
pub fn parse_bet_type_list(list: &str) -> Vec<BetType> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<BetType>() {
            Ok(b) => Some(b),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        })
        .collect()
}
