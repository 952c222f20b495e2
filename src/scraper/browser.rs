//! Browser abstraction used by the navigator
//!
//! `BrowserLauncher` opens a session; `BrowserSession` is one page that
//! the navigator drives step by step. Chromium is the production backend
//! (see `chromium.rs`); tests drive an in-memory site.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::error::NavigationError;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("no element matches {0}")]
    NoSuchElement(String),

    #[error("page transition did not finish within {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<BrowserError> for NavigationError {
    fn from(err: BrowserError) -> Self {
        NavigationError::Browser(err.to_string())
    }
}

/// A link located by its accessible name, like a `role=link` lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkQuery {
    pub name: String,
    /// Whole-text match instead of substring match
    pub exact: bool,
    /// CSS selector of the container to search within
    pub scope: Option<String>,
}

impl LinkQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exact: false,
            scope: None,
        }
    }

    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            exact: true,
            ..Self::new(name)
        }
    }

    pub fn within(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Accessible-name match: whitespace is collapsed; substring matches
    /// ignore case
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize_whitespace(text);
        let name = normalize_whitespace(&self.name);
        if self.exact {
            text == name
        } else {
            text.to_lowercase().contains(&name.to_lowercase())
        }
    }
}

pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Opens browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One browser page
///
/// Every method acts on the same page, so calls must not overlap.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load a URL and wait for the DOM
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Number of links matching the query on the current page
    async fn count_links(&mut self, query: &LinkQuery) -> Result<usize, BrowserError>;

    /// Pause for `delay`, then click the first matching link
    async fn click_link(&mut self, query: &LinkQuery, delay: Duration)
        -> Result<(), BrowserError>;

    /// Wait until the current document has been parsed
    async fn wait_for_dom_ready(&mut self) -> Result<(), BrowserError>;

    /// Texts of the `<a>` inside each `<li>` of the list matching `list_selector`
    async fn tab_labels(&mut self, list_selector: &str) -> Result<Vec<String>, BrowserError>;

    /// Click the link of the `index`-th tab of the list
    async fn click_tab(
        &mut self,
        list_selector: &str,
        index: usize,
        delay: Duration,
    ) -> Result<(), BrowserError>;

    /// Full rendered HTML of the current document
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Release the page and the browser behind it
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}
