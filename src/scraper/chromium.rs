//! Chromium backend using chromiumoxide.
//!
//! Clicks and lookups run as small scripts through `Page::evaluate`; link
//! matching itself happens in Rust via `LinkQuery::matches`.
//!
//! A scripted click returns before any navigation it triggers has started,
//! so every document is tagged with `window.__keiba_doc` before a click and
//! the click only completes once that tag is gone (a new document) or, for
//! tabs switched in place, once the clicked tab is marked active.

use super::browser::{BrowserError, BrowserLauncher, BrowserSession, LinkQuery};
use crate::config::NavigatorConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Visible links under the scope, in document order
const LINKS_JS: &str = r#"
const root = __SCOPE__ === null ? document : document.querySelector(__SCOPE__);
const links = root === null ? [] : Array.from(root.querySelectorAll('a[href], [role="link"]'))
    .filter(el => el.getClientRects().length > 0);
"#;

/// Tags the current document once and returns its tag
const DOC_TOKEN_JS: &str = r#"(() => {
    if (!window.__keiba_doc) {
        window.__keiba_doc = Date.now().toString(36) + Math.random().toString(36).slice(2);
    }
    return window.__keiba_doc;
})()"#;

const DOC_STATE_JS: &str = "(() => ({ token: window.__keiba_doc || null, active: false }))()";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the page looks like while a click is settling
#[derive(Debug, Deserialize)]
struct DocState {
    token: Option<String>,
    active: bool,
}

impl DocState {
    fn settled(&self, before: &str) -> bool {
        self.token.as_deref() != Some(before) || self.active
    }
}

/// Launches headless (or headed) Chromium
pub struct ChromiumLauncher {
    headless: bool,
    chrome_path: Option<PathBuf>,
    page_wait: Duration,
}

impl ChromiumLauncher {
    pub fn new(config: &NavigatorConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            page_wait: config.page_wait(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(BrowserError::Launch(format!("failed to open page: {e}")));
            }
        };

        tracing::debug!("Chromium launched (headless: {})", self.headless);

        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page: Some(page),
            handler_task,
            page_wait: self.page_wait,
        }))
    }
}

/// One Chromium page plus the browser process that owns it
///
/// Dropping the session aborts the CDP handler and the browser process is
/// killed with it, so cancelled captures do not leak Chromium.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    page_wait: Duration,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("page already closed".to_string()))
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, BrowserError> {
        let page = self.page()?;
        let result = tokio::time::timeout(self.page_wait, page.evaluate(script))
            .await
            .map_err(|_| BrowserError::Timeout(self.page_wait))?
            .map_err(|e| BrowserError::Protocol(format!("script failed: {e}")))?;

        result
            .into_value()
            .map_err(|e| BrowserError::Protocol(format!("unexpected script result: {e:?}")))
    }

    async fn link_texts(&self, scope: Option<&str>) -> Result<Vec<String>, BrowserError> {
        let script = format!(
            "(() => {{ {} return links.map(el => el.innerText || el.textContent || ''); }})()",
            links_prelude(scope)
        );
        self.eval(&script).await
    }

    /// Poll `script` (a `DocState`) until the click has taken effect
    ///
    /// Evaluation errors while the old document is torn down are expected
    /// and retried.
    async fn await_click(&self, before: &str, script: &str) -> Result<(), BrowserError> {
        let started = Instant::now();
        loop {
            match self.eval::<DocState>(script).await {
                Ok(state) if state.settled(before) => return Ok(()),
                Ok(_) => {}
                Err(e) => tracing::debug!("page not readable during navigation: {}", e),
            }
            if started.elapsed() >= self.page_wait {
                return Err(BrowserError::Timeout(self.page_wait));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn links_prelude(scope: Option<&str>) -> String {
    let scope = serde_json::to_string(&scope).unwrap_or_else(|_| "null".to_string());
    LINKS_JS.replace("__SCOPE__", &scope)
}

fn tab_items_js(list_selector: &str) -> String {
    let selector = serde_json::to_string(&format!("{list_selector} li"))
        .unwrap_or_else(|_| "''".to_string());
    format!("const items = Array.from(document.querySelectorAll({selector}));")
}

/// `DocState` where `active` tells whether the `index`-th tab is selected
fn tab_state_js(list_selector: &str, index: usize) -> String {
    format!(
        r#"(() => {{ {} const li = items[{index}];
    const active = !!li && (li.classList.contains('active') || li.classList.contains('current')
        || !!li.querySelector('a.active, a.current, a[aria-selected="true"], a[aria-current]'));
    return {{ token: window.__keiba_doc || null, active }}; }})()"#,
        tab_items_js(list_selector)
    )
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        match tokio::time::timeout(self.page_wait, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Protocol(format!("navigation to {url} failed: {e}"))),
            Err(_) => Err(BrowserError::Timeout(self.page_wait)),
        }
    }

    async fn count_links(&mut self, query: &LinkQuery) -> Result<usize, BrowserError> {
        let texts = self.link_texts(query.scope.as_deref()).await?;
        Ok(texts.iter().filter(|t| query.matches(t)).count())
    }

    async fn click_link(
        &mut self,
        query: &LinkQuery,
        delay: Duration,
    ) -> Result<(), BrowserError> {
        let texts = self.link_texts(query.scope.as_deref()).await?;
        let index = texts
            .iter()
            .position(|t| query.matches(t))
            .ok_or_else(|| BrowserError::NoSuchElement(format!("link {:?}", query.name)))?;

        tokio::time::sleep(delay).await;

        let before: String = self.eval(DOC_TOKEN_JS).await?;
        let script = format!(
            "(() => {{ {} const el = links[{index}]; if (!el) return false; el.click(); return true; }})()",
            links_prelude(query.scope.as_deref())
        );
        let clicked: bool = self.eval(&script).await?;
        if !clicked {
            return Err(BrowserError::NoSuchElement(format!("link {:?}", query.name)));
        }

        self.await_click(&before, DOC_STATE_JS).await
    }

    async fn wait_for_dom_ready(&mut self) -> Result<(), BrowserError> {
        let started = Instant::now();
        loop {
            match self.eval::<String>("document.readyState").await {
                Ok(state) if state != "loading" => return Ok(()),
                Ok(_) => {}
                Err(e) => tracing::debug!("readyState not available yet: {}", e),
            }
            if started.elapsed() >= self.page_wait {
                return Err(BrowserError::Timeout(self.page_wait));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn tab_labels(&mut self, list_selector: &str) -> Result<Vec<String>, BrowserError> {
        let script = format!(
            "(() => {{ {} return items.map(li => {{ const a = li.querySelector('a'); return a ? a.innerText.trim() : ''; }}); }})()",
            tab_items_js(list_selector)
        );
        self.eval(&script).await
    }

    async fn click_tab(
        &mut self,
        list_selector: &str,
        index: usize,
        delay: Duration,
    ) -> Result<(), BrowserError> {
        tokio::time::sleep(delay).await;

        let before: String = self.eval(DOC_TOKEN_JS).await?;
        let script = format!(
            "(() => {{ {} const li = items[{index}]; const a = li ? li.querySelector('a') : null; if (!a) return false; a.click(); return true; }})()",
            tab_items_js(list_selector)
        );
        let clicked: bool = self.eval(&script).await?;
        if !clicked {
            return Err(BrowserError::NoSuchElement(format!(
                "tab {index} of {list_selector}"
            )));
        }

        self.await_click(&before, &tab_state_js(list_selector, index))
            .await
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.page()?
            .content()
            .await
            .map_err(|e| BrowserError::Protocol(format!("failed to read content: {e}")))
    }

    async fn close(mut self: Box<Self>) -> Result<(), BrowserError> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("page close failed: {}", e);
            }
        }

        let result = match self.browser.take() {
            Some(mut browser) => {
                let closed = browser
                    .close()
                    .await
                    .map_err(|e| BrowserError::Protocol(format!("browser close failed: {e}")));
                if let Err(e) = browser.wait().await {
                    tracing::debug!("waiting for browser exit failed: {}", e);
                }
                closed.map(|_| ())
            }
            None => Ok(()),
        };

        self.handler_task.abort();
        result
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
