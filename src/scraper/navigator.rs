//! Browser navigation from the JRA top page to the odds tabs of one race
//!
//! ```text
//! Start -> TopPage -> OddsIndex -+-> RacePage ---------------------+-> OddsTabsPage -> Done
//!                                |                                 |
//!                                +-> ResultsPage -> RacePage ->    |
//!                                                   RaceResultPage +
//! ```
//!
//! The odds index only lists meetings that are currently selling. For other
//! meetings the race is reached through the results pages, where the odds
//! link sits inside the `#race_result` block.

use super::browser::{BrowserLauncher, BrowserSession, LinkQuery};
use crate::config::NavigatorConfig;
use crate::error::{CaptureFailure, NavigationError};
use crate::models::{BetType, OddsSnapshot, Route};
use crate::race::RaceId;
use std::collections::BTreeMap;
use std::time::Duration;

/// List holding one `<li><a>` per bet type on the odds page
pub const BET_TAB_LIST: &str = "ul.nav.pills";

const ODDS_LINK: &str = "オッズ";
const RESULTS_LINK: &str = "レース結果";
const RACE_RESULT_SCOPE: &str = "#race_result";

/// Where the navigator currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Start,
    /// jra.go.jp/keiba/
    TopPage,
    /// List of meetings with odds on sale
    OddsIndex,
    /// List of meetings with results
    ResultsPage,
    /// Race list of the meeting
    RacePage,
    /// Result of the race (fallback route only)
    RaceResultPage,
    /// Page with the bet type tabs
    OddsTabsPage,
    Done,
}

/// Tabs captured so far; kept outside the navigation future so it survives
/// a timeout
#[derive(Debug, Default)]
struct Progress {
    route: Route,
    pages: BTreeMap<BetType, String>,
}

/// Drives a browser to the odds tabs of a race and keeps each tab's HTML
pub struct Navigator<L> {
    launcher: L,
    config: NavigatorConfig,
}

impl<L: BrowserLauncher> Navigator<L> {
    pub fn new(launcher: L, config: NavigatorConfig) -> Self {
        Self { launcher, config }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Capture with the configured skip list and timeout
    pub async fn capture(&self, race_id: &str) -> Result<OddsSnapshot, CaptureFailure> {
        self.capture_snapshots(race_id, &self.config.skip_bet_types, self.config.timeout())
            .await
    }

    /// Capture the HTML of every bet type tab not in `skip`
    ///
    /// The browser session is closed on every path. On failure, tabs
    /// captured before the error are returned in `CaptureFailure::partial`.
    pub async fn capture_snapshots(
        &self,
        race_id: &str,
        skip: &[BetType],
        timeout: Duration,
    ) -> Result<OddsSnapshot, CaptureFailure> {
        let race = RaceId::parse(race_id).map_err(|e| CaptureFailure::early(e.into()))?;

        tracing::info!(
            "Capturing odds for race {} ({} / {})",
            race,
            race.meeting_name(),
            race.race_name()
        );

        let mut session = self
            .launcher
            .launch()
            .await
            .map_err(|e| CaptureFailure::early(e.into()))?;

        let mut progress = Progress::default();
        let outcome =
            tokio::time::timeout(timeout, self.drive(session.as_mut(), &race, skip, &mut progress))
                .await;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close browser session: {}", e);
        }

        let snapshot = OddsSnapshot {
            pages: progress.pages,
            ..OddsSnapshot::new(progress.route)
        };

        match outcome {
            Ok(Ok(())) => {
                tracing::info!(
                    "Captured {} tabs: {:?}",
                    snapshot.pages.len(),
                    snapshot.bet_types()
                );
                Ok(snapshot)
            }
            Ok(Err(error)) => {
                tracing::warn!("Navigation failed after {} tabs: {}", snapshot.pages.len(), error);
                Err(CaptureFailure::new(error, snapshot))
            }
            Err(_) => {
                tracing::warn!("Navigation timed out after {:?}", timeout);
                Err(CaptureFailure::new(NavigationError::Timeout(timeout), snapshot))
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        race: &RaceId,
        skip: &[BetType],
        progress: &mut Progress,
    ) -> Result<(), NavigationError> {
        let meeting_link = LinkQuery::new(race.meeting_name());
        let race_link = LinkQuery::exact(race.race_name());
        let mut state = NavState::Start;

        loop {
            tracing::debug!("Navigator state: {:?}", state);
            state = match state {
                NavState::Start => {
                    session.goto(&self.config.top_url).await?;
                    session.wait_for_dom_ready().await?;
                    NavState::TopPage
                }
                NavState::TopPage => {
                    self.follow(session, &LinkQuery::exact(ODDS_LINK), "top page")
                        .await?;
                    NavState::OddsIndex
                }
                NavState::OddsIndex => {
                    if session.count_links(&meeting_link).await? > 0 {
                        self.follow(session, &meeting_link, "odds index").await?;
                        NavState::RacePage
                    } else {
                        tracing::info!(
                            "{} is not on the odds index, going through race results",
                            meeting_link.name
                        );
                        progress.route = Route::ResultsFallback;
                        self.follow(session, &LinkQuery::new(RESULTS_LINK), "odds index")
                            .await?;
                        NavState::ResultsPage
                    }
                }
                NavState::ResultsPage => {
                    self.follow(session, &meeting_link, "results index").await?;
                    NavState::RacePage
                }
                NavState::RacePage => {
                    self.follow(session, &race_link, "race list").await?;
                    match progress.route {
                        Route::Direct => NavState::OddsTabsPage,
                        Route::ResultsFallback => NavState::RaceResultPage,
                    }
                }
                NavState::RaceResultPage => {
                    let odds_link = LinkQuery::new(ODDS_LINK).within(RACE_RESULT_SCOPE);
                    self.follow(session, &odds_link, "race result").await?;
                    NavState::OddsTabsPage
                }
                NavState::OddsTabsPage => {
                    self.capture_tabs(session, skip, progress).await?;
                    NavState::Done
                }
                NavState::Done => return Ok(()),
            };
        }
    }

    /// Click a link that must exist and wait for the next page
    async fn follow(
        &self,
        session: &mut dyn BrowserSession,
        link: &LinkQuery,
        page: &'static str,
    ) -> Result<(), NavigationError> {
        if session.count_links(link).await? == 0 {
            return Err(NavigationError::LinkNotFound {
                name: link.name.clone(),
                page,
            });
        }
        session.click_link(link, self.config.click_delay()).await?;
        session.wait_for_dom_ready().await?;
        Ok(())
    }

    /// Activate each tab in turn and keep its HTML
    async fn capture_tabs(
        &self,
        session: &mut dyn BrowserSession,
        skip: &[BetType],
        progress: &mut Progress,
    ) -> Result<(), NavigationError> {
        let labels = session.tab_labels(BET_TAB_LIST).await?;
        if labels.is_empty() {
            return Err(NavigationError::LinkNotFound {
                name: BET_TAB_LIST.to_string(),
                page: "odds page",
            });
        }

        for (index, label) in labels.iter().enumerate() {
            let bet_type = BetType::from_label(label)
                .ok_or_else(|| NavigationError::UnknownBetTab(label.clone()))?;
            if skip.contains(&bet_type) {
                tracing::debug!("Skipping {} tab", bet_type);
                continue;
            }

            session.click_tab(BET_TAB_LIST, index, Duration::ZERO).await?;
            session.wait_for_dom_ready().await?;
            let html = session.content().await?;
            tracing::debug!("Captured {} tab ({} bytes)", bet_type, html.len());
            progress.pages.insert(bet_type, html);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::browser::BrowserError;
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};

    const RACE: &str = "202505041007";

    struct FakeLink {
        text: &'static str,
        scope: Option<&'static str>,
        target: &'static str,
    }

    #[derive(Default)]
    struct FakePage {
        links: Vec<FakeLink>,
        tabs: Vec<&'static str>,
    }

    /// In-memory site: pages by name, links pointing at page names
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<&'static str, FakePage>,
        /// Page on which every call stalls forever
        stall_on: Option<&'static str>,
        events: Mutex<Vec<String>>,
    }

    impl FakeSite {
        fn page(mut self, name: &'static str, page: FakePage) -> Self {
            self.pages.insert(name, page);
            self
        }

        fn log(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    fn link(text: &'static str, target: &'static str) -> FakeLink {
        FakeLink {
            text,
            scope: None,
            target,
        }
    }

    fn scoped(text: &'static str, scope: &'static str, target: &'static str) -> FakeLink {
        FakeLink {
            text,
            scope: Some(scope),
            target,
        }
    }

    struct FakeLauncher(Arc<FakeSite>);

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.0.log("launch");
            Ok(Box::new(FakeSession {
                site: Arc::clone(&self.0),
                current: "",
                content: String::new(),
            }))
        }
    }

    struct FakeSession {
        site: Arc<FakeSite>,
        current: &'static str,
        content: String,
    }

    impl FakeSession {
        async fn stall_if_needed(&self) {
            if self.site.stall_on == Some(self.current) {
                std::future::pending::<()>().await;
            }
        }

        fn matching(&self, query: &LinkQuery) -> Vec<&FakeLink> {
            self.site
                .pages
                .get(self.current)
                .map(|p| {
                    p.links
                        .iter()
                        .filter(|l| query.scope.is_none() || query.scope.as_deref() == l.scope)
                        .filter(|l| query.matches(l.text))
                        .collect()
                })
                .unwrap_or_default()
        }

        fn enter(&mut self, page: &'static str) {
            self.current = page;
            self.content = format!("<html><body>{}</body></html>", page);
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
            self.site.log(format!("goto {}", url));
            self.enter("top");
            Ok(())
        }

        async fn count_links(&mut self, query: &LinkQuery) -> Result<usize, BrowserError> {
            self.stall_if_needed().await;
            Ok(self.matching(query).len())
        }

        async fn click_link(
            &mut self,
            query: &LinkQuery,
            _delay: Duration,
        ) -> Result<(), BrowserError> {
            let target = self
                .matching(query)
                .first()
                .map(|l| l.target)
                .ok_or_else(|| BrowserError::NoSuchElement(query.name.clone()))?;
            self.site.log(format!("click {}", query.name));
            self.enter(target);
            Ok(())
        }

        async fn wait_for_dom_ready(&mut self) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn tab_labels(&mut self, list_selector: &str) -> Result<Vec<String>, BrowserError> {
            assert_eq!(list_selector, BET_TAB_LIST);
            self.stall_if_needed().await;
            Ok(self
                .site
                .pages
                .get(self.current)
                .map(|p| p.tabs.iter().map(|t| t.to_string()).collect())
                .unwrap_or_default())
        }

        async fn click_tab(
            &mut self,
            _list_selector: &str,
            index: usize,
            _delay: Duration,
        ) -> Result<(), BrowserError> {
            let label = self
                .site
                .pages
                .get(self.current)
                .and_then(|p| p.tabs.get(index))
                .ok_or_else(|| BrowserError::NoSuchElement(format!("tab {}", index)))?;
            self.site.log(format!("tab {}", label));
            self.content = format!("<html><body>{}</body></html>", label);
            Ok(())
        }

        async fn content(&mut self) -> Result<String, BrowserError> {
            Ok(self.content.clone())
        }

        async fn close(self: Box<Self>) -> Result<(), BrowserError> {
            self.site.log("close");
            Ok(())
        }
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.site.log("drop");
        }
    }

    /// Session closed explicitly, then released
    fn closed(events: &[String]) -> bool {
        events.ends_with(&["close".to_string(), "drop".to_string()])
    }

    const ALL_TABS: [&str; 7] = ["単勝・複勝", "枠連", "馬連", "ワイド", "馬単", "3連複", "3連単"];

    fn top() -> FakePage {
        FakePage {
            links: vec![link("オッズ・払戻金", "top"), link("オッズ", "odds_index")],
            ..FakePage::default()
        }
    }

    fn race_list(target: &'static str) -> FakePage {
        FakePage {
            links: vec![
                link("1レース", "wrong_race"),
                link("17レース", "wrong_race"),
                link("7レース", target),
            ],
            ..FakePage::default()
        }
    }

    fn tabs_page(tabs: &[&'static str]) -> FakePage {
        FakePage {
            tabs: tabs.to_vec(),
            ..FakePage::default()
        }
    }

    fn direct_site() -> FakeSite {
        FakeSite::default()
            .page("top", top())
            .page(
                "odds_index",
                FakePage {
                    links: vec![
                        link("4回東京10日", "meeting"),
                        link("レース結果", "results"),
                    ],
                    ..FakePage::default()
                },
            )
            .page("meeting", race_list("odds_tabs"))
            .page("odds_tabs", tabs_page(&ALL_TABS))
    }

    fn fallback_site() -> FakeSite {
        FakeSite::default()
            .page("top", top())
            .page(
                "odds_index",
                FakePage {
                    links: vec![link("3回京都10日", "other"), link("レース結果", "results")],
                    ..FakePage::default()
                },
            )
            .page(
                "results",
                FakePage {
                    links: vec![link("4回東京10日", "results_meeting")],
                    ..FakePage::default()
                },
            )
            .page("results_meeting", race_list("race_result"))
            .page(
                "race_result",
                FakePage {
                    links: vec![
                        link("オッズ", "top"),
                        scoped("オッズ", "#race_result", "odds_tabs"),
                    ],
                    ..FakePage::default()
                },
            )
            .page("odds_tabs", tabs_page(&ALL_TABS))
    }

    fn navigator(site: &Arc<FakeSite>) -> Navigator<FakeLauncher> {
        let config = NavigatorConfig {
            click_delay_ms: 0,
            ..NavigatorConfig::default()
        };
        Navigator::new(FakeLauncher(Arc::clone(site)), config)
    }

    fn keys(snapshot: &OddsSnapshot) -> BTreeSet<BetType> {
        snapshot.pages.keys().copied().collect()
    }

    fn expected_keys(skip: &[BetType]) -> BTreeSet<BetType> {
        BetType::ALL
            .into_iter()
            .filter(|b| !skip.contains(b))
            .collect()
    }

    #[tokio::test]
    async fn test_direct_route() {
        let site = Arc::new(direct_site());
        let skip = [BetType::Wakuren, BetType::Wide];

        let snapshot = navigator(&site)
            .capture_snapshots(RACE, &skip, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(snapshot.route, Route::Direct);
        assert_eq!(keys(&snapshot), expected_keys(&skip));
        assert!(snapshot
            .get(BetType::Umaren)
            .unwrap()
            .contains("馬連"));
        assert_eq!(
            site.events(),
            vec![
                "launch",
                "goto https://www.jra.go.jp/keiba/",
                "click オッズ",
                "click 4回東京10日",
                "click 7レース",
                "tab 単勝・複勝",
                "tab 馬連",
                "tab 馬単",
                "tab 3連複",
                "tab 3連単",
                "close",
                "drop",
            ]
        );
    }

    #[tokio::test]
    async fn test_results_fallback_route() {
        let site = Arc::new(fallback_site());
        let skip = [
            BetType::Wakuren,
            BetType::Wide,
            BetType::Umatan,
            BetType::Sanrenpuku,
            BetType::Sanrentan,
        ];

        let snapshot = navigator(&site)
            .capture_snapshots(RACE, &skip, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(snapshot.route, Route::ResultsFallback);
        assert_eq!(keys(&snapshot), expected_keys(&skip));
        assert_eq!(
            keys(&snapshot),
            [BetType::Tanpuku, BetType::Umaren].into_iter().collect()
        );

        let events = site.events();
        assert!(events.contains(&"click レース結果".to_string()));
        assert!(closed(&events));
    }

    #[tokio::test]
    async fn test_missing_odds_link() {
        let site = Arc::new(direct_site().page("top", FakePage::default()));

        let failure = navigator(&site).capture(RACE).await.unwrap_err();

        assert!(matches!(
            failure.error,
            NavigationError::LinkNotFound { ref name, page: "top page" } if name == "オッズ"
        ));
        assert!(failure.partial.pages.is_empty());
        assert!(closed(&site.events()));
    }

    #[tokio::test]
    async fn test_missing_race_link_on_fallback_route() {
        let site = Arc::new(fallback_site().page("results_meeting", FakePage::default()));

        let failure = navigator(&site).capture(RACE).await.unwrap_err();

        assert!(matches!(
            failure.error,
            NavigationError::LinkNotFound { ref name, .. } if name == "7レース"
        ));
        assert_eq!(failure.partial.route, Route::ResultsFallback);
        assert!(closed(&site.events()));
    }

    #[tokio::test]
    async fn test_unknown_tab_keeps_partial_pages() {
        let site = Arc::new(
            direct_site().page("odds_tabs", tabs_page(&["単勝・複勝", "馬連", "WIN5", "馬単"])),
        );

        let failure = navigator(&site)
            .capture_snapshots(RACE, &[], Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(failure.error, NavigationError::UnknownBetTab(ref l) if l == "WIN5"));
        assert_eq!(
            keys(&failure.partial),
            [BetType::Tanpuku, BetType::Umaren].into_iter().collect()
        );
        assert!(!site.events().contains(&"tab 馬単".to_string()));
        assert!(closed(&site.events()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_still_closes_session() {
        let site = Arc::new(FakeSite {
            stall_on: Some("odds_tabs"),
            ..direct_site()
        });

        let failure = navigator(&site)
            .capture_snapshots(RACE, &[], Duration::from_secs(30))
            .await
            .unwrap_err();

        assert!(matches!(failure.error, NavigationError::Timeout(d) if d == Duration::from_secs(30)));
        assert!(closed(&site.events()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_capture_releases_session() {
        let site = Arc::new(FakeSite {
            stall_on: Some("odds_tabs"),
            ..direct_site()
        });
        let navigator = navigator(&site);

        let abandoned = tokio::time::timeout(
            Duration::from_secs(5),
            navigator.capture_snapshots(RACE, &[], Duration::from_secs(60)),
        )
        .await;

        assert!(abandoned.is_err());
        let events = site.events();
        assert_eq!(events.last().map(String::as_str), Some("drop"));
        assert!(!events.contains(&"close".to_string()));
        assert!(events.contains(&"click 7レース".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_race_id_does_not_launch() {
        let site = Arc::new(direct_site());

        let failure = navigator(&site).capture("202511041007").await.unwrap_err();

        assert!(matches!(failure.error, NavigationError::InvalidRaceId(_)));
        assert!(site.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tabs() {
        let site = Arc::new(direct_site().page("odds_tabs", FakePage::default()));

        let failure = navigator(&site).capture(RACE).await.unwrap_err();

        assert!(matches!(failure.error, NavigationError::LinkNotFound { page: "odds page", .. }));
    }
}
