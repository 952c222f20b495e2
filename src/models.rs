use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Bet type tabs on the JRA odds page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    /// 単勝・複勝 (win and place share one tab)
    Tanpuku,
    /// 枠連
    Wakuren,
    /// 馬連 (quinella)
    Umaren,
    /// ワイド
    Wide,
    /// 馬単 (exacta)
    Umatan,
    /// 3連複 (trio)
    Sanrenpuku,
    /// 3連単 (trifecta)
    Sanrentan,
}

impl BetType {
    pub const ALL: [BetType; 7] = [
        BetType::Tanpuku,
        BetType::Wakuren,
        BetType::Umaren,
        BetType::Wide,
        BetType::Umatan,
        BetType::Sanrenpuku,
        BetType::Sanrentan,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            BetType::Tanpuku => "tanpuku",
            BetType::Wakuren => "wakuren",
            BetType::Umaren => "umaren",
            BetType::Wide => "wide",
            BetType::Umatan => "umatan",
            BetType::Sanrenpuku => "sanrenpuku",
            BetType::Sanrentan => "sanrentan",
        }
    }

    /// Resolve an on-page tab label, including the spelling variants the
    /// site has used for the three-horse bets
    pub fn from_label(label: &str) -> Option<BetType> {
        match label.trim() {
            "単勝・複勝" => Some(BetType::Tanpuku),
            "枠連" => Some(BetType::Wakuren),
            "馬連" => Some(BetType::Umaren),
            "ワイド" => Some(BetType::Wide),
            "馬単" => Some(BetType::Umatan),
            "3連複" | "連複" => Some(BetType::Sanrenpuku),
            "3連単" | "連単" => Some(BetType::Sanrentan),
            _ => None,
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BetType::ALL
            .into_iter()
            .find(|b| b.tag() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown bet type {:?}", s))
    }
}

/// How the navigator reached the odds tabs page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Meeting link was listed on the odds index
    #[default]
    Direct,
    /// Meeting link was missing; went through the race results pages
    ResultsFallback,
}

/// Rendered HTML of each captured bet type tab
///
/// `Default` leaves `captured_at` empty; use `new` for a timestamped one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub captured_at: String,
    pub route: Route,
    pub pages: BTreeMap<BetType, String>,
}

impl OddsSnapshot {
    /// Empty snapshot stamped with the current time
    pub fn new(route: Route) -> Self {
        Self {
            captured_at: Utc::now().to_rfc3339(),
            route,
            pages: BTreeMap::new(),
        }
    }

    pub fn get(&self, bet_type: BetType) -> Option<&str> {
        self.pages.get(&bet_type).map(String::as_str)
    }

    pub fn bet_types(&self) -> Vec<BetType> {
        self.pages.keys().copied().collect()
    }
}

/// Horse number -> win odds
pub type WinOdds = BTreeMap<u8, f64>;

/// Horse number -> lower bound of the place odds range
pub type PlaceOdds = BTreeMap<u8, f64>;

/// "01,02" -> odds, horses ascending
pub type QuinellaOdds = BTreeMap<String, f64>;

/// "01,02" -> odds, in finishing order
pub type ExactaOdds = BTreeMap<String, f64>;

/// "01,02,03" -> odds, horses ascending
pub type TrioOdds = BTreeMap<String, f64>;

/// "01,02,03" -> odds, in finishing order
pub type TrifectaOdds = BTreeMap<String, f64>;

/// What went wrong with a row or table during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The bet type tab was never captured
    MissingSnapshot,
    /// The odds table or list block was not in the page
    MissingTable,
    /// A row lacked a required cell
    MissingCell,
    /// A cell did not hold a usable number
    InvalidNumber,
    /// A selector or pattern failed to compile
    BadSelector,
}

/// One recorded data-loss event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub bet_type: BetType,
    pub kind: DiagnosticKind,
    pub context: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.bet_type, self.kind, self.context)
    }
}

/// Extracted mapping plus everything dropped on the way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction<T> {
    pub odds: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T: Default> Extraction<T> {
    pub fn empty(diagnostic: Diagnostic) -> Self {
        Self {
            odds: T::default(),
            diagnostics: vec![diagnostic],
        }
    }
}

/// A horse paired with the axis in a quinella combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub horse: u8,
    pub odds: f64,
}

/// One of the two lowest quinella combinations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favourite {
    pub horses: (u8, u8),
    pub odds: f64,
}

/// Axis horse for quinella betting, with its partners by ascending odds
///
/// `axis == None` means fewer than two combinations were available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisRecommendation {
    pub axis: Option<u8>,
    pub favourites: Vec<Favourite>,
    pub partners: Vec<Partner>,
}

impl AxisRecommendation {
    pub fn none() -> Self {
        Self::default()
    }
}
