//! Full pipeline: captured pages -> odds mappings -> axis recommendation

use crate::core::select_axis;
use crate::error::CaptureFailure;
use crate::models::{
    AxisRecommendation, BetType, Diagnostic, ExactaOdds, Extraction, OddsSnapshot, PlaceOdds,
    QuinellaOdds, Route, TrifectaOdds, TrioOdds, WinOdds,
};
use crate::scraper::{
    extract_exacta_odds, extract_place_odds, extract_quinella_odds, extract_trifecta_odds,
    extract_trio_odds, extract_win_odds, BrowserLauncher, Navigator,
};
use serde::{Deserialize, Serialize};

/// Everything extracted for one race
///
/// Field names follow the JRA bet names so the JSON reads like the site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaceOdds {
    pub race_id: String,
    pub captured_at: String,
    pub route: Route,
    pub tansho: WinOdds,
    pub fukusho: PlaceOdds,
    pub umaren: QuinellaOdds,
    #[serde(skip_serializing_if = "ExactaOdds::is_empty", default)]
    pub umatan: ExactaOdds,
    #[serde(skip_serializing_if = "TrioOdds::is_empty", default)]
    pub sanrenpuku: TrioOdds,
    #[serde(skip_serializing_if = "TrifectaOdds::is_empty", default)]
    pub sanrentan: TrifectaOdds,
    pub axis: AxisRecommendation,
    pub diagnostics: Vec<Diagnostic>,
}

impl RaceOdds {
    /// Run every extractor that has a page in the snapshot, then pick the axis
    ///
    /// Win, place and quinella are always attempted so a missing tab shows
    /// up in the diagnostics; the three-horse and exacta tabs are optional.
    pub fn from_snapshot(race_id: &str, snapshot: &OddsSnapshot) -> Self {
        let mut diagnostics = Vec::new();

        let tansho = take(&mut diagnostics, extract_win_odds(snapshot));
        let fukusho = take(&mut diagnostics, extract_place_odds(snapshot));
        let umaren = take(&mut diagnostics, extract_quinella_odds(snapshot));

        let captured = |bet_type: BetType| snapshot.get(bet_type).is_some();
        let umatan = if captured(BetType::Umatan) {
            take(&mut diagnostics, extract_exacta_odds(snapshot))
        } else {
            ExactaOdds::new()
        };
        let sanrenpuku = if captured(BetType::Sanrenpuku) {
            take(&mut diagnostics, extract_trio_odds(snapshot))
        } else {
            TrioOdds::new()
        };
        let sanrentan = if captured(BetType::Sanrentan) {
            take(&mut diagnostics, extract_trifecta_odds(snapshot))
        } else {
            TrifectaOdds::new()
        };

        let axis = select_axis(&umaren);

        Self {
            race_id: race_id.to_string(),
            captured_at: snapshot.captured_at.clone(),
            route: snapshot.route,
            tansho,
            fukusho,
            umaren,
            umatan,
            sanrenpuku,
            sanrentan,
            axis,
            diagnostics,
        }
    }
}

fn take<T>(diagnostics: &mut Vec<Diagnostic>, extraction: Extraction<T>) -> T {
    diagnostics.extend(extraction.diagnostics);
    extraction.odds
}

/// Capture and extract odds for one race
pub async fn fetch_race_odds<L: BrowserLauncher>(
    navigator: &Navigator<L>,
    race_id: &str,
) -> Result<RaceOdds, CaptureFailure> {
    let snapshot = navigator.capture(race_id).await?;
    Ok(RaceOdds::from_snapshot(race_id, &snapshot))
}
