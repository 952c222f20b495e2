//! Win (単勝) and place (複勝) odds parser
//!
//! Both come from the same `table.tanpuku`, one row per horse:
//! `td.num` (horse number) | ... | `td.odds_tan` | `td.odds_fuku` (range).
//!
//! The class of the place odds cell has changed between site revisions, so
//! the cell is located through an ordered list of strategies.

use super::{
    element_text, page_or_missing, parse_horse_number, parse_odds_text, selector, setup_failed,
    Collector,
};
use crate::error::ScraperError;
use crate::models::{BetType, DiagnosticKind, Extraction, OddsSnapshot, PlaceOdds, WinOdds};
use scraper::{ElementRef, Html, Selector};

/// Class names the place odds cell has been seen with, most common first
const PLACE_CELL_CLASSES: [&str; 5] = [
    "td.odds_fuku",
    "td.odds_fukusho",
    "td.odds_fuku1",
    "td.odds_fuku2",
    "td.odds_fuku3",
];

/// Substring every known place odds class contains
const PLACE_CLASS_MARKER: &str = "fuku";

const WIN_CLASS: &str = "odds_tan";

struct TanpukuSelectors {
    rows: Selector,
    num: Selector,
    win: Selector,
    td: Selector,
    min: Selector,
    place_candidates: Vec<Selector>,
}

impl TanpukuSelectors {
    fn new() -> Result<Self, ScraperError> {
        Ok(Self {
            rows: selector("table.tanpuku tbody tr")?,
            num: selector("td.num")?,
            win: selector("td.odds_tan")?,
            td: selector("td")?,
            min: selector("span.min")?,
            place_candidates: PLACE_CELL_CLASSES
                .iter()
                .map(|css| selector(css))
                .collect::<Result<_, _>>()?,
        })
    }
}

type PlaceCellStrategy = for<'a> fn(&ElementRef<'a>, &TanpukuSelectors) -> Option<ElementRef<'a>>;

/// Applied in order; the first cell found wins
const PLACE_CELL_STRATEGIES: [(&str, PlaceCellStrategy); 3] = [
    ("known class", place_cell_by_known_class),
    ("class marker", place_cell_by_class_marker),
    ("after win cell", place_cell_after_win_cell),
];

fn place_cell_by_known_class<'a>(
    row: &ElementRef<'a>,
    sel: &TanpukuSelectors,
) -> Option<ElementRef<'a>> {
    sel.place_candidates
        .iter()
        .find_map(|candidate| row.select(candidate).next())
}

fn place_cell_by_class_marker<'a>(
    row: &ElementRef<'a>,
    sel: &TanpukuSelectors,
) -> Option<ElementRef<'a>> {
    row.select(&sel.td).find(|td| {
        td.value()
            .classes()
            .any(|c| c.to_lowercase().contains(PLACE_CLASS_MARKER))
    })
}

fn place_cell_after_win_cell<'a>(
    row: &ElementRef<'a>,
    sel: &TanpukuSelectors,
) -> Option<ElementRef<'a>> {
    let win_cell = row.select(&sel.win).next()?;
    let next_td = win_cell
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")?;

    let is_win_cell = next_td
        .value()
        .classes()
        .any(|c| c.to_lowercase().contains(WIN_CLASS));
    (!is_win_cell).then_some(next_td)
}

/// Locate the place odds cell of a row
fn find_place_cell<'a>(
    row: &ElementRef<'a>,
    sel: &TanpukuSelectors,
) -> Option<(&'static str, ElementRef<'a>)> {
    PLACE_CELL_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(row, sel).map(|cell| (*name, cell)))
}

/// Extract win odds from the `tanpuku` page
///
/// Returns horse number -> odds. Rows without a usable horse number or
/// odds are skipped and reported in the diagnostics.
pub fn extract_win_odds(snapshot: &OddsSnapshot) -> Extraction<WinOdds> {
    let html = match page_or_missing(snapshot, BetType::Tanpuku) {
        Ok(html) => html,
        Err(empty) => return empty,
    };
    parse_win_odds(html).unwrap_or_else(|e| setup_failed(BetType::Tanpuku, e))
}

/// Extract the lower bound of the place odds from the `tanpuku` page
pub fn extract_place_odds(snapshot: &OddsSnapshot) -> Extraction<PlaceOdds> {
    let html = match page_or_missing(snapshot, BetType::Tanpuku) {
        Ok(html) => html,
        Err(empty) => return empty,
    };
    parse_place_odds(html).unwrap_or_else(|e| setup_failed(BetType::Tanpuku, e))
}

fn parse_win_odds(html: &str) -> Result<Extraction<WinOdds>, ScraperError> {
    let document = Html::parse_document(html);
    let sel = TanpukuSelectors::new()?;
    let mut out = Collector::<WinOdds>::new(BetType::Tanpuku);

    let rows: Vec<_> = document.select(&sel.rows).collect();
    if rows.is_empty() {
        out.skip(DiagnosticKind::MissingTable, "table.tanpuku has no rows");
    }

    for (idx, row) in rows.iter().enumerate() {
        let Some(num_cell) = row.select(&sel.num).next() else {
            out.skip(DiagnosticKind::MissingCell, format!("row {}: no td.num", idx + 1));
            continue;
        };
        let num_text = element_text(&num_cell);
        let Some(horse) = parse_horse_number(&num_text) else {
            out.skip(
                DiagnosticKind::InvalidNumber,
                format!("row {}: horse number {:?}", idx + 1, num_text),
            );
            continue;
        };

        let Some(win_cell) = row.select(&sel.win).next() else {
            out.skip(
                DiagnosticKind::MissingCell,
                format!("horse {}: no td.odds_tan", horse),
            );
            continue;
        };
        let odds_text = element_text(&win_cell);
        match parse_odds_text(&odds_text) {
            Some(odds) => {
                out.odds_mut().insert(horse, odds);
            }
            None => out.skip(
                DiagnosticKind::InvalidNumber,
                format!("horse {}: win odds {:?}", horse, odds_text),
            ),
        }
    }

    let result = out.finish();
    tracing::info!("Extracted {} win odds", result.odds.len());
    Ok(result)
}

fn parse_place_odds(html: &str) -> Result<Extraction<PlaceOdds>, ScraperError> {
    let document = Html::parse_document(html);
    let sel = TanpukuSelectors::new()?;
    let mut out = Collector::<PlaceOdds>::new(BetType::Tanpuku);

    let rows: Vec<_> = document.select(&sel.rows).collect();
    if rows.is_empty() {
        out.skip(DiagnosticKind::MissingTable, "table.tanpuku has no rows");
    }

    for (idx, row) in rows.iter().enumerate() {
        let Some(num_cell) = row.select(&sel.num).next() else {
            out.skip(DiagnosticKind::MissingCell, format!("row {}: no td.num", idx + 1));
            continue;
        };
        let num_text = element_text(&num_cell);
        let Some(horse) = parse_horse_number(&num_text) else {
            out.skip(
                DiagnosticKind::InvalidNumber,
                format!("row {}: horse number {:?}", idx + 1, num_text),
            );
            continue;
        };

        let Some((strategy, cell)) = find_place_cell(row, &sel) else {
            let cells: Vec<String> = row
                .select(&sel.td)
                .map(|td| {
                    let class = td.value().attr("class").unwrap_or("");
                    let text: String = element_text(&td).chars().take(20).collect();
                    format!("{}={:?}", class, text)
                })
                .collect();
            out.skip(
                DiagnosticKind::MissingCell,
                format!("horse {}: no place odds cell in [{}]", horse, cells.join(", ")),
            );
            continue;
        };
        tracing::trace!("horse {}: place cell found by {}", horse, strategy);

        let Some(min) = cell.select(&sel.min).next() else {
            out.skip(
                DiagnosticKind::MissingCell,
                format!("horse {}: no span.min", horse),
            );
            continue;
        };
        let min_text = element_text(&min);
        match parse_odds_text(&min_text) {
            Some(odds) => {
                out.odds_mut().insert(horse, odds);
            }
            None => out.skip(
                DiagnosticKind::InvalidNumber,
                format!("horse {}: place odds lower bound {:?}", horse, min_text),
            ),
        }
    }

    let result = out.finish();
    tracing::info!("Extracted {} place odds", result.odds.len());
    Ok(result)
}
