//! Combination bet parsers: quinella (馬連), exacta (馬単), trio (3連複)
//! and trifecta (3連単)
//!
//! All four pages are lists of small tables. Each table fixes the leading
//! horse(s) in its caption or heading and has one row per trailing horse:
//! `<th>` holds the horse number, `<td>` the odds.
//!
//! Keys are zero-padded and comma-joined. Unordered bets are stored with
//! the horses ascending so the same pair or trio always has one key;
//! ordered bets keep the finishing order.

use super::{
    combination_key, element_text, page_or_missing, parse_horse_number, parse_odds_text,
    selector, setup_failed, Collector,
};
use crate::error::ScraperError;
use crate::models::{
    BetType, DiagnosticKind, ExactaOdds, Extraction, OddsSnapshot, QuinellaOdds, TrifectaOdds,
    TrioOdds,
};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// Extract quinella odds from the `umaren` page
pub fn extract_quinella_odds(snapshot: &OddsSnapshot) -> Extraction<QuinellaOdds> {
    extract_pairs(snapshot, BetType::Umaren, "ul.umaren_list", false)
}

/// Extract exacta odds from the `umatan` page
pub fn extract_exacta_odds(snapshot: &OddsSnapshot) -> Extraction<ExactaOdds> {
    extract_pairs(snapshot, BetType::Umatan, "ul.umatan_list", true)
}

/// Extract trio odds from the `sanrenpuku` page
pub fn extract_trio_odds(snapshot: &OddsSnapshot) -> Extraction<TrioOdds> {
    let html = match page_or_missing(snapshot, BetType::Sanrenpuku) {
        Ok(html) => html,
        Err(empty) => return empty,
    };
    parse_trio_odds(html).unwrap_or_else(|e| setup_failed(BetType::Sanrenpuku, e))
}

/// Extract trifecta odds from the `sanrentan` page
pub fn extract_trifecta_odds(snapshot: &OddsSnapshot) -> Extraction<TrifectaOdds> {
    let html = match page_or_missing(snapshot, BetType::Sanrentan) {
        Ok(html) => html,
        Err(empty) => return empty,
    };
    parse_trifecta_odds(html).unwrap_or_else(|e| setup_failed(BetType::Sanrentan, e))
}

fn extract_pairs(
    snapshot: &OddsSnapshot,
    bet_type: BetType,
    list_css: &str,
    ordered: bool,
) -> Extraction<BTreeMap<String, f64>> {
    let html = match page_or_missing(snapshot, bet_type) {
        Ok(html) => html,
        Err(empty) => return empty,
    };
    parse_pair_odds(html, bet_type, list_css, ordered)
        .unwrap_or_else(|e| setup_failed(bet_type, e))
}

/// Row-level selectors shared by every layout
struct RowSelectors {
    rows: Selector,
    th: Selector,
    td: Selector,
}

impl RowSelectors {
    fn new(rows_css: &str) -> Result<Self, ScraperError> {
        Ok(Self {
            rows: selector(rows_css)?,
            th: selector("th")?,
            td: selector("td")?,
        })
    }
}

/// Read every `th`/`td` row of one table and insert it under `leading + [th]`
fn collect_rows(
    table: &ElementRef,
    sel: &RowSelectors,
    leading: &[u8],
    ordered: bool,
    out: &mut Collector<BTreeMap<String, f64>>,
) {
    let prefix = leading
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join("-");

    for row in table.select(&sel.rows) {
        let Some(th) = row.select(&sel.th).next() else {
            out.skip(DiagnosticKind::MissingCell, format!("{}: row without th", prefix));
            continue;
        };
        let th_text = element_text(&th);
        let Some(last) = parse_horse_number(&th_text) else {
            out.skip(
                DiagnosticKind::InvalidNumber,
                format!("{}: horse number {:?}", prefix, th_text),
            );
            continue;
        };

        let Some(td) = row.select(&sel.td).next() else {
            out.skip(
                DiagnosticKind::MissingCell,
                format!("{}-{}: row without td", prefix, last),
            );
            continue;
        };
        let odds_text = element_text(&td);
        let Some(odds) = parse_odds_text(&odds_text) else {
            out.skip(
                DiagnosticKind::InvalidNumber,
                format!("{}-{}: odds {:?}", prefix, last, odds_text),
            );
            continue;
        };

        let mut horses = leading.to_vec();
        horses.push(last);
        if has_duplicates(&horses) {
            out.skip(
                DiagnosticKind::InvalidNumber,
                format!("{}-{}: repeated horse", prefix, last),
            );
            continue;
        }
        if !ordered {
            horses.sort_unstable();
        }

        let key = combination_key(&horses);
        if let Some(previous) = out.odds_mut().get(&key) {
            if *previous != odds {
                tracing::debug!("{} listed twice ({} vs {}), keeping first", key, previous, odds);
            }
            continue;
        }
        out.odds_mut().insert(key, odds);
    }
}

fn has_duplicates(horses: &[u8]) -> bool {
    horses
        .iter()
        .enumerate()
        .any(|(i, h)| horses[i + 1..].contains(h))
}

/// Quinella / exacta layout
///
/// ```text
/// ul.umaren_list > li > table
///     caption            first horse
///     tbody tr > th, td  second horse, odds
/// ```
fn parse_pair_odds(
    html: &str,
    bet_type: BetType,
    list_css: &str,
    ordered: bool,
) -> Result<Extraction<BTreeMap<String, f64>>, ScraperError> {
    let document = Html::parse_document(html);
    let item_selector = selector(&format!("{} li", list_css))?;
    let caption_selector = selector("caption")?;
    let rows = RowSelectors::new("tbody tr")?;
    let mut out = Collector::new(bet_type);

    let items: Vec<_> = document.select(&item_selector).collect();
    if items.is_empty() {
        out.skip(DiagnosticKind::MissingTable, format!("no {} blocks", list_css));
    }

    for (idx, item) in items.iter().enumerate() {
        let Some(caption) = item.select(&caption_selector).next() else {
            out.skip(DiagnosticKind::MissingCell, format!("block {}: no caption", idx + 1));
            continue;
        };
        let caption_text = element_text(&caption);
        let Some(first) = parse_horse_number(&caption_text) else {
            out.skip(
                DiagnosticKind::InvalidNumber,
                format!("block {}: caption {:?}", idx + 1, caption_text),
            );
            continue;
        };

        collect_rows(item, &rows, &[first], ordered, &mut out);
    }

    let result = out.finish();
    tracing::info!("Extracted {} {} odds", result.odds.len(), bet_type);
    Ok(result)
}

/// Trio layout
///
/// ```text
/// div.fuku3_unit
///     h4 span.inner span.num               first horse
///     ul.fuku3_list > li > table
///         caption "1-2"                    second horse after the dash
///         tbody tr > th, td                third horse, odds
/// ```
fn parse_trio_odds(html: &str) -> Result<Extraction<TrioOdds>, ScraperError> {
    let document = Html::parse_document(html);
    let unit_selector = selector("div.fuku3_unit")?;
    let first_selector = selector("h4 span.inner span.num")?;
    let item_selector = selector("ul.fuku3_list li")?;
    let caption_selector = selector("table caption")?;
    let rows = RowSelectors::new("table tbody tr")?;
    let caption_pattern = Regex::new(r"(\d+)\s*-\s*(\d+)")?;
    let mut out = Collector::new(BetType::Sanrenpuku);

    let units: Vec<_> = document.select(&unit_selector).collect();
    if units.is_empty() {
        out.skip(DiagnosticKind::MissingTable, "no div.fuku3_unit blocks");
    }

    for (idx, unit) in units.iter().enumerate() {
        let first = unit
            .select(&first_selector)
            .next()
            .map(|el| element_text(&el))
            .and_then(|text| parse_horse_number(&text));
        let Some(first) = first else {
            out.skip(DiagnosticKind::MissingCell, format!("unit {}: no first horse", idx + 1));
            continue;
        };

        for item in unit.select(&item_selector) {
            let Some(caption) = item.select(&caption_selector).next() else {
                out.skip(DiagnosticKind::MissingCell, format!("{}: no caption", first));
                continue;
            };
            let caption_text = element_text(&caption);
            let second = caption_pattern
                .captures(&caption_text)
                .and_then(|c| c.get(2))
                .and_then(|m| parse_horse_number(m.as_str()));
            let Some(second) = second else {
                out.skip(
                    DiagnosticKind::InvalidNumber,
                    format!("{}: caption {:?}", first, caption_text),
                );
                continue;
            };

            collect_rows(&item, &rows, &[first, second], false, &mut out);
        }
    }

    let result = out.finish();
    tracing::info!("Extracted {} sanrenpuku odds", result.odds.len());
    Ok(result)
}

/// Trifecta layout
///
/// ```text
/// div.tan3_unit
///     span.num                                 first horse
///     ul.tan3_list > li
///         div.p_line:nth-of-type(2) div.num    second horse
///         table.tan3 tbody tr > th, td         third horse, odds
/// ```
fn parse_trifecta_odds(html: &str) -> Result<Extraction<TrifectaOdds>, ScraperError> {
    let document = Html::parse_document(html);
    let unit_selector = selector("div.tan3_unit")?;
    let first_selector = selector("span.num")?;
    let item_selector = selector("ul.tan3_list li")?;
    let second_selector = selector("div.p_line:nth-of-type(2) div.num")?;
    let rows = RowSelectors::new("table.tan3 tbody tr")?;
    let mut out = Collector::new(BetType::Sanrentan);

    let units: Vec<_> = document.select(&unit_selector).collect();
    if units.is_empty() {
        out.skip(DiagnosticKind::MissingTable, "no div.tan3_unit blocks");
    }

    for (idx, unit) in units.iter().enumerate() {
        let first = unit
            .select(&first_selector)
            .next()
            .map(|el| element_text(&el))
            .and_then(|text| parse_horse_number(&text));
        let Some(first) = first else {
            out.skip(DiagnosticKind::MissingCell, format!("unit {}: no first horse", idx + 1));
            continue;
        };

        for item in unit.select(&item_selector) {
            let second = item
                .select(&second_selector)
                .next()
                .map(|el| element_text(&el))
                .and_then(|text| parse_horse_number(&text));
            let Some(second) = second else {
                out.skip(DiagnosticKind::MissingCell, format!("{}: no second horse", first));
                continue;
            };

            collect_rows(&item, &rows, &[first, second], true, &mut out);
        }
    }

    let result = out.finish();
    tracing::info!("Extracted {} sanrentan odds", result.odds.len());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bet_type: BetType, body: &str) -> OddsSnapshot {
        let mut snapshot = OddsSnapshot::default();
        snapshot
            .pages
            .insert(bet_type, format!("<html><body>{}</body></html>", body));
        snapshot
    }

    fn pair_block(first: &str, rows: &[(&str, &str)]) -> String {
        let rows: String = rows
            .iter()
            .map(|(h, o)| format!("<tr><th>{}</th><td>{}</td></tr>", h, o))
            .collect();
        format!(
            "<li><table><caption>{}</caption><tbody>{}</tbody></table></li>",
            first, rows
        )
    }

    #[test]
    fn test_extract_quinella_odds() {
        let body = format!(
            "<ul class=\"umaren_list\">{}{}</ul>",
            pair_block("1", &[("2", "3.5"), ("3", "12.0"), ("10", "1,024.8")]),
            pair_block("2", &[("3", "8.8")]),
        );

        let result = extract_quinella_odds(&snapshot(BetType::Umaren, &body));

        assert_eq!(result.odds.len(), 4);
        assert_eq!(result.odds["01,02"], 3.5);
        assert_eq!(result.odds["01,10"], 1024.8);
        assert_eq!(result.odds["02,03"], 8.8);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_quinella_keys_are_ascending() {
        let body = format!(
            "<ul class=\"umaren_list\">{}</ul>",
            pair_block("12", &[("3", "40.1")])
        );

        let result = extract_quinella_odds(&snapshot(BetType::Umaren, &body));

        assert_eq!(result.odds.get("03,12"), Some(&40.1));
        assert!(!result.odds.contains_key("12,03"));
    }

    #[test]
    fn test_exacta_keeps_finishing_order() {
        let body = format!(
            "<ul class=\"umatan_list\">{}{}</ul>",
            pair_block("2", &[("1", "6.0")]),
            pair_block("1", &[("2", "4.1")]),
        );

        let result = extract_exacta_odds(&snapshot(BetType::Umatan, &body));

        assert_eq!(result.odds["02,01"], 6.0);
        assert_eq!(result.odds["01,02"], 4.1);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let body = format!(
            "<ul class=\"umaren_list\">{}<li><table><tbody><tr><th>2</th><td>1.0</td></tr></tbody></table></li></ul>",
            pair_block("1", &[("2", "3.5"), ("3", "取消"), ("x", "9.9"), ("4", "5.0")]),
        );

        let result = extract_quinella_odds(&snapshot(BetType::Umaren, &body));

        assert_eq!(
            result.odds.keys().cloned().collect::<Vec<_>>(),
            vec!["01,02".to_string(), "01,04".to_string()]
        );
        // 取消, "x" and the caption-less block
        assert_eq!(result.diagnostics.len(), 3);
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.bet_type == BetType::Umaren));
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let result = extract_quinella_odds(&OddsSnapshot::default());
        assert!(result.odds.is_empty());
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MissingSnapshot);

        let result = extract_trifecta_odds(&OddsSnapshot::default());
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MissingSnapshot);
    }

    #[test]
    fn test_missing_list_block() {
        let result = extract_quinella_odds(&snapshot(BetType::Umaren, "<p>発売前</p>"));
        assert!(result.odds.is_empty());
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MissingTable);
    }

    #[test]
    fn test_extract_trio_odds() {
        let body = r#"
            <div class="fuku3_unit">
              <h4><span class="inner"><span class="num">3</span>番</span></h4>
              <ul class="fuku3_list">
                <li><table><caption>3-1</caption><tbody>
                  <tr><th>2</th><td>15.2</td></tr>
                  <tr><th>5</th><td>88.0</td></tr>
                </tbody></table></li>
                <li><table><caption>3 - 4</caption><tbody>
                  <tr><th>6</th><td>1,200.0</td></tr>
                  <tr><th>4</th><td>9.0</td></tr>
                </tbody></table></li>
              </ul>
            </div>"#;

        let result = extract_trio_odds(&snapshot(BetType::Sanrenpuku, body));

        assert_eq!(result.odds["01,02,03"], 15.2);
        assert_eq!(result.odds["01,03,05"], 88.0);
        assert_eq!(result.odds["03,04,06"], 1200.0);
        assert_eq!(result.odds.len(), 3);
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn test_extract_trifecta_odds() {
        let body = r#"
            <div class="tan3_unit">
              <h4><span class="num">1</span></h4>
              <ul class="tan3_list">
                <li>
                  <div class="p_line"><div class="num">1</div></div>
                  <div class="p_line"><div class="num">2</div></div>
                  <table class="tan3"><tbody>
                    <tr><th>3</th><td>30.5</td></tr>
                    <tr><th>4</th><td>---</td></tr>
                  </tbody></table>
                </li>
                <li>
                  <div class="p_line"><div class="num">1</div></div>
                  <div class="p_line"><div class="num">3</div></div>
                  <table class="tan3"><tbody>
                    <tr><th>2</th><td>41.0</td></tr>
                  </tbody></table>
                </li>
              </ul>
            </div>"#;

        let result = extract_trifecta_odds(&snapshot(BetType::Sanrentan, body));

        assert_eq!(result.odds["01,02,03"], 30.5);
        assert_eq!(result.odds["01,03,02"], 41.0);
        assert_eq!(result.odds.len(), 2);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::InvalidNumber);
    }

    #[test]
    fn test_has_duplicates() {
        assert!(has_duplicates(&[1, 2, 1]));
        assert!(!has_duplicates(&[1, 2, 3]));
        assert!(!has_duplicates(&[]));
    }
}
