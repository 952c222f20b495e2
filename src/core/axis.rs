//! Quinella axis selection
//!
//! The two most favoured quinella combinations usually share a horse: the
//! market's strongest pick. That horse becomes the axis (軸) and every
//! quinella containing it is listed by ascending odds.
//!
//! 1. Fewer than two combinations: no axis.
//! 2. Otherwise take the two lowest odds.
//! 3. If they share horses, the smallest shared number is the axis.
//! 4. If not, the first horse of the lowest combination is the axis.

use crate::models::{AxisRecommendation, Favourite, Partner, QuinellaOdds};
use crate::scraper::parse_combination_key;

/// Pick the axis horse from quinella odds
///
/// Never fails: keys that are not a pair of distinct horse numbers and
/// non-positive odds are ignored.
///
/// # Examples
/// ```
/// use keiba_odds::core::select_axis;
/// use keiba_odds::models::QuinellaOdds;
///
/// let odds: QuinellaOdds = [("01,02", 1.5), ("01,03", 2.0), ("02,03", 5.0)]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), v))
///     .collect();
///
/// let rec = select_axis(&odds);
/// assert_eq!(rec.axis, Some(1));
/// assert_eq!(rec.partners.len(), 2);
/// ```
pub fn select_axis(quinella: &QuinellaOdds) -> AxisRecommendation {
    let mut pairs: Vec<((u8, u8), f64)> = quinella
        .iter()
        .filter_map(|(key, &odds)| {
            let pair = parse_pair(key);
            if pair.is_none() {
                tracing::debug!("Ignoring quinella key {:?}", key);
            }
            pair.filter(|_| odds.is_finite() && odds > 0.0)
                .map(|pair| (pair, odds))
        })
        .collect();

    if pairs.len() < 2 {
        return AxisRecommendation::none();
    }

    pairs.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let (lowest, runner_up) = (pairs[0], pairs[1]);
    let lowest_horses = [lowest.0 .0, lowest.0 .1];
    let runner_up_horses = [runner_up.0 .0, runner_up.0 .1];

    let axis = lowest_horses
        .iter()
        .filter(|h| runner_up_horses.contains(h))
        .min()
        .copied()
        .unwrap_or(lowest.0 .0);

    let mut partners: Vec<Partner> = pairs
        .iter()
        .filter_map(|&((a, b), odds)| {
            if a == axis {
                Some(Partner { horse: b, odds })
            } else if b == axis {
                Some(Partner { horse: a, odds })
            } else {
                None
            }
        })
        .collect();
    partners.sort_by(|x, y| x.odds.total_cmp(&y.odds).then_with(|| x.horse.cmp(&y.horse)));

    tracing::debug!(
        "Axis {} from {}-{} ({}) and {}-{} ({}), {} partners",
        axis,
        lowest.0 .0,
        lowest.0 .1,
        lowest.1,
        runner_up.0 .0,
        runner_up.0 .1,
        runner_up.1,
        partners.len()
    );

    AxisRecommendation {
        axis: Some(axis),
        favourites: vec![
            Favourite {
                horses: lowest.0,
                odds: lowest.1,
            },
            Favourite {
                horses: runner_up.0,
                odds: runner_up.1,
            },
        ],
        partners,
    }
}

/// "01,05" -> (1, 5); the two horses must differ
fn parse_pair(key: &str) -> Option<(u8, u8)> {
    match parse_combination_key(key)?.as_slice() {
        &[a, b] if a != b => Some((a, b)),
        _ => None,
    }
}

/// Display form of a quinella: smaller number first, no padding
///
/// ```
/// use keiba_odds::core::format_pair;
/// assert_eq!(format_pair(15, 1), "1-15");
/// ```
pub fn format_pair(a: u8, b: u8) -> String {
    format!("{}-{}", a.min(b), a.max(b))
}
