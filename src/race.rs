//! JRA race identifiers
//!
//! A race id is 12 digits. Only the last eight are used for navigation:
//!
//! ```text
//! 2025 05 04 10 07
//!      |  |  |  +-- race number
//!      |  |  +----- day of the meeting
//!      |  +-------- meeting number (kai)
//!      +----------- venue code
//! ```

use crate::error::RaceIdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Venue codes and names
pub fn get_venue_name(code: u8) -> Option<&'static str> {
    match code {
        1 => Some("札幌"),
        2 => Some("函館"),
        3 => Some("福島"),
        4 => Some("新潟"),
        5 => Some("東京"),
        6 => Some("中山"),
        7 => Some("中京"),
        8 => Some("京都"),
        9 => Some("阪神"),
        10 => Some("小倉"),
        _ => None,
    }
}

/// Validated 12-digit race identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RaceId {
    raw: String,
    venue_code: u8,
    meeting: u8,
    day: u8,
    race_no: u8,
}

impl RaceId {
    pub fn parse(raw: &str) -> Result<Self, RaceIdError> {
        let raw = raw.trim();
        if raw.len() != 12 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RaceIdError::Format(raw.to_string()));
        }

        // All ASCII digits, so two-byte slices always parse
        let field = |range: std::ops::Range<usize>| -> Result<u8, RaceIdError> {
            raw[range]
                .parse::<u8>()
                .map_err(|_| RaceIdError::Format(raw.to_string()))
        };

        let venue_code = field(4..6)?;
        if get_venue_name(venue_code).is_none() {
            return Err(RaceIdError::UnknownVenue(venue_code));
        }

        Ok(Self {
            raw: raw.to_string(),
            venue_code,
            meeting: field(6..8)?,
            day: field(8..10)?,
            race_no: field(10..12)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn venue_code(&self) -> u8 {
        self.venue_code
    }

    pub fn venue_name(&self) -> &'static str {
        // Checked in parse()
        get_venue_name(self.venue_code).unwrap_or_default()
    }

    pub fn meeting(&self) -> u8 {
        self.meeting
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn race_no(&self) -> u8 {
        self.race_no
    }

    /// Link text of the meeting on the odds index, e.g. "4回東京10日"
    pub fn meeting_name(&self) -> String {
        format!("{}回{}{}日", self.meeting, self.venue_name(), self.day)
    }

    /// Link text of the race, e.g. "7レース"
    pub fn race_name(&self) -> String {
        format!("{}レース", self.race_no)
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for RaceId {
    type Err = RaceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RaceId::parse(s)
    }
}

impl TryFrom<String> for RaceId {
    type Error = RaceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RaceId::parse(&value)
    }
}

impl From<RaceId> for String {
    fn from(id: RaceId) -> Self {
        id.raw
    }
}
