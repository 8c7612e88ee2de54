use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Action type tag marking a second reading
pub const SECOND_READING_TAG: &str = "bill:reading:2";
/// Action type tag marking a third reading
pub const THIRD_READING_TAG: &str = "bill:reading:3";

/// A row of the bills table, validated at ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedBill {
    /// Destination record id; status rows link back to it
    pub record_id: String,
    /// Bill identifier as typed in the table, e.g. "AB123"
    pub identifier: Option<String>,
    pub year_introduced: Option<i32>,
    pub last_update: Option<NaiveDate>,
    pub reading: Option<Reading>,
    pub status: Option<String>,
}

/// Re-format a bill identifier the way the upstream API wants it:
/// letters, a space, then digits. Anything else is returned unchanged.
pub fn normalize_bill_id(raw: &str) -> String {
    static BILL_ID: OnceLock<Regex> = OnceLock::new();
    let re = BILL_ID.get_or_init(|| Regex::new(r"^([A-Z]+)(\d+)$").expect("bill id pattern"));
    re.replace(raw, "$1 $2").into_owned()
}

/// Years a tracked bill may have been introduced in
pub const VALID_YEARS: RangeInclusive<i32> = 1000..=9999;

/// Two-year legislative session, labelled e.g. "20232024"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Widened so the label of any `i32` year is computable
    pub start: i64,
}

impl Session {
    /// Odd years open a session; even years close the one opened the year before.
    pub fn from_year(year: i32) -> Self {
        let year = i64::from(year);
        if year % 2 != 0 {
            Session { start: year }
        } else {
            Session { start: year - 1 }
        }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.start, self.start + 1)
    }
}

/// Procedural stage of a bill.
///
/// Values the table holds that are not one of the three readings are kept
/// verbatim in `Other` and never advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    First,
    Second,
    Third,
    Other(String),
}

impl Reading {
    /// Parse a stored table value; blank means no stage has been recorded.
    pub fn parse(value: &str) -> Option<Reading> {
        match value {
            "" => None,
            "First reading" => Some(Reading::First),
            "Second reading" => Some(Reading::Second),
            "Third reading" => Some(Reading::Third),
            other => Some(Reading::Other(other.to_string())),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Reading::First => "First reading",
            Reading::Second => "Second reading",
            Reading::Third => "Third reading",
            Reading::Other(label) => label,
        }
    }

    /// Stage after an action carrying `tags`, starting from `current`.
    pub fn advance(current: Option<Reading>, tags: &BTreeSet<String>) -> Reading {
        let mut reading = current.unwrap_or(Reading::First);
        if reading == Reading::First && tags.contains(SECOND_READING_TAG) {
            reading = Reading::Second;
        }
        if reading == Reading::Second && tags.contains(THIRD_READING_TAG) {
            reading = Reading::Third;
        }
        reading
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Legislative body an action originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chamber {
    Assembly,
    Senate,
}

impl Chamber {
    /// `lower` is the Assembly; every other actor code is the Senate.
    pub fn from_actor(actor: Option<&str>) -> Self {
        match actor {
            Some("lower") => Chamber::Assembly,
            _ => Chamber::Senate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::Assembly => "Assembly",
            Chamber::Senate => "Senate",
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current upstream record of a bill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamBill {
    /// Date of the most recent action, if upstream has any
    pub last_action: Option<NaiveDate>,
    /// Full action history in upstream order
    pub actions: Vec<UpstreamAction>,
}

/// One historical event on a bill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamAction {
    pub date: NaiveDate,
    pub description: String,
    pub chamber: Chamber,
    pub tags: BTreeSet<String>,
}

/// Parameters identifying a bill upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillQuery {
    pub jurisdiction: String,
    pub session: Session,
    pub bill_id: String,
}

/// Row appended to the status table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    /// Record id of the tracked bill
    pub bill: String,
    pub status: String,
    pub notes: String,
    pub date: NaiveDate,
    pub location: Chamber,
    pub reading: Reading,
}

/// Parse an ISO date, ignoring any time component
/// ("2023-02-14 00:00:00" and "2023-02-14T08:00:00Z" both yield 2023-02-14).
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let date = value
        .trim()
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or_default();
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| Error::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_normalize_bill_id() {
        assert_eq!(normalize_bill_id("AB123"), "AB 123");
        assert_eq!(normalize_bill_id("SCR7"), "SCR 7");
        // Not letters-then-digits: passed through as-is
        assert_eq!(normalize_bill_id("AB 123"), "AB 123");
        assert_eq!(normalize_bill_id("ab123"), "ab123");
        assert_eq!(normalize_bill_id("AB123X"), "AB123X");
    }

    #[test]
    fn test_session_key() {
        assert_eq!(Session::from_year(2023).key(), "20232024");
        assert_eq!(Session::from_year(2024).key(), "20232024");
        assert_eq!(Session::from_year(2019).to_string(), "20192020");
    }

    #[test]
    fn test_session_key_at_year_limits() {
        assert_eq!(Session::from_year(i32::MAX).key(), "21474836472147483648");
        assert_eq!(Session::from_year(i32::MIN).key(), "-2147483649-2147483648");
    }

    #[test]
    fn test_reading_never_regresses() {
        let sequence = [
            tags(&[SECOND_READING_TAG]),
            tags(&[THIRD_READING_TAG]),
            tags(&[SECOND_READING_TAG]),
        ];
        let mut reading = Some(Reading::First);
        let mut seen = Vec::new();
        for action_tags in &sequence {
            let next = Reading::advance(reading.take(), action_tags);
            seen.push(next.label().to_string());
            reading = Some(next);
        }
        assert_eq!(seen, ["Second reading", "Third reading", "Third reading"]);
    }

    #[test]
    fn test_reading_skips_are_not_allowed() {
        // A third-reading tag on a bill still in first reading does nothing
        let reading = Reading::advance(Some(Reading::First), &tags(&[THIRD_READING_TAG]));
        assert_eq!(reading, Reading::First);

        // Both tags at once move through both stages
        let reading = Reading::advance(
            None,
            &tags(&[SECOND_READING_TAG, THIRD_READING_TAG]),
        );
        assert_eq!(reading, Reading::Third);
    }

    #[test]
    fn test_reading_other_labels_are_kept() {
        let stored = Reading::parse("Enrolled");
        let reading = Reading::advance(stored, &tags(&[SECOND_READING_TAG]));
        assert_eq!(reading.label(), "Enrolled");
        assert_eq!(Reading::parse(""), None);
    }

    #[test]
    fn test_chamber_mapping() {
        assert_eq!(Chamber::from_actor(Some("lower")), Chamber::Assembly);
        assert_eq!(Chamber::from_actor(Some("upper")), Chamber::Senate);
        assert_eq!(Chamber::from_actor(Some("executive")), Chamber::Senate);
        assert_eq!(Chamber::from_actor(None), Chamber::Senate);
    }

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2023, 2, 14).unwrap();
        assert_eq!(parse_date("2023-02-14 00:00:00").unwrap(), expected);
        assert_eq!(parse_date("2023-02-14T08:00:00Z").unwrap(), expected);
        assert_eq!(parse_date("2023-02-14").unwrap(), expected);
        assert!(matches!(parse_date("Feb 14"), Err(Error::InvalidDate(_))));
    }
}
