//! Fetch, diff, and append status rows for every tracked bill.

use std::fmt;
use std::io::Write;

use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::types::{
    normalize_bill_id, BillQuery, Reading, Session, StatusRow, TrackedBill, UpstreamBill,
};

/// Upstream provider of bill histories
pub trait BillSource {
    fn fetch_bill(&mut self, query: &BillQuery) -> Result<UpstreamBill>;
}

/// Destination table store
pub trait BillStore {
    /// All tracked bills, sorted by bill identifier
    fn tracked_bills(&mut self) -> Result<Vec<TrackedBill>>;

    /// Append one row to the status table
    fn insert_status(&mut self, row: &StatusRow) -> Result<()>;
}

impl<S: BillSource + ?Sized> BillSource for &mut S {
    fn fetch_bill(&mut self, query: &BillQuery) -> Result<UpstreamBill> {
        (**self).fetch_bill(query)
    }
}

impl<T: BillStore + ?Sized> BillStore for &mut T {
    fn tracked_bills(&mut self) -> Result<Vec<TrackedBill>> {
        (**self).tracked_bills()
    }

    fn insert_status(&mut self, row: &StatusRow) -> Result<()> {
        (**self).insert_status(row)
    }
}

/// What a tracked bill needs, given its upstream record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillDiff {
    /// Nothing upstream is newer than the stored last update
    UpToDate,
    /// Rows to append, oldest action first
    Rows(Vec<StatusRow>),
}

/// Work out the status rows for actions newer than the bill's last update.
///
/// Without a stored last update the whole history is returned. The reading
/// stage is carried from one row to the next and only ever moves forward.
pub fn diff_bill(bill: &TrackedBill, upstream: &UpstreamBill, default_status: &str) -> BillDiff {
    let previous = bill.last_update;

    if let Some(previous) = previous {
        match upstream.last_action {
            Some(last) if last > previous => {}
            _ => return BillDiff::UpToDate,
        }
    }

    let status = bill
        .status
        .clone()
        .unwrap_or_else(|| default_status.to_string());
    let mut reading = bill.reading.clone();
    let mut rows = Vec::new();

    for action in &upstream.actions {
        if previous.is_some_and(|previous| action.date <= previous) {
            continue;
        }

        let next = Reading::advance(reading.take(), &action.tags);
        rows.push(StatusRow {
            bill: bill.record_id.clone(),
            status: status.clone(),
            notes: action.description.clone(),
            date: action.date,
            location: action.chamber,
            reading: next.clone(),
        });
        reading = Some(next);
    }

    BillDiff::Rows(rows)
}

/// Result of syncing one bill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillOutcome {
    NoUpdates,
    Updated(usize),
}

/// Per-bill line of the run report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillReport {
    /// Normalized bill identifier
    pub bill_id: String,
    pub outcome: BillOutcome,
}

impl BillReport {
    pub fn rows_inserted(&self) -> usize {
        match self.outcome {
            BillOutcome::NoUpdates => 0,
            BillOutcome::Updated(count) => count,
        }
    }
}

impl fmt::Display for BillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            BillOutcome::NoUpdates => write!(f, "{}: No updates", self.bill_id),
            BillOutcome::Updated(count) => write!(
                f,
                "{}: {} update{}",
                self.bill_id,
                count,
                if count == 1 { "" } else { "s" }
            ),
        }
    }
}

/// Totals for a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub bills: Vec<BillReport>,
    /// Rows without a bill identifier
    pub skipped: usize,
}

impl SyncSummary {
    pub fn rows_inserted(&self) -> usize {
        self.bills.iter().map(BillReport::rows_inserted).sum()
    }
}

/// Drives one synchronization run from `source` into `store`
pub struct BillSync<S, T> {
    source: S,
    store: T,
    jurisdiction: String,
    default_status: String,
    dataset_url: String,
}

impl<S: BillSource, T: BillStore> BillSync<S, T> {
    pub fn new(source: S, store: T, settings: &Settings) -> Self {
        Self {
            source,
            store,
            jurisdiction: settings.jurisdiction.clone(),
            default_status: settings.default_status.clone(),
            dataset_url: settings.dataset_url(),
        }
    }

    /// Sync every tracked bill, writing one report line per bill to `out`.
    ///
    /// Any fetch or store error ends the run; rows already inserted stay.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<SyncSummary> {
        let bills = self.store.tracked_bills()?;
        info!(count = bills.len(), jurisdiction = %self.jurisdiction, "syncing tracked bills");

        let mut summary = SyncSummary::default();
        for bill in &bills {
            match self.sync_bill(bill)? {
                Some(report) => {
                    writeln!(out, "{}", report)?;
                    summary.bills.push(report);
                }
                None => summary.skipped += 1,
            }
        }

        writeln!(out)?;
        writeln!(out, "See {}", self.dataset_url)?;

        info!(
            bills = summary.bills.len(),
            skipped = summary.skipped,
            rows = summary.rows_inserted(),
            "sync finished"
        );
        Ok(summary)
    }

    /// Sync a single bill. Returns `None` for rows without a bill identifier.
    pub fn sync_bill(&mut self, bill: &TrackedBill) -> Result<Option<BillReport>> {
        let Some(raw_id) = bill.identifier.as_deref().filter(|id| !id.trim().is_empty()) else {
            debug!(record = %bill.record_id, "row has no bill id, skipping");
            return Ok(None);
        };

        let bill_id = normalize_bill_id(raw_id);
        let year = bill.year_introduced.ok_or_else(|| Error::InvalidRecord {
            record: bill.record_id.clone(),
            reason: format!("{} has no year introduced", raw_id),
        })?;

        let query = BillQuery {
            jurisdiction: self.jurisdiction.clone(),
            session: Session::from_year(year),
            bill_id: bill_id.clone(),
        };
        let upstream = self.source.fetch_bill(&query)?;

        let outcome = match diff_bill(bill, &upstream, &self.default_status) {
            BillDiff::UpToDate => BillOutcome::NoUpdates,
            BillDiff::Rows(rows) => {
                for row in &rows {
                    self.store.insert_status(row)?;
                }
                BillOutcome::Updated(rows.len())
            }
        };

        Ok(Some(BillReport { bill_id, outcome }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chamber, UpstreamAction, SECOND_READING_TAG, THIRD_READING_TAG};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn action(on: &str, description: &str, actor: &str, tags: &[&str]) -> UpstreamAction {
        UpstreamAction {
            date: date(on),
            description: description.to_string(),
            chamber: Chamber::from_actor(Some(actor)),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn bill(last_update: Option<&str>) -> TrackedBill {
        TrackedBill {
            record_id: "recAB123".to_string(),
            identifier: Some("AB123".to_string()),
            year_introduced: Some(2023),
            last_update: last_update.map(date),
            reading: None,
            status: None,
        }
    }

    fn upstream() -> UpstreamBill {
        UpstreamBill {
            last_action: Some(date("2023-04-10")),
            actions: vec![
                action("2023-01-05", "Introduced. Read first time.", "lower", &[]),
                action("2023-02-01", "Read second time.", "lower", &[SECOND_READING_TAG]),
                action("2023-03-15", "Read third time. Passed.", "lower", &[THIRD_READING_TAG]),
                action("2023-04-10", "In Senate. Read first time.", "upper", &[]),
            ],
        }
    }

    fn rows(diff: BillDiff) -> Vec<StatusRow> {
        match diff {
            BillDiff::Rows(rows) => rows,
            BillDiff::UpToDate => panic!("expected rows"),
        }
    }

    #[test]
    fn test_full_history_without_previous_update() {
        let rows = rows(diff_bill(&bill(None), &upstream(), "Moving"));

        assert_eq!(rows.len(), 4);
        let readings: Vec<_> = rows.iter().map(|r| r.reading.label().to_string()).collect();
        assert_eq!(
            readings,
            ["First reading", "Second reading", "Third reading", "Third reading"]
        );
        assert_eq!(rows[0].status, "Moving");
        assert_eq!(rows[0].bill, "recAB123");
        assert_eq!(rows[0].notes, "Introduced. Read first time.");
        assert_eq!(rows[3].location, Chamber::Senate);
        assert_eq!(rows[2].location, Chamber::Assembly);
    }

    #[test]
    fn test_only_actions_after_last_update() {
        let mut tracked = bill(Some("2023-02-01"));
        tracked.reading = Some(Reading::Second);
        tracked.status = Some("Passed Assembly".to_string());

        let rows = rows(diff_bill(&tracked, &upstream(), "Moving"));

        // 2023-02-01 itself is already recorded
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.date > date("2023-02-01")));
        assert_eq!(rows[0].reading, Reading::Third);
        assert_eq!(rows[0].status, "Passed Assembly");
    }

    #[test]
    fn test_up_to_date_when_upstream_is_not_newer() {
        assert_eq!(
            diff_bill(&bill(Some("2023-04-10")), &upstream(), "Moving"),
            BillDiff::UpToDate
        );
        assert_eq!(
            diff_bill(&bill(Some("2024-01-01")), &upstream(), "Moving"),
            BillDiff::UpToDate
        );
    }

    #[test]
    fn test_no_upstream_last_action() {
        let empty = UpstreamBill {
            last_action: None,
            actions: vec![],
        };
        assert_eq!(
            diff_bill(&bill(Some("2023-01-01")), &empty, "Moving"),
            BillDiff::UpToDate
        );
        assert_eq!(diff_bill(&bill(None), &empty, "Moving"), BillDiff::Rows(vec![]));
    }

    #[test]
    fn test_report_pluralization() {
        let report = |outcome| BillReport {
            bill_id: "AB 123".to_string(),
            outcome,
        };
        assert_eq!(report(BillOutcome::NoUpdates).to_string(), "AB 123: No updates");
        assert_eq!(report(BillOutcome::Updated(0)).to_string(), "AB 123: 0 updates");
        assert_eq!(report(BillOutcome::Updated(1)).to_string(), "AB 123: 1 update");
        assert_eq!(report(BillOutcome::Updated(3)).to_string(), "AB 123: 3 updates");
    }
}
