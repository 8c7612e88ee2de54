//! Blocking client for the Airtable REST API: the bills table is read,
//! the status table is appended to.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::BillStore;
use crate::types::{parse_date, Reading, StatusRow, TrackedBill, VALID_YEARS};

/// Field the bills table is keyed and sorted by
pub const BILL_FIELD: &str = "Bill";

/// One page of a list-records response
#[derive(Debug, Deserialize)]
pub struct RecordPage {
    pub records: Vec<BillRecord>,
    /// Cursor for the next page; absent on the last one
    #[serde(default)]
    pub offset: Option<String>,
}

/// A row of the bills table; Airtable leaves empty cells out entirely
#[derive(Debug, Deserialize)]
pub struct BillRecord {
    pub id: String,
    #[serde(default)]
    pub fields: BillFields,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillFields {
    #[serde(rename = "Bill")]
    pub bill: Option<String>,
    #[serde(rename = "Year introduced")]
    pub year_introduced: Option<YearValue>,
    #[serde(rename = "Last update")]
    pub last_update: Option<String>,
    #[serde(rename = "Reading")]
    pub reading: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

/// Year cells come back as numbers or, for text columns, strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum YearValue {
    Number(f64),
    Text(String),
}

impl YearValue {
    /// Whole years inside [`VALID_YEARS`]; anything else is unreadable.
    fn to_year(&self) -> Option<i32> {
        let year = match self {
            YearValue::Number(n) if n.fract() == 0.0 && n.abs() <= f64::from(i32::MAX) => {
                *n as i32
            }
            YearValue::Number(_) => return None,
            YearValue::Text(s) => s.trim().parse().ok()?,
        };
        VALID_YEARS.contains(&year).then_some(year)
    }
}

impl BillRecord {
    /// Validate the raw cells into a [`TrackedBill`]
    pub fn into_tracked(self) -> Result<TrackedBill> {
        let BillRecord { id, fields } = self;

        let year_introduced = match &fields.year_introduced {
            None => None,
            Some(value) => Some(value.to_year().ok_or_else(|| Error::InvalidRecord {
                record: id.clone(),
                reason: format!("unreadable year introduced: {:?}", value),
            })?),
        };

        let last_update = fields
            .last_update
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(|e| Error::InvalidRecord {
                record: id.clone(),
                reason: e.to_string(),
            })?;

        Ok(TrackedBill {
            identifier: non_blank(fields.bill),
            year_introduced,
            last_update,
            reading: fields.reading.as_deref().and_then(Reading::parse),
            status: non_blank(fields.status),
            record_id: id,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Body of a create-record request against the status table
#[derive(Debug, Serialize)]
pub struct NewStatusRecord<'a> {
    pub fields: StatusFields<'a>,
}

#[derive(Debug, Serialize)]
pub struct StatusFields<'a> {
    #[serde(rename = "Bill")]
    pub bill: [&'a str; 1],
    #[serde(rename = "Status")]
    pub status: &'a str,
    #[serde(rename = "Status notes")]
    pub notes: &'a str,
    #[serde(rename = "Date last status change")]
    pub date: String,
    #[serde(rename = "Location")]
    pub location: &'a str,
    #[serde(rename = "Reading")]
    pub reading: &'a str,
}

impl<'a> From<&'a StatusRow> for NewStatusRecord<'a> {
    fn from(row: &'a StatusRow) -> Self {
        Self {
            fields: StatusFields {
                bill: [&row.bill],
                status: &row.status,
                notes: &row.notes,
                date: row.date.format("%Y-%m-%d").to_string(),
                location: row.location.as_str(),
                reading: row.reading.label(),
            },
        }
    }
}

/// Reads tracked bills from one table and appends status rows to another
#[derive(Debug, Clone)]
pub struct AirtableClient {
    http: Client,
    base_url: String,
    api_key: String,
    base_id: String,
    bills_table: String,
    updates_table: String,
}

impl AirtableClient {
    pub fn from_config(http: Client, config: &Config) -> Self {
        let settings = &config.settings;
        Self {
            http,
            base_url: settings.airtable_url.trim_end_matches('/').to_string(),
            api_key: config.airtable_api_key.clone(),
            base_id: settings.airtable_base_id.clone(),
            bills_table: settings.bills_table.clone(),
            updates_table: settings.updates_table.clone(),
        }
    }

    /// URL of a table endpoint; table names may contain spaces
    pub fn table_url(&self, table: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&format!("{}/", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("cannot use {} as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend([self.base_id.as_str(), table]);
        Ok(url)
    }

    fn list_page(&self, offset: Option<&str>) -> Result<RecordPage> {
        let url = self.table_url(&self.bills_table)?;
        let mut query = vec![
            ("sort[0][field]", BILL_FIELD),
            ("sort[0][direction]", "asc"),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }
        debug!(%url, ?offset, "listing tracked bills");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()?;
        Ok(check(response)?.json()?)
    }
}

fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Api {
            service: "Airtable",
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        })
    }
}

impl BillStore for AirtableClient {
    fn tracked_bills(&mut self) -> Result<Vec<TrackedBill>> {
        let mut bills = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.list_page(offset.as_deref())?;
            for record in page.records {
                bills.push(record.into_tracked()?);
            }
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(bills)
    }

    fn insert_status(&mut self, row: &StatusRow) -> Result<()> {
        let url = self.table_url(&self.updates_table)?;
        debug!(%url, bill = %row.bill, date = %row.date, "inserting status row");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&NewStatusRecord::from(row))
            .send()?;
        check(response)?;
        Ok(())
    }
}
