//! Blocking client for the OpenStates v1 bill endpoint.

use std::collections::BTreeSet;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::BillSource;
use crate::types::{parse_date, BillQuery, Chamber, UpstreamAction, UpstreamBill};

const API_KEY_HEADER: &str = "X-API-KEY";

/// Bill detail response, as much of it as the sync needs
#[derive(Debug, Deserialize)]
pub struct BillResponse {
    pub action_dates: ActionDates,
    #[serde(default)]
    pub actions: Vec<ActionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ActionDates {
    #[serde(default)]
    pub last: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActionResponse {
    pub date: String,
    pub action: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(rename = "type", default)]
    pub types: Vec<String>,
}

impl BillResponse {
    /// Convert the wire shape into an [`UpstreamBill`], parsing every date.
    pub fn into_upstream(self) -> Result<UpstreamBill> {
        let last_action = self.action_dates.last.as_deref().map(parse_date).transpose()?;
        let actions = self
            .actions
            .into_iter()
            .map(|action| {
                Ok(UpstreamAction {
                    date: parse_date(&action.date)?,
                    chamber: Chamber::from_actor(action.actor.as_deref()),
                    description: action.action,
                    tags: action.types.into_iter().collect::<BTreeSet<_>>(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(UpstreamBill {
            last_action,
            actions,
        })
    }
}

/// Fetches bills from OpenStates
#[derive(Debug, Clone)]
pub struct OpenStatesClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenStatesClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(http: Client, config: &Config) -> Self {
        Self::new(
            http,
            config.settings.openstates_url.clone(),
            config.openstates_api_key.clone(),
        )
    }

    /// URL of the bill detail endpoint for `query`
    pub fn bill_url(&self, query: &BillQuery) -> Result<url::Url> {
        let jurisdiction = query.jurisdiction.to_lowercase();
        let session = query.session.key();

        let mut url = url::Url::parse(&format!("{}/", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("cannot use {} as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend([
                "bills",
                jurisdiction.as_str(),
                session.as_str(),
                query.bill_id.as_str(),
                "",
            ]);
        Ok(url)
    }
}

impl BillSource for OpenStatesClient {
    fn fetch_bill(&mut self, query: &BillQuery) -> Result<UpstreamBill> {
        let url = self.bill_url(query)?;
        debug!(%url, "fetching bill from OpenStates");

        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                service: "OpenStates",
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let body: BillResponse = response.json()?;
        body.into_upstream()
    }
}
