use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{HttpClient, LiveSource, post_json};
use crate::error::LiveSourceError;

#[derive(Serialize)]
struct BusesRequest<'a> {
    key: &'a str,
}

#[derive(Deserialize)]
struct BusesResponse {
    data: Vec<serde_json::Value>,
}

/// Client for `POST <api_root>/buses`, authenticated by an API key sent in
/// the request body.
pub struct MhdApi<C> {
    client: C,
    buses_url: reqwest::Url,
    api_key: String,
}

impl<C: HttpClient> MhdApi<C> {
    pub fn new(client: C, api_root: &str, api_key: String) -> Result<Self, LiveSourceError> {
        let url = format!("{}/buses", api_root.trim_end_matches('/'));
        let buses_url = reqwest::Url::parse(&url).map_err(|e| LiveSourceError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            buses_url,
            api_key,
        })
    }

    pub fn buses_url(&self) -> &reqwest::Url {
        &self.buses_url
    }
}

#[async_trait]
impl<C: HttpClient> LiveSource for MhdApi<C> {
    async fn fetch_reports(&self) -> Result<Vec<serde_json::Value>, LiveSourceError> {
        debug!(url = %self.buses_url, "Requesting bus positions");

        let body = post_json(
            &self.client,
            self.buses_url.clone(),
            &BusesRequest { key: &self.api_key },
        )
        .await?;

        let reports = decode_buses(&body)?;
        debug!(reports = reports.len(), "Bus positions received");

        Ok(reports)
    }
}

/// Decodes a `/buses` response body, `{"data": [...]}`. Only the envelope is
/// checked here; the elements are decoded per report during assembly.
pub fn decode_buses(bytes: &[u8]) -> Result<Vec<serde_json::Value>, LiveSourceError> {
    let resp: BusesResponse = serde_json::from_slice(bytes)?;
    Ok(resp.data)
}
