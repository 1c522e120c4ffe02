//! Live data source: the MHD realtime API.

mod basic;
mod client;
mod mhd;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use mhd::{MhdApi, decode_buses};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};

use crate::error::LiveSourceError;

/// Supplies the current batch of vehicle reports, once per refresh cycle.
///
/// Reports are returned undecoded so that one bad element only costs that
/// report; see [`crate::report::RawBusReport::from_value`].
#[async_trait]
pub trait LiveSource: Send + Sync {
    async fn fetch_reports(&self) -> Result<Vec<serde_json::Value>, LiveSourceError>;
}

/// POSTs `body` as JSON and returns the response bytes. Non-2xx responses
/// are errors carrying the status and body text.
pub async fn post_json<C: HttpClient>(
    client: &C,
    url: reqwest::Url,
    body: &impl serde::Serialize,
) -> Result<Vec<u8>, LiveSourceError> {
    let mut req = reqwest::Request::new(reqwest::Method::POST, url);
    req.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());

    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(LiveSourceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(resp.bytes().await?.to_vec())
}
