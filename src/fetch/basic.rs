use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    /// Client whose requests fail once `timeout` elapses, so a stalled API
    /// call only delays the next refresh.
    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
            .build()?;

        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
