//! HTTP client for polling the aircraft-position feed.

use crate::types::{AircraftList, AircraftRecord};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL},
    Client, StatusCode,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned error status: {status}")]
    Status { status: StatusCode },
    #[error("malformed feed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Geographic filter: only aircraft within `radius` of a center coordinate.
#[derive(Debug, Clone, Copy)]
pub struct CenterFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

impl CenterFilter {
    pub fn new(latitude: f64, longitude: f64, radius: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius,
        }
    }

    fn to_query_string(&self) -> String {
        format!(
            "lat={}&lng={}&fDstL=0&fDstU={}",
            self.latitude, self.longitude, self.radius
        )
    }
}

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Provider endpoint returning an aircraft-list JSON document.
    pub provider_url: String,
    /// Optional center/radius filter appended to the query string.
    pub filter: Option<CenterFilter>,
    /// Request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(provider_url: String) -> Self {
        Self {
            provider_url,
            filter: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_filter(mut self, filter: CenterFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request_url(&self) -> String {
        match self.filter {
            Some(filter) => format!("{}?{}", self.provider_url, filter.to_query_string()),
            None => self.provider_url.clone(),
        }
    }
}

/// Client for fetching one feed snapshot per call.
///
/// Call spacing is the caller's job; this client only performs the request.
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    /// Create a new feed client.
    pub fn new(config: ClientConfig) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            url: config.request_url(),
        })
    }

    /// Fetch one snapshot of aircraft records.
    ///
    /// A non-success status and an undecodable body are both reported as
    /// errors the caller retries; neither is fatal.
    pub async fn fetch(&self) -> Result<Vec<AircraftRecord>, FeedError> {
        tracing::debug!("Fetching: {}", self.url);

        let response = self.client.get(&self.url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let list: AircraftList = serde_json::from_slice(&body)?;
                Ok(list.ac_list)
            }
            status => Err(FeedError::Status { status }),
        }
    }
}
