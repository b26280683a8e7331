// traffic-monitor/src/fetcher.rs
use async_trait::async_trait;
use chrono::Utc;
use common::{Config, LogEntry, RawLogEntry};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;

/// Header marking requests as coming from the dashboard rather than an SDK
pub const DASHBOARD_HEADER: &str = "x-dashboard-request";

/// One page of historical log records
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entries: Vec<LogEntry>,
    pub total_pages: u32,
}

/// Wire shape of the collection endpoint's response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageResponse {
    /// Records decode one by one so a single bad record cannot sink the page
    #[serde(default)]
    logs: Vec<Value>,
    #[serde(default)]
    total_pages: Option<u32>,
}

impl PageResponse {
    fn into_page(self) -> Page {
        let now = Utc::now();
        let entries = self
            .logs
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<RawLogEntry>(record) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!("Skipping fetched record that is not an object: {}", e);
                    None
                }
            })
            .map(|raw| {
                let (entry, malformed) = raw.normalize(now);
                if let Some(report) = malformed {
                    tracing::warn!("Fetched entry normalized: {}", report);
                }
                entry
            })
            .collect();

        Page {
            entries,
            total_pages: self.total_pages.unwrap_or(1).max(1),
        }
    }
}

/// Source of historical log pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page. `token` is the caller's bearer credential.
    async fn fetch_page(
        &self,
        app_id: &str,
        page: u32,
        page_size: u32,
        token: Option<&str>,
    ) -> Result<Page, FetchError>;
}

/// Page fetcher backed by the firewall REST API
pub struct HttpPageFetcher {
    client: Client,
    config: Config,
}

impl HttpPageFetcher {
    pub fn new(config: Config) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(
        &self,
        app_id: &str,
        page: u32,
        page_size: u32,
        token: Option<&str>,
    ) -> Result<Page, FetchError> {
        let token = token.ok_or(FetchError::MissingCredential)?;
        let url = self.config.traffic_log_url(app_id)?;

        tracing::debug!("Fetching traffic logs for {} (page {}, limit {})", app_id, page, page_size);

        let response = self
            .client
            .get(url)
            .query(&[("page", page), ("limit", page_size)])
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .header(DASHBOARD_HEADER, "true")
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(FetchError::Unauthorized),
            status if !status.is_success() => return Err(FetchError::Status(status.as_u16())),
            _ => {}
        }

        let body = response.bytes().await?;
        let parsed: PageResponse =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(parsed.into_page())
    }
}
