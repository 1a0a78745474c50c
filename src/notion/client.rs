//! HTTP client for the Notion API

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{DocumentSource, MAX_PAGE_SIZE, RawBlock, RichText};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::model::Page;

const NOTION_VERSION_HEADER: &str = "Notion-Version";
const UNTITLED: &str = "Untitled";

/// One page of a paginated Notion response
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    results: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl NotionClient {
    /// Build a client from configuration; an API key is required
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .notion
            .api_key
            .as_deref()
            .ok_or_else(|| SyncError::Config("NOTION_API_KEY is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| SyncError::Config(format!("invalid Notion API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            NOTION_VERSION_HEADER,
            HeaderValue::from_str(&config.notion.version)
                .map_err(|e| SyncError::Config(format!("invalid Notion version: {e}")))?,
        );

        let timeout = config.notion_timeout();
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.notion.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        target: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<ListResponse<T>> {
        let response = request.send().await.map_err(|e| self.fetch_error(target, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::RemoteFetch {
                target: target.to_string(),
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let page: ListResponse<T> = response
            .json()
            .await
            .map_err(|e| self.fetch_error(target, e))?;
        if page.has_more {
            warn!(
                what = target,
                returned = page.results.len(),
                "Notion reported more results than one page; only the first page is used"
            );
        }
        Ok(page)
    }

    fn fetch_error(&self, target: &str, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            return SyncError::Timeout {
                operation: format!("fetching {target}"),
                after: self.timeout,
            };
        }
        SyncError::RemoteFetch {
            target: target.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl DocumentSource for NotionClient {
    async fn search_pages(&self, page_size: u32) -> Result<Vec<Page>> {
        let body = json!({
            "filter": { "value": "page", "property": "object" },
            "page_size": page_size.min(MAX_PAGE_SIZE),
        });
        let request = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&body);

        let response: ListResponse<Value> = self.send("pages", request).await?;
        let pages: Vec<Page> = response.results.iter().filter_map(page_from_result).collect();
        info!(count = pages.len(), "Loaded pages from Notion");
        Ok(pages)
    }

    async fn list_block_children(&self, block_id: &str, page_size: u32) -> Result<Vec<RawBlock>> {
        let request = self
            .http
            .get(format!("{}/blocks/{}/children", self.base_url, block_id))
            .query(&[("page_size", page_size.min(MAX_PAGE_SIZE))]);

        let target = format!("blocks of {block_id}");
        let response: ListResponse<RawBlock> = self.send(&target, request).await?;
        debug!(block_id, count = response.results.len(), "Loaded block children");
        Ok(response.results)
    }
}

/// Extract a page's id and title from a search result
///
/// The title lives at `properties.title.title[*]`; results without an id are
/// not pages and are skipped.
pub(crate) fn page_from_result(result: &Value) -> Option<Page> {
    let id = result.get("id")?.as_str()?.to_string();

    let runs: Vec<RichText> = result
        .pointer("/properties/title/title")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let title: String = runs.iter().map(RichText::content).collect();

    Some(Page {
        id,
        title: if title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            title
        },
    })
}
