use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::app::{FeedSyncError, Result};
use crate::config::ApiConfig;
use crate::domain::{FeedAdapter, FeedItem, FeedPage, ItemId, ReactionUpdate};
use crate::fetcher::{Mutator, PageFetcher};
use crate::normalizer::Normalizer;

pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    normalizer: Normalizer,
}

impl HttpFetcher {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&config.base_url)?,
            normalizer: Normalizer::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = endpoint(&self.base_url, path)?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        response.error_for_status_ref()?;

        let bytes = response.bytes().await?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| FeedSyncError::MalformedResponse(e.to_string()))?;

        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("success: false");
            return Err(FeedSyncError::Rejected(message.to_string()));
        }

        Ok(value)
    }
}

/// Resolve `path` under `base`, keeping any path prefix the base carries.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

pub fn page_url(base: &Url, adapter: &FeedAdapter, page: u32, page_size: usize) -> Result<Url> {
    let mut url = endpoint(base, &adapter.list_path)?;
    url.query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("limit", &page_size.to_string());
    Ok(url)
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, adapter: &FeedAdapter, page: u32, page_size: usize) -> Result<FeedPage> {
        let url = page_url(&self.base_url, adapter, page, page_size)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        response.error_for_status_ref()?;

        let body = response.bytes().await?;
        let (items, received) = self.normalizer.normalize_page(adapter, &body)?;

        Ok(FeedPage {
            items,
            received,
            requested_page: page,
            page_size,
        })
    }
}

#[async_trait]
impl Mutator for HttpFetcher {
    async fn post_reaction(
        &self,
        adapter: &FeedAdapter,
        item_id: &ItemId,
        user_id: &str,
        reaction: &str,
    ) -> Result<ReactionUpdate> {
        let path = adapter.reaction_path.as_deref().ok_or_else(|| {
            FeedSyncError::Unsupported(format!("{} does not take reactions", adapter.kind))
        })?;

        let body = adapter.reaction_body(item_id, user_id, reaction);
        let response = self.post_json(path, &body).await?;

        self.normalizer
            .reaction_update(&adapter.fields, &response)
            .ok_or_else(|| FeedSyncError::MalformedResponse("reaction response without counts".into()))
    }

    async fn post_comment(&self, adapter: &FeedAdapter, user_id: &str, text: &str) -> Result<Option<FeedItem>> {
        let (path, body) = adapter.comment_request(user_id, text).ok_or_else(|| {
            FeedSyncError::Unsupported(format!("{} does not take comments", adapter.kind))
        })?;

        let response = self.post_json(&path, &body).await?;
        Ok(self.normalizer.created_item(&adapter.fields, &response))
    }
}
