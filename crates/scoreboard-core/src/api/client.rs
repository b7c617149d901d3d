//! HTTP client for the remote event service.
//!
//! The service is a single script endpoint. Every call carries the action
//! name and a cache-busting timestamp in the query string; GET calls add
//! their parameters to the query string, POST/PUT calls send a JSON body.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Url};
use serde_json::Value;
use tracing::debug;

use super::{ApiError, ApiRequest, ApiResponse, DataSource};
use crate::config::Config;

/// Query parameter defeating intermediary caches.
const CACHE_BUSTER_PARAM: &str = "_t";

/// Placeholder for the encoded endpoint inside a proxy template.
/// Templates without it get the encoded endpoint appended.
const PROXY_URL_PLACEHOLDER: &str = "{url}";

/// Live data source backed by the remote endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct LiveSource {
    client: Client,
    api_url: String,
    proxy_url: Option<String>,
}

impl LiveSource {
    pub fn new(
        api_url: impl Into<String>,
        proxy_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            proxy_url: proxy_url.filter(|p| !p.trim().is_empty()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            config.api_url.clone(),
            config.proxy_url.clone(),
            config.request_timeout(),
        )
    }

    /// Endpoint URL, rewritten through the CORS proxy when one is configured.
    pub fn endpoint(&self) -> String {
        match self.proxy_url {
            Some(ref proxy) => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(self.api_url.as_bytes()).collect();
                if proxy.contains(PROXY_URL_PLACEHOLDER) {
                    proxy.replace(PROXY_URL_PLACEHOLDER, &encoded)
                } else {
                    format!("{}{}", proxy, encoded)
                }
            }
            None => self.api_url.clone(),
        }
    }

    /// Full request URL for `request`, stamped with `timestamp_ms`.
    pub fn build_url(&self, request: &ApiRequest, timestamp_ms: i64) -> Result<Url, ApiError> {
        let endpoint = self.endpoint();
        let mut url = Url::parse(&endpoint).map_err(|e| {
            ApiError::InvalidRequest(format!("Invalid endpoint URL {}: {}", endpoint, e))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", &request.action);
            if !request.method.has_body() {
                for (key, value) in request.params.query_pairs() {
                    query.append_pair(&key, &value);
                }
            }
            query.append_pair(CACHE_BUSTER_PARAM, &timestamp_ms.to_string());
        }

        Ok(url)
    }

    /// Check if response status is successful.
    fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(status))
        }
    }
}

#[async_trait]
impl DataSource for LiveSource {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.build_url(request, Utc::now().timestamp_millis())?;
        // Query strings may carry credentials, so only the action is logged
        debug!(action = %request.action, method = request.method.as_str(), "Sending request");

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(payload) = request.payload() {
            builder = builder.json(&payload);
        }

        let response = Self::check_response(builder.send().await?)?;
        let body = response.text().await?;

        let value: Value =
            serde_json::from_str(&body).map_err(|e| ApiError::unparseable(e, &body))?;

        ApiResponse::from_value(value)?.into_result()
    }
}
