//! Remote favorites service client.
//!
//! DESIGN
//! ======
//! `FavoritesApi` is the seam between the sync layer and the network, so
//! tests and alternative transports can stand in for HTTP. The `reqwest`
//! implementation is a thin wrapper; body decoding lives in `types` as pure
//! functions.
//!
//! Routes:
//! - `GET    {base}/favorites/{userIdentifier}`
//! - `POST   {base}/favorites` with `{"userIdentifier", "productId"}`
//! - `DELETE {base}/favorites/{userIdentifier}/{productId}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::types::{ApiError, FavoriteRequest, Product, RemoteAck, parse_ack, parse_product_list};
use crate::config::FavoritesConfig;
use crate::favorites::ProductId;
use crate::identity::UserIdentifier;

#[async_trait]
pub trait FavoritesApi: Send + Sync {
    /// Full product records the service holds as favorites for `user`.
    async fn list_favorites(&self, user: &UserIdentifier) -> Result<Vec<Product>, ApiError>;

    async fn add_favorite(&self, user: &UserIdentifier, product_id: ProductId) -> Result<RemoteAck, ApiError>;

    async fn remove_favorite(&self, user: &UserIdentifier, product_id: ProductId) -> Result<RemoteAck, ApiError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpFavoritesApi {
    http: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpFavoritesApi {
    pub fn new(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, ApiError> {
        let base_url = parse_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url, request_timeout })
    }

    pub fn from_config(config: &FavoritesConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.timeouts.request(), config.timeouts.connect())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(|e| self.request_error(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.request_error(&e))?;
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), body: text });
        }
        Ok(text)
    }

    fn request_error(&self, e: &reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.request_timeout)
        } else {
            ApiError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl FavoritesApi for HttpFavoritesApi {
    async fn list_favorites(&self, user: &UserIdentifier) -> Result<Vec<Product>, ApiError> {
        let url = endpoint(&self.base_url, &["favorites", user.as_str()])?;
        let body = self.send(self.http.get(url)).await?;
        parse_product_list(&body)
    }

    async fn add_favorite(&self, user: &UserIdentifier, product_id: ProductId) -> Result<RemoteAck, ApiError> {
        let url = endpoint(&self.base_url, &["favorites"])?;
        let payload = FavoriteRequest { user_identifier: user.as_str(), product_id };
        let body = self.send(self.http.post(url).json(&payload)).await?;
        parse_ack(&body)
    }

    async fn remove_favorite(&self, user: &UserIdentifier, product_id: ProductId) -> Result<RemoteAck, ApiError> {
        let product = product_id.to_string();
        let url = endpoint(&self.base_url, &["favorites", user.as_str(), &product])?;
        let body = self.send(self.http.delete(url)).await?;
        parse_ack(&body)
    }
}

// =============================================================================
// URL HELPERS
// =============================================================================

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim()).map_err(|e| ApiError::InvalidBaseUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(url)
}

/// Append percent-encoded `segments` to `base`.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ApiError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
