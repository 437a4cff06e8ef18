//! Wire types and errors for the remote favorites service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::favorites::ProductId;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by remote favorites calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The base URL could not be parsed or cannot carry path segments.
    #[error("invalid favorites API base URL: {0}")]
    InvalidBaseUrl(String),

    /// The HTTP request failed before a response arrived.
    #[error("favorites request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("favorites service returned status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("favorites response parse failed: {0}")]
    Parse(String),

    /// No response within the configured bound.
    #[error("favorites request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidBaseUrl(_) => "E_INVALID_BASE_URL",
            Self::Request(_) => "E_API_REQUEST",
            Self::Status { .. } => "E_API_STATUS",
            Self::Parse(_) => "E_API_PARSE",
            Self::Timeout(_) => "E_API_TIMEOUT",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Timeout(_) | Self::Status { status: 408 | 429 | 500..=599, .. })
    }
}

// =============================================================================
// PRODUCTS
// =============================================================================

/// A product record as returned by the favorites listing.
///
/// Only `id` is interpreted; everything else is carried through untouched
/// for the page that renders it. Records keyed by `productId` are accepted;
/// when both keys are present `id` wins and `productId` stays in `details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Map<String, serde_json::Value>")]
pub struct Product {
    pub id: ProductId,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl Product {
    #[must_use]
    pub fn new(id: ProductId) -> Self {
        Self { id, details: serde_json::Map::new() }
    }

    /// Convenience accessor for string detail fields such as `name`.
    #[must_use]
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(serde_json::Value::as_str)
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for Product {
    type Error = String;

    fn try_from(mut details: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let raw = details
            .remove("id")
            .or_else(|| details.remove("productId"))
            .ok_or_else(|| "product record has no `id` or `productId`".to_owned())?;
        let id = serde_json::from_value(raw).map_err(|e| format!("invalid product id: {e}"))?;
        Ok(Self { id, details })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProductListBody {
    Bare(Vec<Product>),
    Wrapped { favorites: Vec<Product> },
}

/// Decode a list-by-user body: a bare array or `{"favorites": [...]}`.
pub fn parse_product_list(body: &str) -> Result<Vec<Product>, ApiError> {
    let parsed: ProductListBody = serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))?;
    Ok(match parsed {
        ProductListBody::Bare(products) | ProductListBody::Wrapped { favorites: products } => products,
    })
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// Acknowledgement of an add/remove call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAck {
    /// Membership after the call, when the service reports it.
    #[serde(default)]
    pub is_favorite: Option<bool>,
}

/// Decode an add/remove body. Empty bodies are a plain acknowledgement.
pub fn parse_ack(body: &str) -> Result<RemoteAck, ApiError> {
    if body.trim().is_empty() {
        return Ok(RemoteAck::default());
    }
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Request body for the add call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FavoriteRequest<'a> {
    pub user_identifier: &'a str,
    pub product_id: ProductId,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
