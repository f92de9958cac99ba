//! HTTP client for the search and recommendation providers.

use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::AppConfig,
    models::{Game, RatedGame},
};

/// Failure modes of a provider call.
///
/// Neither variant is retried; a failed request is terminal for the user
/// action that triggered it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a successful response.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Endpoint the request was sent to.
        url: String,
        /// Underlying transport or status error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body did not decode into the expected shape.
    #[error("failed to decode response from {url}: {source}")]
    MalformedResponse {
        /// Endpoint the response came from.
        url: String,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

/// Client for the two provider endpoints, sharing one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    search_limit: usize,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            search_limit: config.search_limit,
        })
    }

    /// Base address requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search for games by partial name.
    ///
    /// The candidate list is capped at the configured search limit even if
    /// the provider returns more.
    pub async fn search_games(&self, name: &str) -> Result<Vec<Game>, ApiError> {
        let url = format!("{}/search_game", self.base_url);
        debug!(%name, "searching games");
        let response = self
            .client
            .get(&url)
            .query(&[("name", name)])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        let mut games = response
            .json::<Vec<Game>>()
            .await
            .map_err(|source| ApiError::MalformedResponse { url, source })?;
        games.truncate(self.search_limit);
        Ok(games)
    }

    /// Request recommendations for a game-id to rating mapping.
    pub async fn recommend(
        &self,
        ratings: &HashMap<u64, f64>,
    ) -> Result<Vec<RatedGame>, ApiError> {
        let url = format!("{}/recommend", self.base_url);
        debug!(games = ratings.len(), "requesting recommendations");
        let response = self
            .client
            .post(&url)
            .json(ratings)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        response
            .json::<Vec<RatedGame>>()
            .await
            .map_err(|source| ApiError::MalformedResponse { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rating_payload_uses_decimal_id_keys() {
        let mut ratings = HashMap::new();
        ratings.insert(1u64, 8.0f64);
        let body = serde_json::to_value(&ratings).expect("serializable");
        assert_eq!(body, json!({"1": 8.0}));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let config = AppConfig {
            api_base_url: "http://127.0.0.1:8000/".to_string(),
            ..AppConfig::default()
        };
        let client = ApiClient::new(&config).expect("client builds");
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
    }
}
