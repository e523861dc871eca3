// src/services/client.rs

//! Transport seam between the fetch loops and the forum API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::Result;
use crate::models::FetchConfig;
use crate::utils::http::create_async_client;

/// Classified result of one GET request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 2xx with a JSON body
    Ok(Value),
    /// 429
    RateLimited,
    /// 404
    NotFound,
    /// Transport failure or an unexpected status; worth retrying
    Retryable(String),
    /// Body that will never decode; retrying cannot help
    Fatal(String),
}

/// Something that can GET a forum URL and classify the response.
#[async_trait]
pub trait ForumClient: Send + Sync {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Outcome;
}

/// reqwest-backed [`ForumClient`].
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client for one community, with its session headers.
    pub fn new(config: &FetchConfig, headers: &BTreeMap<String, String>) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config, headers)?,
        })
    }

    fn classify_status(status: StatusCode) -> Option<Outcome> {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Some(Outcome::RateLimited),
            StatusCode::NOT_FOUND => Some(Outcome::NotFound),
            s if !s.is_success() => Some(Outcome::Retryable(format!("unexpected status {s}"))),
            _ => None,
        }
    }
}

#[async_trait]
impl ForumClient for HttpClient {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Outcome {
        let response = match self.client.get(url).query(query).send().await {
            Ok(response) => response,
            Err(e) => return Outcome::Retryable(e.to_string()),
        };

        if let Some(outcome) = Self::classify_status(response.status()) {
            return outcome;
        }

        match response.json::<Value>().await {
            Ok(body) => Outcome::Ok(body),
            Err(e) if e.is_decode() => Outcome::Fatal(format!("invalid JSON body: {e}")),
            Err(e) => Outcome::Retryable(e.to_string()),
        }
    }
}
