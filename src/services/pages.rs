// src/services/pages.rs

//! Flat listing fetcher.
//!
//! Requests numbered pages from 0 until the forum answers with an empty
//! page. Used for listings whose size is unknown up front.

use serde::de::DeserializeOwned;

use super::backoff::RetryState;
use super::client::{ForumClient, Outcome};
use super::cursor::PageCursor;
use super::payload::extract_items;
use crate::error::{AppError, Result};

/// Flat listings served page by page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Users,
    Topics,
}

impl Listing {
    pub fn label(self) -> &'static str {
        match self {
            Listing::Users => "users",
            Listing::Topics => "topics",
        }
    }

    /// Where the items sit in a page body.
    pub fn items_pointer(self) -> &'static str {
        match self {
            Listing::Users => "/directory_items",
            Listing::Topics => "/topic_list/topics",
        }
    }
}

/// Service for fetching a whole flat listing.
pub struct PageFetcher<'a, C: ?Sized> {
    client: &'a C,
    max_attempts: u32,
}

impl<'a, C: ForumClient + ?Sized> PageFetcher<'a, C> {
    pub fn new(client: &'a C, max_attempts: u32) -> Self {
        Self {
            client,
            max_attempts,
        }
    }

    /// Fetch every page of `listing` at `url`, in request order.
    pub async fn fetch_all<T: DeserializeOwned>(&self, url: &str, listing: Listing) -> Result<Vec<T>> {
        let label = listing.label();
        let mut fetched = Vec::new();
        let mut cursor = PageCursor::default();
        let mut retry = RetryState::default();

        log::info!("Retrieving raw {label} data");
        loop {
            let context = format!("{label} page {}", cursor.index);
            let query = [
                ("period", "all".to_string()),
                ("page", cursor.index.to_string()),
                ("order", "desc".to_string()),
            ];

            match self.client.get(url, &query).await {
                Outcome::Ok(body) => {
                    let items: Vec<T> = extract_items(&body, listing.items_pointer(), &context)?;
                    if items.is_empty() {
                        log::info!("Done retrieving all {label} data ({})", fetched.len());
                        return Ok(fetched);
                    }

                    log::info!("Fetched {} {label} at page: {}", items.len(), cursor.index);
                    fetched.extend(items);
                    cursor.advance();
                    retry.reset();
                }
                Outcome::RateLimited => {
                    retry
                        .back_off(self.max_attempts, &context, "Rate limited")
                        .await?;
                }
                Outcome::NotFound => {
                    log::error!("404 received for {label} listing at {url}");
                    return Err(AppError::NotFound {
                        url: url.to_string(),
                    });
                }
                Outcome::Retryable(reason) => {
                    log::error!("Request for {context} failed: {reason}");
                    retry.back_off(self.max_attempts, &context, &reason).await?;
                }
                Outcome::Fatal(reason) => {
                    return Err(AppError::unexpected_payload(context, reason));
                }
            }
        }
    }
}
