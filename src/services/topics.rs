// src/services/topics.rs

//! Per-topic post fetcher.
//!
//! Each topic is paged independently from its declared post count. A 404
//! ends only that topic; everything else that cannot be retried aborts the
//! whole run.

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroU64;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;

use super::backoff::RetryState;
use super::client::{ForumClient, Outcome};
use super::payload::extract_items;
use crate::error::{AppError, Result};
use crate::models::{TOPIC_ID_PLACEHOLDER, Topic, TopicPosts};
use crate::utils::{endpoint_url, expand_template};

const POSTS_POINTER: &str = "/post_stream/posts";

/// Exclusive upper bound of the page range requested for a topic.
///
/// Pages `1..total_pages` are fetched, which covers `posts_count` posts.
pub fn total_pages(posts_count: u64, page_size: NonZeroU64) -> u64 {
    posts_count.div_ceil(page_size.get()) + 1
}

/// Service for fetching the posts of every topic.
pub struct TopicPostFetcher<'a, C: ?Sized> {
    client: &'a C,
    max_attempts: u32,
    page_size: NonZeroU64,
    concurrency: usize,
}

impl<'a, C: ForumClient + ?Sized> TopicPostFetcher<'a, C> {
    pub fn new(client: &'a C, max_attempts: u32, page_size: NonZeroU64, concurrency: usize) -> Self {
        Self {
            client,
            max_attempts,
            page_size,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch posts for every topic, keyed by topic id.
    ///
    /// `template` is the topic path containing `{topic_id}`. A topic id
    /// listed twice is fetched once.
    pub async fn fetch_all(
        &self,
        base_url: &str,
        template: &str,
        topics: &[Topic],
    ) -> Result<BTreeMap<u64, TopicPosts>> {
        let mut seen = HashSet::new();
        let unique: Vec<&Topic> = topics.iter().filter(|t| seen.insert(t.id)).collect();
        if unique.len() < topics.len() {
            log::debug!(
                "Skipping {} repeated topics in listing",
                topics.len() - unique.len()
            );
        }

        log::info!("Retrieving posts data");
        let total = unique.len();
        let posts: BTreeMap<u64, TopicPosts> = stream::iter(unique.into_iter().enumerate())
            .map(|(index, topic)| async move {
                log::info!("Currently at topic {} / {}", index + 1, total);
                let url = endpoint_url(
                    base_url,
                    &expand_template(template, TOPIC_ID_PLACEHOLDER, &topic.id.to_string())?,
                )?;
                let record = self.fetch_topic(&url, topic).await?;
                Ok::<_, AppError>((topic.id, record))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        log::info!("Done retrieving all posts for {} topics", posts.len());
        Ok(posts)
    }

    async fn fetch_topic(&self, url: &str, topic: &Topic) -> Result<TopicPosts> {
        let last_page = total_pages(topic.posts_count, self.page_size) - 1;
        let mut record = TopicPosts {
            category_id: topic.category_id,
            tags: topic.tags.clone(),
            posts: Vec::new(),
        };

        log::info!(
            "Topic {} has {} posts, total pages to fetch = {}",
            topic.id,
            topic.posts_count,
            last_page
        );

        for page in 1..=last_page {
            let context = format!("topic {} page {page}/{last_page}", topic.id);
            match self.fetch_page(url, page, &context).await? {
                Some(posts) => {
                    log::debug!("Fetched {context}");
                    record.posts.extend(posts);
                }
                None if page == last_page => {
                    log::debug!("404 received for {url} at last page {page}");
                    break;
                }
                None => {
                    log::warn!("404 received for {url} at page {page}; skipping rest of topic");
                    break;
                }
            }
        }

        Ok(record)
    }

    /// One page of a topic. `None` means the page does not exist.
    async fn fetch_page(&self, url: &str, page: u64, context: &str) -> Result<Option<Vec<Value>>> {
        let query = [("page", page.to_string())];
        let mut retry = RetryState::default();

        loop {
            match self.client.get(url, &query).await {
                Outcome::Ok(body) => return extract_items(&body, POSTS_POINTER, context).map(Some),
                Outcome::NotFound => return Ok(None),
                Outcome::RateLimited => {
                    retry
                        .back_off(self.max_attempts, context, "Rate limited")
                        .await?;
                }
                Outcome::Retryable(reason) => {
                    log::error!("Request for {context} failed: {reason}");
                    retry.back_off(self.max_attempts, context, &reason).await?;
                }
                Outcome::Fatal(reason) => return Err(AppError::unexpected_payload(context, reason)),
            }
        }
    }
}
