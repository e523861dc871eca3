// src/pipeline/acquire.rs

//! Snapshot acquisition pipeline.

use std::num::NonZeroU64;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{AcquisitionStats, Community, Config, DirectoryItem, Endpoints, FetchConfig, RawDataset, Topic};
use crate::services::{ForumClient, HttpClient, Listing, PageFetcher, TopicPostFetcher, UserFetcher};
use crate::utils::endpoint_url;

const TOTAL_STEPS: usize = 5;

/// Drives the fetch strategies in order and assembles a [`RawDataset`].
///
/// Never retries on its own; any error a strategy reports aborts the run.
pub struct Acquirer<C> {
    client: C,
    fetch: FetchConfig,
    topic_page_size: NonZeroU64,
}

impl<C: ForumClient> Acquirer<C> {
    /// Fails if `fetch` does not pass [`FetchConfig::validate`].
    pub fn new(client: C, fetch: FetchConfig) -> Result<Self> {
        fetch.validate()?;
        let topic_page_size = NonZeroU64::new(fetch.topic_page_size)
            .ok_or_else(|| AppError::validation("fetch.topic_page_size must be > 0"))?;
        Ok(Self {
            client,
            fetch,
            topic_page_size,
        })
    }

    /// Acquire the full dataset of the forum at `base_url`.
    pub async fn acquire(&self, base_url: &str, endpoints: &Endpoints) -> Result<RawDataset> {
        let fetch = &self.fetch;
        let pages = PageFetcher::new(&self.client, fetch.max_attempts);

        log::info!("[STEP 1/{TOTAL_STEPS}] Users");
        let users: Vec<DirectoryItem> = pages
            .fetch_all(&endpoint_url(base_url, &endpoints.users)?, Listing::Users)
            .await?;

        log::info!("[STEP 2/{TOTAL_STEPS}] Topics");
        let topics: Vec<Topic> = pages
            .fetch_all(&endpoint_url(base_url, &endpoints.topics)?, Listing::Topics)
            .await?;

        log::info!("[STEP 3/{TOTAL_STEPS}] Posts");
        let posts = TopicPostFetcher::new(
            &self.client,
            fetch.max_attempts,
            self.topic_page_size,
            fetch.max_concurrent,
        )
        .fetch_all(base_url, &endpoints.topic_posts, &topics)
        .await?;

        let user_fetcher = UserFetcher::new(
            &self.client,
            fetch.max_attempts,
            fetch.likes_page_step,
            fetch.max_concurrent,
        );

        log::info!("[STEP 4/{TOTAL_STEPS}] Likes");
        let likes = user_fetcher
            .fetch_likes(&endpoint_url(base_url, &endpoints.likes)?, &users)
            .await?;

        log::info!("[STEP 5/{TOTAL_STEPS}] Profiles");
        let profiles = user_fetcher
            .fetch_profiles(base_url, &endpoints.profile, &users)
            .await?;

        let dataset = RawDataset {
            users,
            topics,
            posts,
            likes,
            profiles,
        };
        dataset.check_integrity()?;
        Ok(dataset)
    }
}

/// Acquire one configured community over HTTP.
pub async fn run_acquire(config: &Config, community: &Community) -> Result<(RawDataset, AcquisitionStats)> {
    config.validate()?;
    let start_time = Utc::now();
    log::info!("Acquiring {} from {}", community.name, community.base_url);

    let client = HttpClient::new(&config.fetch, &community.headers)?;
    let acquirer = Acquirer::new(client, config.fetch.clone())?;
    let dataset = acquirer.acquire(&community.base_url, &config.endpoints).await?;

    let stats = AcquisitionStats::new(&community.name, start_time, Utc::now(), &dataset)?;
    log::info!(
        "Acquired {} users, {} topics, {} posts, likes for {} users, {} profiles in {}s",
        stats.user_count,
        stats.topic_count,
        stats.post_count,
        stats.liking_user_count,
        stats.profile_count,
        stats.elapsed_secs()
    );

    Ok((dataset, stats))
}
