// src/services/users.rs

//! Per-user sub-resource fetcher.
//!
//! Profiles (one document per user) and likes (offset pages per user) run
//! through the same loop driver; they differ only in the query they send,
//! how a page is absorbed and what a 404 means.

use std::collections::HashSet;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;

use super::backoff::RetryState;
use super::client::{ForumClient, Outcome};
use super::cursor::OffsetCursor;
use super::payload::extract_items;
use crate::error::{AppError, Result};
use crate::models::{DirectoryItem, USERNAME_PLACEHOLDER, UserLikes, UserProfile};
use crate::utils::{endpoint_url, expand_template};

/// Field whose presence marks a profile as publicly visible.
pub const PROFILE_MARKER: &str = "user_badges";

const ACTIONS_POINTER: &str = "/user_actions";

/// Filter value selecting "likes given" actions.
const LIKES_FILTER: &str = "1";

/// What the driver does after a successful response.
enum Step {
    Next,
    Done,
}

/// Per-user state machine run by [`UserFetcher::drive`].
trait UserLoop {
    type Output;

    fn query(&self, username: &str) -> Vec<(&'static str, String)>;

    fn describe(&self, username: &str) -> String;

    fn on_page(&mut self, body: Value, context: &str) -> Result<Step>;

    fn on_not_found(&mut self, url: &str);

    fn finish(self, username: &str) -> Option<Self::Output>;
}

/// Single profile document.
#[derive(Default)]
struct ProfileLoop {
    document: Option<Value>,
}

impl UserLoop for ProfileLoop {
    type Output = UserProfile;

    fn query(&self, _username: &str) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn describe(&self, username: &str) -> String {
        format!("profile of {username}")
    }

    fn on_page(&mut self, body: Value, context: &str) -> Result<Step> {
        if body.get(PROFILE_MARKER).is_some() {
            self.document = Some(body);
        } else {
            log::debug!("Skipping {context}: profile is hidden");
        }
        Ok(Step::Done)
    }

    fn on_not_found(&mut self, url: &str) {
        log::error!("404 received for url {url}");
    }

    fn finish(self, username: &str) -> Option<UserProfile> {
        self.document.map(|document| UserProfile {
            username: username.to_string(),
            document,
        })
    }
}

/// Offset-paginated likes.
struct LikesLoop {
    cursor: OffsetCursor,
    actions: Vec<Value>,
}

impl LikesLoop {
    fn new(step: u32) -> Self {
        Self {
            cursor: OffsetCursor::new(step),
            actions: Vec::new(),
        }
    }
}

impl UserLoop for LikesLoop {
    type Output = UserLikes;

    fn query(&self, username: &str) -> Vec<(&'static str, String)> {
        vec![
            ("offset", self.cursor.offset.to_string()),
            ("username", username.to_string()),
            ("filter", LIKES_FILTER.to_string()),
        ]
    }

    fn describe(&self, username: &str) -> String {
        format!("likes of {username} at offset {}", self.cursor.offset)
    }

    fn on_page(&mut self, body: Value, context: &str) -> Result<Step> {
        let page: Vec<Value> = extract_items(&body, ACTIONS_POINTER, context)?;
        if page.is_empty() {
            return Ok(Step::Done);
        }
        self.actions.extend(page);
        self.cursor.advance();
        Ok(Step::Next)
    }

    fn on_not_found(&mut self, _url: &str) {}

    fn finish(self, username: &str) -> Option<UserLikes> {
        (!self.actions.is_empty()).then(|| UserLikes {
            username: username.to_string(),
            actions: self.actions,
        })
    }
}

/// Service for fetching per-user documents.
pub struct UserFetcher<'a, C: ?Sized> {
    client: &'a C,
    max_attempts: u32,
    likes_step: u32,
    concurrency: usize,
}

impl<'a, C: ForumClient + ?Sized> UserFetcher<'a, C> {
    pub fn new(client: &'a C, max_attempts: u32, likes_step: u32, concurrency: usize) -> Self {
        Self {
            client,
            max_attempts,
            likes_step,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch likes for every user at `url`.
    ///
    /// Users without any like are left out. Output keeps user order.
    pub async fn fetch_likes(&self, url: &str, users: &[DirectoryItem]) -> Result<Vec<UserLikes>> {
        log::info!("Retrieving likes data");
        let likes = self
            .fetch_each(users, "likes", |username| async move {
                self.drive(url, username, LikesLoop::new(self.likes_step))
                    .await
            })
            .await?;
        log::info!("Done retrieving all likes data for {} users", likes.len());
        Ok(likes)
    }

    /// Fetch the public profile of every user from the `{username}` path
    /// `template`.
    ///
    /// Hidden and missing profiles are left out. Output keeps user order.
    pub async fn fetch_profiles(
        &self,
        base_url: &str,
        template: &str,
        users: &[DirectoryItem],
    ) -> Result<Vec<UserProfile>> {
        log::info!("Retrieving profile data");
        let profiles = self
            .fetch_each(users, "profile", |username| async move {
                let url = endpoint_url(
                    base_url,
                    &expand_template(template, USERNAME_PLACEHOLDER, username)?,
                )?;
                self.drive(&url, username, ProfileLoop::default()).await
            })
            .await?;
        log::info!("Done retrieving all profile data for {} users", profiles.len());
        Ok(profiles)
    }

    /// Run `fetch` once per distinct username, keeping the `Some` results
    /// in user order.
    async fn fetch_each<'u, T, F, Fut>(
        &self,
        users: &'u [DirectoryItem],
        label: &str,
        fetch: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(&'u str) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let mut seen = HashSet::new();
        let usernames: Vec<&'u str> = users
            .iter()
            .map(DirectoryItem::username)
            .filter(|name| seen.insert(*name))
            .collect();
        let total = usernames.len();

        let results: Vec<Option<T>> = stream::iter(usernames.into_iter().enumerate())
            .map(|(index, username)| {
                let fut = fetch(username);
                async move {
                    let result = fut.await?;
                    if result.is_some() {
                        log::info!("Fetched {label} data for user {}/{total}: {username}", index + 1);
                    }
                    Ok::<_, AppError>(result)
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }

    /// Loop one user's requests until `state` is done or the user is skipped.
    async fn drive<L: UserLoop>(&self, url: &str, username: &str, mut state: L) -> Result<Option<L::Output>> {
        let mut retry = RetryState::default();

        loop {
            let context = state.describe(username);
            let query = state.query(username);

            match self.client.get(url, &query).await {
                Outcome::Ok(body) => {
                    retry.reset();
                    match state.on_page(body, &context)? {
                        Step::Next => continue,
                        Step::Done => break,
                    }
                }
                Outcome::NotFound => {
                    state.on_not_found(url);
                    break;
                }
                Outcome::RateLimited => {
                    retry
                        .back_off(self.max_attempts, &context, "Rate limited")
                        .await?;
                }
                Outcome::Retryable(reason) => {
                    log::error!("Request for {context} failed: {reason}");
                    retry.back_off(self.max_attempts, &context, &reason).await?;
                }
                Outcome::Fatal(reason) => return Err(AppError::unexpected_payload(context, reason)),
            }
        }

        Ok(state.finish(username))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::services::client::testing::ScriptedForum;

    const BASE: &str = "https://forum.test";
    const LIKES_URL: &str = "https://forum.test/user_actions.json";
    const PROFILE_TEMPLATE: &str = "/u/{username}.json";

    fn users(names: &[&str]) -> Vec<DirectoryItem> {
        names
            .iter()
            .map(|n| serde_json::from_value(json!({ "user": { "username": n } })).unwrap())
            .collect()
    }

    fn likes_key(username: &str, offset: u32) -> String {
        format!("{LIKES_URL}?filter=1&offset={offset}&username={username}")
    }

    fn profile_key(username: &str) -> String {
        format!("{BASE}/u/{username}.json")
    }

    fn actions(post_numbers: &[u64]) -> Value {
        let items: Vec<Value> = post_numbers
            .iter()
            .map(|n| json!({ "post_number": n, "action_type": 1 }))
            .collect();
        json!({ "user_actions": items })
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_with_empty_first_page_is_absent() {
        let forum = ScriptedForum::new().ok(&likes_key("bob", 0), actions(&[]));

        let likes = UserFetcher::new(&forum, 20, 30, 1)
            .fetch_likes(LIKES_URL, &users(&["bob"]))
            .await
            .unwrap();

        assert!(likes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_likes_accumulate_until_empty_page() {
        let forum = ScriptedForum::new()
            .ok(&likes_key("alice", 0), actions(&[1, 2]))
            .ok(&likes_key("alice", 30), actions(&[3]))
            .ok(&likes_key("alice", 60), actions(&[]))
            .ok(&likes_key("bob", 0), actions(&[]));

        let likes = UserFetcher::new(&forum, 20, 30, 1)
            .fetch_likes(LIKES_URL, &users(&["alice", "bob"]))
            .await
            .unwrap();

        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].username, "alice");
        assert_eq!(likes[0].actions.len(), 3);
        assert_eq!(forum.count(&likes_key("alice", 90)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_likes_not_found_ends_user_like_empty_page() {
        let forum = ScriptedForum::new()
            .ok(&likes_key("alice", 0), actions(&[1]))
            .route(&likes_key("alice", 30), vec![Outcome::NotFound])
            .ok(&likes_key("carol", 0), actions(&[5]))
            .ok(&likes_key("carol", 30), actions(&[]));

        let likes = UserFetcher::new(&forum, 20, 30, 1)
            .fetch_likes(LIKES_URL, &users(&["alice", "ghost", "carol"]))
            .await
            .unwrap();

        let names: Vec<&str> = likes.iter().map(|l| l.username.as_str()).collect();
        assert_eq!(names, ["alice", "carol"]);
        assert_eq!(likes[0].actions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_likes_rate_limit_retries_same_offset() {
        let forum = ScriptedForum::new()
            .ok(&likes_key("alice", 0), actions(&[1]))
            .route(
                &likes_key("alice", 30),
                vec![Outcome::RateLimited, Outcome::Ok(actions(&[]))],
            );

        let likes = UserFetcher::new(&forum, 20, 30, 1)
            .fetch_likes(LIKES_URL, &users(&["alice"]))
            .await
            .unwrap();

        assert_eq!(likes[0].actions.len(), 1);
        assert_eq!(forum.count(&likes_key("alice", 30)), 2);
        assert_eq!(forum.count(&likes_key("alice", 0)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_state_is_per_user() {
        // Budget of 3: each user fails twice, which only passes if the
        // count starts fresh for every user.
        let flaky = |body: Value| {
            vec![
                Outcome::Retryable("connection reset".into()),
                Outcome::RateLimited,
                Outcome::Ok(body),
            ]
        };
        let forum = ScriptedForum::new()
            .route(&likes_key("alice", 0), flaky(actions(&[])))
            .route(&likes_key("bob", 0), flaky(actions(&[])));

        let likes = UserFetcher::new(&forum, 3, 30, 1)
            .fetch_likes(LIKES_URL, &users(&["alice", "bob"]))
            .await
            .unwrap();
        assert!(likes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_likes_exhaustion_is_fatal() {
        let forum = ScriptedForum::new().route(
            &likes_key("alice", 0),
            vec![Outcome::Retryable("unexpected status 503".into())],
        );

        let err = UserFetcher::new(&forum, 2, 30, 1)
            .fetch_likes(LIKES_URL, &users(&["alice"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RetriesExhausted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_profiles_skip_hidden_and_missing() {
        let forum = ScriptedForum::new()
            .ok(
                &profile_key("alice"),
                json!({ "user": { "username": "alice" }, "user_badges": [] }),
            )
            .ok(&profile_key("bob"), json!({ "user": { "username": "bob" } }));

        let profiles = UserFetcher::new(&forum, 20, 30, 1)
            .fetch_profiles(BASE, PROFILE_TEMPLATE, &users(&["alice", "bob", "gone"]))
            .await
            .unwrap();

        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].username, "alice");
        assert_eq!(profiles[0].document["user"]["username"], "alice");
        assert_eq!(forum.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_rate_limit_retries() {
        let forum = ScriptedForum::new().route(
            &profile_key("alice"),
            vec![
                Outcome::RateLimited,
                Outcome::Ok(json!({ "user": { "username": "alice" }, "user_badges": [] })),
            ],
        );

        let profiles = UserFetcher::new(&forum, 20, 30, 1)
            .fetch_profiles(BASE, PROFILE_TEMPLATE, &users(&["alice"]))
            .await
            .unwrap();
        assert_eq!(profiles.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_username_fetched_once() {
        let forum = ScriptedForum::new().ok(&likes_key("alice", 0), actions(&[]));

        UserFetcher::new(&forum, 20, 30, 2)
            .fetch_likes(LIKES_URL, &users(&["alice", "alice"]))
            .await
            .unwrap();
        assert_eq!(forum.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_likes_keep_user_order() {
        let forum = ScriptedForum::new()
            .route(
                &likes_key("alice", 0),
                vec![Outcome::RateLimited, Outcome::Ok(actions(&[1]))],
            )
            .ok(&likes_key("bob", 0), actions(&[2]))
            .ok(&likes_key("carol", 0), actions(&[3]));

        let likes = UserFetcher::new(&forum, 20, 30, 3)
            .fetch_likes(LIKES_URL, &users(&["alice", "bob", "carol"]))
            .await
            .unwrap();

        let names: Vec<&str> = likes.iter().map(|l| l.username.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }
}
