// src/pipeline/format.rs

//! Per-user activity view of a raw snapshot.
//!
//! Joins every listed user with the topics they opened, the replies they
//! wrote and the likes they gave, in the shape the scoring stage reads.
//! Admin action posts (closing, listing, pinning) carry an `action_code`
//! and are ignored throughout.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{DirectoryItem, RawDataset, Topic, TopicPosts};

/// Quote blocks referencing a topic's opening post.
const OPENING_QUOTE_SELECTOR: &str = r#"aside.quote.no-group[data-post="1"]"#;

/// Discourse post action type for likes.
const LIKE_ACTION_ID: u64 = 2;

/// Everything one user did in the community.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserActivity {
    pub user: UserSummary,
    pub topics: Vec<TopicActivity>,
    pub posts: Vec<PostActivity>,
    pub likes: Vec<LikeGiven>,
}

/// Directory statistics of a user, plus the join date from their profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub username: String,
    pub user_id: Option<u64>,
    pub name: Option<String>,
    pub trust_level: Option<u64>,
    pub topics_entered: Option<u64>,
    pub posts_read: Option<u64>,
    pub days_visited: Option<u64>,
    pub time_read: Option<u64>,
    /// `None` when the profile is hidden
    pub join_date: Option<NaiveDate>,
}

/// A topic opened by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicActivity {
    pub topic_id: u64,
    pub topic_title: Option<String>,
    pub date: Option<String>,
    pub view_count: Option<u64>,
    pub read_count: Option<u64>,
    pub post_count: u64,
    pub like_count: u64,
    pub category_id: Option<u64>,
    pub tags: Option<Vec<String>>,
    /// Posts in the thread quoting the opening post
    pub quote_count: usize,
    pub reply_count: u64,
    pub last_posted_at: Option<String>,
    pub participant_count: usize,
    /// Posters first, then likers, each listed once
    pub participant_list: Vec<String>,
    pub body: Option<String>,
    pub url: String,
}

/// A reply written by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostActivity {
    pub topic_id: u64,
    pub topic_title: Option<String>,
    pub topic_created_date: Option<String>,
    pub topic_creator: Option<String>,
    pub date: Option<String>,
    pub post_number: u64,
    pub like_count: u64,
    pub body: Option<String>,
    pub category_id: Option<u64>,
    pub tags: Option<Vec<String>>,
    pub post_creator: String,
    pub reply_count: u64,
    pub reply_to_post_number: Option<u64>,
    pub reply_to_post_number_created_date: Option<String>,
    pub reply_to_post_username: Option<String>,
    pub url: String,
}

/// A like the user gave.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LikeGiven {
    pub like_given_to: Option<String>,
    pub like_given_to_id: Option<u64>,
    pub date: Option<String>,
    pub topic_id: Option<u64>,
    pub post_number: Option<u64>,
}

fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_owned)
}

fn number(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_u64)
}

fn field<'v>(map: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    map.get(key)
}

/// Likes received by a post, from its action summary.
fn like_count(post: &Value) -> u64 {
    post.get("actions_summary")
        .and_then(Value::as_array)
        .and_then(|actions| {
            actions
                .iter()
                .find(|a| number(a.get("id")) == Some(LIKE_ACTION_ID))
        })
        .and_then(|a| number(a.get("count")))
        .unwrap_or(0)
}

fn is_action_post(post: &Value) -> bool {
    post.get("action_code").is_some()
}

impl UserSummary {
    fn new(item: &DirectoryItem, profile: Option<&Value>) -> Self {
        let join_date = profile
            .and_then(|p| p.pointer("/user/created_at"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.date_naive());

        Self {
            username: item.username().to_string(),
            user_id: number(field(&item.extra, "id")),
            name: text(field(&item.user.extra, "name")).filter(|n| !n.is_empty()),
            trust_level: number(field(&item.user.extra, "trust_level")),
            topics_entered: number(field(&item.extra, "topics_entered")),
            posts_read: number(field(&item.extra, "posts_read")),
            days_visited: number(field(&item.extra, "days_visited")),
            time_read: number(field(&item.extra, "time_read")),
            join_date,
        }
    }
}

impl LikeGiven {
    fn from_action(action: &Value) -> Self {
        Self {
            like_given_to: text(action.get("username")),
            like_given_to_id: number(action.get("user_id")),
            date: text(action.get("created_at")),
            topic_id: number(action.get("topic_id")),
            post_number: number(action.get("post_number")),
        }
    }
}

#[derive(Default)]
struct Authored {
    topics: Vec<TopicActivity>,
    posts: Vec<PostActivity>,
}

/// Builds [`UserActivity`] records from one community's [`RawDataset`].
pub struct ActivityFormatter<'a> {
    dataset: &'a RawDataset,
    base_url: &'a str,
    opening_quote: Selector,
}

impl<'a> ActivityFormatter<'a> {
    /// `base_url` is the forum root used to build topic and post links.
    pub fn new(dataset: &'a RawDataset, base_url: &'a str) -> Result<Self> {
        let opening_quote = Selector::parse(OPENING_QUOTE_SELECTOR)
            .map_err(|e| AppError::selector(OPENING_QUOTE_SELECTOR, format!("{e:?}")))?;
        Ok(Self {
            dataset,
            base_url: base_url.trim_end_matches('/'),
            opening_quote,
        })
    }

    /// One record per distinct listed user, in directory order.
    pub fn format(&self) -> Vec<UserActivity> {
        let dataset = self.dataset;
        let topics: HashMap<u64, &Topic> = dataset.topics.iter().map(|t| (t.id, t)).collect();
        let profiles: HashMap<&str, &Value> = dataset
            .profiles
            .iter()
            .map(|p| (p.username.as_str(), &p.document))
            .collect();
        let likes: HashMap<&str, &[Value]> = dataset
            .likes
            .iter()
            .map(|l| (l.username.as_str(), l.actions.as_slice()))
            .collect();

        let mut authored: HashMap<&str, Authored> = HashMap::new();
        for (&topic_id, thread) in &dataset.posts {
            match topics.get(&topic_id) {
                Some(topic) => self.collect_thread(topic, thread, &mut authored),
                None => log::warn!("Skipping posts of unlisted topic {topic_id}"),
            }
        }

        let mut seen = HashSet::new();
        let activity: Vec<UserActivity> = dataset
            .users
            .iter()
            .filter(|u| seen.insert(u.username()))
            .map(|user| {
                let username = user.username();
                let Authored { topics, posts } = authored.remove(username).unwrap_or_default();
                UserActivity {
                    user: UserSummary::new(user, profiles.get(username).copied()),
                    topics,
                    posts,
                    likes: likes
                        .get(username)
                        .map(|actions| actions.iter().map(LikeGiven::from_action).collect())
                        .unwrap_or_default(),
                }
            })
            .collect();

        if !authored.is_empty() {
            log::debug!("{} posters are missing from the user directory", authored.len());
        }
        log::info!("Formatted activity for {} users", activity.len());
        activity
    }

    /// Attribute every post of one thread to its author.
    fn collect_thread(
        &self,
        topic: &Topic,
        thread: &'a TopicPosts,
        authored: &mut HashMap<&'a str, Authored>,
    ) {
        let opening = thread.posts.first();
        let mut replied_to: HashMap<u64, (Option<String>, String)> = HashMap::new();

        for post in thread.posts.iter().filter(|p| !is_action_post(p)) {
            let Some(username) = post.get("username").and_then(Value::as_str) else {
                continue;
            };
            let post_number = number(post.get("post_number")).unwrap_or_default();
            let reply_count = number(post.get("reply_count")).unwrap_or_default();
            if reply_count != 0 {
                replied_to.insert(
                    post_number,
                    (text(post.get("created_at")), username.to_string()),
                );
            }

            let entry = authored.entry(username).or_default();
            if post_number == 1 {
                entry.topics.push(self.topic_activity(topic, thread, post));
                continue;
            }

            let reply_to_post_number = number(post.get("reply_to_post_number"));
            let reply_to = reply_to_post_number.and_then(|n| replied_to.get(&n));
            entry.posts.push(PostActivity {
                topic_id: topic.id,
                topic_title: text(field(&topic.extra, "title")),
                topic_created_date: opening.and_then(|p| text(p.get("created_at"))),
                topic_creator: opening.and_then(|p| text(p.get("username"))),
                date: text(post.get("created_at")),
                post_number,
                like_count: like_count(post),
                body: text(post.get("cooked")),
                category_id: thread.category_id,
                tags: thread.tags.clone(),
                post_creator: username.to_string(),
                reply_count,
                reply_to_post_number,
                reply_to_post_number_created_date: reply_to.and_then(|(date, _)| date.clone()),
                reply_to_post_username: reply_to.map(|(_, user)| user.clone()),
                url: format!("{}/t/{}/{post_number}", self.base_url, topic.id),
            });
        }
    }

    fn topic_activity(&self, topic: &Topic, thread: &TopicPosts, opening: &Value) -> TopicActivity {
        let participants = self.participants(topic.id, thread);
        TopicActivity {
            topic_id: topic.id,
            topic_title: text(field(&topic.extra, "title")),
            date: text(opening.get("created_at")),
            view_count: number(field(&topic.extra, "views")),
            read_count: number(opening.get("reads")),
            post_count: topic.posts_count,
            like_count: like_count(opening),
            category_id: thread.category_id,
            tags: thread.tags.clone(),
            quote_count: self.quote_count(thread),
            reply_count: number(opening.get("reply_count")).unwrap_or_default(),
            last_posted_at: text(field(&topic.extra, "last_posted_at")),
            participant_count: participants.len(),
            participant_list: participants,
            body: text(opening.get("cooked")),
            url: format!("{}/t/{}", self.base_url, topic.id),
        }
    }

    /// Posts of a thread whose body quotes the opening post.
    fn quote_count(&self, thread: &TopicPosts) -> usize {
        thread
            .posts
            .iter()
            .filter(|p| !is_action_post(p))
            .filter_map(|p| p.get("cooked").and_then(Value::as_str))
            .filter(|cooked| {
                Html::parse_fragment(cooked)
                    .select(&self.opening_quote)
                    .next()
                    .is_some()
            })
            .count()
    }

    /// Everyone who posted in or liked a post of the topic.
    fn participants(&self, topic_id: u64, thread: &TopicPosts) -> Vec<String> {
        let posters = thread
            .posts
            .iter()
            .filter(|p| !is_action_post(p))
            .filter_map(|p| p.get("username").and_then(Value::as_str));
        let likers = self
            .dataset
            .likes
            .iter()
            .flat_map(|l| l.actions.iter())
            .filter(|a| number(a.get("topic_id")) == Some(topic_id))
            .filter_map(|a| a.get("acting_username").and_then(Value::as_str));

        let mut seen = HashSet::new();
        posters
            .chain(likers)
            .filter(|name| seen.insert(*name))
            .map(str::to_owned)
            .collect()
    }
}

/// Format a snapshot into per-user activity records.
pub fn format_activity(dataset: &RawDataset, base_url: &str) -> Result<Vec<UserActivity>> {
    Ok(ActivityFormatter::new(dataset, base_url)?.format())
}
