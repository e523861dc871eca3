//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Placeholder substituted with a topic id in [`Endpoints::topic_posts`].
pub const TOPIC_ID_PLACEHOLDER: &str = "{topic_id}";

/// Placeholder substituted with a username in [`Endpoints::profile`].
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and retry behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Endpoint path templates, shared by all communities
    #[serde(default)]
    pub endpoints: Endpoints,

    /// Forum communities that can be acquired
    #[serde(default = "defaults::communities")]
    pub communities: Vec<Community>,

    /// Output locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Find a community by name.
    pub fn community(&self, name: &str) -> Result<&Community> {
        self.communities
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AppError::config(format!("Unknown community '{name}'")))
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.fetch.validate()?;
        self.endpoints.validate()?;

        if self.communities.is_empty() {
            return Err(AppError::validation("No communities defined"));
        }
        let mut names = HashSet::new();
        for community in &self.communities {
            if !names.insert(community.name.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate community name '{}'",
                    community.name
                )));
            }
            community.validate()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            endpoints: Endpoints::default(),
            communities: defaults::communities(),
            paths: PathsConfig::default(),
        }
    }
}

/// HTTP client and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempt budget for a single request before the run is aborted
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Maximum topics or users fetched concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Posts per topic page served by the forum
    #[serde(default = "defaults::topic_page_size")]
    pub topic_page_size: u64,

    /// Offset increment between like pages
    #[serde(default = "defaults::likes_page_step")]
    pub likes_page_step: u32,
}

impl FetchConfig {
    /// Reject settings the fetch loops cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.max_attempts == 0 {
            return Err(AppError::validation("fetch.max_attempts must be > 0"));
        }
        if self.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.topic_page_size == 0 {
            return Err(AppError::validation("fetch.topic_page_size must be > 0"));
        }
        if self.likes_page_step == 0 {
            return Err(AppError::validation("fetch.likes_page_step must be > 0"));
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            max_concurrent: defaults::max_concurrent(),
            topic_page_size: defaults::topic_page_size(),
            likes_page_step: defaults::likes_page_step(),
        }
    }
}

/// Endpoint path templates, relative to a community's base URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoints {
    /// User directory listing (page based)
    #[serde(default = "defaults::users_endpoint")]
    pub users: String,

    /// Topic listing (page based)
    #[serde(default = "defaults::topics_endpoint")]
    pub topics: String,

    /// Posts of a single topic, contains `{topic_id}`
    #[serde(default = "defaults::topic_posts_endpoint")]
    pub topic_posts: String,

    /// User actions listing (offset based)
    #[serde(default = "defaults::likes_endpoint")]
    pub likes: String,

    /// Public profile of a single user, contains `{username}`
    #[serde(default = "defaults::profile_endpoint")]
    pub profile: String,
}

impl Endpoints {
    fn validate(&self) -> Result<()> {
        for (name, template) in [
            ("users", &self.users),
            ("topics", &self.topics),
            ("topic_posts", &self.topic_posts),
            ("likes", &self.likes),
            ("profile", &self.profile),
        ] {
            if !template.starts_with('/') {
                return Err(AppError::validation(format!(
                    "endpoints.{name} must start with '/'"
                )));
            }
        }
        if !self.topic_posts.contains(TOPIC_ID_PLACEHOLDER) {
            return Err(AppError::validation(format!(
                "endpoints.topic_posts must contain {TOPIC_ID_PLACEHOLDER}"
            )));
        }
        if !self.profile.contains(USERNAME_PLACEHOLDER) {
            return Err(AppError::validation(format!(
                "endpoints.profile must contain {USERNAME_PLACEHOLDER}"
            )));
        }
        Ok(())
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            users: defaults::users_endpoint(),
            topics: defaults::topics_endpoint(),
            topic_posts: defaults::topic_posts_endpoint(),
            likes: defaults::likes_endpoint(),
            profile: defaults::profile_endpoint(),
        }
    }
}

/// A forum community to acquire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    /// Short name used on the command line and for output files
    pub name: String,

    /// Forum root, e.g. `https://forum.example.org`
    pub base_url: String,

    /// Extra headers sent with every request to this forum
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Community {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("community name is empty"));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            AppError::validation(format!(
                "community '{}' has invalid base_url '{}': {e}",
                self.name, self.base_url
            ))
        })?;
        Ok(())
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory that receives `{community}.json` snapshots
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    use super::Community;

    const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

    // Fetch defaults
    pub fn user_agent() -> String {
        "forum-snapshot/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_attempts() -> u32 {
        20
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn topic_page_size() -> u64 {
        20
    }
    pub fn likes_page_step() -> u32 {
        30
    }

    // Endpoint defaults (Discourse)
    pub fn users_endpoint() -> String {
        "/directory_items.json".into()
    }
    pub fn topics_endpoint() -> String {
        "/latest.json".into()
    }
    pub fn topic_posts_endpoint() -> String {
        "/t/{topic_id}.json".into()
    }
    pub fn likes_endpoint() -> String {
        "/user_actions.json".into()
    }
    pub fn profile_endpoint() -> String {
        "/u/{username}.json".into()
    }

    pub fn output_dir() -> String {
        "storage/raw".into()
    }

    // Community defaults
    pub fn communities() -> Vec<Community> {
        vec![
            Community {
                name: "arbitrum".to_string(),
                base_url: "https://forum.arbitrum.foundation".to_string(),
                headers: BTreeMap::new(),
            },
            Community {
                name: "gnosis".to_string(),
                base_url: "https://forum.gnosis.io".to_string(),
                headers: BTreeMap::from([(
                    "User-Agent".to_string(),
                    BROWSER_USER_AGENT.to_string(),
                )]),
            },
        ]
    }
}
