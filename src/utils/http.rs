// src/utils/http.rs

//! HTTP client utilities.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::FetchConfig;

/// Create a configured asynchronous HTTP client.
///
/// `headers` are sent with every request; a `User-Agent` entry there
/// overrides `config.user_agent`.
pub fn create_async_client(
    config: &FetchConfig,
    headers: &BTreeMap<String, String>,
) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(header_map(headers)?)
        .build()?;
    Ok(client)
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::config(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::config(format!("Invalid value for header {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_accepts_user_agent() {
        let headers = BTreeMap::from([("User-Agent".to_string(), "Mozilla/5.0".to_string())]);
        let map = header_map(&headers).unwrap();
        assert_eq!(map.get("user-agent").unwrap(), "Mozilla/5.0");
    }

    #[test]
    fn test_header_map_rejects_bad_name() {
        let headers = BTreeMap::from([("bad header".to_string(), "x".to_string())]);
        assert!(header_map(&headers).is_err());
    }

    #[test]
    fn test_create_async_client() {
        assert!(create_async_client(&FetchConfig::default(), &BTreeMap::new()).is_ok());
    }
}
