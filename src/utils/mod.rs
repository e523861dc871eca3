//! Utility functions and helpers.

pub mod http;

use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::error::{AppError, Result};

/// Join an endpoint path onto a forum base URL.
///
/// Unlike `Url::join`, a base URL with a path prefix (a forum served under
/// `/forum`) keeps that prefix.
pub fn endpoint_url(base_url: &str, path: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let url = Url::parse(&format!("{base}/{path}"))?;
    Ok(url.to_string())
}

/// Substitute `placeholder` in an endpoint template, percent-encoding the value.
pub fn expand_template(template: &str, placeholder: &str, value: &str) -> Result<String> {
    if !template.contains(placeholder) {
        return Err(AppError::config(format!(
            "endpoint template '{template}' has no {placeholder}"
        )));
    }
    let encoded: String = byte_serialize(value.as_bytes()).collect();
    Ok(template.replace(placeholder, &encoded))
}
