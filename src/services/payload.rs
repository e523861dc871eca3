//! Extraction of item lists from response bodies.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};

/// Read the array at JSON `pointer` and decode its items.
///
/// A missing array or an item that does not decode is an
/// [`AppError::UnexpectedPayload`]; retrying will not fix a schema mismatch.
pub fn extract_items<T: DeserializeOwned>(
    body: &Value,
    pointer: &str,
    context: &str,
) -> Result<Vec<T>> {
    let items = body.pointer(pointer).ok_or_else(|| {
        AppError::unexpected_payload(context, format!("missing field {pointer}"))
    })?;
    Vec::<T>::deserialize(items).map_err(|e| AppError::unexpected_payload(context, e))
}
