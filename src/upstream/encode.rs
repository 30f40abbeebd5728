//! Upstream item encoding
//!
//! Turns one raw upstream record into a `tweet` frame. Keep-alive blank lines
//! are skipped; anything that is not a JSON object is rejected as malformed.

use serde_json::Value;

use crate::error::{Result, WallError};
use crate::registry::{EventKind, WallMessage};

/// Encode a raw upstream record for viewers
///
/// Returns `Ok(None)` for keep-alive records that carry no item.
pub fn encode_item(raw: &[u8]) -> Result<Option<WallMessage>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| WallError::MalformedItem(format!("invalid UTF-8: {}", e)))?;

    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let item: Value =
        serde_json::from_str(text).map_err(|e| WallError::MalformedItem(e.to_string()))?;

    if !item.is_object() {
        return Err(WallError::MalformedItem("expected a JSON object".into()));
    }

    WallMessage::encode(EventKind::Tweet, &item).map(Some)
}
