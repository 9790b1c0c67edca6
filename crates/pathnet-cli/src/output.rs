//! Output formatting utilities

use serde::Serialize;

/// Render a value as JSON, pretty-printed unless `compact`
pub fn format_json<T: Serialize>(data: &T, compact: bool) -> anyhow::Result<String> {
    let text = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(text)
}
