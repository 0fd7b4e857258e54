//! Small helpers shared by config, the HTTP remote and the CLI.

use crate::error::{Error, Result};

/// Longest server message kept in a queue item's `last_error`.
const MAX_SERVER_MESSAGE_CHARS: usize = 180;

/// Trim optional text; blank becomes `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Validate an API base URL and strip trailing slashes so paths can be appended.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(Error::Config("api_base_url must not be empty".into()));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::Config(
            "api_base_url must include http:// or https://".into(),
        ));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Collapse a server response body onto one bounded line for `last_error`.
pub fn summarize_server_message(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_SERVER_MESSAGE_CHARS)
        .collect()
}

/// Current client clock in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
