//! Chat messages and user-text sanitizing.

use crate::error::SessionError;
use crate::session::Identity;
use chrono::{DateTime, Utc};
use derive_new::new;
use serde::Serialize;

/// One line of table chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, new)]
pub struct ChatMessage {
    /// Sender identity.
    pub identity: Identity,
    /// Sender display name at the time of sending.
    pub display_name: String,
    /// Escaped message text.
    pub text: String,
    /// When the message was accepted.
    pub timestamp: DateTime<Utc>,
}

/// Escapes the characters that carry meaning in HTML markup.
pub fn escape_markup(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Trims, bounds and escapes user-supplied text.
///
/// The length bound counts characters of the trimmed input, before escaping.
///
/// # Errors
///
/// Returns a validation error naming `what` when the text is blank or too long.
#[track_caller]
pub fn sanitize_text(raw: &str, max_len: usize, what: &str) -> Result<String, SessionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SessionError::validation(format!("{} must not be empty", what)));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(SessionError::validation(format!(
            "{} is {} characters, limit is {}",
            what, len, max_len
        )));
    }
    Ok(escape_markup(trimmed))
}

/// Case-insensitive key used to detect display-name clashes.
pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
