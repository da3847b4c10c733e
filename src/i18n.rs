//! Client-facing message catalogue for request validation failures.
//!
//! Validation returns a [`Violation`] instead of a finished sentence, so the
//! translations middleware can render it in the language the client asked
//! for. English is the default and the only language used in logs.

use std::fmt;

use axum::http::HeaderValue;

use crate::models::{STATE_CLOSED, STATE_OPEN};

/// Request header selecting the response language.
pub const LOCALE_HEADER: &str = "locale";

/// Languages validation messages can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    /// Locale named by a `locale` header value.
    ///
    /// Region suffixes are ignored (`zh-CN`, `zh_TW` and `en-US` all match).
    /// Anything unrecognised falls back to English.
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        let Some(tag) = value.and_then(|v| v.to_str().ok()) else {
            return Self::default();
        };

        let language = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match language.as_str() {
            "zh" => Self::Zh,
            _ => Self::En,
        }
    }
}

/// A rejected request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    TooShort { field: String, min: usize },
    TooLong { field: String, max: usize, got: usize },
    InvalidState { got: u8 },
    IdTooSmall { field: String },
    InvalidUrl { field: String },
    /// Undecodable body or query. The detail comes from the decoder and is
    /// only ever English.
    Malformed(String),
}

impl Violation {
    pub fn render(&self, locale: Locale) -> String {
        match (self, locale) {
            (Self::TooShort { field, min }, Locale::En) => {
                format!("{field} must be at least {min} characters")
            }
            (Self::TooShort { field, min }, Locale::Zh) => {
                format!("{field} 长度不能少于 {min} 个字符")
            }
            (Self::TooLong { field, max, got }, Locale::En) => {
                format!("{field} cannot exceed {max} characters (got {got})")
            }
            (Self::TooLong { field, max, got }, Locale::Zh) => {
                format!("{field} 长度不能超过 {max} 个字符（当前 {got} 个）")
            }
            (Self::InvalidState { got }, Locale::En) => {
                format!("state must be {STATE_CLOSED} or {STATE_OPEN} (got {got})")
            }
            (Self::InvalidState { got }, Locale::Zh) => {
                format!("state 必须为 {STATE_CLOSED} 或 {STATE_OPEN}（当前为 {got}）")
            }
            (Self::IdTooSmall { field }, Locale::En) => format!("{field} must be at least 1"),
            (Self::IdTooSmall { field }, Locale::Zh) => format!("{field} 必须大于或等于 1"),
            (Self::InvalidUrl { field }, Locale::En) => {
                format!("{field} must be a valid http(s) URL")
            }
            (Self::InvalidUrl { field }, Locale::Zh) => {
                format!("{field} 必须是有效的 http(s) URL")
            }
            (Self::Malformed(detail), Locale::En) => detail.clone(),
            (Self::Malformed(detail), Locale::Zh) => format!("请求参数格式错误：{detail}"),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Locale::En))
    }
}

impl From<String> for Violation {
    fn from(detail: String) -> Self {
        Self::Malformed(detail)
    }
}

impl From<&str> for Violation {
    fn from(detail: &str) -> Self {
        Self::Malformed(detail.to_string())
    }
}
