use url::Url;

use crate::error::{AppError, AppResult};
use crate::i18n::Violation;
use crate::models::{
    CreateArticleRequest, CreateTagRequest, STATE_CLOSED, STATE_OPEN, UpdateArticleRequest,
    UpdateStateRequest, UpdateTagRequest,
};

// =============================================================================
// Validation Constants
// =============================================================================

/// Tag name length bounds, in characters.
pub const TAG_NAME_LENGTH: (usize, usize) = (1, 100);

/// Article title length bounds, in characters.
pub const TITLE_LENGTH: (usize, usize) = (2, 100);

/// Article description length bounds, in characters.
pub const DESC_LENGTH: (usize, usize) = (2, 255);

/// Minimum article content length, in characters.
pub const MIN_CONTENT_LENGTH: usize = 2;

/// Author name (`created_by` / `modified_by`) length bounds, in characters.
pub const ACTOR_LENGTH: (usize, usize) = (2, 100);

/// Validate that `value` has between `min` and `max` characters.
pub fn validate_length(value: &str, field: &str, (min, max): (usize, usize)) -> AppResult<()> {
    let len = value.chars().count();

    if len < min {
        return Err(AppError::BadRequest(Violation::TooShort {
            field: field.to_string(),
            min,
        }));
    }

    if len > max {
        return Err(AppError::BadRequest(Violation::TooLong {
            field: field.to_string(),
            max,
            got: len,
        }));
    }

    Ok(())
}

pub fn validate_tag_name(name: &str) -> AppResult<()> {
    validate_length(name, "name", TAG_NAME_LENGTH)
}

/// Validate a `created_by` / `modified_by` value.
pub fn validate_actor(actor: &str, field: &str) -> AppResult<()> {
    validate_length(actor, field, ACTOR_LENGTH)
}

/// Validate a tag or article state. Only 0 (closed) and 1 (open) exist.
pub fn validate_state(state: u8) -> AppResult<()> {
    if state != STATE_CLOSED && state != STATE_OPEN {
        return Err(AppError::BadRequest(Violation::InvalidState { got: state }));
    }
    Ok(())
}

/// Ids start at 1.
pub fn validate_id(id: u32, field: &str) -> AppResult<()> {
    if id == 0 {
        return Err(AppError::BadRequest(Violation::IdTooSmall {
            field: field.to_string(),
        }));
    }
    Ok(())
}

/// Validate a cover image URL.
///
/// Rules:
/// - Must parse as an absolute URL
/// - Scheme must be `http` or `https`
/// - Host must be present in the input as written
/// - No whitespace or control characters anywhere
pub fn validate_cover_image_url(raw: &str) -> AppResult<()> {
    let invalid = || {
        AppError::BadRequest(Violation::InvalidUrl {
            field: "cover_image_url".to_string(),
        })
    };

    // The parser silently strips these, so check the raw input.
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }

    let url = Url::parse(raw).map_err(|_| invalid())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }

    // `https:///a.png` parses with host `a.png`; require the authority up front.
    let authority = raw
        .get(url.scheme().len()..)
        .and_then(|rest| rest.strip_prefix("://"))
        .ok_or_else(invalid)?;
    if authority.starts_with(['/', '\\']) {
        return Err(invalid());
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Request Validation
// =============================================================================

pub fn validate_create_tag(req: &CreateTagRequest) -> AppResult<()> {
    validate_tag_name(&req.name)?;
    validate_actor(&req.created_by, "created_by")?;
    validate_state(req.state)
}

pub fn validate_update_tag(req: &UpdateTagRequest) -> AppResult<()> {
    if let Some(name) = &req.name {
        validate_tag_name(name)?;
    }
    if let Some(state) = req.state {
        validate_state(state)?;
    }
    validate_actor(&req.modified_by, "modified_by")
}

pub fn validate_create_article(req: &CreateArticleRequest) -> AppResult<()> {
    validate_id(req.tag_id, "tag_id")?;
    validate_length(&req.title, "title", TITLE_LENGTH)?;
    validate_length(&req.desc, "desc", DESC_LENGTH)?;
    validate_length(&req.content, "content", (MIN_CONTENT_LENGTH, usize::MAX))?;
    validate_cover_image_url(&req.cover_image_url)?;
    validate_actor(&req.created_by, "created_by")?;
    validate_state(req.state)
}

pub fn validate_update_article(req: &UpdateArticleRequest) -> AppResult<()> {
    if let Some(tag_id) = req.tag_id {
        validate_id(tag_id, "tag_id")?;
    }
    if let Some(title) = &req.title {
        validate_length(title, "title", TITLE_LENGTH)?;
    }
    if let Some(desc) = &req.desc {
        validate_length(desc, "desc", DESC_LENGTH)?;
    }
    if let Some(content) = &req.content {
        validate_length(content, "content", (MIN_CONTENT_LENGTH, usize::MAX))?;
    }
    if let Some(url) = &req.cover_image_url {
        validate_cover_image_url(url)?;
    }
    if let Some(state) = req.state {
        validate_state(state)?;
    }
    validate_actor(&req.modified_by, "modified_by")
}

pub fn validate_update_state(req: &UpdateStateRequest) -> AppResult<()> {
    validate_state(req.state)?;
    validate_actor(&req.modified_by, "modified_by")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn article() -> CreateArticleRequest {
        CreateArticleRequest {
            tag_id: 1,
            title: "Token buckets".to_string(),
            desc: "Lazy refill explained".to_string(),
            content: "A bucket holds tokens.".to_string(),
            cover_image_url: "https://example.com/cover.png".to_string(),
            created_by: "alice".to_string(),
            state: STATE_OPEN,
        }
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 100 multi-byte characters are within the tag name limit
        let name = "é".repeat(100);
        assert!(validate_tag_name(&name).is_ok());
        assert!(validate_tag_name(&"é".repeat(101)).is_err());
    }

    #[test]
    fn test_empty_tag_name() {
        let result = validate_tag_name("");
        assert!(result.unwrap_err().to_string().contains("at least 1"));
    }

    #[test]
    fn test_actor_bounds() {
        assert!(validate_actor("al", "created_by").is_ok());
        let err = validate_actor("a", "created_by").unwrap_err();
        assert!(err.to_string().contains("created_by"));
        assert!(validate_actor(&"a".repeat(101), "modified_by").is_err());
    }

    #[test]
    fn test_state_values() {
        assert!(validate_state(0).is_ok());
        assert!(validate_state(1).is_ok());
        assert!(validate_state(2).is_err());
    }

    #[test]
    fn test_cover_image_urls() {
        assert!(validate_cover_image_url("https://example.com/a.png").is_ok());
        assert!(validate_cover_image_url("http://cdn.example.com:8080/a.png?x=1").is_ok());
        assert!(validate_cover_image_url("ftp://example.com/a.png").is_err());
        assert!(validate_cover_image_url("https:///a.png").is_err());
        assert!(validate_cover_image_url("https://exa mple.com").is_err());
        assert!(validate_cover_image_url("not a url").is_err());
        assert!(validate_cover_image_url("HTTPS://Example.com/a.png").is_ok());
    }

    #[test]
    fn test_cover_image_url_rejects_malformed_authority() {
        for raw in [
            "http://exa<mple>.com/c.png",
            "http://[::1/c.png",
            "https://a%%b/c",
            "http://x:notaport/",
            "https:\\\\example.com/c.png",
            "http:example.com/c.png",
        ] {
            assert!(validate_cover_image_url(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_create_article_valid() {
        assert!(validate_create_article(&article()).is_ok());
    }

    #[test]
    fn test_create_article_rejects_short_title_and_zero_tag() {
        let req = CreateArticleRequest {
            title: "x".to_string(),
            ..article()
        };
        assert!(validate_create_article(&req).unwrap_err().to_string().contains("title"));

        let req = CreateArticleRequest {
            tag_id: 0,
            ..article()
        };
        assert!(validate_create_article(&req).unwrap_err().to_string().contains("tag_id"));
    }

    #[test]
    fn test_update_article_only_checks_present_fields() {
        let req = UpdateArticleRequest {
            tag_id: None,
            title: None,
            desc: Some("ok enough".to_string()),
            content: None,
            cover_image_url: None,
            state: None,
            modified_by: "bob".to_string(),
        };
        assert!(validate_update_article(&req).is_ok());

        let req = UpdateArticleRequest {
            cover_image_url: Some("javascript:alert(1)".to_string()),
            ..req
        };
        assert!(validate_update_article(&req).is_err());
    }
}
