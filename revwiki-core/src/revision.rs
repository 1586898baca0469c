//! Validation and normalization applied to a revision before it is stored.

use crate::error::ValidationError;
use crate::redirect::truncate_to_directive;

/// Longest accepted edit comment, in UTF-16 code units
pub const MAX_COMMENT_LEN: usize = 255;

/// Reject comments longer than [`MAX_COMMENT_LEN`]
pub fn validate_comment(comment: &str) -> Result<(), ValidationError> {
    let length = comment.encode_utf16().count();
    if length > MAX_COMMENT_LEN {
        return Err(ValidationError::CommentTooLong {
            length,
            max: MAX_COMMENT_LEN,
        });
    }
    Ok(())
}

/// Normalize a body for storage
///
/// CRLF becomes LF, then a redirect body is cut down to its directive line.
/// Anything after the directive is discarded.
pub fn normalize_body(body: &str) -> String {
    let body = body.replace("\r\n", "\n");
    truncate_to_directive(&body).to_string()
}
