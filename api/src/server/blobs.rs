use axum::{
    extract::{Extension, Path},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_SECURITY_POLICY, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        HeaderValue,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    model::{ApiError, ApiResult},
    server::{ApiQuery, Context},
};

#[derive(Debug, Deserialize)]
pub struct BlobQuery {
    /// Signature of a signed url.
    token: Option<String>,
}

/// Uploads are user content served from the API origin, so only images are
/// displayed inline.
fn disposition(path: &str, content_type: &str) -> HeaderValue {
    let kind = if content_type.starts_with("image/") {
        "inline"
    } else {
        "attachment"
    };
    let file_name: String = path
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' { c } else { '_' })
        .collect();

    HeaderValue::from_str(&format!("{kind}; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Serve a stored object. Private objects need the token of a signed url.
pub async fn get_blob(
    Path(path): Path<String>,
    ApiQuery(BlobQuery { token }): ApiQuery<BlobQuery>,
    Extension(ctx): Extension<Context>,
) -> ApiResult<Response> {
    // Wildcard captures keep their leading slash
    let path = path.strip_prefix('/').unwrap_or(&path);

    let blob = ctx
        .blobs()
        .fetch(path, token.as_deref())
        .await?
        .ok_or_else(|| ApiError::blob_not_found(path))?;

    let content_type = blob
        .content_type
        .or_else(|| mime_guess::from_path(path).first().map(|m| m.to_string()))
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    let disposition = disposition(path, content_type.to_str().unwrap_or_default());

    Ok((
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, disposition),
            (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (
                CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("default-src 'none'; style-src 'unsafe-inline'; sandbox"),
            ),
        ],
        blob.data,
    )
        .into_response())
}
