use std::{
    error::Error as StdError,
    fmt::{Display, Formatter},
};

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Represents an API Error.
///
/// Serialized as `{"error": [reason, explanation...]}`. The status is carried
/// by the HTTP response and is not part of the body.
///
/// ```
/// # use brandboard_api::model::ApiError;
/// let err = ApiError::forbidden("alice");
/// assert_eq!(err.status().as_u16(), 403);
/// assert_eq!(
///     serde_json::to_string(&err).unwrap(),
///     r#"{"error":["Forbidden","Not permitted to access settings of `alice`"]}"#
/// );
/// ```
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    error: Vec<String>,
    #[serde(skip)]
    status: StatusCode,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Api Error")?;
        write!(f, "({})", self.status.as_str())?;

        self.error.iter().try_for_each(|e| write!(f, " {},", e))
    }
}

impl StdError for ApiError {}

impl ApiError {
    #[inline]
    pub fn new(status: StatusCode) -> Self {
        let error = match status.canonical_reason() {
            Some(reason) => vec![reason.to_owned()],
            None => vec![],
        };
        Self { error, status }
    }

    /// Replace the status, e.g. after deserializing from a response body.
    #[inline]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    #[inline]
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_errors(self) -> Vec<String> {
        self.error
    }

    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.error
    }

    #[inline]
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Match the text with the error reasons.
    ///
    /// Returns `true` if the text is a substring of any of the errors.
    #[must_use]
    pub fn matches(&self, status_text: &str) -> bool {
        self.errors().iter().any(|e| e.contains(status_text))
    }

    #[inline]
    #[must_use]
    pub fn matches_status(&self, status: StatusCode) -> bool {
        self.status == status
    }

    /// Push an explanatory error message to the error list.
    #[inline]
    pub fn explain(mut self, error: impl Into<String>) -> Self {
        self.error.push(error.into());
        self
    }

    #[inline]
    pub fn bad_token() -> Self {
        Self::new(StatusCode::UNAUTHORIZED).explain("Token is either expired or in bad shape")
    }

    #[inline]
    pub fn missing_token() -> Self {
        Self::new(StatusCode::UNAUTHORIZED).explain("Token is missing")
    }

    #[inline]
    pub fn bad_signature() -> Self {
        Self::new(StatusCode::UNAUTHORIZED).explain("Signature is either expired or in bad shape")
    }

    #[inline]
    pub fn forbidden(user_id: impl AsRef<str>) -> Self {
        Self::new(StatusCode::FORBIDDEN).explain(format!(
            "Not permitted to access settings of `{}`",
            user_id.as_ref()
        ))
    }

    #[inline]
    pub fn setting_not_found(setting_id: impl AsRef<str>) -> Self {
        Self::new(StatusCode::NOT_FOUND).explain(format!(
            "Cannot find saved setting with ID `{}`",
            setting_id.as_ref()
        ))
    }

    #[inline]
    pub fn branding_not_found(user_id: impl AsRef<str>) -> Self {
        Self::new(StatusCode::NOT_FOUND).explain(format!(
            "Cannot find branding profile of `{}`",
            user_id.as_ref()
        ))
    }

    #[inline]
    pub fn blob_not_found(path: impl AsRef<str>) -> Self {
        Self::new(StatusCode::NOT_FOUND)
            .explain(format!("Cannot find object `{}`", path.as_ref()))
    }

    #[inline]
    pub fn missing_field(name: impl AsRef<str>) -> Self {
        Self::bad_request(format!("Missing multipart field `{}`", name.as_ref()))
    }

    #[inline]
    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE)
            .explain(format!("Upload exceeds the limit of {limit} bytes"))
    }

    #[inline]
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST).explain(error)
    }

    #[inline]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
