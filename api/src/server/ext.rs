use std::error::Error as StdError;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        Extension, FromRequest, Multipart, Query, RequestParts,
    },
    http::{header::AUTHORIZATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bb_core::Error as CoreError;

use crate::{
    model::ApiError,
    server::{Claims, Context},
};

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        tracing::warn!("{}", e);
        Self::bad_token()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidPath(path) => {
                tracing::warn!(path = path.as_str(), "Invalid object path");
                Self::bad_request(format!("Invalid object path `{path}`"))
            }
            CoreError::Unstorable(e) => {
                tracing::debug!(error = e.as_str(), "Unstorable settings");
                Self::bad_request(format!("Settings can't be stored: {e}"))
            }
            CoreError::Signature(e) => {
                tracing::warn!(error = %e, "Rejected blob signature");
                Self::bad_signature()
            }
            err => {
                let err_str = err.to_string();
                tracing::error!(error = err_str.as_str(), "Backend error");
                Self::internal().explain(err_str)
            }
        }
    }
}

/// Bearer token authentication. Rejects with 401 when the token is missing or invalid.
#[axum::async_trait]
impl<B: Send> FromRequest<B> for Claims {
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(ctx) = Extension::<Context>::from_request(req)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Context is not installed");
                ApiError::internal()
            })?;

        let header = req
            .headers()
            .get(AUTHORIZATION)
            .ok_or_else(ApiError::missing_token)?;
        let token = header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or_else(ApiError::bad_token)?;

        Ok(ctx.jwt().validate(token)?)
    }
}

/// Credentials of a `Bearer` authorization value. The scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim_start();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Explain a rejection of axum's extractors, including the underlying causes.
fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_str = cause.to_string();
        if !message.ends_with(&cause_str) {
            message = format!("{message}: {cause_str}");
        }
        source = cause.source();
    }
    message
}

fn rejected<E: StdError + IntoResponse>(err: E, status: Option<StatusCode>) -> ApiError {
    let message = describe(&err);
    tracing::debug!(error = message.as_str(), "Request rejected");
    let status = status.unwrap_or_else(|| err.into_response().status());
    ApiError::new(status).explain(message)
}

/// JSON body extractor rejecting with an [`ApiError`]. Keeps axum's status:
/// 400 on syntax errors, 415 without a JSON content type and 422 when the
/// payload doesn't fit the target type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, B> FromRequest<B> for ApiJson<T>
where
    T: Send,
    B: Send,
    Json<T>: FromRequest<B, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|e| rejected(e, None))
    }
}

/// Multipart extractor rejecting with a 400 [`ApiError`].
#[derive(Debug)]
pub struct ApiMultipart(pub Multipart);

#[axum::async_trait]
impl<B> FromRequest<B> for ApiMultipart
where
    B: Send,
    Multipart: FromRequest<B, Rejection = MultipartRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        Multipart::from_request(req)
            .await
            .map(Self)
            .map_err(|e| rejected(e, Some(StatusCode::BAD_REQUEST)))
    }
}

/// Query string extractor rejecting with a 400 [`ApiError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, B> FromRequest<B> for ApiQuery<T>
where
    T: Send,
    B: Send,
    Query<T>: FromRequest<B, Rejection = QueryRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request(req)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|e| rejected(e, Some(StatusCode::BAD_REQUEST)))
    }
}
