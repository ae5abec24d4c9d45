use http::StatusCode;
use thiserror::Error;

use crate::model::ApiError;

/// Failure of a [`Client`](crate::client::Client) call.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be sent or its response not read.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// A successful response carried an unexpected body.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Unable to build endpoint url: {0}")]
    Url(#[from] url::ParseError),
    /// The server refused the request.
    #[error("Rejected by server: {0}")]
    Api(#[from] ApiError),
}

impl Error {
    /// HTTP status of a rejected request.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(e) => Some(e.status()),
            Self::Transport(e) => e.status(),
            Self::Decode(_) | Self::Url(_) => None,
        }
    }

    /// The caller tried to access settings of another user.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN)
    }

    /// The saved setting, branding profile or object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// The token is missing, expired or forged.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Whether any explanation sent by the server contains `text`.
    #[must_use]
    pub fn explains(&self, text: &str) -> bool {
        matches!(self, Self::Api(e) if e.matches(text))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
