//! Buffered multipart forms.

use std::collections::HashMap;

use axum::extract::{multipart::MultipartError, Multipart};
use bb_core::blob::Blob;
use bytes::{Bytes, BytesMut};

use crate::model::{ApiError, ApiResult};

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// Client supplied file name, only set for file fields.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormPart {
    #[must_use]
    pub fn into_blob(self) -> Blob {
        Blob {
            data: self.data,
            content_type: self.content_type,
        }
    }
}

/// A multipart form read into memory. Later fields replace earlier ones with the same name.
#[derive(Debug, Default)]
pub struct Form {
    parts: HashMap<String, FormPart>,
}

fn malformed(e: &MultipartError) -> ApiError {
    tracing::debug!(error = %e, "Malformed multipart body");
    ApiError::bad_request(format!("Malformed multipart body: {e}"))
}

impl Form {
    /// Read all fields, rejecting bodies whose fields add up to more than `limit` bytes.
    ///
    /// # Errors
    /// 400 on malformed bodies, 413 above the limit.
    pub async fn read(mut multipart: Multipart, limit: usize) -> ApiResult<Self> {
        let mut form = Self::default();
        let mut total = 0_usize;

        while let Some(mut field) = multipart.next_field().await.map_err(|e| malformed(&e))? {
            let Some(name) = field.name().map(ToString::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(ToString::to_string);
            let content_type = field.content_type().map(ToString::to_string);

            let mut data = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(|e| malformed(&e))? {
                total += chunk.len();
                if total > limit {
                    tracing::debug!(limit, "Multipart body too large");
                    return Err(ApiError::payload_too_large(limit));
                }
                data.extend_from_slice(&chunk);
            }

            form.parts.insert(
                name,
                FormPart {
                    file_name,
                    content_type,
                    data: data.freeze(),
                },
            );
        }

        Ok(form)
    }

    /// Take a field out of the form.
    pub fn take(&mut self, name: &str) -> Option<FormPart> {
        self.parts.remove(name)
    }

    /// Take a text field out of the form.
    ///
    /// # Errors
    /// 400 if the field is not valid UTF-8.
    pub fn text(&mut self, name: &str) -> ApiResult<Option<String>> {
        self.take(name)
            .map(|part| {
                String::from_utf8(part.data.to_vec())
                    .map_err(|_| ApiError::bad_request(format!("Field `{name}` is not valid UTF-8")))
            })
            .transpose()
    }

    /// Take a text field that must be present.
    ///
    /// # Errors
    /// 400 if the field is missing or not valid UTF-8.
    pub fn require_text(&mut self, name: &str) -> ApiResult<String> {
        self.text(name)?.ok_or_else(|| ApiError::missing_field(name))
    }
}
