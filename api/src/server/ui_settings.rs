//! Legacy branding form.
//!
//! Kept for clients that predate `/settings`. Every response carries a
//! `Deprecation` header.

use axum::{
    extract::Extension,
    http::{HeaderName, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use bb_core::{
    blob::Visibility,
    models::{BrandingProfile, BrandingUpdate},
    utils::{extension, random_hex},
};
use tower_http::set_header::SetResponseHeaderLayer;
use url::Url;

use crate::{
    model::{ApiError, ApiResult, BrandingUpdated},
    server::{ApiMultipart, Claims, Context, Form, FormPart},
};

/// Routes of the legacy group, to be nested under `/ui_settings`.
pub fn ui_settings_routes() -> Router {
    Router::new()
        .route("/update_settings", post(update_app_settings))
        .route("/settings", get(get_branding_profile))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("deprecation"),
            HeaderValue::from_static("true"),
        ))
}

async fn store_private_logo(ctx: &Context, user_id: &str, file: FormPart) -> bb_core::Result<Url> {
    let ext = file.file_name.as_deref().map_or("", extension);
    let path = format!("user_logos/{user_id}/logo_{}{ext}", random_hex(8));

    ctx.blobs()
        .put(&path, file.into_blob(), Visibility::Private)
        .await?;
    ctx.blobs().signed_url(&path).await
}

/// Overwrite the caller's branding profile from a multipart form with the
/// fields `brand_name`, `color`, and optionally `user_id` and `logo_file`.
pub async fn update_app_settings(
    claims: Claims,
    Extension(ctx): Extension<Context>,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<Json<BrandingUpdated>> {
    let mut form = Form::read(multipart, ctx.config().max_upload_size).await?;

    let user_id = match form.text("user_id")? {
        Some(user_id) => {
            claims.ensure_user(&user_id)?;
            user_id
        }
        None => claims.user_id().to_owned(),
    };
    let brand_name = form.require_text("brand_name")?;
    let color = form.require_text("color")?;

    let logo_url = match form.take("logo_file").filter(|file| !file.data.is_empty()) {
        Some(file) => store_private_logo(&ctx, &user_id, file)
            .await
            .map_err(|e| {
                tracing::error!(user_id = user_id.as_str(), error = %e, "Failed to process logo");
                ApiError::internal().explain(format!("Failed to process logo: {e}"))
            })?
            .to_string(),
        None => String::new(),
    };

    let update = BrandingUpdate {
        brand_name,
        logo_url,
        color,
    };
    ctx.store()
        .put_branding(&user_id, &update)
        .await
        .map_err(|e| {
            tracing::error!(user_id = user_id.as_str(), error = %e, "Failed to save branding");
            ApiError::internal().explain(format!("Failed to save settings to database: {e}"))
        })?;

    tracing::info!(user_id = user_id.as_str(), "Branding profile updated");
    let BrandingUpdate {
        brand_name,
        logo_url,
        color,
    } = update;
    Ok(Json(BrandingUpdated {
        message: "Settings updated successfully".to_owned(),
        logo_url,
        brand_name,
        color,
        user_id,
    }))
}

pub async fn get_branding_profile(
    claims: Claims,
    Extension(ctx): Extension<Context>,
) -> ApiResult<Json<BrandingProfile>> {
    ctx.store()
        .get_branding(claims.user_id())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::branding_not_found(claims.user_id()))
}
