//! Handlers of the settings endpoints.
//!
//! Every handler first makes sure the caller owns the user id in the path.

use axum::extract::{Extension, Path};
use axum::Json;
use bb_core::{
    blob::Visibility,
    models::{SavedSetting, UserSettings},
    utils::{base_name, new_id},
};

use crate::{
    model::{ApiError, ApiResult, LogoUploaded, SettingCreated, Success},
    server::{ApiJson, ApiMultipart, Claims, Context, Form},
};

/// File name used for uploads sent without one.
const FALLBACK_LOGO_NAME: &str = "logo";

/// Store the defaults unless the user already has settings.
pub async fn init_settings(
    claims: Claims,
    Path(user_id): Path<String>,
    Extension(ctx): Extension<Context>,
) -> ApiResult<Json<UserSettings>> {
    claims.ensure_user(&user_id)?;

    let settings = ctx
        .store()
        .init_settings(&user_id, &UserSettings::defaults())
        .await?;
    Ok(Json(settings))
}

pub async fn get_settings(
    claims: Claims,
    Path(user_id): Path<String>,
    Extension(ctx): Extension<Context>,
) -> ApiResult<Json<UserSettings>> {
    claims.ensure_user(&user_id)?;

    let settings = match ctx.store().get_settings(&user_id).await? {
        Some(settings) => settings,
        None => {
            tracing::debug!(user_id = user_id.as_str(), "No settings yet, seeding defaults");
            ctx.store()
                .init_settings(&user_id, &UserSettings::defaults())
                .await?
        }
    };
    Ok(Json(settings))
}

pub async fn set_settings(
    claims: Claims,
    Path(user_id): Path<String>,
    Extension(ctx): Extension<Context>,
    ApiJson(settings): ApiJson<UserSettings>,
) -> ApiResult<Json<Success>> {
    claims.ensure_user(&user_id)?;

    ctx.store().set_settings(&user_id, &settings).await?;
    tracing::debug!(user_id = user_id.as_str(), keys = settings.len(), "Settings replaced");
    Ok(Json(Success::ok()))
}

pub async fn list_saved_settings(
    claims: Claims,
    Path(user_id): Path<String>,
    Extension(ctx): Extension<Context>,
) -> ApiResult<Json<Vec<SavedSetting>>> {
    claims.ensure_user(&user_id)?;

    Ok(Json(ctx.store().list_saved(&user_id).await?))
}

pub async fn create_saved_setting(
    claims: Claims,
    Path(user_id): Path<String>,
    Extension(ctx): Extension<Context>,
    ApiJson(settings): ApiJson<UserSettings>,
) -> ApiResult<Json<SettingCreated>> {
    claims.ensure_user(&user_id)?;

    let saved = ctx.store().insert_saved(&user_id, &settings).await?;
    Ok(Json(SettingCreated {
        setting_id: saved.setting_id,
    }))
}

pub async fn get_saved_setting(
    claims: Claims,
    Path((user_id, setting_id)): Path<(String, String)>,
    Extension(ctx): Extension<Context>,
) -> ApiResult<Json<SavedSetting>> {
    claims.ensure_user(&user_id)?;

    ctx.store()
        .get_saved(&user_id, &setting_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::setting_not_found(&setting_id))
}

/// Deleting a missing setting still succeeds.
pub async fn delete_saved_setting(
    claims: Claims,
    Path((user_id, setting_id)): Path<(String, String)>,
    Extension(ctx): Extension<Context>,
) -> ApiResult<Json<Success>> {
    claims.ensure_user(&user_id)?;

    let deleted = ctx.store().delete_saved(&user_id, &setting_id).await?;
    tracing::debug!(
        user_id = user_id.as_str(),
        setting_id = setting_id.as_str(),
        deleted,
        "Saved setting deleted"
    );
    Ok(Json(Success::ok()))
}

/// Store a logo publicly. The user's settings are left alone, clients write
/// the returned url themselves.
pub async fn upload_logo(
    claims: Claims,
    Path(user_id): Path<String>,
    Extension(ctx): Extension<Context>,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<Json<LogoUploaded>> {
    claims.ensure_user(&user_id)?;

    let mut form = Form::read(multipart, ctx.config().max_upload_size).await?;
    let file = form
        .take("file")
        .ok_or_else(|| ApiError::missing_field("file"))?;

    let file_name = file
        .file_name
        .as_deref()
        .map(base_name)
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_LOGO_NAME);
    let path = format!("logos/{user_id}/{}_{file_name}", new_id());

    let logo_url = ctx
        .blobs()
        .put(&path, file.into_blob(), Visibility::Public)
        .await?;

    tracing::info!(user_id = user_id.as_str(), path = path.as_str(), "Logo uploaded");
    Ok(Json(LogoUploaded { logo_url }))
}
