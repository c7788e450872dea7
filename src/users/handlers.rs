use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, patch, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use super::{
    dto::{validate_password, UpdatePassword, UserDb},
    services::{ext_from_mime, replace_avatar, AvatarUpload},
};
use crate::{
    auth::{
        extractors::CurrentUser,
        password::{hash_password, verify_password},
    },
    error::{ApiError, ApiResult},
    extract::ApiJson,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/password", put(change_password))
        .route(
            "/users/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(5 * 1024 * 1024)), // 5MB
        )
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserDb> {
    Json(user.into())
}

/// PATCH /users/avatar (multipart, field `file`)
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UserDb>> {
    let mut mp = mp?;
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        upload = Some(AvatarUpload { body, content_type });
        break;
    }

    let upload = upload.ok_or_else(|| ApiError::Validation("file is required".into()))?;
    if ext_from_mime(&upload.content_type).is_none() {
        warn!(content_type = %upload.content_type, "rejected avatar upload");
        return Err(ApiError::Validation(format!(
            "unsupported image type: {}",
            upload.content_type
        )));
    }
    if upload.body.is_empty() {
        return Err(ApiError::Validation("file is empty".into()));
    }

    let updated = replace_avatar(&state, &user, upload).await?;
    Ok(Json(updated.into()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<UpdatePassword>,
) -> ApiResult<Json<Value>> {
    validate_password(&body.new_password)?;
    if !verify_password(&body.old_password, &user.password_hash)? {
        warn!("password change with wrong current password");
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let hash = hash_password(&body.new_password)?;
    state.users.set_password(&user.email, &hash).await?;
    state.users.set_refresh_token(user.id, None).await?;
    state.user_cache.invalidate(&user.email);
    info!("password changed");
    Ok(Json(json!({ "message": "Password updated" })))
}
