use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    claims::TokenKind,
    dto::{
        normalize_email, LoginRequest, MessageResponse, RequestEmail, ResetPasswordRequest,
        SignupRequest, TokenResponse, UserResponse,
    },
    extractors::{CurrentUser, RefreshClaims},
    mail::{confirmation_email, password_reset_email},
    password::{hash_password, verify_password},
};
use crate::{
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    state::AppState,
    users::{
        dto::validate_password,
        repo::{EmailTaken, User},
        services::create_user,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh_token", get(refresh_token))
        .route("/auth/logout", post(logout))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
        .route("/auth/request_email", post(request_email))
        .route("/auth/forgot_password", post(forgot_password))
        .route("/auth/reset_password", post(reset_password))
}

async fn send_confirmation(state: &AppState, user: &User) {
    let token = match state.jwt.sign_email_confirmation(&user.email) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign confirmation failed");
            return;
        }
    };
    let link = format!(
        "{}/api/auth/confirmed_email/{}",
        state.config.public_base_url.trim_end_matches('/'),
        token
    );
    let msg = confirmation_email(&state.config.mail_from, &user.email, &user.username, &link);
    if let Err(e) = state.mailer.send(msg).await {
        error!(error = %e, user_id = %user.id, "confirmation email failed");
    }
}

async fn issue_tokens(state: &AppState, user: &User) -> ApiResult<TokenResponse> {
    let access_token = state.jwt.sign_access(&user.email)?;
    let refresh_token = state.jwt.sign_refresh(&user.email)?;
    state
        .users
        .set_refresh_token(user.id, Some(&refresh_token))
        .await?;
    Ok(TokenResponse::bearer(access_token, refresh_token))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    payload.validate().map_err(|e| {
        warn!(error = %e, "invalid signup");
        e
    })?;

    if state.users.get_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Account already exists".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = create_user(
        state.users.as_ref(),
        state.avatars.as_ref(),
        &payload.username,
        &payload.email,
        &hash,
    )
    .await
    .map_err(|e| {
        if e.is::<EmailTaken>() {
            warn!(email = %payload.email, "email registered concurrently");
            ApiError::Conflict("Account already exists".into())
        } else {
            ApiError::Internal(e)
        }
    })?;

    send_confirmation(&state, &user).await;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            user: user.into(),
            detail: "User successfully created. Check your email for confirmation.".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let email = normalize_email(&payload.email);

    let user = match state.users.get_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(%email, "login unknown email");
            return Err(ApiError::unauthorized("Invalid email"));
        }
    };

    if !user.confirmed {
        warn!(user_id = %user.id, "login with unconfirmed email");
        return Err(ApiError::unauthorized("Email not confirmed"));
    }

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let tokens = issue_tokens(&state, &user).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(tokens))
}

/// Rotates the token pair. A refresh token other than the one last issued is
/// treated as stolen: the stored token is revoked and the request refused.
/// The swap is a compare-and-set, so of two requests racing with the same
/// token only one wins.
#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    RefreshClaims { token, claims }: RefreshClaims,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .users
        .get_by_email(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;

    let access_token = state.jwt.sign_access(&user.email)?;
    let refresh_token = state.jwt.sign_refresh(&user.email)?;
    if !state
        .users
        .rotate_refresh_token(user.id, &token, &refresh_token)
        .await?
    {
        warn!(user_id = %user.id, "refresh token reuse detected");
        state.users.set_refresh_token(user.id, None).await?;
        state.user_cache.invalidate(&user.email);
        return Err(ApiError::unauthorized("Invalid refresh token"));
    }

    info!(user_id = %user.id, "tokens refreshed");
    Ok(Json(TokenResponse::bearer(access_token, refresh_token)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<StatusCode> {
    state.users.set_refresh_token(user.id, None).await?;
    state.user_cache.invalidate(&user.email);
    info!("user logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn confirmed_email(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> ApiResult<Json<MessageResponse>> {
    let claims = state
        .jwt
        .verify(&token, TokenKind::EmailConfirmation)
        .map_err(|e| ApiError::BadRequest(format!("Invalid confirmation token: {e}")))?;

    let user = state
        .users
        .get_by_email(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Verification error".into()))?;

    if user.confirmed {
        return Ok(Json(MessageResponse::new("Your email is already confirmed")));
    }
    state.users.mark_confirmed(&user.email).await?;
    state.user_cache.invalidate(&user.email);
    info!(user_id = %user.id, "email confirmed");
    Ok(Json(MessageResponse::new("Email confirmed")))
}

#[instrument(skip_all)]
pub async fn request_email(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestEmail>,
) -> ApiResult<Json<MessageResponse>> {
    let email = normalize_email(&body.email);
    if let Some(user) = state.users.get_by_email(&email).await? {
        if user.confirmed {
            return Ok(Json(MessageResponse::new("Your email is already confirmed")));
        }
        send_confirmation(&state, &user).await;
    }
    Ok(Json(MessageResponse::new("Check your email for confirmation.")))
}

#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestEmail>,
) -> ApiResult<Json<MessageResponse>> {
    let email = normalize_email(&body.email);
    if let Some(user) = state.users.get_by_email(&email).await? {
        let token = state.jwt.sign_password_reset(&user.email)?;
        let msg = password_reset_email(&state.config.mail_from, &user.email, &user.username, &token);
        if let Err(e) = state.mailer.send(msg).await {
            error!(error = %e, user_id = %user.id, "password reset email failed");
        }
    } else {
        warn!(%email, "password reset for unknown email");
    }
    Ok(Json(MessageResponse::new(
        "If the account exists, a password reset code has been sent.",
    )))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let claims = state
        .jwt
        .verify(&body.token, TokenKind::PasswordReset)
        .map_err(|e| ApiError::BadRequest(format!("Invalid reset token: {e}")))?;
    validate_password(&body.new_password)?;

    let user = state
        .users
        .get_by_email(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Verification error".into()))?;

    let hash = hash_password(&body.new_password)?;
    state.users.set_password(&user.email, &hash).await?;
    state.users.set_refresh_token(user.id, None).await?;
    state.user_cache.invalidate(&user.email);
    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse::new("Password has been reset")))
}
