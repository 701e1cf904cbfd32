use axum::{
    extract::{FromRef, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    auth::{
        cookie::SessionKeys,
        dto::{ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest, UserData},
        extractors::{ClientMeta, CurrentUser},
        password::{hash_password, verify_password, verify_unknown_user},
        services::{
            generate_reset_token, open_session, reset_email, reset_link, reset_token_expiry,
            SessionKind,
        },
    },
    error::AppError,
    response::Envelope,
    state::AppState,
    users::{is_duplicate_email, NewUser, PublicUser, Role},
    validation::{normalize_email, ValidatedJson},
};

pub const INVALID_CREDENTIALS: &str = "Incorrect email or password";
pub const EMAIL_IN_USE: &str = "Email already in use";
pub const INVALID_RESET_TOKEN: &str = "Token is invalid or has expired";
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

fn user_response(status: StatusCode, cookie: axum::http::HeaderValue, user: PublicUser) -> Response {
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(Envelope::data(UserData { user })),
    )
        .into_response()
}

#[instrument(skip(state, meta, payload))]
pub async fn signup(
    State(state): State<AppState>,
    meta: ClientMeta,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> Result<Response, AppError> {
    let email = normalize_email(&payload.email);

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "signup with registered email");
        return Err(AppError::BadRequest(EMAIL_IN_USE.into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = match state
        .users
        .create(NewUser {
            name: payload.name.trim().to_string(),
            email: email.clone(),
            password_hash,
            role: Role::User,
        })
        .await
    {
        Ok(user) => user,
        Err(e) if is_duplicate_email(&e) => {
            warn!(email = %email, "signup lost a race for the same email");
            return Err(AppError::BadRequest(EMAIL_IN_USE.into()));
        }
        Err(e) => return Err(e.into()),
    };

    let (_, cookie) = open_session(&state, user.id, meta, SessionKind::Extended).await?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok(user_response(StatusCode::CREATED, cookie, user.into()))
}

#[instrument(skip(state, meta, payload))]
pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let email = normalize_email(&payload.email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        verify_unknown_user(&payload.password);
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let (_, cookie) = open_session(&state, user.id, meta, SessionKind::Login).await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(user_response(StatusCode::OK, cookie, user.into()))
}

#[instrument(skip(state, headers))]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let keys = SessionKeys::from_ref(&state);

    let Some(session_id) = keys.session_id(&headers) else {
        return Err(AppError::Unauthorized("Not authenticated".into()));
    };
    if !state.sessions.destroy(&session_id).await {
        debug!("logout for unknown or expired session");
        return Err(AppError::Unauthorized("Not authenticated".into()));
    }

    info!("session destroyed on logout");
    Ok((
        [(header::SET_COOKIE, keys.clear_cookie()?)],
        Json(Envelope::message("Logged out successfully")),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn get_me(current: CurrentUser) -> Json<Envelope<UserData>> {
    Json(Envelope::data(UserData { user: current.user }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    let email = normalize_email(&payload.email);

    match state.users.find_by_email(&email).await? {
        None => debug!("password reset requested for unknown email"),
        Some(user) => {
            let token = generate_reset_token();
            let expires = reset_token_expiry(OffsetDateTime::now_utc());
            state
                .users
                .set_reset_token(user.id, Some(&token), Some(expires))
                .await?;

            let link = reset_link(&state.config.client_url, &token);
            match state.mailer.send(reset_email(&user.email, &link)).await {
                Ok(()) => info!(user_id = %user.id, "password reset email sent"),
                Err(e) => {
                    error!(user_id = %user.id, error = ?e, "password reset email failed; clearing token");
                    state.users.set_reset_token(user.id, None, None).await?;
                }
            }
        }
    }

    Ok(Json(Envelope::message(FORGOT_PASSWORD_MESSAGE)))
}

#[instrument(skip(state, meta, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    meta: ClientMeta,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    if state
        .users
        .find_by_reset_token(&token, OffsetDateTime::now_utc())
        .await?
        .is_none()
    {
        warn!("reset with invalid or expired token");
        return Err(AppError::BadRequest(INVALID_RESET_TOKEN.into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .users
        .redeem_reset_token(&token, OffsetDateTime::now_utc(), &password_hash)
        .await?
        .ok_or_else(|| {
            warn!("reset token spent by a concurrent request");
            AppError::BadRequest(INVALID_RESET_TOKEN.into())
        })?;

    let revoked = state.sessions.destroy_for_user(user.id).await;
    let (_, cookie) = open_session(&state, user.id, meta, SessionKind::Extended).await?;

    info!(user_id = %user.id, revoked, "password reset");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(
            Envelope::data(UserData { user: user.into() })
                .with_message("Password updated successfully"),
        ),
    )
        .into_response())
}
