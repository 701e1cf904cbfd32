use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderValue},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::cookie::SessionKeys;
use crate::{
    error::AppError,
    state::AppState,
    users::{PublicUser, Role},
};

pub const NOT_LOGGED_IN: &str = "You are not logged in. Please log in to get access.";
pub const USER_GONE: &str = "The user no longer exists. Please log in again.";

/// Auth guard rejection; optionally tells the browser to drop a stale cookie.
#[derive(Debug)]
pub struct AuthRejection {
    error: AppError,
    clear_cookie: Option<HeaderValue>,
}

impl From<AppError> for AuthRejection {
    fn from(error: AppError) -> Self {
        Self {
            error,
            clear_cookie: None,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let mut response = self.error.into_response();
        if let Some(cookie) = self.clear_cookie {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        response
    }
}

/// The authenticated user behind the request's session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: PublicUser,
    pub session_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);

        let session_id = keys.session_id(&parts.headers).ok_or_else(|| {
            debug!("no valid session cookie");
            AppError::Unauthorized(NOT_LOGGED_IN.into())
        })?;

        let session = state.sessions.get(&session_id).await.ok_or_else(|| {
            debug!("session unknown or expired");
            AppError::Unauthorized(NOT_LOGGED_IN.into())
        })?;

        let user = state
            .users
            .find_by_id(session.user_id)
            .await
            .map_err(AppError::from)?;

        match user {
            Some(user) => Ok(CurrentUser {
                user: user.into(),
                session_id,
            }),
            None => {
                warn!(user_id = %session.user_id, "session references a missing user; destroying it");
                state.sessions.destroy(&session_id).await;
                Err(AuthRejection {
                    error: AppError::Unauthorized(USER_GONE.into()),
                    clear_cookie: keys.clear_cookie().ok(),
                })
            }
        }
    }
}

/// [`CurrentUser`] with the `ADMIN` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if current.user.role != Role::Admin {
            warn!(user_id = %current.user.id, "admin route refused");
            return Err(AppError::Forbidden("Admin access required".into()).into());
        }
        Ok(AdminUser(current))
    }
}

/// Caller details recorded on new sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // First hop of X-Forwarded-For when behind a proxy, else the socket peer.
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientMeta {
            user_agent,
            ip_address: forwarded.or(peer),
        })
    }
}
