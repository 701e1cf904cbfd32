use axum::{extract::FromRef, http::HeaderValue};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{
    cookie::SessionKeys,
    extractors::ClientMeta,
    session::{generate_refresh_token, NewSession, Session},
};
use crate::{mailer::OutgoingEmail, state::AppState};

pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// How long a newly opened session should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Interactive login; lives for the configured cookie lifetime.
    Login,
    /// Opened by signup or password reset; long-lived and carries a refresh token.
    Extended,
}

/// Opens a session for `user_id` and returns it with its `Set-Cookie` value.
pub async fn open_session(
    state: &AppState,
    user_id: Uuid,
    meta: ClientMeta,
    kind: SessionKind,
) -> anyhow::Result<(Session, HeaderValue)> {
    let cfg = &state.config.session;
    let (ttl, refresh_token) = match kind {
        SessionKind::Login => (Duration::hours(cfg.ttl_hours), None),
        SessionKind::Extended => (
            Duration::days(cfg.long_ttl_days),
            Some(generate_refresh_token()),
        ),
    };

    let session = state
        .sessions
        .create(NewSession {
            user_id,
            refresh_token,
            user_agent: meta.user_agent,
            ip_address: meta.ip_address,
            ttl,
        })
        .await;
    let cookie = SessionKeys::from_ref(state).set_cookie(&session)?;
    Ok((session, cookie))
}

pub fn generate_reset_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn reset_token_expiry(now: OffsetDateTime) -> OffsetDateTime {
    now + RESET_TOKEN_TTL
}

pub fn reset_link(client_url: &str, token: &str) -> String {
    format!("{}/reset-password/{}", client_url.trim_end_matches('/'), token)
}

pub fn reset_email(to: &str, link: &str) -> OutgoingEmail {
    let text = format!(
        "Forgot your password? Open the link below and submit your new password and its confirmation:\n{link}\n\
         If you didn't forget your password, please ignore this email!"
    );
    let html = format!("<p>{}</p>", text.replace('\n', "<br>"));
    OutgoingEmail {
        to: to.to_string(),
        subject: "Your password reset token (valid for 1 hour)".into(),
        text,
        html: Some(html),
    }
}
