use axum::{
    extract::{FromRef, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::cookie::SessionKeys;
use crate::state::AppState;

/// Rolls the caller's session forward after every response and re-sends the
/// cookie with a fresh `Max-Age`. Responses that already set the cookie
/// (login, logout, a dropped session) are left untouched.
pub async fn roll_session(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let keys = SessionKeys::from_ref(&state);
    let session_id = keys.session_id(req.headers());

    let mut response = next.run(req).await;

    let Some(session_id) = session_id else {
        return response;
    };
    if response.headers().contains_key(header::SET_COOKIE) {
        return response;
    }

    match state.sessions.touch(&session_id).await {
        Some(session) => match keys.set_cookie(&session) {
            Ok(cookie) => {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            Err(e) => warn!(error = %e, "could not re-issue session cookie"),
        },
        None => debug!("no live session to roll"),
    }
    response
}
