//! Signed session cookie.
//!
//! The cookie carries an HS256 token whose subject is the session id, so a
//! guessed or edited id is rejected before the session store is consulted.
//! Lifetime is enforced by the store, not by the token.

use axum::{
    extract::FromRef,
    http::{header, HeaderMap, HeaderValue},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use super::session::Session;
use crate::{config::SessionConfig, state::AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct CookieClaims {
    pub sub: String, // session id
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    cookie_name: String,
    secure: bool,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        SessionKeys::new(&state.config.session)
    }
}

impl SessionKeys {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            cookie_name: cfg.cookie_name.clone(),
            secure: cfg.secure,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn sign(&self, session_id: &str) -> anyhow::Result<String> {
        let claims = CookieClaims {
            sub: session_id.to_string(),
            iat: OffsetDateTime::now_utc().unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Returns the session id carried by a cookie value.
    pub fn verify(&self, token: &str) -> anyhow::Result<String> {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "iss", "aud"]);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<CookieClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims.sub)
    }

    /// Session id from the request's cookie, if present and correctly signed.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        let value = read_cookie(headers, &self.cookie_name)?;
        match self.verify(&value) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(error = %e, "rejected session cookie");
                None
            }
        }
    }

    /// `Set-Cookie` value for a freshly opened session.
    pub fn set_cookie(&self, session: &Session) -> anyhow::Result<HeaderValue> {
        let token = self.sign(&session.id)?;
        let max_age = session.remaining_secs(OffsetDateTime::now_utc());
        let value = format!(
            "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}{}",
            self.cookie_name,
            token,
            self.same_site(),
            max_age,
            if self.secure { "; Secure" } else { "" },
        );
        Ok(HeaderValue::from_str(&value)?)
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie.
    pub fn clear_cookie(&self) -> anyhow::Result<HeaderValue> {
        let value = format!(
            "{}=; Path=/; HttpOnly; SameSite={}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT{}",
            self.cookie_name,
            self.same_site(),
            if self.secure { "; Secure" } else { "" },
        );
        Ok(HeaderValue::from_str(&value)?)
    }

    fn same_site(&self) -> &'static str {
        // Cross-site requests from the dashboard origin need None, which browsers only accept with Secure.
        if self.secure {
            "None"
        } else {
            "Lax"
        }
    }
}

/// First value of the named cookie across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
