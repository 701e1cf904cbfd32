//! HTTP client for the auth API and the signed-in state a dashboard keeps
//! around it.
//!
//! [`AuthClient`] holds a cookie jar, so the session cookie set by login or
//! signup is replayed on later calls. [`AuthContext`] layers the dashboard's
//! view on top: who is signed in, whether a call is in flight, and the last
//! error to show.

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::{auth::dto::UserData, response::Envelope, users::PublicUser};

pub const LOGIN_FALLBACK: &str = "Failed to sign in. Please check your credentials.";
pub const SIGNUP_FALLBACK: &str = "Failed to create an account. Please try again.";
pub const LOGIN_REQUIRED_FIELDS: &str = "Email and password are required";
pub const SIGNUP_REQUIRED_FIELDS: &str = "All fields are required";
pub const SIGNUP_SHORT_PASSWORD: &str = "Password must be at least 6 characters";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("request failed with {status}")]
    Api {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("response had no data")]
    MissingData,
}

impl ClientError {
    /// The `message` field of the server's error body, when there was one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Api { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignupBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
    password_confirm: &'a str,
}

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetBody<'a> {
    password: &'a str,
    password_confirm: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    base_url: String,
}

impl AuthClient {
    /// `base_url` is the API root, e.g. `http://localhost:4000/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(
        res: reqwest::Response,
    ) -> Result<Envelope<T>, ClientError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res.json::<Envelope<T>>().await?);
        }
        let message = res
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);
        Err(ClientError::Api { status, message })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ClientError> {
        let res = self.http.post(self.url(path)).json(body).send().await?;
        Self::decode(res).await
    }

    fn user(envelope: Envelope<UserData>) -> Result<PublicUser, ClientError> {
        envelope
            .data
            .map(|d| d.user)
            .ok_or(ClientError::MissingData)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let env = self
            .post("/auth/login", &Credentials { email, password })
            .await?;
        Self::user(env)
    }

    #[instrument(skip(self, password))]
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, ClientError> {
        let body = SignupBody {
            name,
            email,
            password,
            password_confirm: password,
        };
        let env = self.post("/auth/signup", &body).await?;
        Self::user(env)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.post::<_, serde_json::Value>("/auth/logout", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    pub async fn me(&self) -> Result<PublicUser, ClientError> {
        let res = self.http.get(self.url("/auth/me")).send().await?;
        Self::user(Self::decode(res).await?)
    }

    /// Returns the server's confirmation message.
    pub async fn forgot_password(&self, email: &str) -> Result<String, ClientError> {
        let env = self
            .post::<_, serde_json::Value>("/auth/forgot-password", &EmailBody { email })
            .await?;
        Ok(env.message.unwrap_or_default())
    }

    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<PublicUser, ClientError> {
        let body = ResetBody {
            password,
            password_confirm,
        };
        let env = self
            .post(&format!("/auth/reset-password/{}", token), &body)
            .await?;
        Self::user(env)
    }
}

/// What the dashboard knows about the signed-in user.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub current_user: Option<PublicUser>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct AuthContext {
    client: AuthClient,
    state: AuthState,
}

impl AuthContext {
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            state: AuthState::default(),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn current_user(&self) -> Option<&PublicUser> {
        self.state.current_user.as_ref()
    }

    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    pub fn clear_error(&mut self) {
        self.state.error = None;
    }

    /// Where a route guard sends the user.
    pub fn redirect_target(&self) -> &'static str {
        if self.state.current_user.is_some() {
            "/dashboard"
        } else {
            "/login"
        }
    }

    fn fail(&mut self, message: String) -> String {
        self.state.loading = false;
        self.state.error = Some(message.clone());
        message
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<PublicUser, String> {
        self.state.loading = true;
        self.state.error = None;

        if email.is_empty() || password.is_empty() {
            return Err(self.fail(LOGIN_REQUIRED_FIELDS.into()));
        }

        match self.client.login(email, password).await {
            Ok(user) => {
                self.state.current_user = Some(user.clone());
                self.state.loading = false;
                Ok(user)
            }
            Err(e) => {
                let message = e.server_message().unwrap_or(LOGIN_FALLBACK).to_string();
                Err(self.fail(message))
            }
        }
    }

    /// Creates the account but leaves the context signed out; the user logs
    /// in explicitly afterwards.
    pub async fn signup(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, String> {
        self.state.loading = true;
        self.state.error = None;

        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(self.fail(SIGNUP_REQUIRED_FIELDS.into()));
        }
        if password.chars().count() < 6 {
            return Err(self.fail(SIGNUP_SHORT_PASSWORD.into()));
        }

        match self.client.signup(name, email, password).await {
            Ok(user) => {
                self.state.loading = false;
                Ok(user)
            }
            Err(e) => {
                let message = e.server_message().unwrap_or(SIGNUP_FALLBACK).to_string();
                Err(self.fail(message))
            }
        }
    }

    /// Always ends signed out, even when the server call fails.
    pub async fn logout(&mut self) {
        self.state.loading = true;
        if let Err(e) = self.client.logout().await {
            warn!(error = %e, "logout call failed; clearing local state anyway");
        }
        self.state.current_user = None;
        self.state.loading = false;
    }

    /// Re-reads the signed-in user from the server; a rejected session
    /// signs the context out.
    pub async fn refresh_current_user(&mut self) -> Option<&PublicUser> {
        self.state.loading = true;
        self.state.current_user = match self.client.me().await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "could not restore session");
                None
            }
        };
        self.state.loading = false;
        self.state.current_user.as_ref()
    }
}
