use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

use retail_media::{
    app::build_app,
    auth::cookie::SessionKeys,
    config::AppConfig,
    mailer::RecordingMailer,
    state::AppState,
    users::{ensure_admin, NewUser, Role},
};

const PASSWORD: &str = "Str0ng!Pass";

struct TestApp {
    router: Router,
    state: AppState,
    mailer: RecordingMailer,
}

impl TestApp {
    fn new() -> Self {
        Self::with_mailer(RecordingMailer::new())
    }

    fn with_mailer(mailer: RecordingMailer) -> Self {
        let state = AppState::in_memory(AppConfig::local(), mailer.clone());
        let router = build_app(state.clone()).unwrap();
        Self {
            router,
            state,
            mailer,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> (StatusCode, Option<String>, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let set_cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, set_cookie, value)
    }

    /// Signs up and returns the `name=value` cookie pair.
    async fn signup(&self, name: &str, email: &str) -> String {
        let (status, cookie, body) = self
            .send(
                "POST",
                "/api/auth/signup",
                Some(json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "passwordConfirm": PASSWORD,
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        cookie_pair(&cookie.expect("signup sets a cookie"))
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Option<String>, Value) {
        self.send(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": email, "password": password })),
            None,
        )
        .await
    }

    fn last_reset_token(&self) -> String {
        let sent = self.mailer.sent();
        let email = sent.last().expect("a reset email");
        email
            .text
            .split("/reset-password/")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .expect("token in reset link")
            .to_string()
    }
}

fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().trim().to_string()
}

#[tokio::test]
async fn health_and_banner() {
    let app = TestApp::new();

    let (status, _, body) = app.send("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());

    let (status, cookie, body) = app.send("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body["message"].is_string());
    assert!(body["documentation"].is_string());
    assert!(cookie.is_none());
}

#[tokio::test]
async fn signup_returns_public_user_and_session() {
    let app = TestApp::new();
    let (status, cookie, body) = app
        .send(
            "POST",
            "/api/auth/signup",
            Some(json!({
                "name": "  Jane Doe ",
                "email": "Jane@Example.com",
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
            })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    let user = &body["data"]["user"];
    assert_eq!(user["name"], "Jane Doe");
    assert_eq!(user["email"], "jane@example.com");
    assert_eq!(user["role"], "USER");
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password_hash").is_none());

    let cookie = cookie.unwrap();
    assert!(cookie.starts_with("retail-media.sid="));
    assert!(cookie.contains("HttpOnly"));

    let (status, _, me) = app
        .send("GET", "/api/auth/me", None, Some(&cookie_pair(&cookie)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["user"]["email"], "jane@example.com");
}

#[tokio::test]
async fn signup_with_mismatched_passwords_creates_nothing() {
    let app = TestApp::new();
    let (status, cookie, body) = app
        .send(
            "POST",
            "/api/auth/signup",
            Some(json!({
                "name": "Jane",
                "email": "jane@example.com",
                "password": PASSWORD,
                "passwordConfirm": "Str0ng!Pasz",
            })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(cookie.is_none());
    assert_eq!(body["status"], "fail");
    assert_eq!(body["errors"][0]["path"], "passwordConfirm");
    assert_eq!(body["errors"][0]["message"], "Passwords do not match");
    assert_eq!(app.state.users.count().await.unwrap(), 0);
}

#[tokio::test]
async fn validation_reports_every_bad_field() {
    let app = TestApp::new();
    let (status, _, body) = app
        .send(
            "POST",
            "/api/auth/signup",
            Some(json!({ "name": "J", "email": "nope", "password": "short" })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    let paths: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"name"));
    assert!(paths.contains(&"email"));
    assert!(paths.contains(&"password"));
    assert!(paths.contains(&"passwordConfirm"));
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = TestApp::new();
    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_signup_is_rejected() {
    let app = TestApp::new();
    app.signup("Jane", "jane@example.com").await;

    let (status, _, body) = app
        .send(
            "POST",
            "/api/auth/signup",
            Some(json!({
                "name": "Other Jane",
                "email": "JANE@example.com",
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");
    assert_eq!(app.state.users.count().await.unwrap(), 1);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.signup("Jane", "jane@example.com").await;

    let unknown = app.login("nobody@example.com", PASSWORD).await;
    let wrong = app.login("jane@example.com", "Wr0ng!Pass").await;

    assert_eq!(unknown.0, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.0, wrong.0);
    assert_eq!(unknown.2, wrong.2);
    assert!(unknown.1.is_none() && wrong.1.is_none());

    let (status, cookie, body) = app.login("JANE@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some());
    assert_eq!(body["data"]["user"]["email"], "jane@example.com");
}

#[tokio::test]
async fn logged_out_session_cannot_authenticate() {
    let app = TestApp::new();
    let cookie = app.signup("Jane", "jane@example.com").await;

    let (status, set_cookie, body) = app
        .send("POST", "/api/auth/logout", None, Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");
    assert!(set_cookie.unwrap().contains("Max-Age=0"));

    let (status, _, body) = app.send("GET", "/api/auth/me", None, Some(&cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "fail");

    let (status, _, _) = app
        .send("POST", "/api/auth/logout", None, Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_and_tampered_cookies_are_rejected() {
    let app = TestApp::new();
    let cookie = app.signup("Jane", "jane@example.com").await;

    let (status, _, _) = app.send("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Flip one character inside the signature segment.
    let mut chars: Vec<char> = cookie.chars().collect();
    let at = chars.len() - 10;
    chars[at] = if chars[at] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();
    let (status, _, _) = app.send("GET", "/api/auth/me", None, Some(&tampered)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = "retail-media.sid=not-a-signed-token";
    let (status, _, _) = app.send("GET", "/api/auth/me", None, Some(forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleted_user_session_is_destroyed() {
    let app = TestApp::new();
    let cookie = app.signup("Jane", "jane@example.com").await;
    assert_eq!(app.state.sessions.active_count().await, 1);

    let user = app
        .state
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(app.state.users.delete(user.id).await.unwrap());

    let (status, set_cookie, _) = app.send("GET", "/api/auth/me", None, Some(&cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(set_cookie.unwrap().contains("Max-Age=0"));
    assert_eq!(app.state.sessions.active_count().await, 0);
}

#[tokio::test]
async fn forgot_password_always_succeeds() {
    let app = TestApp::new();
    app.signup("Jane", "jane@example.com").await;

    let known = app
        .send(
            "POST",
            "/api/auth/forgot-password",
            Some(json!({ "email": "jane@example.com" })),
            None,
        )
        .await;
    let unknown = app
        .send(
            "POST",
            "/api/auth/forgot-password",
            Some(json!({ "email": "nobody@example.com" })),
            None,
        )
        .await;

    assert_eq!(known.0, StatusCode::OK);
    assert_eq!(unknown.0, StatusCode::OK);
    assert_eq!(known.2, unknown.2);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jane@example.com");
    assert!(sent[0].text.contains("http://localhost:5173/reset-password/"));
}

#[tokio::test]
async fn forgot_password_mail_failure_clears_token() {
    let app = TestApp::with_mailer(RecordingMailer::failing());
    app.signup("Jane", "jane@example.com").await;

    let (status, _, _) = app
        .send(
            "POST",
            "/api/auth/forgot-password",
            Some(json!({ "email": "jane@example.com" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let user = app
        .state
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(user.reset_token.is_none());
    assert!(user.reset_token_expires.is_none());
}

#[tokio::test]
async fn reset_token_works_once_and_revokes_old_sessions() {
    let app = TestApp::new();
    let old_cookie = app.signup("Jane", "jane@example.com").await;

    app.send(
        "POST",
        "/api/auth/forgot-password",
        Some(json!({ "email": "jane@example.com" })),
        None,
    )
    .await;
    let token = app.last_reset_token();
    let new_password = "N3w!Passw0rd";
    let body = json!({ "password": new_password, "passwordConfirm": new_password });
    let uri = format!("/api/auth/reset-password/{token}");

    let (status, cookie, res) = app.send("POST", &uri, Some(body.clone()), None).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    assert_eq!(res["message"], "Password updated successfully");
    let new_cookie = cookie_pair(&cookie.unwrap());

    let (status, _, res) = app.send("POST", &uri, Some(body), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["message"], "Token is invalid or has expired");

    let (status, _, _) = app.send("GET", "/api/auth/me", None, Some(&old_cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = app.send("GET", "/api/auth/me", None, Some(&new_cookie)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.login("jane@example.com", PASSWORD).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("jane@example.com", new_password).await.0, StatusCode::OK);
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let app = TestApp::new();
    app.signup("Jane", "jane@example.com").await;
    let user = app
        .state
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();

    let expired = OffsetDateTime::now_utc() - Duration::minutes(1);
    app.state
        .users
        .set_reset_token(user.id, Some("stale-token"), Some(expired))
        .await
        .unwrap();

    let (status, _, body) = app
        .send(
            "POST",
            "/api/auth/reset-password/stale-token",
            Some(json!({ "password": "N3w!Passw0rd", "passwordConfirm": "N3w!Passw0rd" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Token is invalid or has expired");
}

#[tokio::test]
async fn stub_endpoints_require_a_session() {
    let app = TestApp::new();

    let (status, _, _) = app.send("GET", "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = app.signup("Jane", "jane@example.com").await;
    let (status, _, body) = app.send("GET", "/api/projects", None, Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Projects endpoint");

    let (status, _, body) = app
        .send("POST", "/api/ai/generate", Some(json!({})), Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "AI generation endpoint");
}

#[tokio::test]
async fn settings_merge_and_update() {
    let app = TestApp::new();
    let cookie = app.signup("Jane", "jane@example.com").await;

    let (status, _, body) = app.send("GET", "/api/settings", None, Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["settings"],
        json!({ "name": "Jane", "email": "jane@example.com" })
    );

    let (status, _, body) = app
        .send(
            "PUT",
            "/api/settings",
            Some(json!({ "name": "Jane Doe", "email": "JD@Example.com", "theme": "dark" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["data"]["settings"],
        json!({ "name": "Jane Doe", "email": "jd@example.com", "theme": "dark" })
    );

    let (_, _, me) = app.send("GET", "/api/auth/me", None, Some(&cookie)).await;
    assert_eq!(me["data"]["user"]["email"], "jd@example.com");
}

#[tokio::test]
async fn settings_email_taken_by_someone_else() {
    let app = TestApp::new();
    app.signup("Other", "other@example.com").await;
    let cookie = app.signup("Jane", "jane@example.com").await;

    let (status, _, body) = app
        .send(
            "PUT",
            "/api/settings",
            Some(json!({ "email": "other@example.com" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already in use");

    let (status, _, _) = app
        .send(
            "PUT",
            "/api/settings",
            Some(json!({ "email": "jane@example.com", "theme": "light" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_stats_need_admin_role() {
    let app = TestApp::new();
    let user_cookie = app.signup("Jane", "jane@example.com").await;

    let (status, _, body) = app
        .send("GET", "/api/admin/stats", None, Some(&user_cookie))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin access required");

    let seed = retail_media::config::AdminSeed {
        email: "admin@example.com".into(),
        password: "Adm1n!pass".into(),
        name: "Admin User".into(),
    };
    assert!(ensure_admin(app.state.users.as_ref(), &seed).await.unwrap());

    let (status, cookie, _) = app.login("admin@example.com", "Adm1n!pass").await;
    assert_eq!(status, StatusCode::OK);
    let admin_cookie = cookie_pair(&cookie.unwrap());

    let (status, _, body) = app
        .send("GET", "/api/admin/stats", None, Some(&admin_cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["users"], 2);
    assert_eq!(body["data"]["activeSessions"], 2);
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let app = TestApp::new();
    let padding = "x".repeat(20 * 1024);
    let (status, _, body) = app
        .send(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "jane@example.com", "password": padding })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Request body is too large");
}

#[tokio::test]
async fn store_created_admin_role_survives_login() {
    let app = TestApp::new();
    let hash = retail_media::auth::password::hash_password(PASSWORD).unwrap();
    app.state
        .users
        .create(NewUser {
            name: "Root".into(),
            email: "root@example.com".into(),
            password_hash: hash,
            role: Role::Admin,
        })
        .await
        .unwrap();

    let (status, _, body) = app.login("root@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "ADMIN");
}

async fn post_json(router: Router, uri: String, body: Value) -> StatusCode {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    router.oneshot(req).await.unwrap().status()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_signups_for_one_email() {
    let app = TestApp::new();
    let body = json!({
        "name": "Jane",
        "email": "jane@example.com",
        "password": PASSWORD,
        "passwordConfirm": PASSWORD,
    });

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            tokio::spawn(post_json(
                app.router.clone(),
                "/api/auth/signup".into(),
                body.clone(),
            ))
        })
        .collect();
    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(),
        3,
        "{statuses:?}"
    );
    assert_eq!(app.state.users.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resets_spend_the_token_once() {
    let app = TestApp::new();
    app.signup("Jane", "jane@example.com").await;
    app.send(
        "POST",
        "/api/auth/forgot-password",
        Some(json!({ "email": "jane@example.com" })),
        None,
    )
    .await;
    let uri = format!("/api/auth/reset-password/{}", app.last_reset_token());

    let tasks: Vec<_> = ["N3w!Passw0rd", "Oth3r!Passw0rd", "Th1rd!Passw0rd"]
        .into_iter()
        .map(|password| {
            tokio::spawn(post_json(
                app.router.clone(),
                uri.clone(),
                json!({ "password": password, "passwordConfirm": password }),
            ))
        })
        .collect();
    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1, "{statuses:?}");
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 2);
}

#[tokio::test]
async fn store_rejects_an_email_claimed_after_the_precheck() {
    let app = TestApp::new();
    app.signup("Other", "other@example.com").await;
    app.signup("Jane", "jane@example.com").await;
    let jane = app
        .state
        .users
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();

    // The handler's pre-check passes for a free email; the store is what
    // rejects it once another account has claimed it.
    let update = retail_media::users::ProfileUpdate {
        email: Some("other@example.com".into()),
        ..Default::default()
    };
    let err = app.state.users.update_profile(jane.id, update).await.unwrap_err();
    assert!(retail_media::users::is_duplicate_email(&err));
}

#[tokio::test]
async fn authenticated_requests_roll_the_session() {
    let app = TestApp::new();
    let cookie = app.signup("Jane", "jane@example.com").await;

    let keys = SessionKeys::new(&app.state.config.session);
    let token = cookie.split_once('=').unwrap().1;
    let session_id = keys.verify(token).unwrap();
    let before = app.state.sessions.get(&session_id).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let (status, set_cookie, _) = app.send("GET", "/api/auth/me", None, Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);

    let set_cookie = set_cookie.expect("session cookie re-issued");
    assert!(set_cookie.starts_with("retail-media.sid="));
    assert!(set_cookie.contains("Max-Age="));
    assert!(!set_cookie.contains("Max-Age=0;"));

    let after = app.state.sessions.get(&session_id).await.unwrap();
    assert!(after.expires_at > before.expires_at);

    // The re-issued cookie names the same session.
    let reissued = cookie_pair(&set_cookie);
    let (status, _, _) = app.send("GET", "/api/auth/me", None, Some(&reissued)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn requests_without_a_session_get_no_cookie() {
    let app = TestApp::new();
    let (_, set_cookie, _) = app.send("GET", "/api/health", None, None).await;
    assert!(set_cookie.is_none());

    let (status, set_cookie, _) = app.send("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(set_cookie.is_none());
}
