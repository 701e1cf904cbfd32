use serde::Deserialize;

const DEV_SESSION_SECRET: &str = "dev-secret-key-123";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of a login session.
    pub ttl_hours: i64,
    /// Lifetime of the sessions opened by signup and password reset.
    pub long_ttl_days: i64,
    pub secure: bool,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_name: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub database_url: Option<String>,
    pub client_url: String,
    pub session: SessionConfig,
    pub mail: Option<MailConfig>,
    pub admin: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let production = var("APP_ENV").map(|v| v == "production").unwrap_or(false);

        let secret = match var("SESSION_SECRET") {
            Some(secret) => secret,
            None if production => anyhow::bail!("SESSION_SECRET must be set in production"),
            None => DEV_SESSION_SECRET.to_string(),
        };

        let sweep_interval_secs = parse_or(var("SESSION_SWEEP_SECS"), 300);
        if sweep_interval_secs == 0 {
            anyhow::bail!("SESSION_SWEEP_SECS must be greater than zero");
        }

        let session = SessionConfig {
            secret,
            cookie_name: var("SESSION_COOKIE_NAME").unwrap_or_else(|| "retail-media.sid".into()),
            issuer: var("SESSION_ISSUER").unwrap_or_else(|| "retail-media".into()),
            audience: var("SESSION_AUDIENCE").unwrap_or_else(|| "retail-media-web".into()),
            ttl_hours: parse_or(var("SESSION_TTL_HOURS"), 24),
            long_ttl_days: parse_or(var("SESSION_LONG_TTL_DAYS"), 30),
            secure: production,
            sweep_interval_secs,
        };

        let mail = match var("EMAIL_HOST") {
            Some(host) => Some(MailConfig {
                host,
                port: parse_or(var("EMAIL_PORT"), 587),
                secure: var("EMAIL_SECURE").map(|v| v == "true").unwrap_or(false),
                username: var("EMAIL_USERNAME"),
                password: var("EMAIL_PASSWORD"),
                from_name: var("EMAIL_FROM_NAME").unwrap_or_else(|| "Retail Media".into()),
                from_email: var("EMAIL_FROM_EMAIL")
                    .unwrap_or_else(|| "no-reply@retail-media.local".into()),
            }),
            None => None,
        };

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: var("ADMIN_NAME").unwrap_or_else(|| "Admin User".into()),
            }),
            _ => None,
        };

        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(var("APP_PORT"), 4000),
            production,
            database_url: var("DATABASE_URL"),
            client_url: var("CLIENT_URL").unwrap_or_else(|| "http://localhost:5173".into()),
            session,
            mail,
            admin,
        })
    }

    /// Development defaults with nothing read from the environment.
    pub fn local() -> Self {
        Self::from_lookup(|_| None).expect("development defaults are always valid")
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}
