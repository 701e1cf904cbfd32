use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::SessionStore,
    config::AppConfig,
    db,
    mailer::{self, Mailer, RecordingMailer},
    users::{MemoryUserStore, PgUserStore, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub sessions: SessionStore,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let users: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                info!("using postgres user store");
                Arc::new(PgUserStore::new(pool))
            }
            None => {
                warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                Arc::new(MemoryUserStore::new())
            }
        };

        let mailer = mailer::from_config(config.mail.as_ref())?;

        Ok(Self::from_parts(
            users,
            SessionStore::new(),
            mailer,
            Arc::new(config),
        ))
    }

    pub fn from_parts(
        users: Arc<dyn UserStore>,
        sessions: SessionStore,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users,
            sessions,
            mailer,
            config,
        }
    }

    /// Fully in-memory state with a recording mailer, for tests and local tooling.
    pub fn in_memory(config: AppConfig, mailer: RecordingMailer) -> Self {
        Self::from_parts(
            Arc::new(MemoryUserStore::new()),
            SessionStore::new(),
            Arc::new(mailer),
            Arc::new(config),
        )
    }
}
