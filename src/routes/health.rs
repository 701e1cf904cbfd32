use axum::Json;
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Serialize)]
pub struct Banner {
    pub status: &'static str,
    pub message: &'static str,
    pub documentation: &'static str,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub async fn root() -> Json<Banner> {
    Json(Banner {
        status: "success",
        message: "Retail Media API is running",
        documentation: "Please use the API endpoints starting with /api",
        time: now_rfc3339(),
    })
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        timestamp: now_rfc3339(),
    })
}
