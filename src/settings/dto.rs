use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::validation::{Errors, FieldError, Validate};

/// `PUT /settings` body: profile columns plus arbitrary preference keys.
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub preferences: Map<String, Value>,
}

impl Validate for SettingsUpdate {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        if let Some(name) = &self.name {
            errors.name("name", name);
        }
        if let Some(email) = &self.email {
            errors.email("email", email);
        }
        errors.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsData {
    pub settings: Map<String, Value>,
}

/// Stored preferences overlaid with the profile's name and email.
pub fn merged_settings(name: &str, email: &str, stored: Option<&str>) -> Map<String, Value> {
    let mut merged = match stored.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(Ok(other)) => {
            warn!(kind = ?other, "stored settings are not an object; ignoring");
            Map::new()
        }
        Some(Err(e)) => {
            warn!(error = %e, "stored settings are not valid JSON; ignoring");
            Map::new()
        }
        None => Map::new(),
    };
    merged.insert("name".into(), Value::String(name.to_string()));
    merged.insert("email".into(), Value::String(email.to_string()));
    merged
}
