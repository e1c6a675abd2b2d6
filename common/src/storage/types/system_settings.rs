use serde::{Deserialize, Serialize};

use crate::storage::types::document::deserialize_flexible_id;
use crate::{
    error::AppError, storage::db::SurrealDbClient, storage::types::StoredObject,
    utils::config::AppConfig,
};

/// Runtime-adjustable answering parameters, kept as a singleton row so model
/// changes do not require a restart. Seeded from `AppConfig` on first boot.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemSettings {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub query_model: String,
    pub query_temperature: f32,
    pub query_max_tokens: u32,
    pub query_system_prompt: String,
    pub embedding_dimensions: u32,
}

impl StoredObject for SystemSettings {
    fn table_name() -> &'static str {
        "system_settings"
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

impl SystemSettings {
    pub fn from_config(config: &AppConfig, embedding_dimensions: u32) -> Self {
        Self {
            id: "current".to_string(),
            query_model: config.query_model.clone(),
            query_temperature: config.query_temperature,
            query_max_tokens: config.query_max_tokens,
            query_system_prompt:
                crate::storage::types::system_prompts::DEFAULT_QUERY_SYSTEM_PROMPT.to_string(),
            embedding_dimensions,
        }
    }

    pub async fn ensure_initialized(
        db: &SurrealDbClient,
        config: &AppConfig,
        embedding_dimensions: u32,
    ) -> Result<Self, AppError> {
        let settings: Option<Self> = db.select(("system_settings", "current")).await?;

        if settings.is_none() {
            let created: Option<SystemSettings> = db
                .create(("system_settings", "current"))
                .content(Self::from_config(config, embedding_dimensions))
                .await?;

            return created.ok_or(AppError::Validation("Failed to initialize settings".into()));
        };

        settings.ok_or(AppError::Validation("Failed to initialize settings".into()))
    }

    pub async fn get_current(db: &SurrealDbClient) -> Result<Self, AppError> {
        let settings: Option<Self> = db
            .client
            .query("SELECT * FROM type::thing('system_settings', 'current')")
            .await?
            .take(0)?;

        settings.ok_or(AppError::NotFound("System settings not found".into()))
    }

    pub async fn update(db: &SurrealDbClient, changes: Self) -> Result<Self, AppError> {
        let updated: Option<Self> = db
            .client
            .query("UPDATE type::thing('system_settings', 'current') MERGE $changes RETURN AFTER")
            .bind(("changes", changes))
            .await?
            .take(0)?;

        updated.ok_or(AppError::Validation(
            "Something went wrong updating the settings".into(),
        ))
    }
}
