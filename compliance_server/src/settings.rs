use serde::{Serialize, Deserialize};

use crate::error::{ServiceError, ServiceResult};

/// Runtime settings stored in the `server_settings` table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    /// Run the instance generator in the background.
    pub auto_generate_enabled: bool,
    pub generation_interval_seconds: i64,
    /// Offset applied to UTC when deciding what "today" is.
    pub utc_offset_minutes: i32,
}

/// Partial update; absent fields keep their current value.
#[derive(Deserialize, Debug, Default)]
pub struct SettingsUpdate {
    pub auto_generate_enabled: Option<bool>,
    pub generation_interval_seconds: Option<i64>,
    pub utc_offset_minutes: Option<i32>,
}

impl ServerSettings {
    pub fn apply(&mut self, update: SettingsUpdate) -> ServiceResult<()> {
        if let Some(v) = update.generation_interval_seconds {
            if !(10..=86_400).contains(&v) {
                return Err(ServiceError::validation(
                    "generation_interval_seconds must be between 10 and 86400",
                ));
            }
            self.generation_interval_seconds = v;
        }
        if let Some(v) = update.utc_offset_minutes {
            if !(-14 * 60..=14 * 60).contains(&v) {
                return Err(ServiceError::validation("utc_offset_minutes must be within +/-14h"));
            }
            self.utc_offset_minutes = v;
        }
        if let Some(v) = update.auto_generate_enabled {
            self.auto_generate_enabled = v;
        }
        Ok(())
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            auto_generate_enabled: true,
            generation_interval_seconds: 300,
            utc_offset_minutes: 0,
        }
    }
}
