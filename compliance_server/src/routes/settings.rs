use rocket::serde::json::Json;
use rocket::{get, put, State};

use crate::auth::Actor;
use crate::db;
use crate::error::ServiceError;
use crate::settings::{ServerSettings, SettingsUpdate};
use crate::routes::{json_body, JsonBody};
use crate::state::AppState;

/// VIEW SETTINGS
#[get("/settings")]
pub async fn view_settings(state: &State<AppState>, _actor: Actor) -> Json<ServerSettings> {
    Json(state.settings_snapshot())
}

/// UPDATE SETTINGS
#[put("/settings", format = "json", data = "<update>")]
pub async fn update_settings(
    state: &State<AppState>,
    actor: Actor,
    update: JsonBody<'_, SettingsUpdate>,
) -> Result<Json<ServerSettings>, ServiceError> {
    let update = json_body(update)?;
    let pool = state.db_pool.clone();

    let settings = db::run(&pool, move |conn| {
        // Load existing settings
        let mut settings = db::load_settings(conn)?;

        // Apply changes
        settings.apply(update)?;

        // Save updated settings to DB
        db::save_settings(conn, &settings)?;
        Ok(settings)
    })
    .await?;

    // Update shared in-memory settings
    if let Ok(mut guard) = state.settings.write() {
        *guard = settings.clone();
    }

    log::info!(
        "Settings updated by {} ({}): {:?}",
        actor.user_id,
        actor.company_id,
        settings
    );
    Ok(Json(settings))
}
