//! Compliance task server: recurring task templates, daily instance
//! generation, reading-checked completion and an append-only audit trail.

pub mod audit_log;
pub mod auth;
pub mod completion;
pub mod db;
pub mod error;
pub mod generator;
pub mod instances;
pub mod models;
pub mod readings;
pub mod routes;
pub mod schedule;
pub mod schema;
pub mod settings;
pub mod sites;
pub mod state;
pub mod tasks;
pub mod templates;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};

use crate::state::AppState;

/// Options the binary and the integration tests differ on.
#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Spawn the periodic instance generator after liftoff.
    pub background_tasks: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { background_tasks: true }
    }
}

/// Build the Rocket instance around an already migrated pool.
pub fn build_rocket(pool: db::DbPool, options: ServerOptions) -> Result<Rocket<Build>, error::ServiceError> {
    let settings = {
        let mut conn = pool.get()?;
        db::load_settings(&mut conn)?
    };
    log::info!(
        "Loaded settings: auto_generate={}, interval={}s, utc_offset={}min",
        settings.auto_generate_enabled,
        settings.generation_interval_seconds,
        settings.utc_offset_minutes
    );

    let state = AppState::new(pool, settings);
    let mut rocket = rocket::build()
        .manage(state.clone())
        .mount("/api", routes::api_routes())
        .register("/api", routes::api_catchers());

    if options.background_tasks {
        rocket = rocket.attach(AdHoc::on_liftoff("Instance generator", move |_| {
            let state = state.clone();
            Box::pin(async move {
                tasks::spawn_instance_generator(state);
            })
        }));
    }

    Ok(rocket)
}
