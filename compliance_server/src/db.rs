use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

pub mod logger;
pub mod pool;

pub use logger::init_logger;
pub use pool::{init_pool, run_migrations, DbPool};

use crate::error::{ServiceError, ServiceResult};
use crate::settings::ServerSettings;

diesel::define_sql_function! {
    /// Rowid of the last successful INSERT on this connection.
    fn last_insert_rowid() -> diesel::sql_types::BigInt;
}

/// Run blocking Diesel work on the blocking thread pool with a pooled connection.
pub async fn run<T, F>(pool: &DbPool, f: F) -> ServiceResult<T>
where
    F: FnOnce(&mut SqliteConnection) -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ServiceError::Unexpected(format!("blocking task failed: {}", e)))?
}

/// Struct representing a row in server_settings
#[derive(Queryable)]
pub struct ServerSettingsRow {
    pub id: i32,
    pub auto_generate_enabled: bool,
    pub generation_interval_seconds: i64,
    pub utc_offset_minutes: i32,
}

/// Get current server settings from DB, defaults when none are stored
pub fn load_settings(conn: &mut SqliteConnection) -> QueryResult<ServerSettings> {
    use crate::schema::server_settings::dsl::*;

    let row = server_settings
        .order(id.asc())
        .first::<ServerSettingsRow>(conn)
        .optional()?;

    Ok(match row {
        Some(s) => ServerSettings {
            auto_generate_enabled: s.auto_generate_enabled,
            generation_interval_seconds: s.generation_interval_seconds,
            utc_offset_minutes: s.utc_offset_minutes,
        },
        None => ServerSettings::default(),
    })
}

/// Save server settings to DB (insert or update)
pub fn save_settings(conn: &mut SqliteConnection, settings: &ServerSettings) -> QueryResult<()> {
    use crate::schema::server_settings::dsl::*;

    let existing = server_settings
        .order(id.asc())
        .first::<ServerSettingsRow>(conn)
        .optional()?;

    let values = (
        auto_generate_enabled.eq(settings.auto_generate_enabled),
        generation_interval_seconds.eq(settings.generation_interval_seconds),
        utc_offset_minutes.eq(settings.utc_offset_minutes),
    );

    if let Some(row) = existing {
        diesel::update(server_settings.filter(id.eq(row.id)))
            .set(values)
            .execute(conn)?;
    } else {
        diesel::insert_into(server_settings)
            .values(values)
            .execute(conn)?;
    }

    Ok(())
}
