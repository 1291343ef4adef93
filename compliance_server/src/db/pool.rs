use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{ServiceError, ServiceResult};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Per-connection pragmas; SQLite does not persist them.
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "compliance.db".to_string())
}

pub fn init_pool(database_url: &str, max_size: u32) -> ServiceResult<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Ok(Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)?)
}

/// Apply any embedded migrations that have not run yet.
pub fn run_migrations(conn: &mut SqliteConnection) -> ServiceResult<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ServiceError::Unexpected(format!("migrations failed: {}", e)))?;
    for version in applied {
        log::info!("Applied migration {}", version);
    }
    Ok(())
}
