use anyhow::Context;
use rocket::launch;

use compliance_server::{build_rocket, db, ServerOptions};

#[launch]
fn rocket() -> _ {
    match db::init_logger() {
        // Dropping the handle would shut the logger down
        Ok(handle) => std::mem::forget(handle),
        Err(e) => eprintln!("Logging disabled: {:#}", e),
    }

    match setup() {
        Ok(rocket) => rocket,
        Err(e) => {
            log::error!("Startup failed: {:#}", e);
            eprintln!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn setup() -> anyhow::Result<rocket::Rocket<rocket::Build>> {
    let database_url = db::pool::database_url();
    log::info!("Using database {}", database_url);

    let pool = db::init_pool(&database_url, 8).context("failed to create DB pool")?;
    {
        let mut conn = pool.get().context("failed to get DB connection")?;
        db::run_migrations(&mut conn).context("failed to run migrations")?;
    }

    build_rocket(pool, ServerOptions::default()).context("failed to build server")
}
