use rocket::serde::json::Json;
use rocket::{get, State};

use crate::audit_log::{self, ComplianceRecord};
use crate::auth::Actor;
use crate::db;
use crate::error::ServiceError;
use crate::routes::parse_date;
use crate::sites;
use crate::state::AppState;

/// Compliance records of a site, newest first
#[get("/records?<site_id>&<from>&<to>&<limit>")]
pub async fn site_records(
    state: &State<AppState>,
    actor: Actor,
    site_id: i32,
    from: Option<&str>,
    to: Option<&str>,
    limit: Option<i64>,
) -> Result<Json<Vec<ComplianceRecord>>, ServiceError> {
    let from = parse_date(from, "from")?;
    let to = parse_date(to, "to")?;
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err(ServiceError::validation("from must not be after to"));
        }
    }

    db::run(&state.db_pool, move |conn| {
        sites::find_site(conn, &actor.company_id, site_id)?;
        audit_log::list_for_site(conn, site_id, from, to, limit)
    })
    .await
    .map(Json)
}
