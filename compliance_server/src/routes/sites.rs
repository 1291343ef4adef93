use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, post, State};

use crate::auth::Actor;
use crate::db;
use crate::error::ServiceError;
use crate::models::Site;
use crate::sites::{self, CreateSite};
use crate::routes::{json_body, JsonBody};
use crate::state::AppState;

/// Create a site for the caller's company
#[post("/sites", format = "json", data = "<input>")]
pub async fn create_site(
    state: &State<AppState>,
    actor: Actor,
    input: JsonBody<'_, CreateSite>,
) -> Result<Custom<Json<Site>>, ServiceError> {
    let input = json_body(input)?;
    let site = db::run(&state.db_pool, move |conn| {
        sites::create_site(conn, &actor.company_id, &input)
    })
    .await?;
    Ok(Custom(Status::Created, Json(site)))
}

/// List sites
#[get("/sites?<include_inactive>")]
pub async fn list_sites(
    state: &State<AppState>,
    actor: Actor,
    include_inactive: Option<bool>,
) -> Result<Json<Vec<Site>>, ServiceError> {
    let include_inactive = include_inactive.unwrap_or(false);
    db::run(&state.db_pool, move |conn| {
        sites::list_sites(conn, &actor.company_id, include_inactive)
    })
    .await
    .map(Json)
}

/// Soft-deactivate a site
#[post("/sites/<site_id>/deactivate")]
pub async fn deactivate_site(
    state: &State<AppState>,
    actor: Actor,
    site_id: i32,
) -> Result<Json<Site>, ServiceError> {
    db::run(&state.db_pool, move |conn| {
        sites::deactivate_site(conn, &actor.company_id, site_id)
    })
    .await
    .map(Json)
}
