use chrono::NaiveDate;
use rocket::serde::json::Json;
use rocket::serde::Deserialize;
use rocket::{get, post, State};

use crate::audit_log::{self, ComplianceRecord};
use crate::auth::Actor;
use crate::completion::{self, CompletionRequest, RemediationRequest};
use crate::db;
use crate::error::ServiceError;
use crate::generator::{self, GenerationScope, GenerationSummary};
use crate::instances::{self, InstanceFilter, InstanceView};
use crate::schedule::{self, InstanceStatus};
use crate::sites;
use crate::routes::{json_body, parse_date, JsonBody};
use crate::state::AppState;

#[derive(Deserialize, Default)]
#[serde(crate = "rocket::serde")]
pub struct GenerateRequest {
    /// Defaults to today at the configured UTC offset.
    pub date: Option<NaiveDate>,
    pub site_id: Option<i32>,
}

/// Materialize the caller's instances for a date
#[post("/instances/generate", format = "json", data = "<request>")]
pub async fn generate_instances(
    state: &State<AppState>,
    actor: Actor,
    request: JsonBody<'_, GenerateRequest>,
) -> Result<Json<GenerationSummary>, ServiceError> {
    let request = json_body(request)?;
    let settings = state.settings_snapshot();
    let date = request
        .date
        .unwrap_or_else(|| schedule::today(settings.utc_offset_minutes));

    db::run(&state.db_pool, move |conn| {
        if let Some(site_id) = request.site_id {
            sites::find_site(conn, &actor.company_id, site_id)?;
        }
        let scope = GenerationScope {
            company_id: Some(actor.company_id.clone()),
            site_id: request.site_id,
        };
        generator::generate_for_date(conn, date, &scope)
    })
    .await
    .map(Json)
}

#[get("/instances?<site_id>&<date>&<status>&<limit>")]
pub async fn list_instances(
    state: &State<AppState>,
    actor: Actor,
    site_id: Option<i32>,
    date: Option<&str>,
    status: Option<&str>,
    limit: Option<i64>,
) -> Result<Json<Vec<InstanceView>>, ServiceError> {
    let filter = InstanceFilter {
        site_id,
        date: parse_date(date, "date")?,
        status: status.map(str::parse::<InstanceStatus>).transpose()?,
        limit,
    };
    let now = schedule::local_now(state.settings_snapshot().utc_offset_minutes);

    db::run(&state.db_pool, move |conn| {
        instances::list_instances(conn, &actor.company_id, &filter, now)
    })
    .await
    .map(Json)
}

#[get("/instances/<instance_id>")]
pub async fn get_instance(
    state: &State<AppState>,
    actor: Actor,
    instance_id: i32,
) -> Result<Json<InstanceView>, ServiceError> {
    let now = schedule::local_now(state.settings_snapshot().utc_offset_minutes);
    db::run(&state.db_pool, move |conn| {
        instances::get_instance(conn, &actor.company_id, instance_id, now)
    })
    .await
    .map(Json)
}

/// Submit readings; out-of-range readings are rejected with 400
#[post("/instances/<instance_id>/complete", format = "json", data = "<request>")]
pub async fn complete_instance(
    state: &State<AppState>,
    actor: Actor,
    instance_id: i32,
    request: JsonBody<'_, CompletionRequest>,
) -> Result<Json<InstanceView>, ServiceError> {
    let request = json_body(request)?;
    let now = schedule::local_now(state.settings_snapshot().utc_offset_minutes);
    db::run(&state.db_pool, move |conn| {
        completion::complete_instance(conn, &actor, instance_id, &request, now)
    })
    .await
    .map(Json)
}

/// Remediation flow for out-of-range readings
#[post("/instances/<instance_id>/out-of-range", format = "json", data = "<request>")]
pub async fn record_out_of_range(
    state: &State<AppState>,
    actor: Actor,
    instance_id: i32,
    request: JsonBody<'_, RemediationRequest>,
) -> Result<Json<InstanceView>, ServiceError> {
    let request = json_body(request)?;
    let now = schedule::local_now(state.settings_snapshot().utc_offset_minutes);
    db::run(&state.db_pool, move |conn| {
        completion::record_out_of_range(conn, &actor, instance_id, &request, now)
    })
    .await
    .map(Json)
}

#[get("/instances/<instance_id>/records")]
pub async fn instance_records(
    state: &State<AppState>,
    actor: Actor,
    instance_id: i32,
) -> Result<Json<Vec<ComplianceRecord>>, ServiceError> {
    db::run(&state.db_pool, move |conn| {
        instances::load_for_company(conn, &actor.company_id, instance_id)?;
        audit_log::list_for_instance(conn, instance_id)
    })
    .await
    .map(Json)
}
