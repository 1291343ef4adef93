use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::serde::Deserialize;
use rocket::{delete, get, patch, post, State};

use crate::auth::Actor;
use crate::db;
use crate::error::ServiceError;
use crate::routes::{json_body, JsonBody};
use crate::state::AppState;
use crate::templates::{self, CreateTemplate, TemplateView, UpdateTemplate};

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct DeployRequest {
    pub site_ids: Vec<i32>,
}

#[post("/templates", format = "json", data = "<input>")]
pub async fn create_template(
    state: &State<AppState>,
    actor: Actor,
    input: JsonBody<'_, CreateTemplate>,
) -> Result<Custom<Json<TemplateView>>, ServiceError> {
    let input = json_body(input)?;
    let view = db::run(&state.db_pool, move |conn| {
        templates::create_template(conn, &actor.company_id, &input)
    })
    .await?;
    Ok(Custom(Status::Created, Json(view)))
}

#[get("/templates?<include_inactive>")]
pub async fn list_templates(
    state: &State<AppState>,
    actor: Actor,
    include_inactive: Option<bool>,
) -> Result<Json<Vec<TemplateView>>, ServiceError> {
    let include_inactive = include_inactive.unwrap_or(false);
    db::run(&state.db_pool, move |conn| {
        templates::list_templates(conn, &actor.company_id, include_inactive)
    })
    .await
    .map(Json)
}

#[get("/templates/<template_id>")]
pub async fn get_template(
    state: &State<AppState>,
    actor: Actor,
    template_id: i32,
) -> Result<Json<TemplateView>, ServiceError> {
    db::run(&state.db_pool, move |conn| {
        templates::get_template(conn, &actor.company_id, template_id)
    })
    .await
    .map(Json)
}

/// Partial update; absent fields are left unchanged
#[patch("/templates/<template_id>", format = "json", data = "<update>")]
pub async fn update_template(
    state: &State<AppState>,
    actor: Actor,
    template_id: i32,
    update: JsonBody<'_, UpdateTemplate>,
) -> Result<Json<TemplateView>, ServiceError> {
    let update = json_body(update)?;
    db::run(&state.db_pool, move |conn| {
        templates::update_template(conn, &actor.company_id, template_id, update)
    })
    .await
    .map(Json)
}

#[post("/templates/<template_id>/deactivate")]
pub async fn deactivate_template(
    state: &State<AppState>,
    actor: Actor,
    template_id: i32,
) -> Result<Json<TemplateView>, ServiceError> {
    db::run(&state.db_pool, move |conn| {
        templates::deactivate_template(conn, &actor.company_id, template_id)
    })
    .await
    .map(Json)
}

#[post("/templates/<template_id>/deploy", format = "json", data = "<request>")]
pub async fn deploy_template(
    state: &State<AppState>,
    actor: Actor,
    template_id: i32,
    request: JsonBody<'_, DeployRequest>,
) -> Result<Json<TemplateView>, ServiceError> {
    let site_ids = json_body(request)?.site_ids;
    db::run(&state.db_pool, move |conn| {
        templates::deploy_template(conn, &actor.company_id, template_id, &site_ids)
    })
    .await
    .map(Json)
}

#[delete("/templates/<template_id>/sites/<site_id>")]
pub async fn undeploy_template(
    state: &State<AppState>,
    actor: Actor,
    template_id: i32,
    site_id: i32,
) -> Result<Json<TemplateView>, ServiceError> {
    db::run(&state.db_pool, move |conn| {
        templates::undeploy_template(conn, &actor.company_id, template_id, site_id)
    })
    .await
    .map(Json)
}
