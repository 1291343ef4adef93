use chrono::NaiveDate;
use rocket::http::Status;
use rocket::serde::json::{self, json, Json, Value};
use rocket::{catch, catchers, get, routes, Catcher, Request, Route};

use crate::error::{ServiceError, ServiceResult};

pub mod instances;
pub mod records;
pub mod settings;
pub mod sites;
pub mod templates;

/// API routes
pub fn api_routes() -> Vec<Route> {
    routes![
        health,

        // Sites
        sites::create_site,
        sites::list_sites,
        sites::deactivate_site,

        // Templates
        templates::create_template,
        templates::list_templates,
        templates::get_template,
        templates::update_template,
        templates::deactivate_template,
        templates::deploy_template,
        templates::undeploy_template,

        // Instances
        instances::generate_instances,
        instances::list_instances,
        instances::get_instance,
        instances::complete_instance,
        instances::record_out_of_range,
        instances::instance_records,

        // Compliance records
        records::site_records,

        // Settings
        settings::view_settings,
        settings::update_settings,
    ]
}

/// JSON bodies for errors raised outside the handlers
pub fn api_catchers() -> Vec<Catcher> {
    catchers![unauthorized, not_found, internal_error, default_catcher]
}

#[get("/health")]
pub fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Parse an optional `YYYY-MM-DD` query parameter.
pub fn parse_date(value: Option<&str>, field: &str) -> ServiceResult<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| ServiceError::validation(format!("{} must be a YYYY-MM-DD date", field)))
        })
        .transpose()
}

/// JSON request body; a malformed or incomplete body is kept as an error
/// so handlers can answer it as a validation failure.
pub type JsonBody<'r, T> = Result<Json<T>, json::Error<'r>>;

pub fn json_body<T>(body: JsonBody<'_, T>) -> ServiceResult<T> {
    body.map(Json::into_inner)
        .map_err(|e| ServiceError::validation(format!("invalid request body: {}", e)))
}

fn error_body(code: &str, message: &str) -> Json<Value> {
    Json(json!({ "error": code, "message": message }))
}

#[catch(401)]
fn unauthorized(_req: &Request) -> Json<Value> {
    error_body("unauthorized", "missing X-User-Id or X-Company-Id header")
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Value> {
    error_body("not_found", &format!("no route for {}", req.uri()))
}

#[catch(500)]
fn internal_error(_req: &Request) -> Json<Value> {
    error_body("unexpected", "internal server error")
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> Json<Value> {
    error_body("error", status.reason().unwrap_or("request failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_only() {
        assert_eq!(
            parse_date(Some("2026-03-02"), "date").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 2)
        );
        assert_eq!(parse_date(None, "date").unwrap(), None);
        assert!(matches!(parse_date(Some("02/03/2026"), "date"), Err(ServiceError::Validation(_))));
    }
}
