use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde_json::{json, Value};
use tempfile::TempDir;

use compliance_server::{build_rocket, db, ServerOptions};

struct TestServer {
    client: Client,
    // Keeps the database file alive for the client's lifetime
    _dir: TempDir,
}

fn server() -> TestServer {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = dir.path().join("compliance.db");
    let pool = db::init_pool(url.to_str().expect("utf-8 path"), 4).expect("pool");
    db::run_migrations(&mut pool.get().expect("conn")).expect("migrations");

    let rocket = build_rocket(pool, ServerOptions { background_tasks: false }).expect("rocket");
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestServer { client, _dir: dir }
}

fn user(company: &str) -> [Header<'static>; 2] {
    [
        Header::new("X-User-Id", "user-1"),
        Header::new("X-Company-Id", company.to_string()),
    ]
}

impl TestServer {
    fn get(&self, path: &str, company: &str) -> LocalResponse<'_> {
        let [u, c] = user(company);
        self.client.get(path.to_string()).header(u).header(c).dispatch()
    }

    fn post(&self, path: &str, company: &str, body: Value) -> LocalResponse<'_> {
        let [u, c] = user(company);
        self.client
            .post(path.to_string())
            .header(u)
            .header(c)
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
    }

    fn json(&self, response: LocalResponse<'_>) -> Value {
        response.into_json::<Value>().expect("json body")
    }

    /// One site with one daily temperature template; returns the site id.
    fn seed(&self, company: &str) -> i64 {
        let site = self.json(self.post("/api/sites", company, json!({ "name": "Harbour St" })));
        let site_id = site["id"].as_i64().expect("site id");

        let response = self.post(
            "/api/templates",
            company,
            json!({
                "name": "Fridge temperatures",
                "frequency": "daily",
                "daypart": "opening",
                "evidence_types": ["temperature"],
                "site_ids": [site_id],
            }),
        );
        assert_eq!(response.status(), Status::Created);
        site_id
    }

    fn generate(&self, company: &str, date: &str) -> Value {
        let response = self.post("/api/instances/generate", company, json!({ "date": date }));
        assert_eq!(response.status(), Status::Ok);
        self.json(response)
    }

    fn instances(&self, company: &str, date: &str) -> Vec<Value> {
        let body = self.json(self.get(&format!("/api/instances?date={}", date), company));
        body.as_array().cloned().expect("array")
    }
}

fn reading(value: f64) -> Value {
    json!({ "equipment_ref": "walk-in", "recorded_temp": value, "temp_min": 0.0, "temp_max": 5.0 })
}

#[test]
fn health_needs_no_identity() {
    let server = server();
    let response = server.client.get("/api/health").dispatch();
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn missing_identity_is_unauthorized() {
    let server = server();
    let response = server.client.get("/api/templates").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(server.json(response)["error"], "unauthorized");
}

#[test]
fn generation_is_idempotent() {
    let server = server();
    server.seed("acme");

    let first = server.generate("acme", "2026-04-01");
    assert_eq!(first["created"], 1);
    let second = server.generate("acme", "2026-04-01");
    assert_eq!(second["created"], 0);
    assert_eq!(second["existing"], 1);

    let listed = server.instances("acme", "2026-04-01");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["status"], "pending");
    assert_eq!(listed[0]["due_daypart"], "opening");
}

#[test]
fn out_of_range_is_rejected_without_mutation() {
    let server = server();
    server.seed("acme");
    server.generate("acme", "2026-04-01");
    let id = server.instances("acme", "2026-04-01")[0]["id"].as_i64().unwrap();

    let response = server.post(
        &format!("/api/instances/{}/complete", id),
        "acme",
        json!({ "readings": [reading(4.0), reading(7.5)] }),
    );
    assert_eq!(response.status(), Status::BadRequest);
    let body = server.json(response);
    assert_eq!(body["error"], "out_of_range");
    assert_eq!(body["action_required"], "out_of_range");
    assert_eq!(body["breaches"].as_array().unwrap().len(), 1);
    assert_eq!(body["breaches"][0]["recorded_temp"], 7.5);

    assert_eq!(server.instances("acme", "2026-04-01")[0]["status"], "pending");
    let records = server.json(server.get(&format!("/api/instances/{}/records", id), "acme"));
    assert!(records.as_array().unwrap().is_empty());
}

#[test]
fn in_range_completion_happens_once() {
    let server = server();
    let site_id = server.seed("acme");
    server.generate("acme", "2026-04-01");
    let id = server.instances("acme", "2026-04-01")[0]["id"].as_i64().unwrap();
    let path = format!("/api/instances/{}/complete", id);

    let response = server.post(&path, "acme", json!({ "readings": [reading(3.0)], "notes": "all good" }));
    assert_eq!(response.status(), Status::Ok);
    let body = server.json(response);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["completed_data"]["notes"], "all good");

    let again = server.post(&path, "acme", json!({ "readings": [reading(3.0)] }));
    assert_eq!(again.status(), Status::Conflict);

    let records = server.json(server.get(&format!("/api/instances/{}/records", id), "acme"));
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["action"], "completed");
    assert_eq!(records[0]["user_id"], "user-1");

    let site_records = server.json(server.get(&format!("/api/records?site_id={}", site_id), "acme"));
    assert_eq!(site_records.as_array().unwrap().len(), 1);
}

#[test]
fn remediation_flow_completes_with_breach() {
    let server = server();
    server.seed("acme");
    server.generate("acme", "2026-04-01");
    let id = server.instances("acme", "2026-04-01")[0]["id"].as_i64().unwrap();

    let response = server.post(
        &format!("/api/instances/{}/out-of-range", id),
        "acme",
        json!({ "readings": [reading(9.0)], "corrective_action": "Discarded stock, engineer booked" }),
    );
    assert_eq!(response.status(), Status::Ok);
    let body = server.json(response);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["completed_data"]["out_of_range"], true);

    let records = server.json(server.get(&format!("/api/instances/{}/records", id), "acme"));
    assert_eq!(records[0]["action"], "out_of_range_remediated");
}

#[test]
fn tenants_are_isolated() {
    let server = server();
    server.seed("acme");
    server.generate("acme", "2026-04-01");
    let id = server.instances("acme", "2026-04-01")[0]["id"].as_i64().unwrap();

    assert!(server.instances("rival", "2026-04-01").is_empty());
    let response = server.post(
        &format!("/api/instances/{}/complete", id),
        "rival",
        json!({ "readings": [reading(3.0)] }),
    );
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(server.generate("rival", "2026-04-01")["created"], 0);
}

#[test]
fn bad_query_date_is_a_validation_failure() {
    let server = server();
    let response = server.get("/api/instances?date=yesterday", "acme");
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(server.json(response)["error"], "validation_failed");
}

#[test]
fn settings_round_trip() {
    let server = server();
    let [u, c] = user("acme");
    let response = server
        .client
        .put("/api/settings")
        .header(u)
        .header(c)
        .header(ContentType::JSON)
        .body(json!({ "auto_generate_enabled": false, "utc_offset_minutes": 60 }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let settings = server.json(server.get("/api/settings", "acme"));
    assert_eq!(settings["auto_generate_enabled"], false);
    assert_eq!(settings["utc_offset_minutes"], 60);
    assert_eq!(settings["generation_interval_seconds"], 300);
}

#[test]
fn missing_body_fields_are_validation_failures() {
    let server = server();
    let site_id = server.seed("acme");

    let response = server.post(
        "/api/templates",
        "acme",
        json!({ "name": "No frequency", "daypart": "opening", "site_ids": [site_id] }),
    );
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(server.json(response)["error"], "validation_failed");

    server.generate("acme", "2026-04-01");
    let id = server.instances("acme", "2026-04-01")[0]["id"].as_i64().unwrap();
    let response = server.post(
        &format!("/api/instances/{}/out-of-range", id),
        "acme",
        json!({ "readings": [reading(9.0)] }),
    );
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(server.json(response)["error"], "validation_failed");
    assert_eq!(server.instances("acme", "2026-04-01")[0]["status"], "pending");
}

#[test]
fn instance_listing_honours_limit() {
    let server = server();
    let site_id = server.seed("acme");
    let response = server.post(
        "/api/templates",
        "acme",
        json!({ "name": "Hand wash stations", "frequency": "daily", "daypart": "midday", "site_ids": [site_id] }),
    );
    assert_eq!(response.status(), Status::Created);
    server.generate("acme", "2026-04-01");

    assert_eq!(server.instances("acme", "2026-04-01").len(), 2);
    let limited = server.json(server.get("/api/instances?date=2026-04-01&limit=1", "acme"));
    assert_eq!(limited.as_array().unwrap().len(), 1);
}
