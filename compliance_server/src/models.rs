use diesel::prelude::*;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::schema::{sites, task_templates, template_sites, task_instances, compliance_records};

#[derive(Queryable, Identifiable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = sites)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Site {
    pub id: i32,
    pub company_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = sites)]
pub struct NewSite<'a> {
    pub company_id: &'a str,
    pub name: &'a str,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// Row of `task_templates`. Enum-like columns stay as text here; the
/// typed view lives in [`crate::schedule`].
#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = task_templates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TemplateRow {
    pub id: i32,
    pub company_id: String,
    pub name: String,
    pub description: Option<String>,
    pub frequency: String,
    pub schedule_day: Option<i32>,
    pub daypart: String,
    pub evidence_types: String,
    pub requires_sop: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = task_templates)]
pub struct NewTemplate {
    pub company_id: String,
    pub name: String,
    pub description: Option<String>,
    pub frequency: String,
    pub schedule_day: Option<i32>,
    pub daypart: String,
    pub evidence_types: String,
    pub requires_sop: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Insertable, Selectable, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[diesel(table_name = template_sites)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Deployment {
    pub template_id: i32,
    pub site_id: i32,
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = task_instances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InstanceRow {
    pub id: i32,
    pub template_id: i32,
    pub site_id: i32,
    pub due_date: NaiveDate,
    pub due_daypart: String,
    pub due_at: NaiveDateTime,
    pub status: String,
    pub completed_at: Option<NaiveDateTime>,
    pub completed_by: Option<String>,
    pub completed_data: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = task_instances)]
pub struct NewInstance<'a> {
    pub template_id: i32,
    pub site_id: i32,
    pub due_date: NaiveDate,
    pub due_daypart: &'a str,
    pub due_at: NaiveDateTime,
    pub status: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Identifiable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = compliance_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ComplianceRecordRow {
    pub id: String,
    pub instance_id: i32,
    pub site_id: i32,
    pub user_id: String,
    pub action: String,
    pub data: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = compliance_records)]
pub struct NewComplianceRecord {
    pub id: String,
    pub instance_id: i32,
    pub site_id: i32,
    pub user_id: String,
    pub action: String,
    pub data: String,
    pub created_at: NaiveDateTime,
}

impl NewComplianceRecord {
    pub fn new(instance_id: i32, site_id: i32, user_id: &str, action: &str, data: &serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            instance_id,
            site_id,
            user_id: user_id.to_string(),
            action: action.to_string(),
            data: data.to_string(),
            created_at: Utc::now().naive_utc(),
        }
    }
}
