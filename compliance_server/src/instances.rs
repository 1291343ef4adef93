use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::models::{InstanceRow, TemplateRow};
use crate::schedule::{Daypart, InstanceStatus};
use crate::schema::{task_instances, task_templates};
use crate::templates::Template;

/// Instance as returned over the API.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceView {
    pub id: i32,
    pub template_id: i32,
    pub template_name: String,
    pub site_id: i32,
    pub due_date: NaiveDate,
    pub due_daypart: Daypart,
    pub due_at: NaiveDateTime,
    pub status: InstanceStatus,
    /// Pending past its daypart deadline.
    pub overdue: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub completed_by: Option<String>,
    pub completed_data: Option<serde_json::Value>,
}

impl InstanceView {
    pub fn build(row: InstanceRow, template_name: String, now: NaiveDateTime) -> ServiceResult<Self> {
        let status: InstanceStatus = row.status.parse()?;
        let completed_data = row
            .completed_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Self {
            overdue: status == InstanceStatus::Pending && now > row.due_at,
            due_daypart: row.due_daypart.parse()?,
            status,
            completed_data,
            id: row.id,
            template_id: row.template_id,
            template_name,
            site_id: row.site_id,
            due_date: row.due_date,
            due_at: row.due_at,
            completed_at: row.completed_at,
            completed_by: row.completed_by,
        })
    }
}

pub const DEFAULT_LIST_LIMIT: i64 = 500;
pub const MAX_LIST_LIMIT: i64 = 1000;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct InstanceFilter {
    pub site_id: Option<i32>,
    pub date: Option<NaiveDate>,
    pub status: Option<InstanceStatus>,
    /// Page size, clamped to `1..=MAX_LIST_LIMIT`.
    pub limit: Option<i64>,
}

/// Instance and its template, provided the template belongs to `company_id`.
pub fn load_for_company(
    conn: &mut SqliteConnection,
    company_id: &str,
    instance_id: i32,
) -> ServiceResult<(InstanceRow, Template)> {
    let (row, template) = task_instances::table
        .inner_join(task_templates::table)
        .filter(task_instances::id.eq(instance_id))
        .filter(task_templates::company_id.eq(company_id))
        .select((InstanceRow::as_select(), TemplateRow::as_select()))
        .first::<(InstanceRow, TemplateRow)>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found(format!("instance {}", instance_id)))?;
    Ok((row, Template::try_from(template)?))
}

pub fn get_instance(
    conn: &mut SqliteConnection,
    company_id: &str,
    instance_id: i32,
    now: NaiveDateTime,
) -> ServiceResult<InstanceView> {
    let (row, template) = load_for_company(conn, company_id, instance_id)?;
    InstanceView::build(row, template.name, now)
}

/// Instances ordered by deadline, at most `filter.limit` of them.
pub fn list_instances(
    conn: &mut SqliteConnection,
    company_id: &str,
    filter: &InstanceFilter,
    now: NaiveDateTime,
) -> ServiceResult<Vec<InstanceView>> {
    let mut query = task_instances::table
        .inner_join(task_templates::table)
        .filter(task_templates::company_id.eq(company_id))
        .select((InstanceRow::as_select(), task_templates::name))
        .order((task_instances::due_at.asc(), task_instances::id.asc()))
        .into_boxed();

    if let Some(site_id) = filter.site_id {
        query = query.filter(task_instances::site_id.eq(site_id));
    }
    if let Some(date) = filter.date {
        query = query.filter(task_instances::due_date.eq(date));
    }
    if let Some(status) = filter.status {
        query = query.filter(task_instances::status.eq(status.as_str()));
    }

    let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    query
        .limit(limit)
        .load::<(InstanceRow, String)>(conn)?
        .into_iter()
        .map(|(row, name)| InstanceView::build(row, name, now))
        .collect()
}
