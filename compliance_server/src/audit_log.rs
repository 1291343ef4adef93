//! Append-only compliance records. No update or delete path exists and the
//! table's triggers reject both.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::error::ServiceResult;
use crate::models::{ComplianceRecordRow, NewComplianceRecord};
use crate::schema::compliance_records;

pub const ACTION_COMPLETED: &str = "completed";
pub const ACTION_OUT_OF_RANGE_REMEDIATED: &str = "out_of_range_remediated";

pub const DEFAULT_LIST_LIMIT: i64 = 200;
pub const MAX_LIST_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceRecord {
    pub id: String,
    pub instance_id: i32,
    pub site_id: i32,
    pub user_id: String,
    pub action: String,
    pub data: serde_json::Value,
    pub created_at: NaiveDateTime,
}

impl TryFrom<ComplianceRecordRow> for ComplianceRecord {
    type Error = crate::error::ServiceError;

    fn try_from(row: ComplianceRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            data: serde_json::from_str(&row.data)?,
            id: row.id,
            instance_id: row.instance_id,
            site_id: row.site_id,
            user_id: row.user_id,
            action: row.action,
            created_at: row.created_at,
        })
    }
}

pub fn append(conn: &mut SqliteConnection, record: &NewComplianceRecord) -> ServiceResult<()> {
    diesel::insert_into(compliance_records::table)
        .values(record)
        .execute(conn)?;
    Ok(())
}

pub fn list_for_instance(conn: &mut SqliteConnection, instance_id: i32) -> ServiceResult<Vec<ComplianceRecord>> {
    compliance_records::table
        .filter(compliance_records::instance_id.eq(instance_id))
        .order(compliance_records::created_at.asc())
        .select(ComplianceRecordRow::as_select())
        .load::<ComplianceRecordRow>(conn)?
        .into_iter()
        .map(ComplianceRecord::try_from)
        .collect()
}

/// Records for a site, newest first. `from` and `to` are inclusive dates.
pub fn list_for_site(
    conn: &mut SqliteConnection,
    site_id: i32,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<i64>,
) -> ServiceResult<Vec<ComplianceRecord>> {
    let mut query = compliance_records::table
        .filter(compliance_records::site_id.eq(site_id))
        .select(ComplianceRecordRow::as_select())
        .order(compliance_records::created_at.desc())
        .into_boxed();

    if let Some(from) = from {
        query = query.filter(compliance_records::created_at.ge(from.and_time(chrono::NaiveTime::MIN)));
    }
    if let Some(to) = to.and_then(|d| d.succ_opt()) {
        query = query.filter(compliance_records::created_at.lt(to.and_time(chrono::NaiveTime::MIN)));
    }

    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    query
        .limit(limit)
        .load::<ComplianceRecordRow>(conn)?
        .into_iter()
        .map(ComplianceRecord::try_from)
        .collect()
}
