//! Completion handler and the out-of-range remediation flow.
//!
//! Both paths update the instance and append the compliance record inside
//! one transaction. The update only matches rows still `pending`, so an
//! instance is completed at most once even under concurrent submissions.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;
use serde_json::json;

use crate::audit_log::{self, ACTION_COMPLETED, ACTION_OUT_OF_RANGE_REMEDIATED};
use crate::auth::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::instances::{self, InstanceView};
use crate::models::{InstanceRow, NewComplianceRecord};
use crate::readings::{self, Reading};
use crate::schedule::{EvidenceType, InstanceStatus};
use crate::schema::task_instances;
use crate::templates::Template;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct CompletionRequest {
    #[serde(default)]
    pub readings: Vec<Reading>,
    pub notes: Option<String>,
    #[serde(default)]
    pub sop_acknowledged: bool,
    /// Photo, signature and other attachments, stored as submitted.
    pub evidence: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RemediationRequest {
    pub readings: Vec<Reading>,
    pub corrective_action: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub sop_acknowledged: bool,
}

fn load_pending(
    conn: &mut SqliteConnection,
    actor: &Actor,
    instance_id: i32,
) -> ServiceResult<(InstanceRow, Template)> {
    let (row, template) = instances::load_for_company(conn, &actor.company_id, instance_id)?;
    if row.status != InstanceStatus::Pending.as_str() {
        return Err(ServiceError::Conflict(format!("instance {} is already {}", instance_id, row.status)));
    }
    Ok((row, template))
}

fn check_sop(template: &Template, acknowledged: bool) -> ServiceResult<()> {
    if template.requires_sop && !acknowledged {
        return Err(ServiceError::validation("the SOP must be acknowledged before completing this task"));
    }
    Ok(())
}

fn check_evidence(template: &Template, request: &CompletionRequest) -> ServiceResult<()> {
    if template.requires(EvidenceType::Temperature) && request.readings.is_empty() {
        return Err(ServiceError::validation("temperature readings are required for this task"));
    }
    check_sop(template, request.sop_acknowledged)
}

/// Marks the instance completed and appends one record, atomically.
fn finalize(
    conn: &mut SqliteConnection,
    actor: &Actor,
    row: &InstanceRow,
    action: &str,
    snapshot: serde_json::Value,
    completed_at: NaiveDateTime,
) -> ServiceResult<()> {
    conn.transaction(|conn| {
        let updated = diesel::update(
            task_instances::table
                .filter(task_instances::id.eq(row.id))
                .filter(task_instances::status.eq(InstanceStatus::Pending.as_str())),
        )
        .set((
            task_instances::status.eq(InstanceStatus::Completed.as_str()),
            task_instances::completed_at.eq(completed_at),
            task_instances::completed_by.eq(actor.user_id.as_str()),
            task_instances::completed_data.eq(snapshot.to_string()),
        ))
        .execute(conn)?;

        if updated == 0 {
            return Err(ServiceError::Conflict(format!("instance {} is already completed", row.id)));
        }

        audit_log::append(conn, &NewComplianceRecord::new(row.id, row.site_id, &actor.user_id, action, &snapshot))
    })
}

/// Normal completion. Any out-of-range reading rejects the whole request
/// without touching the instance; the caller must use
/// [`record_out_of_range`] instead.
pub fn complete_instance(
    conn: &mut SqliteConnection,
    actor: &Actor,
    instance_id: i32,
    request: &CompletionRequest,
    now: NaiveDateTime,
) -> ServiceResult<InstanceView> {
    let (row, template) = load_pending(conn, actor, instance_id)?;
    check_evidence(&template, request)?;

    if let Err(e) = readings::evaluate(&request.readings) {
        if let ServiceError::OutOfRange(breaches) = &e {
            log::warn!(
                "Completion of instance {} by {} rejected: {} reading(s) out of range",
                instance_id,
                actor.user_id,
                breaches.len()
            );
        }
        return Err(e);
    }

    let completed_at = Utc::now().naive_utc();
    let snapshot = json!({
        "template_id": template.id,
        "due_date": row.due_date,
        "readings": request.readings,
        "notes": request.notes,
        "sop_acknowledged": request.sop_acknowledged,
        "evidence": request.evidence,
        "out_of_range": false,
    });
    finalize(conn, actor, &row, ACTION_COMPLETED, snapshot, completed_at)?;

    log::info!("Instance {} completed by {}", instance_id, actor.user_id);
    instances::get_instance(conn, &actor.company_id, instance_id, now)
}

/// Remediation path for readings outside their thresholds. Requires at
/// least one breach and a corrective action; completes the instance with
/// the breaches recorded.
pub fn record_out_of_range(
    conn: &mut SqliteConnection,
    actor: &Actor,
    instance_id: i32,
    request: &RemediationRequest,
    now: NaiveDateTime,
) -> ServiceResult<InstanceView> {
    let (row, template) = load_pending(conn, actor, instance_id)?;
    check_sop(&template, request.sop_acknowledged)?;

    let corrective_action = request.corrective_action.trim();
    if corrective_action.is_empty() {
        return Err(ServiceError::validation("corrective_action is required"));
    }

    let breaches = readings::find_breaches(&request.readings)?;
    if breaches.is_empty() {
        return Err(ServiceError::validation(
            "no reading is out of range; submit a normal completion instead",
        ));
    }

    let completed_at = Utc::now().naive_utc();
    let snapshot = json!({
        "template_id": template.id,
        "due_date": row.due_date,
        "readings": request.readings,
        "breaches": breaches,
        "corrective_action": corrective_action,
        "notes": request.notes,
        "sop_acknowledged": request.sop_acknowledged,
        "out_of_range": true,
    });
    finalize(conn, actor, &row, ACTION_OUT_OF_RANGE_REMEDIATED, snapshot, completed_at)?;

    log::warn!(
        "Instance {} completed with {} out-of-range reading(s) by {}: {}",
        instance_id,
        breaches.len(),
        actor.user_id,
        corrective_action
    );
    instances::get_instance(conn, &actor.company_id, instance_id, now)
}
