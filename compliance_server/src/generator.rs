//! Instance generator: expands active templates into dated, site-scoped
//! task instances.
//!
//! Every (template, site, due_date) triple is guarded by a unique index and
//! inserted with `ON CONFLICT DO NOTHING`, so repeated or concurrent runs
//! for the same day never create duplicates.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::error::ServiceResult;
use crate::models::{NewInstance, TemplateRow};
use crate::schedule::{Daypart, Frequency, InstanceStatus};
use crate::schema::{sites, task_instances, task_templates, template_sites};

/// Restricts a run to one tenant and optionally one of its sites.
#[derive(Debug, Default, Clone)]
pub struct GenerationScope {
    pub company_id: Option<String>,
    pub site_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationSummary {
    pub date: NaiveDate,
    /// Deployed (template, site) pairs due on `date`.
    pub considered: usize,
    pub created: usize,
    /// Pairs that already had an instance for `date`.
    pub existing: usize,
}

pub fn generate_for_date(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    scope: &GenerationScope,
) -> ServiceResult<GenerationSummary> {
    // Write lock up front, so concurrent runs queue on busy_timeout
    let summary = conn.immediate_transaction(|conn| {
        let mut query = template_sites::table
            .inner_join(task_templates::table)
            .inner_join(sites::table)
            .filter(task_templates::is_active.eq(true))
            .filter(sites::is_active.eq(true))
            .filter(sites::company_id.eq(task_templates::company_id))
            .select((TemplateRow::as_select(), sites::id))
            .order((task_templates::id.asc(), sites::id.asc()))
            .into_boxed();

        if let Some(company_id) = &scope.company_id {
            query = query.filter(task_templates::company_id.eq(company_id.clone()));
        }
        if let Some(site_id) = scope.site_id {
            query = query.filter(sites::id.eq(site_id));
        }

        let pairs = query.load::<(TemplateRow, i32)>(conn)?;
        let now = Utc::now().naive_utc();
        let mut summary = GenerationSummary { date, considered: 0, created: 0, existing: 0 };

        for (template, site_id) in pairs {
            let (frequency, daypart) = match (
                template.frequency.parse::<Frequency>(),
                template.daypart.parse::<Daypart>(),
            ) {
                (Ok(f), Ok(d)) => (f, d),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Skipping template {}: {}", template.id, e);
                    continue;
                }
            };
            if !frequency.is_due_on(template.schedule_day, date) {
                continue;
            }
            summary.considered += 1;

            let inserted = diesel::insert_into(task_instances::table)
                .values(&NewInstance {
                    template_id: template.id,
                    site_id,
                    due_date: date,
                    due_daypart: daypart.as_str(),
                    due_at: daypart.due_at(date),
                    status: InstanceStatus::Pending.as_str(),
                    created_at: now,
                })
                .on_conflict_do_nothing()
                .execute(conn)?;

            if inserted == 1 {
                summary.created += 1;
            } else {
                summary.existing += 1;
            }
        }

        Ok::<_, crate::error::ServiceError>(summary)
    })?;

    log::info!(
        "Generated instances for {}: {} created, {} already present",
        summary.date,
        summary.created,
        summary.existing
    );
    Ok(summary)
}
