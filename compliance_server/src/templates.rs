//! Template store: recurring compliance task definitions and their
//! deployment to sites.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::db::last_insert_rowid;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Deployment, NewTemplate, TemplateRow};
use crate::schedule::{Daypart, EvidenceType, Frequency};
use crate::schema::{sites, task_templates, template_sites};

/// Typed view of a template row.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: i32,
    pub company_id: String,
    pub name: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub schedule_day: Option<i32>,
    pub daypart: Daypart,
    pub evidence_types: Vec<EvidenceType>,
    pub requires_sop: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Template {
    pub fn requires(&self, evidence: EvidenceType) -> bool {
        self.evidence_types.contains(&evidence)
    }
}

impl TryFrom<TemplateRow> for Template {
    type Error = ServiceError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let evidence_types = serde_json::from_str(&row.evidence_types).map_err(|e| {
            ServiceError::Unexpected(format!("template {} has unreadable evidence_types: {}", row.id, e))
        })?;
        Ok(Template {
            frequency: row.frequency.parse()?,
            daypart: row.daypart.parse()?,
            evidence_types,
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            description: row.description,
            schedule_day: row.schedule_day,
            requires_sop: row.requires_sop,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Template together with the sites it is deployed to.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateView {
    #[serde(flatten)]
    pub template: Template,
    pub site_ids: Vec<i32>,
}

#[derive(Deserialize, Debug)]
pub struct CreateTemplate {
    pub name: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub schedule_day: Option<i32>,
    pub daypart: Daypart,
    #[serde(default)]
    pub evidence_types: Vec<EvidenceType>,
    #[serde(default)]
    pub requires_sop: bool,
    #[serde(default)]
    pub site_ids: Vec<i32>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    /// Absent keeps the description, `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub frequency: Option<Frequency>,
    pub schedule_day: Option<i32>,
    pub daypart: Option<Daypart>,
    pub evidence_types: Option<Vec<EvidenceType>>,
    pub requires_sop: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = task_templates)]
struct TemplateChanges {
    name: Option<String>,
    description: Option<Option<String>>,
    frequency: Option<String>,
    schedule_day: Option<i32>,
    daypart: Option<String>,
    evidence_types: Option<String>,
    requires_sop: Option<bool>,
    is_active: Option<bool>,
    updated_at: Option<NaiveDateTime>,
}

/// Wraps any present value, `null` included, in `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn validate_name(name: &str) -> ServiceResult<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::validation("template name is required"));
    }
    Ok(())
}

fn validate_evidence(evidence: &[EvidenceType]) -> ServiceResult<()> {
    let mut seen = HashSet::new();
    for e in evidence {
        if !seen.insert(e) {
            return Err(ServiceError::validation(format!("evidence type {:?} listed twice", e)));
        }
    }
    Ok(())
}

pub fn create_template(
    conn: &mut SqliteConnection,
    company_id: &str,
    input: &CreateTemplate,
) -> ServiceResult<TemplateView> {
    validate_name(&input.name)?;
    validate_evidence(&input.evidence_types)?;
    input
        .frequency
        .validate_schedule_day(input.schedule_day)
        .map_err(ServiceError::Validation)?;

    let now = Utc::now().naive_utc();
    let new_template = NewTemplate {
        company_id: company_id.to_string(),
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        frequency: input.frequency.as_str().to_string(),
        schedule_day: input.schedule_day,
        daypart: input.daypart.as_str().to_string(),
        evidence_types: serde_json::to_string(&input.evidence_types)?,
        requires_sop: input.requires_sop,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let view = conn.transaction(|conn| {
        diesel::insert_into(task_templates::table)
            .values(&new_template)
            .execute(conn)?;
        let new_id = diesel::select(last_insert_rowid()).get_result::<i64>(conn)? as i32;
        deploy_template(conn, company_id, new_id, &input.site_ids)
    })?;

    log::info!(
        "Template {} '{}' created for company {} ({} site(s))",
        view.template.id,
        view.template.name,
        company_id,
        view.site_ids.len()
    );
    Ok(view)
}

fn find_row(conn: &mut SqliteConnection, company_id: &str, template_id: i32) -> ServiceResult<TemplateRow> {
    task_templates::table
        .filter(task_templates::id.eq(template_id))
        .filter(task_templates::company_id.eq(company_id))
        .select(TemplateRow::as_select())
        .first::<TemplateRow>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found(format!("template {}", template_id)))
}

fn deployed_sites(conn: &mut SqliteConnection, template_ids: &[i32]) -> ServiceResult<BTreeMap<i32, Vec<i32>>> {
    let rows = template_sites::table
        .filter(template_sites::template_id.eq_any(template_ids))
        .order((template_sites::template_id.asc(), template_sites::site_id.asc()))
        .select(Deployment::as_select())
        .load::<Deployment>(conn)?;

    let mut by_template: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    for d in rows {
        by_template.entry(d.template_id).or_default().push(d.site_id);
    }
    Ok(by_template)
}

pub fn get_template(conn: &mut SqliteConnection, company_id: &str, template_id: i32) -> ServiceResult<TemplateView> {
    let template = Template::try_from(find_row(conn, company_id, template_id)?)?;
    let site_ids = deployed_sites(conn, &[template_id])?
        .remove(&template_id)
        .unwrap_or_default();
    Ok(TemplateView { template, site_ids })
}

pub fn list_templates(
    conn: &mut SqliteConnection,
    company_id: &str,
    include_inactive: bool,
) -> ServiceResult<Vec<TemplateView>> {
    let mut query = task_templates::table
        .filter(task_templates::company_id.eq(company_id))
        .select(TemplateRow::as_select())
        .order(task_templates::name.asc())
        .into_boxed();
    if !include_inactive {
        query = query.filter(task_templates::is_active.eq(true));
    }
    let rows = query.load::<TemplateRow>(conn)?;

    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let mut deployments = deployed_sites(conn, &ids)?;

    rows.into_iter()
        .map(|row| -> ServiceResult<TemplateView> {
            let site_ids = deployments.remove(&row.id).unwrap_or_default();
            Ok(TemplateView { template: Template::try_from(row)?, site_ids })
        })
        .collect()
}

pub fn update_template(
    conn: &mut SqliteConnection,
    company_id: &str,
    template_id: i32,
    update: UpdateTemplate,
) -> ServiceResult<TemplateView> {
    let current = Template::try_from(find_row(conn, company_id, template_id)?)?;

    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    if let Some(evidence) = &update.evidence_types {
        validate_evidence(evidence)?;
    }

    // A frequency change drops a schedule_day the new frequency cannot use
    let frequency = update.frequency.unwrap_or(current.frequency);
    let schedule_day = match (update.schedule_day, update.frequency) {
        (Some(day), _) => Some(day),
        (None, Some(f)) if f != current.frequency => None,
        (None, _) => current.schedule_day,
    };
    frequency
        .validate_schedule_day(schedule_day)
        .map_err(ServiceError::Validation)?;

    let changes = TemplateChanges {
        name: update.name.map(|n| n.trim().to_string()),
        description: update.description,
        frequency: update.frequency.map(|f| f.as_str().to_string()),
        schedule_day: update.schedule_day,
        daypart: update.daypart.map(|d| d.as_str().to_string()),
        evidence_types: update
            .evidence_types
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?,
        requires_sop: update.requires_sop,
        is_active: update.is_active,
        updated_at: Some(Utc::now().naive_utc()),
    };

    conn.transaction(|conn| {
        diesel::update(task_templates::table.filter(task_templates::id.eq(template_id)))
            .set(&changes)
            .execute(conn)?;
        if schedule_day.is_none() && current.schedule_day.is_some() {
            diesel::update(task_templates::table.filter(task_templates::id.eq(template_id)))
                .set(task_templates::schedule_day.eq(None::<i32>))
                .execute(conn)?;
        }
        Ok::<_, ServiceError>(())
    })?;

    get_template(conn, company_id, template_id)
}

/// Soft-deactivate. Templates are never deleted.
pub fn deactivate_template(conn: &mut SqliteConnection, company_id: &str, template_id: i32) -> ServiceResult<TemplateView> {
    let view = update_template(
        conn,
        company_id,
        template_id,
        UpdateTemplate { is_active: Some(false), ..Default::default() },
    )?;
    log::info!("Template {} of company {} deactivated", template_id, company_id);
    Ok(view)
}

/// Deploy a template to additional sites. Already deployed sites are kept.
pub fn deploy_template(
    conn: &mut SqliteConnection,
    company_id: &str,
    template_id: i32,
    site_ids: &[i32],
) -> ServiceResult<TemplateView> {
    find_row(conn, company_id, template_id)?;

    let known: HashSet<i32> = sites::table
        .filter(sites::company_id.eq(company_id))
        .filter(sites::id.eq_any(site_ids))
        .select(sites::id)
        .load::<i32>(conn)?
        .into_iter()
        .collect();
    if let Some(missing) = site_ids.iter().find(|id| !known.contains(id)) {
        return Err(ServiceError::not_found(format!("site {}", missing)));
    }

    for &site_id in site_ids {
        diesel::insert_into(template_sites::table)
            .values(&Deployment { template_id, site_id })
            .on_conflict_do_nothing()
            .execute(conn)?;
    }

    get_template(conn, company_id, template_id)
}

/// Stop generating for one site. Instances already created are kept.
pub fn undeploy_template(
    conn: &mut SqliteConnection,
    company_id: &str,
    template_id: i32,
    site_id: i32,
) -> ServiceResult<TemplateView> {
    find_row(conn, company_id, template_id)?;
    let removed = diesel::delete(
        template_sites::table
            .filter(template_sites::template_id.eq(template_id))
            .filter(template_sites::site_id.eq(site_id)),
    )
    .execute(conn)?;
    if removed == 0 {
        return Err(ServiceError::not_found(format!(
            "deployment of template {} to site {}",
            template_id, site_id
        )));
    }
    get_template(conn, company_id, template_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::sites::{create_site, CreateSite};

    fn fridge_check(site_ids: Vec<i32>) -> CreateTemplate {
        CreateTemplate {
            name: "Fridge temperature check".into(),
            description: None,
            frequency: Frequency::Daily,
            schedule_day: None,
            daypart: Daypart::Opening,
            evidence_types: vec![EvidenceType::Temperature],
            requires_sop: false,
            site_ids,
        }
    }

    #[test]
    fn create_and_read_back() {
        let mut conn = test_support::conn();
        let site = create_site(&mut conn, "acme", &CreateSite { name: "Main".into() }).unwrap();

        let created = create_template(&mut conn, "acme", &fridge_check(vec![site.id])).unwrap();
        assert_eq!(created.site_ids, vec![site.id]);
        assert!(created.template.requires(EvidenceType::Temperature));

        let fetched = get_template(&mut conn, "acme", created.template.id).unwrap();
        assert_eq!(fetched.template.daypart, Daypart::Opening);
        assert!(matches!(
            get_template(&mut conn, "other", created.template.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn deploying_to_foreign_site_fails_without_side_effects() {
        let mut conn = test_support::conn();
        let foreign = create_site(&mut conn, "other", &CreateSite { name: "Theirs".into() }).unwrap();

        let err = create_template(&mut conn, "acme", &fridge_check(vec![foreign.id])).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(list_templates(&mut conn, "acme", true).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_schedule_day() {
        let mut conn = test_support::conn();
        let mut input = fridge_check(vec![]);
        input.frequency = Frequency::Weekly;
        input.schedule_day = Some(9);
        assert!(matches!(
            create_template(&mut conn, "acme", &input),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn rejects_duplicate_evidence() {
        let mut conn = test_support::conn();
        let mut input = fridge_check(vec![]);
        input.evidence_types = vec![EvidenceType::Photo, EvidenceType::Photo];
        assert!(matches!(
            create_template(&mut conn, "acme", &input),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn frequency_change_clears_schedule_day() {
        let mut conn = test_support::conn();
        let mut input = fridge_check(vec![]);
        input.frequency = Frequency::Weekly;
        input.schedule_day = Some(3);
        let created = create_template(&mut conn, "acme", &input).unwrap();

        let updated = update_template(
            &mut conn,
            "acme",
            created.template.id,
            UpdateTemplate { frequency: Some(Frequency::Daily), ..Default::default() },
        )
        .unwrap();
        assert_eq!(updated.template.frequency, Frequency::Daily);
        assert_eq!(updated.template.schedule_day, None);
    }

    #[test]
    fn description_is_kept_when_absent_and_cleared_by_null() {
        let mut conn = test_support::conn();
        let mut input = fridge_check(vec![]);
        input.description = Some("All reach-in units".into());
        let id = create_template(&mut conn, "acme", &input).unwrap().template.id;

        let rename: UpdateTemplate = serde_json::from_str(r#"{"name": "Reach-in check"}"#).unwrap();
        let view = update_template(&mut conn, "acme", id, rename).unwrap();
        assert_eq!(view.template.name, "Reach-in check");
        assert_eq!(view.template.description.as_deref(), Some("All reach-in units"));

        let clear: UpdateTemplate = serde_json::from_str(r#"{"description": null}"#).unwrap();
        let view = update_template(&mut conn, "acme", id, clear).unwrap();
        assert_eq!(view.template.description, None);
    }

    #[test]
    fn deactivate_hides_from_default_listing() {
        let mut conn = test_support::conn();
        let created = create_template(&mut conn, "acme", &fridge_check(vec![])).unwrap();
        let view = deactivate_template(&mut conn, "acme", created.template.id).unwrap();
        assert!(!view.template.is_active);
        assert!(list_templates(&mut conn, "acme", false).unwrap().is_empty());
        assert_eq!(list_templates(&mut conn, "acme", true).unwrap().len(), 1);
    }

    #[test]
    fn deploy_is_idempotent_and_undeploy_removes() {
        let mut conn = test_support::conn();
        let s1 = create_site(&mut conn, "acme", &CreateSite { name: "One".into() }).unwrap();
        let s2 = create_site(&mut conn, "acme", &CreateSite { name: "Two".into() }).unwrap();
        let created = create_template(&mut conn, "acme", &fridge_check(vec![s1.id])).unwrap();

        let view = deploy_template(&mut conn, "acme", created.template.id, &[s1.id, s2.id]).unwrap();
        assert_eq!(view.site_ids, vec![s1.id, s2.id]);

        let view = undeploy_template(&mut conn, "acme", created.template.id, s1.id).unwrap();
        assert_eq!(view.site_ids, vec![s2.id]);
        assert!(matches!(
            undeploy_template(&mut conn, "acme", created.template.id, s1.id),
            Err(ServiceError::NotFound(_))
        ));
    }
}
