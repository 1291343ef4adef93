use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;

use crate::db::last_insert_rowid;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{NewSite, Site};
use crate::schema::sites;

#[derive(Deserialize, Debug)]
pub struct CreateSite {
    pub name: String,
}

pub fn create_site(conn: &mut SqliteConnection, company_id: &str, input: &CreateSite) -> ServiceResult<Site> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("site name is required"));
    }

    conn.transaction(|conn| {
        diesel::insert_into(sites::table)
            .values(&NewSite {
                company_id,
                name,
                is_active: true,
                created_at: Utc::now().naive_utc(),
            })
            .execute(conn)?;
        let new_id = diesel::select(last_insert_rowid()).get_result::<i64>(conn)? as i32;
        find_site(conn, company_id, new_id)
    })
}

pub fn list_sites(conn: &mut SqliteConnection, company_id: &str, include_inactive: bool) -> ServiceResult<Vec<Site>> {
    let mut query = sites::table
        .filter(sites::company_id.eq(company_id))
        .select(Site::as_select())
        .order(sites::name.asc())
        .into_boxed();
    if !include_inactive {
        query = query.filter(sites::is_active.eq(true));
    }
    Ok(query.load::<Site>(conn)?)
}

/// Site owned by `company_id`; other tenants' sites read as missing.
pub fn find_site(conn: &mut SqliteConnection, company_id: &str, site_id: i32) -> ServiceResult<Site> {
    sites::table
        .filter(sites::id.eq(site_id))
        .filter(sites::company_id.eq(company_id))
        .select(Site::as_select())
        .first::<Site>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found(format!("site {}", site_id)))
}

/// Soft-deactivate. Existing instances are kept; the generator skips the site.
pub fn deactivate_site(conn: &mut SqliteConnection, company_id: &str, site_id: i32) -> ServiceResult<Site> {
    find_site(conn, company_id, site_id)?;
    diesel::update(sites::table.filter(sites::id.eq(site_id)))
        .set(sites::is_active.eq(false))
        .execute(conn)?;
    log::info!("Site {} of company {} deactivated", site_id, company_id);
    find_site(conn, company_id, site_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[test]
    fn sites_are_scoped_by_company() {
        let mut conn = test_support::conn();
        let a = create_site(&mut conn, "acme", &CreateSite { name: "Harbour St".into() }).unwrap();
        create_site(&mut conn, "other", &CreateSite { name: "Elsewhere".into() }).unwrap();

        let listed = list_sites(&mut conn, "acme", false).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a.id);
        assert!(matches!(find_site(&mut conn, "other", a.id), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn deactivated_sites_are_hidden_by_default() {
        let mut conn = test_support::conn();
        let site = create_site(&mut conn, "acme", &CreateSite { name: "Kiosk".into() }).unwrap();
        let site = deactivate_site(&mut conn, "acme", site.id).unwrap();
        assert!(!site.is_active);
        assert!(list_sites(&mut conn, "acme", false).unwrap().is_empty());
        assert_eq!(list_sites(&mut conn, "acme", true).unwrap().len(), 1);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut conn = test_support::conn();
        let err = create_site(&mut conn, "acme", &CreateSite { name: "   ".into() }).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
