use std::time::Duration;

use crate::error::ServiceResult;
use crate::generator::{self, GenerationScope, GenerationSummary};
use crate::schedule;
use crate::state::AppState;

/// One sweeper round: materialize today's instances for every tenant, or
/// nothing when auto generation is switched off.
pub fn run_once(state: &AppState) -> ServiceResult<Option<GenerationSummary>> {
    let settings = state.settings_snapshot();
    if !settings.auto_generate_enabled {
        return Ok(None);
    }

    let today = schedule::today(settings.utc_offset_minutes);
    let mut conn = state.db_pool.get()?;
    generator::generate_for_date(&mut conn, today, &GenerationScope::default()).map(Some)
}

/// Spawn the background loop that materializes today's instances for every
/// tenant. Interval and on/off switch are re-read from settings each round.
pub fn spawn_instance_generator(state: AppState) {
    tokio::spawn(async move {
        loop {
            let round_state = state.clone();
            match tokio::task::spawn_blocking(move || run_once(&round_state)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::error!("Scheduled generation failed: {}", e),
                Err(e) => log::error!("Scheduled generation task panicked: {}", e),
            }

            let interval = state.settings_snapshot().generation_interval_seconds.max(10) as u64;
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::prelude::*;
    use crate::db::test_support;
    use crate::schedule::{Daypart, EvidenceType, Frequency};
    use crate::settings::ServerSettings;
    use crate::sites::{create_site, CreateSite};
    use crate::templates::{create_template, CreateTemplate};

    fn seeded_state(settings: ServerSettings) -> (tempfile::TempDir, AppState) {
        let (dir, pool) = test_support::file_pool(2);
        {
            let mut conn = pool.get().unwrap();
            let site = create_site(&mut conn, "acme", &CreateSite { name: "Main".into() }).unwrap();
            create_template(
                &mut conn,
                "acme",
                &CreateTemplate {
                    name: "Fridge temperatures".into(),
                    description: None,
                    frequency: Frequency::Daily,
                    schedule_day: None,
                    daypart: Daypart::Anytime,
                    evidence_types: vec![EvidenceType::Temperature],
                    requires_sop: false,
                    site_ids: vec![site.id],
                },
            )
            .unwrap();
        }
        (dir, AppState::new(pool, settings))
    }

    #[test]
    fn disabled_round_does_nothing() {
        let (_dir, state) = seeded_state(ServerSettings { auto_generate_enabled: false, ..Default::default() });
        assert_eq!(run_once(&state).unwrap(), None);

        let mut conn = state.db_pool.get().unwrap();
        let count: i64 = crate::schema::task_instances::table
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn round_generates_for_today_at_configured_offset() {
        let offset = 13 * 60;
        let (_dir, state) = seeded_state(ServerSettings { utc_offset_minutes: offset, ..Default::default() });

        let summary = run_once(&state).unwrap().expect("enabled round");
        assert_eq!(summary.date, schedule::today(offset));
        assert_eq!(summary.created, 1);

        // Settings changes are picked up by the next round
        state.settings.write().unwrap().auto_generate_enabled = false;
        assert_eq!(run_once(&state).unwrap(), None);
    }
}
