//! Backfills work days that passed while nothing was running. Every missed weekday is closed as
//! if the full scheduled shift of the active job was worked. The day in progress is never
//! touched, it stays open for the accrual engine.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::{
    ledger::entities::{DailyEarningRecord, Job, LedgerState, WorkSession},
    utils::time::days_between,
};

use super::schedule::{daily_working_hours, hourly_rate, is_workday};

/// How far back the first ever reconciliation looks when nothing was recorded before.
pub const FIRST_RUN_LOOKBACK: Duration = Duration::days(7);

/// Sessions synthesized for missed days, ready to be folded into the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Ascending by date.
    pub sessions: Vec<WorkSession>,
    /// Descending by date.
    pub records: Vec<DailyEarningRecord>,
    pub missed_earnings: f64,
    /// Everything up to and including this day is closed once applied.
    pub reconciled_through: NaiveDate,
}

/// Works out what has to be backfilled. Returns `None` when the ledger is already reconciled
/// through yesterday (or further, if the clock moved backwards).
pub fn plan_missed_sessions(
    job: &Job,
    last_reconciled: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<Reconciliation> {
    let last = last_reconciled.unwrap_or(today - FIRST_RUN_LOOKBACK);
    if last >= today {
        if last > today {
            warn!("Last reconciled date {last} is after today {today}, skipping reconciliation");
        }
        return None;
    }

    let hours_worked = daily_working_hours(job).max(0.);
    let earnings = hourly_rate(job) * hours_worked;

    let sessions = days_between(last, today)
        .filter(|day| is_workday(*day))
        .map(|date| WorkSession {
            date,
            hours_worked,
            earnings,
            job_id: job.id,
        })
        .collect::<Vec<_>>();

    let mut records = sessions
        .iter()
        .map(DailyEarningRecord::from)
        .collect::<Vec<_>>();
    records.sort_by(|a, b| b.date().cmp(&a.date()));

    let missed_earnings = sessions.iter().map(|session| session.earnings).sum();

    Some(Reconciliation {
        sessions,
        records,
        missed_earnings,
        reconciled_through: today - Duration::days(1),
    })
}

impl Reconciliation {
    /// Folds the backfill into the state. The running total moves once for the whole batch.
    pub fn apply(self, state: &mut LedgerState) {
        let Reconciliation {
            sessions,
            records,
            missed_earnings,
            reconciled_through,
        } = self;

        let hours = sessions.iter().map(|session| session.hours_worked).sum::<f64>();
        if let Some(job_id) = sessions.first().map(|session| session.job_id) {
            if let Some(job) = state.job_mut(job_id) {
                job.lifetime_hours += hours;
            }
        }

        state.daily_earnings_history.splice(0..0, records);
        state.work_sessions.extend(sessions);
        state.work_session_earnings += missed_earnings;
        state.last_reconciled_date = Some(reconciled_through);
    }
}

/// Closes every missed weekday between the last reconciled day and today for the active job.
/// Returns the number of sessions created. Running it again on the same day does nothing.
pub fn reconcile_missed_sessions(state: &mut LedgerState, now: NaiveDateTime) -> usize {
    let today = now.date();
    let Some(job) = state.active_job() else {
        debug!("No active job, nothing to reconcile");
        return 0;
    };

    let Some(plan) = plan_missed_sessions(job, state.last_reconciled_date, today) else {
        return 0;
    };

    let created = plan.sessions.len();
    if created > 0 {
        info!(
            "Backfilled {created} missed work days for {:?}, {:.2} earned",
            job.title, plan.missed_earnings
        );
    }
    plan.apply(state);
    created
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    use crate::ledger::entities::{Job, LedgerState};

    use super::{plan_missed_sessions, reconcile_missed_sessions};

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn noon(date: NaiveDate) -> NaiveDateTime {
        date.and_hms_opt(12, 0, 0).unwrap()
    }

    fn state_with_developer() -> LedgerState {
        let mut state = LedgerState::empty();
        let job = Job::new("Developer", 5000., "08:00", "18:00", "12:00", "13:00");
        state.active_job_id = Some(job.id);
        state.jobs.push(job);
        state
    }

    #[test]
    fn test_missed_day_backfill() {
        // Friday 2025-05-16; the three missed days are Tue, Wed and Thu.
        let today = date(5, 16);
        let mut state = state_with_developer();
        state.last_reconciled_date = Some(date(5, 12));

        let created = reconcile_missed_sessions(&mut state, noon(today));

        assert_eq!(created, 3);
        assert_eq!(state.work_sessions.len(), 3);
        for session in &state.work_sessions {
            assert_eq!(session.hours_worked, 9.);
            assert!((session.earnings - 227.27).abs() < 0.01);
        }
        assert!((state.work_session_earnings - 681.82).abs() < 0.01);
        assert_eq!(state.last_reconciled_date, Some(date(5, 15)));
        assert_eq!(state.jobs[0].lifetime_hours, 27.);

        let labels = state
            .daily_earnings_history
            .iter()
            .map(|record| record.date_label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["2025-05-15", "2025-05-14", "2025-05-13"]);
    }

    #[test]
    fn test_idempotent_reconciliation() {
        let today = date(5, 16);
        let mut state = state_with_developer();
        state.last_reconciled_date = Some(date(5, 12));

        reconcile_missed_sessions(&mut state, noon(today));
        let after_first = state.clone();

        let created = reconcile_missed_sessions(&mut state, noon(today) + Duration::hours(5));
        assert_eq!(created, 0);
        assert_eq!(state, after_first);
    }

    #[test]
    fn test_weekends_are_skipped() {
        // Monday 2025-05-19, last reconciled the previous Thursday. Only Friday is missed.
        let mut state = state_with_developer();
        state.last_reconciled_date = Some(date(5, 15));

        let created = reconcile_missed_sessions(&mut state, noon(date(5, 19)));

        assert_eq!(created, 1);
        assert_eq!(state.work_sessions[0].date, date(5, 16));
        assert_eq!(state.last_reconciled_date, Some(date(5, 18)));
    }

    #[test]
    fn test_first_run_looks_back_a_week() {
        let mut state = state_with_developer();
        let today = date(5, 16);

        reconcile_missed_sessions(&mut state, noon(today));

        // 2025-05-09 (excluded) to 2025-05-16 (excluded): Mon 12 through Thu 15 plus Sat/Sun.
        let dates = state
            .work_sessions
            .iter()
            .map(|session| session.date)
            .collect::<Vec<_>>();
        assert_eq!(dates, vec![date(5, 12), date(5, 13), date(5, 14), date(5, 15)]);
    }

    #[test]
    fn test_no_active_job_is_noop() {
        let mut state = state_with_developer();
        state.active_job_id = None;
        state.last_reconciled_date = Some(date(5, 12));

        assert_eq!(reconcile_missed_sessions(&mut state, noon(date(5, 16))), 0);
        assert_eq!(state.last_reconciled_date, Some(date(5, 12)));
        assert!(state.work_sessions.is_empty());
    }

    #[test]
    fn test_yesterday_only_moves_marker() {
        let mut state = state_with_developer();
        state.last_reconciled_date = Some(date(5, 15));

        assert_eq!(reconcile_missed_sessions(&mut state, noon(date(5, 16))), 0);
        assert_eq!(state.last_reconciled_date, Some(date(5, 15)));
        assert_eq!(state.work_session_earnings, 0.);
    }

    #[test]
    fn test_future_marker_is_left_alone() {
        let job = Job::new("Developer", 5000., "08:00", "18:00", "12:00", "13:00");
        assert!(plan_missed_sessions(&job, Some(date(5, 20)), date(5, 16)).is_none());
        assert!(plan_missed_sessions(&job, Some(date(5, 16)), date(5, 16)).is_none());
    }

    #[test]
    fn test_degenerate_job_backfills_zero() {
        let job = Job::new("Broken", 5000., "09:00", "10:00", "08:00", "12:00");
        let plan = plan_missed_sessions(&job, Some(date(5, 12)), date(5, 14)).unwrap();
        assert_eq!(plan.sessions.len(), 1);
        assert_eq!(plan.sessions[0].hours_worked, 0.);
        assert_eq!(plan.missed_earnings, 0.);
    }
}
