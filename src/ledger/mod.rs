//! The ledger owns the jobs, the closed history and the running totals. Every operation mutates
//! the in-memory state and then publishes a snapshot for persistence; a failed publish or write
//! never undoes the mutation.

pub mod entities;
pub mod ticker;

use chrono::{NaiveDate, NaiveDateTime};
use entities::{DailyEarningRecord, Job, LedgerState, WorkSession};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    engine::{
        accrual::{compute_todays_accrual, compute_work_progress, Accrual},
        reconcile::reconcile_missed_sessions,
        schedule::is_within_paid_window,
    },
    utils::clock::Clock,
};

/// Number of history rows shown in compact views.
pub const HISTORY_PREVIEW: usize = 3;

/// Read-only picture of the ledger at one instant, meant for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStatus {
    pub at: NaiveDateTime,
    pub user_name: String,
    pub active_job: Option<Job>,
    pub is_working: bool,
    pub todays_earnings: f64,
    pub hours_worked_today: f64,
    pub work_progress: f64,
    pub lifetime_earnings: f64,
    pub recent_history: Vec<DailyEarningRecord>,
}

pub struct Ledger {
    state: LedgerState,
    today: Accrual,
    clock: Box<dyn Clock>,
    publisher: Option<mpsc::UnboundedSender<LedgerState>>,
}

impl Ledger {
    /// Builds the ledger and runs the startup refresh: missed days are reconciled before today's
    /// accrual is computed.
    pub fn open(
        state: LedgerState,
        clock: Box<dyn Clock>,
        publisher: Option<mpsc::UnboundedSender<LedgerState>>,
    ) -> Self {
        let mut ledger = Self {
            state,
            today: Accrual::ZERO,
            clock,
            publisher,
        };
        ledger.state.repair();
        ledger.refresh();
        ledger
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.time()
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn user_name(&self) -> &str {
        &self.state.user_name
    }

    pub fn jobs(&self) -> &[Job] {
        &self.state.jobs
    }

    pub fn job(&self, id: Uuid) -> Option<&Job> {
        self.state.job(id)
    }

    pub fn active_job(&self) -> Option<&Job> {
        self.state.active_job()
    }

    pub fn todays_earnings(&self) -> f64 {
        self.today.earnings
    }

    pub fn hours_worked_today(&self) -> f64 {
        self.today.hours_worked()
    }

    pub fn work_session_earnings(&self) -> f64 {
        self.state.work_session_earnings
    }

    /// Closed sessions plus the open day. Never stored on its own.
    pub fn lifetime_earnings(&self) -> f64 {
        self.state.work_session_earnings + self.today.earnings
    }

    pub fn work_progress(&self) -> f64 {
        match self.active_job() {
            Some(job) if !self.is_today_closed(self.now().date()) => {
                compute_work_progress(job, self.now())
            }
            _ => 0.,
        }
    }

    pub fn is_working_now(&self) -> bool {
        self.active_job()
            .is_some_and(|job| is_within_paid_window(job, self.now()))
    }

    pub fn daily_earnings_history(&self) -> &[DailyEarningRecord] {
        &self.state.daily_earnings_history
    }

    pub fn recent_history(&self) -> &[DailyEarningRecord] {
        let history = &self.state.daily_earnings_history;
        &history[..history.len().min(HISTORY_PREVIEW)]
    }

    pub fn work_sessions(&self) -> &[WorkSession] {
        &self.state.work_sessions
    }

    pub fn last_reconciled_date(&self) -> Option<NaiveDate> {
        self.state.last_reconciled_date
    }

    pub fn status(&self) -> LedgerStatus {
        LedgerStatus {
            at: self.now(),
            user_name: self.state.user_name.clone(),
            active_job: self.active_job().cloned(),
            is_working: self.is_working_now(),
            todays_earnings: self.todays_earnings(),
            hours_worked_today: self.hours_worked_today(),
            work_progress: self.work_progress(),
            lifetime_earnings: self.lifetime_earnings(),
            recent_history: self.recent_history().to_vec(),
        }
    }

    /// Appends a job. It becomes active when no job is. Returns `false` if the id is taken or
    /// the pay isn't a finite number.
    pub fn add_job(&mut self, job: Job) -> bool {
        if self.state.job(job.id).is_some() {
            warn!("Job {} already exists", job.id);
            return false;
        }
        if !job.has_finite_pay() {
            warn!("Refusing job {} with pay that isn't a number", job.id);
            return false;
        }
        debug!("Adding job {} {:?}", job.id, job.title);
        let id = job.id;
        self.state.jobs.push(job);
        if self.state.active_job_id.is_none() {
            self.state.active_job_id = Some(id);
            self.recompute_today(self.now());
        }
        self.persist();
        true
    }

    /// Replaces the job with the same id. Today's accrual follows the new rate and schedule when
    /// the job is active.
    pub fn update_job(&mut self, updated: Job) -> bool {
        let id = updated.id;
        if !updated.has_finite_pay() {
            warn!("Refusing update of {id} with pay that isn't a number");
            return false;
        }
        let Some(job) = self.state.job_mut(id) else {
            warn!("Can't update missing job {id}");
            return false;
        };
        *job = updated;
        debug!("Updated job {id}");
        if self.state.active_job_id == Some(id) {
            self.recompute_today(self.now());
        }
        self.persist();
        true
    }

    /// Removes the job together with its sessions. The session total is re-summed from what's
    /// left instead of subtracting the removed part.
    pub fn delete_job(&mut self, id: Uuid) -> bool {
        let Some(index) = self.state.jobs.iter().position(|job| job.id == id) else {
            warn!("Can't delete missing job {id}");
            return false;
        };
        self.state.jobs.remove(index);

        if self.state.active_job_id == Some(id) {
            self.state.active_job_id = self.state.jobs.first().map(|job| job.id);
            debug!("Active job moved to {:?}", self.state.active_job_id);
        }

        let before = self.state.work_sessions.len();
        self.state.work_sessions.retain(|session| session.job_id != id);
        self.state.work_session_earnings = self.state.session_earnings_sum();
        info!(
            "Deleted job {id} with {} sessions",
            before - self.state.work_sessions.len()
        );

        self.recompute_today(self.now());
        self.persist();
        true
    }

    /// Switches the active job. Whatever accrued today under the previous job is dropped, not
    /// carried over.
    pub fn set_active_job(&mut self, id: Uuid) -> bool {
        if self.state.job(id).is_none() {
            warn!("Can't activate missing job {id}");
            return false;
        }
        if self.today.earnings > 0. && self.state.active_job_id != Some(id) {
            warn!(
                "Switching active job discards {:.2} accrued today",
                self.today.earnings
            );
        }
        self.state.active_job_id = Some(id);
        self.recompute_today(self.now());
        self.persist();
        true
    }

    /// Closes today into a session and a history record, then resets today's figures. Nothing
    /// happens without an active job or when nothing positive was earned.
    pub fn end_work_day(&mut self) -> Option<WorkSession> {
        let now = self.now();
        self.recompute_today(now);

        let job_id = self.state.active_job_id?;
        if !(self.today.earnings > 0. && self.today.earnings.is_finite()) {
            debug!(
                "Earned {} today, not ending the day",
                self.today.earnings
            );
            return None;
        }

        let session = WorkSession {
            date: now.date(),
            hours_worked: self.today.hours_worked(),
            earnings: self.today.earnings,
            job_id,
        };
        info!(
            "Ending work day {} with {:.2} over {:.2} hours",
            session.date, session.earnings, session.hours_worked
        );
        self.state.close_session(session.clone());
        self.state.last_reconciled_date = Some(now.date());
        self.today = Accrual::ZERO;
        self.sync_job_hours();

        self.persist();
        Some(session)
    }

    pub fn refresh(&mut self) {
        self.refresh_at(self.now());
    }

    /// Reconciles missed days, then recomputes today. Safe to call as often as wanted.
    pub fn refresh_at(&mut self, now: NaiveDateTime) {
        reconcile_missed_sessions(&mut self.state, now);
        self.recompute_today(now);
        self.persist();
    }

    pub fn set_user_name(&mut self, name: impl Into<String>) {
        self.state.user_name = name.into();
        self.persist();
    }

    fn is_today_closed(&self, today: NaiveDate) -> bool {
        self.state
            .last_reconciled_date
            .is_some_and(|date| date >= today)
    }

    /// Today's figures are zero once the day was ended, otherwise they come straight from the
    /// schedule of the active job.
    fn recompute_today(&mut self, now: NaiveDateTime) {
        self.today = match self.state.active_job() {
            Some(_) if self.is_today_closed(now.date()) => Accrual::ZERO,
            Some(job) => compute_todays_accrual(job, now),
            None => Accrual::ZERO,
        };
        self.sync_job_hours();
    }

    fn sync_job_hours(&mut self) {
        let active = self.state.active_job_id;
        let hours = self.today.hours_worked();
        for job in self.state.jobs.iter_mut() {
            job.hours_worked_today = if Some(job.id) == active { hours } else { 0. };
        }
    }

    fn persist(&mut self) {
        let closed = self
            .publisher
            .as_ref()
            .is_some_and(|publisher| publisher.send(self.state.clone()).is_err());
        if closed {
            warn!("Persistence channel is closed, changes stay in memory");
            self.publisher = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use tempfile::tempdir;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use crate::{
        storage::{
            key_value::JsonFileStorage,
            state_store::{load_state, save_state},
        },
        utils::{clock::test_clock::TestClock, logging::TEST_LOGGING},
    };

    use super::{
        entities::{Job, LedgerState, WorkSession},
        Ledger,
    };

    /// Wednesday.
    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 14).unwrap()
    }

    fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, minute, 0).unwrap()
    }

    fn developer() -> Job {
        Job::new("Developer", 5000., "08:00", "18:00", "12:00", "13:00")
    }

    fn designer() -> Job {
        Job::new("Designer", 3200., "09:00", "17:00", "12:30", "13:30").with_working_days(20)
    }

    /// Ledger already reconciled through yesterday so only today's accrual is in play.
    fn ledger_at(now: NaiveDateTime, jobs: Vec<Job>) -> (Ledger, TestClock) {
        *TEST_LOGGING;
        let clock = TestClock::new(now);
        let mut state = LedgerState::empty();
        state.active_job_id = jobs.first().map(|job| job.id);
        state.jobs = jobs;
        state.last_reconciled_date = Some(now.date() - Duration::days(1));
        (Ledger::open(state, Box::new(clock.clone()), None), clock)
    }

    fn assert_lifetime_invariant(ledger: &Ledger) {
        assert_eq!(
            ledger.lifetime_earnings(),
            ledger.work_session_earnings() + ledger.todays_earnings()
        );
        assert_eq!(
            ledger.work_session_earnings(),
            ledger.work_sessions().iter().map(|s| s.earnings).sum::<f64>()
        );
    }

    #[test]
    fn test_open_computes_today() {
        let (ledger, _) = ledger_at(at(wednesday(), 10, 0), vec![developer()]);
        assert_eq!(ledger.hours_worked_today(), 2.);
        assert!((ledger.todays_earnings() - 2. * 5000. / 198.).abs() < 1e-9);
        assert_eq!(ledger.jobs()[0].hours_worked_today, 2.);
        assert!(ledger.is_working_now());
        assert_lifetime_invariant(&ledger);
    }

    #[test]
    fn test_first_job_becomes_active() {
        let (mut ledger, _) = ledger_at(at(wednesday(), 10, 0), vec![]);
        assert!(ledger.active_job().is_none());
        assert_eq!(ledger.todays_earnings(), 0.);

        let job = developer();
        let id = job.id;
        assert!(ledger.add_job(job));
        assert_eq!(ledger.active_job().map(|job| job.id), Some(id));
        assert!(ledger.todays_earnings() > 0.);

        let second = designer();
        let second_id = second.id;
        assert!(ledger.add_job(second.clone()));
        assert_eq!(ledger.active_job().map(|job| job.id), Some(id));
        assert!(!ledger.add_job(second));
        assert_eq!(ledger.jobs().len(), 2);
        assert_eq!(ledger.jobs()[1].id, second_id);
        assert_lifetime_invariant(&ledger);
    }

    #[test]
    fn test_update_active_job_recomputes() {
        let (mut ledger, _) = ledger_at(at(wednesday(), 10, 0), vec![developer()]);
        let mut job = ledger.jobs()[0].clone();
        job.custom_hourly_rate = Some(50.);
        assert!(ledger.update_job(job));
        assert_eq!(ledger.todays_earnings(), 100.);
        assert!(!ledger.update_job(designer()));
        assert_lifetime_invariant(&ledger);
    }

    #[test]
    fn test_switching_job_discards_today() {
        let jobs = vec![developer(), designer()];
        let designer_id = jobs[1].id;
        let (mut ledger, _) = ledger_at(at(wednesday(), 10, 0), jobs);
        let before = ledger.todays_earnings();

        assert!(ledger.set_active_job(designer_id));
        assert_eq!(ledger.active_job().unwrap().id, designer_id);
        assert_eq!(ledger.hours_worked_today(), 1.);
        assert!(ledger.todays_earnings() < before);
        assert_eq!(ledger.work_session_earnings(), 0.);
        assert_eq!(ledger.jobs()[0].hours_worked_today, 0.);

        assert!(!ledger.set_active_job(Uuid::new_v4()));
        assert_eq!(ledger.active_job().unwrap().id, designer_id);
        assert_lifetime_invariant(&ledger);
    }

    #[test]
    fn test_end_day_reset() {
        let (mut ledger, clock) = ledger_at(at(wednesday(), 15, 0), vec![developer()]);
        let expected_hours = ledger.hours_worked_today();
        let expected_earnings = ledger.todays_earnings();
        assert_eq!(expected_hours, 6.);

        let session = ledger.end_work_day().unwrap();

        assert_eq!(ledger.todays_earnings(), 0.);
        assert_eq!(ledger.hours_worked_today(), 0.);
        assert_eq!(session.hours_worked, expected_hours);
        assert_eq!(session.earnings, expected_earnings);
        assert_eq!(ledger.work_sessions(), &[session]);
        assert_eq!(ledger.daily_earnings_history()[0].amount, expected_earnings);
        assert_eq!(ledger.daily_earnings_history()[0].date_label, "2025-05-14");
        assert_eq!(ledger.last_reconciled_date(), Some(wednesday()));
        assert_eq!(ledger.jobs()[0].lifetime_hours, 6.);
        assert_lifetime_invariant(&ledger);

        // The closed day stays closed for later ticks.
        clock.advance(Duration::hours(2));
        ledger.refresh();
        assert_eq!(ledger.todays_earnings(), 0.);
        assert_eq!(ledger.work_progress(), 0.);
        assert!(ledger.end_work_day().is_none());
        assert_eq!(ledger.work_sessions().len(), 1);
        assert_lifetime_invariant(&ledger);
    }

    #[test]
    fn test_end_day_noop_without_earnings() {
        let (mut ledger, _) = ledger_at(at(wednesday(), 7, 0), vec![developer()]);
        assert!(ledger.end_work_day().is_none());
        assert!(ledger.work_sessions().is_empty());
        assert!(ledger.daily_earnings_history().is_empty());

        let (mut ledger, _) = ledger_at(at(wednesday(), 10, 0), vec![]);
        assert!(ledger.end_work_day().is_none());
    }

    #[test]
    fn test_next_day_after_end_day() {
        let (mut ledger, clock) = ledger_at(at(wednesday(), 18, 0), vec![developer()]);
        ledger.end_work_day().unwrap();

        clock.set(at(wednesday() + Duration::days(1), 9, 0));
        ledger.refresh();

        assert_eq!(ledger.work_sessions().len(), 1);
        assert_eq!(ledger.hours_worked_today(), 1.);
        assert_eq!(ledger.last_reconciled_date(), Some(wednesday()));
        assert_lifetime_invariant(&ledger);
    }

    #[test]
    fn test_refresh_backfills_across_restart() {
        let (mut ledger, clock) = ledger_at(at(wednesday(), 11, 0), vec![developer()]);
        // Application closed on Wednesday without ending the day, reopened on Monday.
        clock.set(at(NaiveDate::from_ymd_opt(2025, 5, 19).unwrap(), 9, 0));
        ledger.refresh();

        let dates = ledger
            .work_sessions()
            .iter()
            .map(|session| session.date)
            .collect::<Vec<_>>();
        assert_eq!(
            dates,
            vec![
                wednesday(),
                NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 16).unwrap(),
            ]
        );
        assert_eq!(ledger.daily_earnings_history()[0].date_label, "2025-05-16");
        assert_eq!(ledger.hours_worked_today(), 1.);

        let before = ledger.state().clone();
        ledger.refresh();
        assert_eq!(ledger.state(), &before);
        assert_lifetime_invariant(&ledger);
    }

    #[test]
    fn test_delete_job_consistency() {
        let jobs = vec![developer(), designer()];
        let developer_id = jobs[0].id;
        let designer_id = jobs[1].id;
        let (mut ledger, _) = ledger_at(at(wednesday(), 10, 0), jobs);

        let day = |d| NaiveDate::from_ymd_opt(2025, 5, d).unwrap();
        ledger.state.work_sessions = vec![
            WorkSession { date: day(5), hours_worked: 9., earnings: 0.1, job_id: developer_id },
            WorkSession { date: day(6), hours_worked: 7., earnings: 0.2, job_id: designer_id },
            WorkSession { date: day(7), hours_worked: 9., earnings: 0.3, job_id: developer_id },
            WorkSession { date: day(8), hours_worked: 7., earnings: 0.7, job_id: designer_id },
        ];
        ledger.state.work_session_earnings = 1.3;

        assert!(ledger.delete_job(developer_id));

        assert_eq!(ledger.work_sessions().len(), 2);
        assert_eq!(ledger.work_session_earnings(), 0.2 + 0.7);
        assert_eq!(ledger.active_job().unwrap().id, designer_id);
        assert_lifetime_invariant(&ledger);

        assert!(ledger.delete_job(designer_id));
        assert!(ledger.active_job().is_none());
        assert_eq!(ledger.work_session_earnings(), 0.);
        assert_eq!(ledger.todays_earnings(), 0.);
        assert!(!ledger.delete_job(designer_id));
        assert_lifetime_invariant(&ledger);
    }

    #[test]
    fn test_delete_inactive_job_keeps_active() {
        let jobs = vec![developer(), designer()];
        let developer_id = jobs[0].id;
        let designer_id = jobs[1].id;
        let (mut ledger, _) = ledger_at(at(wednesday(), 10, 0), jobs);
        assert!(ledger.delete_job(designer_id));
        assert_eq!(ledger.active_job().unwrap().id, developer_id);
    }

    #[test]
    fn test_recent_history_truncates() {
        let (mut ledger, clock) = ledger_at(at(wednesday(), 12, 0), vec![developer()]);
        clock.set(at(NaiveDate::from_ymd_opt(2025, 5, 23).unwrap(), 12, 0));
        ledger.refresh();
        assert!(ledger.daily_earnings_history().len() > 3);
        assert_eq!(ledger.recent_history().len(), 3);
        assert_eq!(ledger.recent_history(), &ledger.daily_earnings_history()[..3]);

        let status = ledger.status();
        assert_eq!(status.recent_history.len(), 3);
        assert_eq!(status.lifetime_earnings, ledger.lifetime_earnings());
    }

    #[test]
    fn test_operations_publish_snapshots() {
        *TEST_LOGGING;
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let clock = TestClock::new(at(wednesday(), 10, 0));
        let mut state = LedgerState::default();
        state.last_reconciled_date = Some(wednesday() - Duration::days(1));
        let mut ledger = Ledger::open(state, Box::new(clock), Some(sender));

        ledger.set_user_name("Jane");
        let snapshot = std::iter::from_fn(|| receiver.try_recv().ok()).last().unwrap();
        assert_eq!(snapshot.user_name, "Jane");
        assert_eq!(&snapshot, ledger.state());

        drop(receiver);
        ledger.set_user_name("Still works");
        assert_eq!(ledger.user_name(), "Still works");
    }

    #[tokio::test]
    async fn test_bad_rates_never_reach_saved_sessions() -> anyhow::Result<()> {
        let tuesday = wednesday() - Duration::days(1);
        let broken = Job::new("Broken", f64::NAN, "08:00", "18:00", "12:00", "13:00");
        let broken_id = broken.id;
        let (mut ledger, clock) = ledger_at(at(tuesday, 17, 0), vec![developer(), broken]);
        let closed = ledger.end_work_day().unwrap();

        clock.set(at(wednesday(), 15, 0));
        ledger.refresh();
        let infinite = developer().with_custom_hourly_rate(Some(f64::INFINITY));
        assert!(!ledger.add_job(infinite));
        let mut corrupted = ledger.jobs()[0].clone();
        corrupted.monthly_salary = f64::NAN;
        assert!(!ledger.update_job(corrupted));
        assert_eq!(ledger.jobs()[0].monthly_salary, 5000.);

        let negative = developer().with_custom_hourly_rate(Some(-10.));
        let negative_id = negative.id;
        assert!(ledger.add_job(negative));

        ledger.set_active_job(negative_id);
        assert_eq!(ledger.end_work_day(), None);
        ledger.set_active_job(broken_id);
        assert_eq!(ledger.todays_earnings(), 0.);
        assert_eq!(ledger.end_work_day(), None);
        assert_lifetime_invariant(&ledger);

        let dir = tempdir()?;
        let storage = JsonFileStorage::new(dir.path().to_owned())?;
        save_state(&storage, ledger.state()).await?;
        let loaded = load_state(&storage).await;
        assert_eq!(loaded.work_sessions, vec![closed.clone()]);
        assert_eq!(loaded.work_session_earnings, closed.earnings);
        assert_eq!(loaded.jobs, ledger.jobs());
        assert_eq!(loaded.active_job_id, Some(broken_id));
        Ok(())
    }
}
