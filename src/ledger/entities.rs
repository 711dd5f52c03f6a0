use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    engine::schedule,
    utils::time::{date_to_label, label_to_date},
};

/// Working days per month assumed when a job is created without an explicit count.
pub const DEFAULT_WORKING_DAYS: u32 = 22;

pub const DEFAULT_USER_NAME: &str = "John Doe";

/// A compensation and schedule profile. Times of day are kept as the `HH:mm` strings the user
/// typed; parsing happens in [schedule] and degrades to midnight on malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub monthly_salary: f64,
    pub work_start: String,
    pub work_end: String,
    pub lunch_start: String,
    pub lunch_end: String,
    #[serde(rename = "workingDays")]
    pub working_days_per_month: u32,
    #[serde(default)]
    pub custom_hourly_rate: Option<f64>,
    /// Recomputed from the schedule on every refresh, never authoritative.
    #[serde(default)]
    pub hours_worked_today: f64,
    #[serde(default)]
    pub lifetime_hours: f64,
}

impl Job {
    pub fn new(
        title: impl Into<String>,
        monthly_salary: f64,
        work_start: impl Into<String>,
        work_end: impl Into<String>,
        lunch_start: impl Into<String>,
        lunch_end: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            monthly_salary,
            work_start: work_start.into(),
            work_end: work_end.into(),
            lunch_start: lunch_start.into(),
            lunch_end: lunch_end.into(),
            working_days_per_month: DEFAULT_WORKING_DAYS,
            custom_hourly_rate: None,
            hours_worked_today: 0.,
            lifetime_hours: 0.,
        }
    }

    pub fn with_working_days(self, working_days_per_month: u32) -> Self {
        Self {
            working_days_per_month,
            ..self
        }
    }

    pub fn with_custom_hourly_rate(self, custom_hourly_rate: Option<f64>) -> Self {
        Self {
            custom_hourly_rate,
            ..self
        }
    }

    pub fn with_lifetime_hours(self, lifetime_hours: f64) -> Self {
        Self {
            lifetime_hours,
            ..self
        }
    }

    pub fn hourly_rate(&self) -> f64 {
        schedule::hourly_rate(self)
    }

    pub fn earnings_per_minute(&self) -> f64 {
        schedule::earnings_per_minute(self)
    }

    pub fn daily_working_hours(&self) -> f64 {
        schedule::daily_working_hours(self)
    }

    /// JSON has no NaN or infinity, such a job would not survive a save.
    pub fn has_finite_pay(&self) -> bool {
        self.monthly_salary.is_finite() && self.custom_hourly_rate.map_or(true, f64::is_finite)
    }
}

/// One closed work day for one job. Created by reconciliation or by ending the day and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub date: NaiveDate,
    pub hours_worked: f64,
    pub earnings: f64,
    pub job_id: Uuid,
}

/// History entry meant for display. The date lives in a formatted label, see
/// [display_label](crate::utils::time::display_label) for how it's shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEarningRecord {
    pub date_label: String,
    pub amount: f64,
}

impl DailyEarningRecord {
    pub fn for_date(date: NaiveDate, amount: f64) -> Self {
        Self {
            date_label: date_to_label(date),
            amount,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        label_to_date(&self.date_label)
    }
}

impl From<&WorkSession> for DailyEarningRecord {
    fn from(session: &WorkSession) -> Self {
        DailyEarningRecord::for_date(session.date, session.earnings)
    }
}

/// Everything the ledger persists. Today's accrual is deliberately absent: it is re-derived from
/// the clock, and lifetime earnings are always `work_session_earnings` plus that accrual.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerState {
    pub user_name: String,
    pub jobs: Vec<Job>,
    pub active_job_id: Option<Uuid>,
    pub work_session_earnings: f64,
    /// Most recent first.
    pub daily_earnings_history: Vec<DailyEarningRecord>,
    pub work_sessions: Vec<WorkSession>,
    pub last_reconciled_date: Option<NaiveDate>,
}

impl Default for LedgerState {
    /// Fresh install: sample jobs with the first one active, nothing earned yet.
    fn default() -> Self {
        let jobs = sample_jobs();
        let active_job_id = jobs.first().map(|job| job.id);
        Self {
            jobs,
            active_job_id,
            ..Self::empty()
        }
    }
}

impl LedgerState {
    pub fn empty() -> Self {
        Self {
            user_name: DEFAULT_USER_NAME.to_string(),
            jobs: vec![],
            active_job_id: None,
            work_session_earnings: 0.,
            daily_earnings_history: vec![],
            work_sessions: vec![],
            last_reconciled_date: None,
        }
    }

    pub fn job(&self, id: Uuid) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    pub fn active_job(&self) -> Option<&Job> {
        self.active_job_id.and_then(|id| self.job(id))
    }

    pub fn session_earnings_sum(&self) -> f64 {
        self.work_sessions.iter().map(|session| session.earnings).sum()
    }

    /// Records a closed session: the session itself, its history entry, the running total and the
    /// job's lifetime hours.
    pub fn close_session(&mut self, session: WorkSession) {
        if let Some(job) = self.job_mut(session.job_id) {
            job.lifetime_hours += session.hours_worked;
        }
        self.work_session_earnings += session.earnings;
        self.daily_earnings_history
            .insert(0, DailyEarningRecord::from(&session));
        self.work_sessions.push(session);
    }

    /// Fixes references and totals that can't be trusted after loading from disk. An active job
    /// that no longer exists falls back to the first job, and the session total is re-derived
    /// from the sessions themselves.
    pub fn repair(&mut self) {
        for job in self.jobs.iter_mut().filter(|job| !job.has_finite_pay()) {
            warn!("Job {} has pay that isn't a number, resetting it", job.id);
            if !job.monthly_salary.is_finite() {
                job.monthly_salary = 0.;
            }
            job.custom_hourly_rate = job.custom_hourly_rate.filter(|rate| rate.is_finite());
        }

        if let Some(id) = self.active_job_id {
            if self.job(id).is_none() {
                warn!("Active job {id} doesn't exist, falling back to the first job");
                self.active_job_id = None;
            }
        }
        if self.active_job_id.is_none() {
            self.active_job_id = self.jobs.first().map(|job| job.id);
        }

        let sum = self.session_earnings_sum();
        if sum != self.work_session_earnings {
            if (sum - self.work_session_earnings).abs() > 1e-6 {
                warn!(
                    "Stored session earnings {} drifted from sessions sum {sum}",
                    self.work_session_earnings
                );
            }
            self.work_session_earnings = sum;
        }
    }
}

pub fn sample_jobs() -> Vec<Job> {
    vec![
        Job::new(
            "Software Developer",
            5000.,
            "08:00",
            "18:00",
            "12:00",
            "13:00",
        )
        .with_lifetime_hours(1847.5),
        Job::new(
            "Freelance Designer",
            3200.,
            "09:00",
            "17:00",
            "12:30",
            "13:30",
        )
        .with_working_days(20)
        .with_lifetime_hours(892.),
    ]
}
