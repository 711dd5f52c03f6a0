//! Pure conversions from a job's salary and schedule into rates, working minutes and the
//! "on the clock" predicate. Nothing here holds state.

use std::fmt::Display;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use tracing::trace;

use crate::{ledger::entities::Job, utils::time::minutes_of_day};

/// Exactly two integer parts around a `:`. Parts are not range checked, so `24:00` is 1440.
fn parse_time_of_day(time: &str) -> Option<i64> {
    let (hours, minutes) = time.split_once(':')?;
    let hours = hours.parse::<i64>().ok()?;
    let minutes = minutes.parse::<i64>().ok()?;
    hours.checked_mul(60)?.checked_add(minutes)
}

/// Minutes since midnight of an `HH:mm` string. Malformed input is treated as midnight.
pub fn minutes_since_midnight(time: &str) -> i64 {
    match parse_time_of_day(time) {
        Some(minutes) => minutes,
        None => {
            trace!("Malformed time of day {time:?}, using midnight");
            0
        }
    }
}

/// A job's schedule resolved to minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleMinutes {
    pub work_start: i64,
    pub work_end: i64,
    pub lunch_start: i64,
    pub lunch_end: i64,
}

impl ScheduleMinutes {
    pub fn of(job: &Job) -> Self {
        Self {
            work_start: minutes_since_midnight(&job.work_start),
            work_end: minutes_since_midnight(&job.work_end),
            lunch_start: minutes_since_midnight(&job.lunch_start),
            lunch_end: minutes_since_midnight(&job.lunch_end),
        }
    }

    pub fn lunch_minutes(&self) -> i64 {
        self.lunch_end - self.lunch_start
    }

    /// Can be zero or negative for a misconfigured job.
    pub fn daily_working_minutes(&self) -> i64 {
        (self.work_end - self.work_start) - self.lunch_minutes()
    }

    /// Lunch runs from just after `lunch_start` up to and including `lunch_end`.
    pub fn is_lunch(&self, minute: i64) -> bool {
        minute > self.lunch_start && minute <= self.lunch_end
    }

    pub fn is_working_minute(&self, minute: i64) -> bool {
        minute >= self.work_start && minute <= self.work_end && !self.is_lunch(minute)
    }
}

pub fn daily_working_minutes(job: &Job) -> i64 {
    ScheduleMinutes::of(job).daily_working_minutes()
}

pub fn daily_working_hours(job: &Job) -> f64 {
    daily_working_minutes(job) as f64 / 60.
}

/// Custom rate when set, otherwise the monthly salary spread over the scheduled hours of the
/// month. A schedule without working time, or a salary or rate that isn't a finite number,
/// yields 0.
pub fn hourly_rate(job: &Job) -> f64 {
    let rate = match job.custom_hourly_rate {
        Some(rate) => rate,
        None => {
            let monthly_hours = daily_working_hours(job) * f64::from(job.working_days_per_month);
            if monthly_hours <= 0. {
                return 0.;
            }
            job.monthly_salary / monthly_hours
        }
    };
    if !rate.is_finite() {
        trace!("Hourly rate of {} is {rate}, using 0", job.id);
        return 0.;
    }
    rate
}

pub fn earnings_per_minute(job: &Job) -> f64 {
    hourly_rate(job) / 60.
}

/// Monday to Friday.
pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_within_paid_window(job: &Job, now: NaiveDateTime) -> bool {
    is_workday(now.date()) && ScheduleMinutes::of(job).is_working_minute(minutes_of_day(now.time()))
}

/// Problems that make the derived figures meaningless. They are reported, never enforced.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleIssue {
    MalformedTime { field: &'static str, value: String },
    EndNotAfterStart,
    LunchInverted,
    LunchOutsideWork,
    NoWorkingTime,
    NegativeSalary,
    NonFiniteSalary,
    InvalidCustomRate(f64),
    NoWorkingDays,
}

impl Display for ScheduleIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleIssue::MalformedTime { field, value } => {
                write!(f, "{field} {value:?} is not a HH:mm time, midnight will be used")
            }
            ScheduleIssue::EndNotAfterStart => write!(f, "work ends before it starts"),
            ScheduleIssue::LunchInverted => write!(f, "lunch ends before it starts"),
            ScheduleIssue::LunchOutsideWork => write!(f, "lunch is outside of working hours"),
            ScheduleIssue::NoWorkingTime => {
                write!(f, "no working time is left after lunch, earnings will be 0")
            }
            ScheduleIssue::NegativeSalary => write!(f, "monthly salary is negative"),
            ScheduleIssue::NonFiniteSalary => {
                write!(f, "monthly salary is not a number, earnings will be 0")
            }
            ScheduleIssue::InvalidCustomRate(rate) => {
                write!(f, "hourly rate {rate} is negative or not a number")
            }
            ScheduleIssue::NoWorkingDays => write!(f, "working days per month is 0"),
        }
    }
}

pub fn validate(job: &Job) -> Vec<ScheduleIssue> {
    let mut issues = vec![];

    for (field, value) in [
        ("work start", &job.work_start),
        ("work end", &job.work_end),
        ("lunch start", &job.lunch_start),
        ("lunch end", &job.lunch_end),
    ] {
        if parse_time_of_day(value).is_none() {
            issues.push(ScheduleIssue::MalformedTime {
                field,
                value: value.clone(),
            });
        }
    }

    let schedule = ScheduleMinutes::of(job);
    if schedule.work_end <= schedule.work_start {
        issues.push(ScheduleIssue::EndNotAfterStart);
    }
    if schedule.lunch_end < schedule.lunch_start {
        issues.push(ScheduleIssue::LunchInverted);
    }
    if schedule.lunch_start < schedule.work_start || schedule.lunch_end > schedule.work_end {
        issues.push(ScheduleIssue::LunchOutsideWork);
    }
    if schedule.daily_working_minutes() <= 0 {
        issues.push(ScheduleIssue::NoWorkingTime);
    }
    if job.monthly_salary < 0. {
        issues.push(ScheduleIssue::NegativeSalary);
    }
    if !job.monthly_salary.is_finite() && job.custom_hourly_rate.is_none() {
        issues.push(ScheduleIssue::NonFiniteSalary);
    }
    if let Some(rate) = job.custom_hourly_rate.filter(|rate| !(rate.is_finite() && *rate >= 0.)) {
        issues.push(ScheduleIssue::InvalidCustomRate(rate));
    }
    if job.working_days_per_month == 0 && job.custom_hourly_rate.is_none() {
        issues.push(ScheduleIssue::NoWorkingDays);
    }

    issues
}
