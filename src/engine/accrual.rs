//! Today's accrual, re-derived from the schedule and the current instant on every call. There is
//! no running counter: calling it twice at the same instant gives the same answer, and skipped
//! ticks lose nothing.

use chrono::NaiveDateTime;

use crate::{ledger::entities::Job, utils::time::minutes_of_day};

use super::schedule::{hourly_rate, is_workday, ScheduleMinutes};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Accrual {
    pub minutes_worked: i64,
    pub earnings: f64,
}

impl Accrual {
    pub const ZERO: Accrual = Accrual {
        minutes_worked: 0,
        earnings: 0.,
    };

    pub fn hours_worked(&self) -> f64 {
        self.minutes_worked as f64 / 60.
    }
}

/// Minutes worked since the shift started, net of lunch, 0 on weekends and before the start.
fn worked_minutes(schedule: &ScheduleMinutes, now: NaiveDateTime) -> i64 {
    if !is_workday(now.date()) {
        return 0;
    }
    let clock = minutes_of_day(now.time());
    if clock <= schedule.work_start {
        return 0;
    }

    let elapsed = clock.min(schedule.work_end) - schedule.work_start;
    let lunch = if clock > schedule.lunch_end {
        schedule.lunch_minutes()
    } else if clock > schedule.lunch_start {
        clock - schedule.lunch_start
    } else {
        0
    };

    (elapsed - lunch).max(0)
}

pub fn compute_todays_accrual(job: &Job, now: NaiveDateTime) -> Accrual {
    let schedule = ScheduleMinutes::of(job);
    if schedule.daily_working_minutes() <= 0 {
        return Accrual::ZERO;
    }

    let minutes_worked = worked_minutes(&schedule, now);
    Accrual {
        minutes_worked,
        earnings: minutes_worked as f64 / 60. * hourly_rate(job),
    }
}

/// Share of today's scheduled minutes already worked, within 0..=1.
pub fn compute_work_progress(job: &Job, now: NaiveDateTime) -> f64 {
    let schedule = ScheduleMinutes::of(job);
    let total = schedule.daily_working_minutes();
    if total <= 0 {
        return 0.;
    }
    (worked_minutes(&schedule, now) as f64 / total as f64).min(1.)
}
