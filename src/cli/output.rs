use ansi_term::Colour;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    engine::schedule::ScheduleIssue,
    ledger::{
        entities::{DailyEarningRecord, Job},
        LedgerStatus,
    },
    utils::{percentage::Percentage, time::display_label},
};

pub fn format_money(amount: f64) -> String {
    format!("${amount:.2}")
}

fn format_history_row(record: &DailyEarningRecord, today: NaiveDate) -> String {
    format!(
        "  {:<12} {:>12}",
        display_label(&record.date_label, today),
        format_money(record.amount)
    )
}

pub fn render_status(status: &LedgerStatus) -> String {
    let mut lines = vec![];

    let indicator = if status.is_working {
        Colour::Green.paint("working").to_string()
    } else {
        Colour::Yellow.paint("off hours").to_string()
    };
    match &status.active_job {
        Some(job) => lines.push(format!(
            "{} - {} [{indicator}] {}/h",
            status.user_name,
            job.title,
            format_money(job.hourly_rate())
        )),
        None => lines.push(format!("{} - no active job", status.user_name)),
    }

    lines.push(format!(
        "Today     {:>12}  {:.2} h  {}",
        format_money(status.todays_earnings),
        status.hours_worked_today,
        Percentage::from_ratio(status.work_progress)
    ));
    lines.push(format!(
        "Lifetime  {:>12}",
        format_money(status.lifetime_earnings)
    ));

    if !status.recent_history.is_empty() {
        lines.push("Recent".to_string());
        let today = status.at.date();
        lines.extend(
            status
                .recent_history
                .iter()
                .map(|record| format_history_row(record, today)),
        );
    }

    lines.join("\n")
}

pub fn render_history(history: &[DailyEarningRecord], today: NaiveDate) -> String {
    if history.is_empty() {
        return "No closed days yet".to_string();
    }
    history
        .iter()
        .map(|record| format_history_row(record, today))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_jobs(jobs: &[Job], active: Option<Uuid>) -> String {
    if jobs.is_empty() {
        return "No jobs configured".to_string();
    }
    jobs.iter()
        .enumerate()
        .map(|(index, job)| {
            let marker = if Some(job.id) == active { "*" } else { " " };
            format!(
                "{marker} {} {:<24} {}-{} lunch {}-{}  {}/h  {} days  {}",
                index + 1,
                job.title,
                job.work_start,
                job.work_end,
                job.lunch_start,
                job.lunch_end,
                format_money(job.hourly_rate()),
                job.working_days_per_month,
                job.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_issues(issues: &[ScheduleIssue]) -> Option<String> {
    if issues.is_empty() {
        return None;
    }
    Some(
        issues
            .iter()
            .map(|issue| format!("{} {issue}", Colour::Yellow.paint("warning:")))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}
