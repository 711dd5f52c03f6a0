use anyhow::{anyhow, bail, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::{
    engine::schedule::validate,
    ledger::{
        entities::{Job, DEFAULT_WORKING_DAYS},
        Ledger,
    },
};

use super::output::render_issues;

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    #[command(about = "Add a job. The first job becomes active")]
    Add {
        #[arg(help = "Job title")]
        title: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
        #[arg(long, default_value_t = DEFAULT_WORKING_DAYS, help = "Working days per month")]
        days: u32,
        #[arg(
            long,
            value_parser = finite_amount,
            help = "Hourly rate overriding the one computed from the salary"
        )]
        rate: Option<f64>,
    },
    #[command(about = "Change fields of a job. Omitted fields keep their value")]
    Update {
        #[arg(help = "Job number from `earnly jobs` or a prefix of its id")]
        job: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_parser = finite_amount)]
        salary: Option<f64>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long = "lunch-start")]
        lunch_start: Option<String>,
        #[arg(long = "lunch-end")]
        lunch_end: Option<String>,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, value_parser = finite_amount, conflicts_with = "clear_rate")]
        rate: Option<f64>,
        #[arg(long = "clear-rate", help = "Go back to the rate computed from the salary")]
        clear_rate: bool,
    },
    #[command(about = "Delete a job together with its closed sessions")]
    Delete {
        #[arg(help = "Job number from `earnly jobs` or a prefix of its id")]
        job: String,
    },
    #[command(about = "Make a job the active one. Today's accrual restarts under it")]
    Select {
        #[arg(help = "Job number from `earnly jobs` or a prefix of its id")]
        job: String,
    },
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    #[arg(long, value_parser = finite_amount, help = "Monthly salary")]
    salary: f64,
    #[arg(long, help = "Start of work, HH:mm")]
    start: String,
    #[arg(long, help = "End of work, HH:mm")]
    end: String,
    #[arg(long = "lunch-start", help = "Start of lunch, HH:mm")]
    lunch_start: String,
    #[arg(long = "lunch-end", help = "End of lunch, HH:mm")]
    lunch_end: String,
}

fn finite_amount(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        Ok(_) => Err("expected a finite number".into()),
        Err(e) => Err(e.to_string()),
    }
}

/// Finds a job by its 1-based position in the job list or by a unique prefix of its id.
pub fn resolve_job(jobs: &[Job], reference: &str) -> Result<Uuid> {
    if let Ok(position) = reference.parse::<usize>() {
        if let Some(job) = position.checked_sub(1).and_then(|index| jobs.get(index)) {
            return Ok(job.id);
        }
    }

    let reference = reference.to_lowercase();
    let mut matching = jobs
        .iter()
        .filter(|job| job.id.to_string().starts_with(&reference));
    match (matching.next(), matching.next()) {
        (Some(job), None) => Ok(job.id),
        (Some(_), Some(_)) => bail!("Job reference {reference:?} is ambiguous"),
        (None, _) => Err(anyhow!("No job matches {reference:?}")),
    }
}

fn warn_about_schedule(job: &Job) {
    if let Some(issues) = render_issues(&validate(job)) {
        eprintln!("{issues}");
    }
}

pub fn process_job_command(command: JobCommand, ledger: &mut Ledger) -> Result<()> {
    match command {
        JobCommand::Add {
            title,
            schedule,
            days,
            rate,
        } => {
            let job = Job::new(
                title,
                schedule.salary,
                schedule.start,
                schedule.end,
                schedule.lunch_start,
                schedule.lunch_end,
            )
            .with_working_days(days)
            .with_custom_hourly_rate(rate);
            warn_about_schedule(&job);
            let id = job.id;
            if !ledger.add_job(job) {
                bail!("Job {id} was not added");
            }
            println!("Added job {id}");
        }
        JobCommand::Update {
            job,
            title,
            salary,
            start,
            end,
            lunch_start,
            lunch_end,
            days,
            rate,
            clear_rate,
        } => {
            let id = resolve_job(ledger.jobs(), &job)?;
            let mut updated = ledger
                .job(id)
                .cloned()
                .ok_or_else(|| anyhow!("Job {id} disappeared"))?;
            if let Some(title) = title {
                updated.title = title;
            }
            if let Some(salary) = salary {
                updated.monthly_salary = salary;
            }
            if let Some(start) = start {
                updated.work_start = start;
            }
            if let Some(end) = end {
                updated.work_end = end;
            }
            if let Some(lunch_start) = lunch_start {
                updated.lunch_start = lunch_start;
            }
            if let Some(lunch_end) = lunch_end {
                updated.lunch_end = lunch_end;
            }
            if let Some(days) = days {
                updated.working_days_per_month = days;
            }
            if rate.is_some() || clear_rate {
                updated.custom_hourly_rate = rate;
            }
            warn_about_schedule(&updated);
            if !ledger.update_job(updated) {
                bail!("Job {id} was not updated");
            }
            println!("Updated job {id}");
        }
        JobCommand::Delete { job } => {
            let id = resolve_job(ledger.jobs(), &job)?;
            ledger.delete_job(id);
            println!("Deleted job {id}");
        }
        JobCommand::Select { job } => {
            let id = resolve_job(ledger.jobs(), &job)?;
            ledger.set_active_job(id);
            println!("Active job is now {id}");
        }
    }
    Ok(())
}
