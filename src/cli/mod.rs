pub mod job;
pub mod output;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use job::{process_job_command, JobCommand};
use output::{render_history, render_jobs, render_status};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};

use crate::{
    ledger::{
        ticker::{RefreshTicker, DEFAULT_TICK},
        Ledger,
    },
    persistence::{saver::StateSaver, PersistenceModule},
    storage::{key_value::JsonFileStorage, state_store::load_state},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, WATCH_PREFIX},
        shutdown::detect_shutdown,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Earnly", version, long_about = None)]
#[command(about = "Tracks how much you have earned today", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Show today's earnings, progress and recent days")]
    Status,
    #[command(about = "Show earnings of closed days, newest first")]
    History {
        #[arg(long, help = "Show every recorded day instead of the last few")]
        all: bool,
    },
    #[command(about = "List configured jobs. The active one is marked with *")]
    Jobs,
    #[command(about = "Manage jobs")]
    Job {
        #[command(subcommand)]
        command: JobCommand,
    },
    #[command(about = "Close today as a work session and record its earnings")]
    EndDay,
    #[command(about = "Change the display name")]
    Name {
        #[arg(help = "New display name")]
        name: String,
    },
    #[command(about = "Keep the status on screen, refreshing it periodically. Stop with Ctrl-C")]
    Watch {
        #[arg(long, default_value_t = DEFAULT_TICK.as_secs(), help = "Seconds between refreshes")]
        seconds: u64,
    },
}

fn application_path(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Couldn't create application directory {dir:?}"))?;
            Ok(dir)
        }
        None => create_application_default_path(),
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let application_path = application_path(args.dir)?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = match args.commands {
        Commands::Watch { .. } => WATCH_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &application_path, logging_level, args.log)?;

    let storage = JsonFileStorage::new(application_path.join("state"))?;
    let state = load_state(&storage).await;

    let (sender, receiver) = mpsc::unbounded_channel();
    let persistence =
        tokio::spawn(PersistenceModule::new(receiver, StateSaver::new(storage)).run());

    let ledger = Ledger::open(state, Box::new(DefaultClock), Some(sender));
    info!("Opened ledger at {}", ledger.now());

    // The ledger owns the only sender, so persistence drains once the command drops it.
    let result = execute(args.commands, ledger).await;

    match persistence.await {
        Ok(Ok(())) => (),
        Ok(Err(e)) => error!("Persistence finished with an error {e:?}"),
        Err(e) => error!("Persistence task failed {e:?}"),
    }
    result
}

async fn execute(command: Commands, mut ledger: Ledger) -> Result<()> {
    match command {
        Commands::Status => {
            println!("{}", render_status(&ledger.status()));
        }
        Commands::History { all } => {
            let history = if all {
                ledger.daily_earnings_history()
            } else {
                ledger.recent_history()
            };
            println!("{}", render_history(history, ledger.now().date()));
        }
        Commands::Jobs => {
            println!(
                "{}",
                render_jobs(ledger.jobs(), ledger.active_job().map(|job| job.id))
            );
        }
        Commands::Job { command } => process_job_command(command, &mut ledger)?,
        Commands::EndDay => match ledger.end_work_day() {
            Some(session) => println!(
                "Closed {} with {:.2} h and {}",
                session.date,
                session.hours_worked,
                output::format_money(session.earnings)
            ),
            None => println!("Nothing to close, no active job or nothing earned today"),
        },
        Commands::Name { name } => {
            ledger.set_user_name(name);
            println!("Hello, {}", ledger.user_name());
        }
        Commands::Watch { seconds } => {
            watch(ledger, Duration::from_secs(seconds.max(1))).await?
        }
    }
    Ok(())
}

async fn watch(ledger: Ledger, frequency: Duration) -> Result<()> {
    let shutdown = CancellationToken::new();
    let (sender, mut receiver) = mpsc::channel(4);
    let ticker = RefreshTicker::new(
        Arc::new(Mutex::new(ledger)),
        sender,
        shutdown.clone(),
        frequency,
        Box::new(DefaultClock),
    );

    let ticking = async {
        let result = ticker.run().await;
        shutdown.cancel();
        result
    };
    let printing = async move {
        while let Some(status) = receiver.recv().await {
            println!("{}\n", render_status(&status));
        }
    };

    let (_, result, _) = tokio::join!(detect_shutdown(shutdown.clone()), ticking, printing);
    result
}
