//! workq CLI: exercise a bounded work queue from the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde::Serialize;
use workq::config::Config;
use workq::model::FaultReport;
use workq::telemetry::{TelemetryConfig, init_telemetry};
use workq::{Admission, CancellationToken, Limit, SubmitOptions, WorkQueue};

#[derive(Parser)]
#[command(name = "workq", about = "Bounded-concurrency async work queue")]
struct Cli {
    /// TOML config file (defaults to environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a batch of synthetic jobs and report the outcome
    Run {
        /// Number of jobs to submit
        #[arg(long, default_value_t = 16)]
        jobs: usize,
        /// Concurrency limit (0 or negative = hardware default)
        #[arg(long, allow_negative_numbers = true)]
        concurrency: Option<i64>,
        /// Simulated work per job
        #[arg(long, default_value_t = 50)]
        delay_ms: u64,
        /// Make every Nth job fail
        #[arg(long)]
        fail_every: Option<usize>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the resolved concurrency limit
    Limits {
        /// Requested limit (0 or negative = hardware default)
        #[arg(long, allow_negative_numbers = true)]
        concurrency: Option<i64>,
    },
}

#[derive(Serialize)]
struct RunSummary {
    concurrency_limit: usize,
    submitted: usize,
    withdrawn: usize,
    completed: usize,
    peak_concurrency: usize,
    elapsed_ms: u64,
    faults: Vec<FaultReport>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Command::Run {
            jobs,
            concurrency,
            delay_ms,
            fail_every,
            json,
        } => {
            let _guard = init_telemetry(TelemetryConfig::from_config(&config, "workq"))?;
            let config = Config {
                concurrency: concurrency.map(Limit::from).unwrap_or(config.concurrency),
                ..config
            };
            cmd_run(&config, jobs, Duration::from_millis(delay_ms), fail_every, json).await
        }
        Command::Limits { concurrency } => {
            let limit = concurrency.map(Limit::from).unwrap_or(config.concurrency);
            println!("requested:  {limit:?}");
            println!("resolved:   {}", limit.resolve());
            Ok(())
        }
    }
}

async fn cmd_run(
    config: &Config,
    jobs: usize,
    delay: Duration,
    fail_every: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let queue = WorkQueue::from_config(config);
    let shutdown = CancellationToken::new();

    let ctrl = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.cancel();
    });

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let mut withdrawn = 0;
    let started = Instant::now();

    for n in 1..=jobs {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        let completed = Arc::clone(&completed);
        let fail = fail_every.is_some_and(|every| every > 0 && n % every == 0);

        let job = async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            running.fetch_sub(1, Ordering::SeqCst);
            completed.fetch_add(1, Ordering::SeqCst);
            if fail {
                anyhow::bail!("job {n} failed on purpose");
            }
            Ok(())
        };

        let options = SubmitOptions::new()
            .label(format!("job-{n}"))
            .cancel(shutdown.clone());
        match queue.submit_with(job, options).await {
            Admission::Admitted(_) => {}
            Admission::Rejected | Admission::Withdrawn => withdrawn += 1,
        }
    }

    // Interrupted runs still wait for admitted jobs; only new admissions stop.
    queue.wait_for_drain_with(false, None).await?;

    let summary = RunSummary {
        concurrency_limit: queue.concurrency_limit(),
        submitted: jobs,
        withdrawn,
        completed: completed.load(Ordering::SeqCst),
        peak_concurrency: peak.load(Ordering::SeqCst),
        elapsed_ms: started.elapsed().as_millis() as u64,
        faults: queue.faults().iter().map(|f| f.report()).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Limit:      {}", summary.concurrency_limit);
        println!("Submitted:  {}", summary.submitted);
        println!("Withdrawn:  {}", summary.withdrawn);
        println!("Completed:  {}", summary.completed);
        println!("Peak:       {}", summary.peak_concurrency);
        println!("Elapsed:    {}ms", summary.elapsed_ms);
        println!("Faulted:    {}", queue.is_faulted());
        for fault in &summary.faults {
            let label = fault.label.as_deref().unwrap_or("-");
            println!("  {label:<10}  {}", fault.message);
        }
    }

    Ok(())
}
