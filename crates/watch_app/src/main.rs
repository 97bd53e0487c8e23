mod cli;
mod config;
mod effects;
mod logging;
mod persistence;
mod render;
mod terminal;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use indicatif::MultiProgress;
use watch_engine::{JobClient, JobWatcher, PollHandle};
use watch_logging::{poll_debug, poll_info, poll_warn};

use cli::{Cli, Command};
use config::{Overrides, WatchConfig};
use effects::{CompletionDispatcher, CompletionPlan, CompletionReport, Settlement};
use logging::LogDestination;
use terminal::TerminalObserver;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(
        LogDestination::from_flag(cli.log_file),
        logging::level_from_verbosity(cli.verbose, cli.quiet),
    );

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when a watched job did not complete.
async fn run(cli: Cli) -> Result<bool> {
    let mut config = WatchConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&overrides(&cli));

    match cli.command {
        Command::Watch {
            job_ids,
            project,
            no_urls,
            ..
        } => {
            let plan = CompletionPlan {
                fetch_urls: !no_urls,
                auto_download: config.auto_download,
                output_dir: config.output_dir.clone(),
                project_id: project,
            };
            watch(&config, job_ids, plan).await
        }
        Command::Cancel { job_id } => {
            let result = client(&config)?
                .cancel(&job_id)
                .await
                .with_context(|| format!("failed to cancel job {job_id}"))?;
            println!(
                "[{job_id}] {}",
                result.message.as_deref().unwrap_or("Cancel requested")
            );
            Ok(true)
        }
        Command::Download { job_id, .. } => {
            let file = client(&config)?
                .download(&job_id, &config.output_dir)
                .await
                .with_context(|| format!("failed to download result of job {job_id}"))?;
            println!("{}", render::downloaded(&file));
            Ok(true)
        }
        Command::Urls { job_id } => {
            let list = client(&config)?
                .url_list(&job_id)
                .await
                .with_context(|| format!("failed to fetch URLs of job {job_id}"))?;
            println!("{}", render::url_list(&list));
            Ok(true)
        }
        Command::Save { job_id, project } => {
            let result = client(&config)?
                .save_to_project(&job_id, &project)
                .await
                .with_context(|| format!("failed to save job {job_id} to project {project}"))?;
            println!("{}", render::saved(&job_id, &result));
            Ok(true)
        }
        Command::Last => {
            match persistence::load_last_result(&config.cache_path, Utc::now()) {
                Some(result) => println!("{}", render::last_result(&result)),
                None => println!("No completed job in the last 24 hours"),
            }
            Ok(true)
        }
    }
}

fn overrides(cli: &Cli) -> Overrides {
    let mut overrides = Overrides {
        base_url: cli.base_url.clone(),
        ..Overrides::default()
    };
    match &cli.command {
        Command::Watch {
            interval_ms,
            max_attempts,
            no_download,
            output_dir,
            ..
        } => {
            overrides.interval_ms = *interval_ms;
            overrides.max_attempts = *max_attempts;
            overrides.no_download = *no_download;
            overrides.output_dir = output_dir.clone();
        }
        Command::Download { output_dir, .. } => overrides.output_dir = output_dir.clone(),
        _ => {}
    }
    overrides
}

fn client(config: &WatchConfig) -> Result<JobClient> {
    let client = JobClient::new(config.endpoints()?, config.http.to_settings())
        .context("failed to build HTTP client")?;
    Ok(client)
}

async fn watch(config: &WatchConfig, job_ids: Vec<String>, plan: CompletionPlan) -> Result<bool> {
    let client = Arc::new(client(config)?);
    let watcher = JobWatcher::new(client.clone(), config.poll.to_settings());
    let multi = MultiProgress::new();
    poll_info!("Watching {} job(s) on {}", job_ids.len(), config.base_url);

    let handles: Vec<PollHandle> = job_ids
        .iter()
        .map(|job_id| {
            let observer = Arc::new(TerminalObserver::new(&multi, job_id));
            watcher.spawn(job_id.clone(), observer)
        })
        .collect();

    let stop_tokens: Vec<_> = handles.iter().map(PollHandle::stop_token).collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            poll_warn!("Interrupted, stopping {} poll chain(s)", stop_tokens.len());
            for token in &stop_tokens {
                token.cancel();
            }
        }
    });

    let dispatcher = CompletionDispatcher::new(&client, &plan);
    let settlements = dispatcher
        .settle(handles, &|settlement: &Settlement| {
            poll_debug!(job = settlement.job_id(); "chain settled");
            multi.suspend(|| report_settlement(settlement));
            if let Settlement::Completed { outcome, report } = settlement {
                let entry = report.to_last_result(outcome);
                persistence::save_last_result(&config.cache_path, &entry);
            }
        })
        .await;
    Ok(settlements.iter().all(Settlement::is_success))
}

fn report_settlement(settlement: &Settlement) {
    match settlement {
        Settlement::Completed { outcome, report } => {
            println!("{}", render::outcome_summary(outcome));
            print_report(&outcome.job_id, report);
        }
        Settlement::Unfinished(outcome) => println!("{}", render::outcome_summary(outcome)),
        Settlement::Lost { job_id, error } => eprintln!("[{job_id}] {error}"),
    }
}

fn print_report(job_id: &str, report: &CompletionReport) {
    if let Some(list) = &report.urls {
        println!("{}", render::url_list(list));
    }
    if let Some(file) = &report.downloaded {
        println!("{}", render::downloaded(file));
    }
    if let Some(result) = &report.saved {
        println!("{}", render::saved(job_id, result));
    }
}
