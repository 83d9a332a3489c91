//! Process entry point (C10, §4.10): wires C0 (config) into C1/C2/C3
//! singletons, then either runs one synchronous pass (`run`) or hands
//! control to C8's scheduler loop (`serve`). Exit code 0 on success,
//! non-zero on failure, per §6.

mod account_store;
mod runtime;
mod status;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use indexmesh_common::{Config, IndexMeshError, Source};
use indexmesh_embed::TextEmbedder;
use indexmesh_engine::{IndexerCore, Scheduler, StatsRegistry};
use tracing::{error, info};
use uuid::Uuid;

/// Request budget for a one-shot `run` invocation. There is no config key
/// for this: a CLI-triggered run is an operator action, not a scheduled
/// tick, so the budget is a flag with a conservative default rather than
/// an environment-driven setting.
const DEFAULT_CLI_BUDGET: u32 = 50;

#[derive(Parser)]
#[command(name = "indexmesh")]
#[command(about = "Multi-source social-content indexing engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RunSource {
    Microblog,
    Groupchat,
    All,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronous indexing pass for the given source(s).
    Run {
        source: RunSource,
        /// Maximum number of adapter requests to spend on this pass.
        #[arg(long, default_value_t = DEFAULT_CLI_BUDGET)]
        budget: u32,
    },
    /// Probe C1 (vector store) and C2 (embedding provider) connectivity.
    Health,
    /// Print C9's rolling counters from the last `serve` snapshot.
    Stats,
    /// Zero C9's counters in the snapshot file.
    ResetStats,
    /// Peek or clear C8's running flags, via the `serve` snapshot.
    #[command(subcommand)]
    Scheduler(SchedulerCommands),
    /// Start the long-running scheduler loop (C8).
    Serve,
}

#[derive(Subcommand)]
enum SchedulerCommands {
    Status,
    Reset,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match Config::try_from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    let result = runtime.block_on(dispatch(cli.command, config));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config) {
    use indexmesh_common::LogFormat;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

async fn dispatch(command: Commands, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Run { source, budget } => cmd_run(&config, source, budget).await,
        Commands::Health => cmd_health(&config).await,
        Commands::Stats => cmd_stats(&config),
        Commands::ResetStats => cmd_reset_stats(&config),
        Commands::Scheduler(SchedulerCommands::Status) => cmd_scheduler_status(&config),
        Commands::Scheduler(SchedulerCommands::Reset) => cmd_scheduler_reset(&config),
        Commands::Serve => cmd_serve(config).await,
    }
}

async fn cmd_run(config: &Config, source: RunSource, budget: u32) -> anyhow::Result<()> {
    let rt = runtime::Runtime::bootstrap(config)?;
    rt.ensure_collection(config).await?;

    let mut failed = false;
    if matches!(source, RunSource::Microblog | RunSource::All) {
        failed |= !run_once(config, &rt, Source::Microblog, budget, None).await?;
    }
    if matches!(source, RunSource::Groupchat | RunSource::All) {
        failed |= !run_once(config, &rt, Source::Groupchat, budget, None).await?;
    }

    if failed {
        anyhow::bail!("one or more indexing runs did not complete successfully");
    }
    Ok(())
}

/// Runs one pass for `source` and reports whether it succeeded. When
/// `stats` is supplied (the `serve` loop), the run is folded into C9's
/// rolling counters; a one-shot CLI `run` has no long-lived registry to
/// fold into, so it passes `None` and relies on the printed summary.
async fn run_once(
    config: &Config,
    rt: &runtime::Runtime,
    source: Source,
    budget: u32,
    stats: Option<&StatsRegistry>,
) -> anyhow::Result<bool> {
    if let Some(stats) = stats {
        stats.record_run_start(source);
    }

    let mut states = match source {
        Source::Microblog => account_store::load_or_default(
            config.account_state_snapshot_path.as_deref(),
            source,
            runtime::default_microblog_states(config),
        ),
        Source::Groupchat => account_store::load_or_default(
            config.account_state_snapshot_path.as_deref(),
            source,
            runtime::default_groupchat_states(config),
        ),
    };

    if states.is_empty() {
        info!(%source, "No accounts/channels configured, nothing to do");
        return Ok(true);
    }

    let (adapter, report) = match source {
        Source::Microblog => {
            let core = IndexerCore::new(
                &rt.microblog_adapter,
                &rt.embedder,
                &rt.gateway,
                config.vector_store_collection.clone(),
                config.etl_max_historical_days,
            );
            let report = core.run(Uuid::new_v4(), &mut states, budget).await;
            ("microblog", report)
        }
        Source::Groupchat => {
            let core = IndexerCore::new(
                &rt.groupchat_adapter,
                &rt.embedder,
                &rt.gateway,
                config.vector_store_collection.clone(),
                config.etl_max_historical_days,
            );
            let report = core.run(Uuid::new_v4(), &mut states, budget).await;
            ("groupchat", report)
        }
    };

    account_store::save(config.account_state_snapshot_path.as_deref(), source, &states);
    if let Some(stats) = stats {
        stats.record_run_end(&report);
    }

    info!(
        source = adapter,
        run_id = %report.run_id,
        processed = report.processed,
        stored = report.stored,
        errors = report.errors,
        success = report.success,
        "Indexing run finished"
    );
    Ok(report.success)
}

async fn cmd_health(config: &Config) -> anyhow::Result<()> {
    let rt = runtime::Runtime::bootstrap(config)?;

    let vector_store_ok = rt.ensure_collection(config).await.is_ok();
    let embedding_ok = rt.embedder.embed_one("health probe").await.is_ok();

    println!(
        "{}",
        serde_json::json!({
            "vectorStoreOk": vector_store_ok,
            "embeddingOk": embedding_ok,
        })
    );

    let mut snapshot = status::load(&config.runtime_status_path);
    snapshot.vector_store_ok = Some(vector_store_ok);
    snapshot.embedding_ok = Some(embedding_ok);
    snapshot.updated_at = Some(chrono::Utc::now());
    let _ = status::save(&config.runtime_status_path, &snapshot);

    if !vector_store_ok || !embedding_ok {
        anyhow::bail!("health check failed");
    }
    Ok(())
}

fn cmd_stats(config: &Config) -> anyhow::Result<()> {
    let snapshot = status::load(&config.runtime_status_path);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn cmd_reset_stats(config: &Config) -> anyhow::Result<()> {
    let mut snapshot = status::load(&config.runtime_status_path);
    snapshot.microblog_stats = Default::default();
    snapshot.groupchat_stats = Default::default();
    snapshot.updated_at = Some(chrono::Utc::now());
    status::save(&config.runtime_status_path, &snapshot)?;
    println!("stats reset");
    Ok(())
}

fn cmd_scheduler_status(config: &Config) -> anyhow::Result<()> {
    let snapshot = status::load(&config.runtime_status_path);
    println!(
        "{}",
        serde_json::json!({
            "microblog": snapshot.microblog_scheduler,
            "groupchat": snapshot.groupchat_scheduler,
        })
    );
    Ok(())
}

fn cmd_scheduler_reset(config: &Config) -> anyhow::Result<()> {
    let mut snapshot = status::load(&config.runtime_status_path);
    snapshot.microblog_scheduler = Default::default();
    snapshot.groupchat_scheduler = Default::default();
    status::save(&config.runtime_status_path, &snapshot)?;
    println!("scheduler status reset");
    Ok(())
}

async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    config.log_redacted();
    let rt = runtime::Runtime::bootstrap(&config)?;
    rt.ensure_collection(&config).await?;

    let scheduler = Scheduler::new(config.etl_schedule_interval.as_deref())
        .map_err(|e| IndexMeshError::Config(e))?;
    let stats = StatsRegistry::new();

    let token = scheduler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            token.cancel();
        }
    });

    let budget = DEFAULT_CLI_BUDGET;
    let mb_microblog = scheduler.microblog.clone();
    let mb_groupchat = scheduler.groupchat.clone();

    scheduler
        .run(
            || async {
                match run_once(&config, &rt, Source::Microblog, budget, Some(&stats)).await {
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Microblog tick failed"),
                }
                persist_snapshot(&config, &stats, &mb_microblog, &mb_groupchat).await;
            },
            || async {
                match run_once(&config, &rt, Source::Groupchat, budget, Some(&stats)).await {
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Groupchat tick failed"),
                }
                persist_snapshot(&config, &stats, &mb_microblog, &mb_groupchat).await;
            },
            || async {
                let vector_store_ok = rt.ensure_collection(&config).await.is_ok();
                let embedding_ok = rt.embedder.embed_one("health probe").await.is_ok();
                let mut snapshot = status::load(&config.runtime_status_path);
                snapshot.vector_store_ok = Some(vector_store_ok);
                snapshot.embedding_ok = Some(embedding_ok);
                snapshot.updated_at = Some(chrono::Utc::now());
                let _ = status::save(&config.runtime_status_path, &snapshot);
            },
        )
        .await;

    Ok(())
}

async fn persist_snapshot(
    config: &Config,
    stats: &StatsRegistry,
    microblog_trigger: &std::sync::Arc<indexmesh_engine::SourceTrigger>,
    groupchat_trigger: &std::sync::Arc<indexmesh_engine::SourceTrigger>,
) {
    let mut snapshot = status::load(&config.runtime_status_path);
    snapshot.microblog_stats = stats.snapshot(Source::Microblog);
    snapshot.groupchat_stats = stats.snapshot(Source::Groupchat);
    snapshot.microblog_scheduler = microblog_trigger.status().await;
    snapshot.groupchat_scheduler = groupchat_trigger.status().await;
    snapshot.updated_at = Some(chrono::Utc::now());
    let _ = status::save(&config.runtime_status_path, &snapshot);
}
