//! Daybook command line front-end.
//!
//! # Responsibility
//! - Run stats and views over exported document snapshots.
//! - Drive a full tracker session against a local SQLite store (`demo`).
//! - Keep `ping` as a quick linkage check for `daybook_core`.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use daybook_core::{
    compute_stats, init_logging, view, Clock, CoreConfig, FixedClock, Mood, RawRecord,
    Reconciler, RecordKind, RecordPatch, SortOrder, SqliteDocumentStore, StatusFilter,
    SystemClock, TaskStatus, TrackerService, ViewQuery,
};
use log::info;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Task and journal tracker core tools")]
struct Cli {
    /// JSON file with core configuration overrides
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Absolute directory for rolling log files; logging is off without it
    #[arg(long, global = true)]
    log_dir: Option<String>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core linkage and version
    Ping,
    /// Print derived stats for a snapshot file
    Stats(StatsArgs),
    /// Print a filtered and sorted list for a snapshot file
    View(ViewArgs),
    /// Run a scripted session against a SQLite document store
    Demo(DemoArgs),
}

#[derive(Args)]
struct SnapshotArgs {
    /// JSON array of documents, or an object mapping ids to documents
    #[arg(long)]
    input: PathBuf,
    /// Collection the documents belong to: task or journal
    #[arg(long, default_value = "task")]
    kind: String,
    /// Evaluate as of noon UTC on this day (YYYY-MM-DD) instead of now
    #[arg(long)]
    today: Option<String>,
}

#[derive(Args)]
struct StatsArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,
}

#[derive(Args)]
struct ViewArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,
    /// all, active, or a status
    #[arg(long, default_value = "all")]
    status: String,
    #[arg(long, default_value = "newest")]
    sort: String,
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long)]
    mood: Option<String>,
    #[arg(long)]
    tag: Option<String>,
}

#[derive(Args)]
struct DemoArgs {
    /// Store database path; an in-memory database is used when omitted
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long, default_value = "demo-user")]
    user: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| daybook_core::default_log_level());
        init_logging(level, log_dir).map_err(|err| anyhow!(err))?;
    }
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ping => {
            println!("daybook_core ping={}", daybook_core::ping());
            println!("daybook_core version={}", daybook_core::core_version());
            Ok(())
        }
        Commands::Stats(args) => run_stats(&args, &config),
        Commands::View(args) => run_view(&args, &config),
        Commands::Demo(args) => run_demo(&args, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<CoreConfig> {
    let Some(path) = path else {
        return Ok(CoreConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    CoreConfig::from_json_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn run_stats(args: &StatsArgs, config: &CoreConfig) -> Result<()> {
    let (reconciler, clock) = load_snapshot(&args.snapshot, config)?;
    let stats = compute_stats(reconciler.records(), clock.now_ms(), &config.stats);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_view(args: &ViewArgs, config: &CoreConfig) -> Result<()> {
    let (reconciler, _) = load_snapshot(&args.snapshot, config)?;
    let status = StatusFilter::parse(&args.status)
        .ok_or_else(|| anyhow!("unknown status filter `{}`", args.status))?;
    let sort =
        SortOrder::parse(&args.sort).ok_or_else(|| anyhow!("unknown sort order `{}`", args.sort))?;

    let mut query = ViewQuery::new(status, sort, args.search.as_str());
    if let Some(mood) = args.mood.as_deref() {
        let mood = Mood::parse(mood).ok_or_else(|| anyhow!("unknown mood `{mood}`"))?;
        query = query.with_mood(mood);
    }
    if let Some(tag) = args.tag.as_deref() {
        query = query.with_tag(tag);
    }

    let records = view(reconciler.records(), &query);
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn load_snapshot(args: &SnapshotArgs, config: &CoreConfig) -> Result<(Reconciler, Arc<dyn Clock>)> {
    let kind = RecordKind::parse(&args.kind)
        .ok_or_else(|| anyhow!("unknown record kind `{}`", args.kind))?;
    let clock = clock_for(args.today.as_deref())?;

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let document: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", args.input.display()))?;
    let raws = raw_records(document)?;

    let mut reconciler = Reconciler::new(kind, config.overlay.clone());
    let outcome = reconciler.apply_snapshot(&raws, clock.now_ms());
    info!(
        "event=cli_snapshot_load module=cli status=ok kind={} received={} applied={}",
        kind.as_str(),
        outcome.received,
        outcome.applied
    );
    Ok((reconciler, clock))
}

fn raw_records(document: Value) -> Result<Vec<RawRecord>> {
    match document {
        Value::Array(items) => Ok(items.into_iter().map(RawRecord::from_value).collect()),
        Value::Object(entries) => Ok(entries
            .into_iter()
            .map(|(id, body)| RawRecord::from_document(id, body))
            .collect()),
        _ => bail!("snapshot must be a JSON array or object"),
    }
}

fn clock_for(today: Option<&str>) -> Result<Arc<dyn Clock>> {
    match today {
        Some(day) => {
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .with_context(|| format!("invalid --today `{day}`, expected YYYY-MM-DD"))?;
            Ok(Arc::new(FixedClock::at(date, 12)))
        }
        None => Ok(Arc::new(SystemClock)),
    }
}

fn run_demo(args: &DemoArgs, config: CoreConfig) -> Result<()> {
    let store = match args.db.as_deref() {
        Some(path) => SqliteDocumentStore::open(path)
            .with_context(|| format!("failed to open store {}", path.display()))?,
        None => SqliteDocumentStore::open_in_memory().context("failed to open in-memory store")?,
    };
    let mut tracker = TrackerService::new(store, config);
    tracker.set_owner(Some(args.user.as_str()))?;
    tracker.pump_events();

    let write = tracker.add(
        RecordKind::Task,
        &RecordPatch::named("Write weekly review").with_tags(["work"]),
    )?;
    tracker.add(
        RecordKind::Task,
        &RecordPatch::named("Stretch").with_tags(["health"]),
    )?;
    tracker.set_task_status(&write.id, TaskStatus::Completed)?;
    tracker.add(
        RecordKind::Journal,
        &RecordPatch::named("Quiet morning").with_mood(Some(Mood::Happy)),
    )?;
    tracker.pump_events();

    for kind in RecordKind::ALL {
        let stats = tracker.stats(kind);
        println!(
            "{} total={} completed={} completion_rate={} current_streak={}",
            kind.collection_name(),
            stats.total,
            stats.completed,
            stats.completion_rate,
            stats.streak.current
        );
    }
    let active = tracker.view(
        RecordKind::Task,
        &ViewQuery::new(StatusFilter::Active, SortOrder::NameAsc, ""),
    );
    for record in active {
        println!("active task: {} [{}]", record.name, record.status.as_str());
    }

    tracker.set_owner(None)?;
    Ok(())
}
