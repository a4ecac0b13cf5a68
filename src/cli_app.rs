//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use habitgrid::core::config::Config;
use habitgrid::model::progress::average_progress_pct;
use habitgrid::model::section::{SectionKey, TimePeriod, Tracker};
use habitgrid::reorder::drag::SectionRect;
use habitgrid::reorder::heights::HeightOracle;
use habitgrid::reorder::runtime::{
    ReorderRuntime, ScrollHost, SectionSurface, UiEvent, ViewAnimator, hydrate_store,
};
use habitgrid::store::sqlite::SectionDb;

/// habitgrid — sectioned habit tracker engine.
#[derive(Debug, Parser)]
#[command(
    name = "hgrid",
    author,
    version,
    about = "habitgrid - sectioned habit tracker engine",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Inspect and mutate sections.
    Sections(SectionsArgs),
    /// Inspect and mutate trackers.
    Trackers(TrackersArgs),
    /// Show period completion progress.
    Progress(ProgressArgs),
    /// Replay a recorded gesture script against the reorder engine.
    Replay(ReplayArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct SectionsArgs {
    #[command(subcommand)]
    command: SectionsCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum SectionsCommand {
    /// List sections with their positions.
    List(PeriodFilterArgs),
    /// Create an empty section at the end of its period group.
    Add(SectionRefArgs),
    /// Delete a section and close the position gap.
    Delete(SectionRefArgs),
    /// Move a section by a signed number of positions.
    Move(MoveArgs),
}

#[derive(Debug, Clone, Args)]
struct PeriodFilterArgs {
    /// Restrict to one period (Daily/Weekly/Monthly).
    #[arg(long, value_parser = parse_period, value_name = "PERIOD")]
    period: Option<TimePeriod>,
}

#[derive(Debug, Clone, Args)]
struct SectionRefArgs {
    /// Section title.
    title: String,
    /// Section period (Daily/Weekly/Monthly).
    #[arg(value_parser = parse_period, value_name = "PERIOD")]
    period: TimePeriod,
}

#[derive(Debug, Clone, Args)]
struct MoveArgs {
    /// Section title.
    title: String,
    /// Section period (Daily/Weekly/Monthly).
    #[arg(value_parser = parse_period, value_name = "PERIOD")]
    period: TimePeriod,
    /// Signed number of positions to move (positive = down).
    #[arg(allow_hyphen_values = true)]
    delta: i64,
}

#[derive(Debug, Clone, Args)]
struct TrackersArgs {
    #[command(subcommand)]
    command: TrackersCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum TrackersCommand {
    /// Create a tracker.
    Add(TrackerAddArgs),
    /// Adjust a tracker's current amount.
    Bump(TrackerBumpArgs),
    /// Attach a tracker to a section.
    Attach(TrackerLinkArgs),
    /// Detach a tracker from a section.
    Detach(TrackerLinkArgs),
}

#[derive(Debug, Clone, Args)]
struct TrackerAddArgs {
    /// Tracker name.
    name: String,
    /// Tracker period (Daily/Weekly/Monthly).
    #[arg(value_parser = parse_period, value_name = "PERIOD")]
    period: TimePeriod,
    /// Target: positive = goal, negative = limit, 0 = plain counter.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    bound: i64,
    /// Icon identifier.
    #[arg(long, default_value = "circle")]
    icon: String,
    /// Optional unit label.
    #[arg(long)]
    unit: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct TrackerBumpArgs {
    /// Tracker name.
    name: String,
    /// Tracker period (Daily/Weekly/Monthly).
    #[arg(value_parser = parse_period, value_name = "PERIOD")]
    period: TimePeriod,
    /// Signed amount to add.
    #[arg(default_value_t = 1, allow_hyphen_values = true)]
    by: i64,
}

#[derive(Debug, Clone, Args)]
struct TrackerLinkArgs {
    /// Section title.
    section: String,
    /// Tracker name.
    name: String,
    /// Shared period (Daily/Weekly/Monthly).
    #[arg(value_parser = parse_period, value_name = "PERIOD")]
    period: TimePeriod,
}

#[derive(Debug, Clone, Args)]
struct ProgressArgs {
    /// Period to aggregate (Daily/Weekly/Monthly).
    #[arg(value_parser = parse_period, value_name = "PERIOD")]
    period: TimePeriod,
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Gesture script file (JSON).
    script: PathBuf,
    /// Apply the resulting order to the database (defaults to dry run).
    #[arg(long)]
    apply: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

fn parse_period(raw: &str) -> Result<TimePeriod, String> {
    TimePeriod::from_str_opt(raw)
        .ok_or_else(|| format!("unknown period {raw:?} (expected Daily, Weekly, or Monthly)"))
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Sections(args) => run_sections(cli, args),
        Command::Trackers(args) => run_trackers(cli, args),
        Command::Progress(args) => run_progress(cli, args),
        Command::Replay(args) => run_replay(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn output_mode(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))
}

fn open_db(config: &Config) -> Result<SectionDb, CliError> {
    SectionDb::open(&config.paths.sqlite_db)
        .map_err(|e| CliError::Runtime(format!("open section database: {e}")))
}

// ──────────────────── sections ────────────────────

fn run_sections(cli: &Cli, args: &SectionsArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let db = open_db(&config)?;

    match &args.command {
        SectionsCommand::List(filter) => {
            let sections = db
                .load_sections()
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            let periods: Vec<TimePeriod> = filter
                .period
                .map_or_else(|| TimePeriod::all().to_vec(), |p| vec![p]);

            match output_mode(cli) {
                OutputMode::Human => {
                    for period in periods {
                        let group: Vec<_> =
                            sections.iter().filter(|s| s.period == period).collect();
                        if group.is_empty() {
                            continue;
                        }
                        println!("{}", period.as_str().bold());
                        for section in group {
                            println!(
                                "  {:>2}  {}  ({} trackers)",
                                section.position,
                                section.title,
                                section.trackers.len(),
                            );
                        }
                    }
                }
                OutputMode::Json => {
                    let rows: Vec<Value> = sections
                        .iter()
                        .filter(|s| periods.contains(&s.period))
                        .map(|s| {
                            json!({
                                "title": s.title,
                                "period": s.period.as_str(),
                                "position": s.position,
                                "trackers": s.trackers.len(),
                            })
                        })
                        .collect();
                    write_json_line(&json!({"command": "sections list", "sections": rows}))?;
                }
            }
            Ok(())
        }
        SectionsCommand::Add(section) => {
            let position = db
                .group_positions(section.period)
                .map_err(|e| CliError::Runtime(e.to_string()))?
                .len() as u32;
            db.insert_section(&habitgrid::model::section::Section::new(
                section.title.clone(),
                section.period,
                position,
            ))
            .map_err(|e| CliError::User(e.to_string()))?;
            emit_ack(cli, "sections add", &section.title, section.period)
        }
        SectionsCommand::Delete(section) => {
            db.delete_section(&SectionKey::new(section.title.clone(), section.period))
                .map_err(|e| CliError::User(e.to_string()))?;
            emit_ack(cli, "sections delete", &section.title, section.period)
        }
        SectionsCommand::Move(args) => {
            let key = SectionKey::new(args.title.clone(), args.period);
            db.persist_reorder(&key, args.delta)
                .map_err(|e| CliError::User(e.to_string()))?;
            let order = db
                .group_positions(args.period)
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", args.period.as_str().bold());
                    for (title, position) in order {
                        let marker = if title == args.title { "*" } else { " " };
                        println!("  {position:>2} {marker} {title}");
                    }
                }
                OutputMode::Json => {
                    let rows: Vec<Value> = order
                        .iter()
                        .map(|(title, position)| json!({"title": title, "position": position}))
                        .collect();
                    write_json_line(&json!({"command": "sections move", "order": rows}))?;
                }
            }
            Ok(())
        }
    }
}

fn emit_ack(cli: &Cli, command: &str, title: &str, period: TimePeriod) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => println!("ok: {command} {title} ({period})"),
        OutputMode::Json => write_json_line(&json!({
            "command": command,
            "title": title,
            "period": period.as_str(),
            "ok": true,
        }))?,
    }
    Ok(())
}

// ──────────────────── trackers ────────────────────

fn run_trackers(cli: &Cli, args: &TrackersArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let db = open_db(&config)?;

    match &args.command {
        TrackersCommand::Add(add) => {
            let mut tracker = Tracker::new(add.name.clone(), add.period, add.bound, add.icon.clone());
            tracker.unit = add.unit.clone();
            db.insert_tracker(&tracker)
                .map_err(|e| CliError::User(e.to_string()))?;
            emit_ack(cli, "trackers add", &add.name, add.period)
        }
        TrackersCommand::Bump(bump) => {
            let current = db
                .load_tracker(&bump.name, bump.period)
                .map_err(|e| CliError::User(e.to_string()))?
                .current_amount;
            let next = (current + bump.by).max(0);
            db.update_tracker_amount(&bump.name, bump.period, next)
                .map_err(|e| CliError::User(e.to_string()))?;
            match output_mode(cli) {
                OutputMode::Human => println!("{}: {current} -> {next}", bump.name),
                OutputMode::Json => write_json_line(&json!({
                    "command": "trackers bump",
                    "name": bump.name,
                    "period": bump.period.as_str(),
                    "amount": next,
                }))?,
            }
            Ok(())
        }
        TrackersCommand::Attach(link) => {
            let key = SectionKey::new(link.section.clone(), link.period);
            let slot = db
                .load_sections()
                .map_err(|e| CliError::Runtime(e.to_string()))?
                .iter()
                .find(|s| s.matches(&key))
                .map_or(0, |s| s.trackers.len() as u32);
            db.attach_tracker(&key, &link.name, slot)
                .map_err(|e| CliError::User(e.to_string()))?;
            emit_ack(cli, "trackers attach", &link.name, link.period)
        }
        TrackersCommand::Detach(link) => {
            let key = SectionKey::new(link.section.clone(), link.period);
            db.detach_tracker(&key, &link.name)
                .map_err(|e| CliError::User(e.to_string()))?;
            emit_ack(cli, "trackers detach", &link.name, link.period)
        }
    }
}

// ──────────────────── progress ────────────────────

fn run_progress(cli: &Cli, args: &ProgressArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let db = open_db(&config)?;
    let sections = db
        .load_sections()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let pct = average_progress_pct(&sections, args.period);

    match output_mode(cli) {
        OutputMode::Human => println!("{} progress: {pct}%", args.period.as_str().bold()),
        OutputMode::Json => write_json_line(&json!({
            "command": "progress",
            "period": args.period.as_str(),
            "pct": pct,
        }))?,
    }
    Ok(())
}

// ──────────────────── replay ────────────────────

/// One scripted gesture step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ScriptEvent {
    EditEnter,
    EditExit,
    TouchStart { touch_y: f64 },
    TouchMove { finger_dy: f64, touch_y: f64 },
    Tick { count: Option<u32> },
    Release,
    Cancel,
}

/// Gesture script: viewport geometry plus an event sequence.
#[derive(Debug, Clone, Deserialize)]
struct GestureScript {
    #[serde(default = "default_period")]
    period: String,
    #[serde(default = "default_visible_height")]
    visible_height: f64,
    events: Vec<ScriptEvent>,
}

fn default_period() -> String {
    "Daily".to_string()
}

const fn default_visible_height() -> f64 {
    800.0
}

/// Headless view for replays: rectangles are derived from the height oracle
/// by stacking the period group from y = 0.
struct HeadlessView {
    rects: Vec<(SectionKey, SectionRect)>,
    scroll_enabled: bool,
    scroll_offset: f64,
    visible_height: f64,
    content_height: f64,
}

impl HeadlessView {
    fn new(
        oracle: &HeightOracle,
        sections: &[&habitgrid::model::section::Section],
        visible_height: f64,
    ) -> Self {
        let margin = oracle.layout().section_margin;
        let mut y = 0.0;
        let mut rects = Vec::with_capacity(sections.len());
        for section in sections {
            let height = oracle.height_of_count(section.trackers.len());
            rects.push((
                section.key(),
                SectionRect {
                    screen_y: y,
                    height,
                },
            ));
            y += height + margin;
        }
        Self {
            rects,
            scroll_enabled: true,
            scroll_offset: 0.0,
            visible_height,
            content_height: y,
        }
    }
}

impl SectionSurface for HeadlessView {
    fn measure(&self, key: &SectionKey) -> Option<SectionRect> {
        self.rects
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, rect)| *rect)
    }
}

impl ScrollHost for HeadlessView {
    fn set_scroll_enabled(&mut self, enabled: bool) {
        self.scroll_enabled = enabled;
    }
    fn scroll_to(&mut self, y: f64) {
        self.scroll_offset = y;
    }
    fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }
    fn content_extent(&self) -> (f64, f64) {
        (self.visible_height, self.content_height)
    }
}

impl ViewAnimator for HeadlessView {
    fn translate(&mut self, _key: &SectionKey, _y: f64) {}
    fn reseat(&mut self, _key: &SectionKey, _dy: f64) {}
    fn settle(&mut self, _key: &SectionKey) {}
}

/// Sink that drops commits — used for dry-run replays.
struct NullSink;

impl habitgrid::reorder::runtime::ReorderSink for NullSink {
    fn persist_reorder(&self, _key: &SectionKey, _delta: i64) -> habitgrid::core::errors::Result<()> {
        Ok(())
    }
}

fn run_replay(cli: &Cli, args: &ReplayArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let raw = std::fs::read_to_string(&args.script)
        .map_err(|e| CliError::User(format!("read script {}: {e}", args.script.display())))?;
    let script: GestureScript =
        serde_json::from_str(&raw).map_err(|e| CliError::User(format!("parse script: {e}")))?;
    let period = parse_period(&script.period).map_err(CliError::User)?;

    let db = open_db(&config)?;
    let store = hydrate_store(&db).map_err(|e| CliError::Runtime(e.to_string()))?;

    let oracle = HeightOracle::new(config.layout.clone());
    let view = HeadlessView::new(&oracle, &store.ordered(period), script.visible_height);

    let sink: Box<dyn habitgrid::reorder::runtime::ReorderSink> = if args.apply {
        Box::new(db)
    } else {
        Box::new(NullSink)
    };
    let mut runtime = ReorderRuntime::new(&config, store, view, sink);
    runtime.process(UiEvent::SetPeriod(period));

    for event in script.events {
        match event {
            ScriptEvent::EditEnter => runtime.process(UiEvent::EditEnter),
            ScriptEvent::EditExit => runtime.process(UiEvent::EditExit),
            ScriptEvent::TouchStart { touch_y } => {
                runtime.process(UiEvent::TouchStart { touch_y });
            }
            ScriptEvent::TouchMove {
                finger_dy,
                touch_y,
            } => runtime.process(UiEvent::TouchMove {
                finger_dy,
                touch_y,
            }),
            ScriptEvent::Tick { count } => {
                for _ in 0..count.unwrap_or(1) {
                    runtime.process(UiEvent::Tick);
                }
            }
            ScriptEvent::Release => runtime.process(UiEvent::Release),
            ScriptEvent::Cancel => runtime.process(UiEvent::Cancel),
        }
    }

    let store = runtime.shutdown();
    let order: Vec<(String, u32)> = store
        .ordered(period)
        .iter()
        .map(|s| (s.title.clone(), s.position))
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            let mode = if args.apply { "applied" } else { "dry run" };
            println!("{} order after replay ({mode}):", period.as_str().bold());
            for (title, position) in order {
                println!("  {position:>2}  {title}");
            }
        }
        OutputMode::Json => {
            let rows: Vec<Value> = order
                .iter()
                .map(|(title, position)| json!({"title": title, "position": position}))
                .collect();
            write_json_line(&json!({
                "command": "replay",
                "period": period.as_str(),
                "applied": args.apply,
                "order": rows,
            }))?;
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Path => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(Config::default_path);
            match output_mode(cli) {
                OutputMode::Human => println!("{}", path.display()),
                OutputMode::Json => write_json_line(&json!({
                    "command": "config path",
                    "path": path.to_string_lossy(),
                }))?,
            }
            Ok(())
        }
        ConfigCommand::Show => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let rendered = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(e.to_string()))?;
                    print!("{rendered}");
                }
                OutputMode::Json => {
                    let payload = serde_json::to_value(&config)?;
                    write_json_line(&json!({"command": "config show", "config": payload}))?;
                }
            }
            Ok(())
        }
        ConfigCommand::Validate => {
            load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => println!("configuration ok"),
                OutputMode::Json => {
                    write_json_line(&json!({"command": "config validate", "ok": true}))?;
                }
            }
            Ok(())
        }
    }
}
