//! SchemaForge command line
//!
//! - `run`: drive an offline session with the template generator
//! - `normalize`: clean a file of generated text
//! - `parse`: extract schema artifacts from a file

#![warn(unreachable_pub)]

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use forge_content::{normalize::Normalizer, parser, ContentVariant, ParseOutcome};
use forge_core::{
    default_stages, JsonFileStore, MemoryStore, Orchestrator, OrchestratorConfig, SessionEvent,
    SessionRequest, SessionSnapshot, SessionStore, SessionView, TaskId, TemplateGenerator,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Build the command tree
#[must_use]
pub fn cli() -> Command {
    Command::new("schemaforge")
        .version(forge_core::VERSION)
        .about("SchemaForge - staged schema design sessions")
        .subcommand_required(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs and results as JSON"),
        )
        .subcommand(
            Command::new("run")
                .about("Run a session with the offline generator")
                .arg(
                    Arg::new("request")
                        .long("request")
                        .required(true)
                        .help("What the schema should model"),
                )
                .arg(
                    Arg::new("variant")
                        .long("variant")
                        .default_value("relational")
                        .value_parser(value_parser!(ContentVariant))
                        .help("relational, document or vector"),
                )
                .arg(
                    Arg::new("rate")
                        .long("rate")
                        .value_parser(value_parser!(u32).range(1..))
                        .help("Reveal rate in chars per second"),
                )
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .default_value("800")
                        .value_parser(value_parser!(u64))
                        .help("Simulated generation latency per stage"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML orchestrator config"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory to write the session JSON to"),
                ),
        )
        .subcommand(
            Command::new("normalize")
                .about("Strip meta-commentary from generated text")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("parse")
                .about("Extract schema artifacts from a file")
                .arg(
                    Arg::new("variant")
                        .long("variant")
                        .required(true)
                        .value_parser(value_parser!(ContentVariant)),
                )
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

/// Options of the `run` subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Request text
    pub request: String,
    /// Target database family
    pub variant: ContentVariant,
    /// Reveal rate override
    pub rate: Option<u32>,
    /// Simulated generation latency
    pub latency: Duration,
    /// Config file
    pub config: Option<PathBuf>,
    /// Output directory for the JSON store
    pub out: Option<PathBuf>,
}

impl RunOptions {
    /// Read options from parsed `run` arguments
    #[must_use]
    pub fn from_matches(args: &ArgMatches) -> Self {
        Self {
            request: args.get_one::<String>("request").cloned().unwrap_or_default(),
            variant: args
                .get_one::<ContentVariant>("variant")
                .copied()
                .unwrap_or_default(),
            rate: args.get_one::<u32>("rate").copied(),
            latency: Duration::from_millis(
                args.get_one::<u64>("latency-ms").copied().unwrap_or(800),
            ),
            config: args.get_one::<PathBuf>("config").cloned(),
            out: args.get_one::<PathBuf>("out").cloned(),
        }
    }

    /// Orchestrator config after applying file and flag overrides
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig> {
        let config = match &self.config {
            Some(path) => OrchestratorConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => OrchestratorConfig::default(),
        };
        Ok(match self.rate {
            Some(rate) => config.with_reveal_rate(rate),
            None => config,
        })
    }
}

/// Run a session to completion, passing one line per notable event to `report`
///
/// Ctrl-C stops the session; partial results are still saved.
pub async fn run_session<F>(options: &RunOptions, mut report: F) -> Result<SessionSnapshot>
where
    F: FnMut(String),
{
    let config = options.orchestrator_config()?;
    let store: Arc<dyn SessionStore> = match &options.out {
        Some(dir) => Arc::new(JsonFileStore::new(dir)),
        None => Arc::new(MemoryStore::new()),
    };
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(TemplateGenerator::new(options.latency)),
        store,
    )?;

    let handle = orchestrator.start(
        SessionRequest::new(options.request.clone(), options.variant),
        default_stages(),
    );
    tracing::info!(session_id = %handle.id(), variant = %options.variant, "session started");

    // The first task starts before anyone can subscribe
    let mut events = handle.subscribe();
    let view = handle.view();
    if let Some(line) = view
        .active_task()
        .and_then(|active| describe_start(&view, active.task.id, active.task.ordinal))
    {
        report(line);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = describe_event(&event, &handle.view()) {
                        report(line);
                    }
                    if matches!(event, SessionEvent::SessionFinished { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        tracing::info!("interrupted, stopping session");
                        handle.stop();
                    }
                    Err(err) => tracing::warn!(error = %err, "cannot listen for ctrl-c"),
                }
            }
        }
    }

    let snapshot = handle.wait().await.context("session did not finish cleanly")?;
    if let Some(dir) = &options.out {
        tracing::info!(path = %dir.display(), "session written");
    }
    Ok(snapshot)
}

fn describe_start(view: &SessionView, task_id: TaskId, ordinal: usize) -> Option<String> {
    let task = &view.task(task_id)?.task;
    Some(format!(
        "[{}/{}] {} ({})",
        ordinal + 1,
        view.tasks.len(),
        task.title,
        task.agent
    ))
}

/// One line describing an event, or `None` for events not worth printing
#[must_use]
pub fn describe_event(event: &SessionEvent, view: &SessionView) -> Option<String> {
    match event {
        SessionEvent::TaskStarted {
            task_id, ordinal, ..
        } => describe_start(view, *task_id, *ordinal),
        SessionEvent::Reasoning(step) => Some(format!(
            "    > {} ({:.2})",
            step.narrative, step.confidence
        )),
        SessionEvent::Insight(entry) => Some(format!(
            "    {:?} {}: {}",
            entry.kind, entry.agent, entry.message
        )),
        SessionEvent::TaskProgress { .. } => None,
        SessionEvent::TaskFinished { status, tier, .. } => Some(match tier {
            Some(tier) => format!("    {status:?} via {tier}"),
            None => format!("    {status:?}"),
        }),
        SessionEvent::SessionFinished { session_id, status } => {
            Some(format!("session {session_id} {status:?}"))
        }
    }
}

/// Per-task summary of a finished session
#[must_use]
pub fn render_summary(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}) {:?}, {:.0}%",
        snapshot.session.request,
        snapshot.session.variant,
        snapshot.session.status,
        snapshot.session.progress
    );
    for record in &snapshot.tasks {
        let tier = record
            .tier
            .map_or_else(|| "none".to_string(), |tier| tier.to_string());
        let _ = writeln!(
            out,
            "  {} [{:?}, {tier}]: {}",
            record.task.title,
            record.task.status,
            record
                .artifacts
                .as_ref()
                .map_or_else(|| "no content".to_string(), render_outcome)
        );
    }
    out
}

/// Compact description of parsed artifacts
#[must_use]
pub fn render_outcome(outcome: &ParseOutcome) -> String {
    match outcome.artifacts() {
        Some(artifacts) => {
            let counts = artifacts.counts();
            let names = artifacts.entity_names();
            let mut line = format!(
                "{} structured, {} fenced",
                counts.structured, counts.fenced
            );
            if !names.is_empty() {
                let _ = write!(line, "; {}", names.join(", "));
            }
            line
        }
        None => "no structure".to_string(),
    }
}

/// Normalize the text in `path`
pub fn normalize_file(path: &Path, normalizer: &Normalizer) -> Result<String> {
    let text = read(path)?;
    Ok(normalizer.normalize(&text))
}

/// Normalize then parse the text in `path`
pub fn parse_file(path: &Path, variant: ContentVariant) -> Result<ParseOutcome> {
    let clean = normalize_file(path, &Normalizer::default())?;
    Ok(parser::parse(variant, &clean))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{SessionStatus, TaskStatus};
    use pretty_assertions::assert_eq;

    #[test]
    fn run_arguments_are_parsed() {
        let matches = cli()
            .try_get_matches_from([
                "schemaforge",
                "run",
                "--request",
                "Clinic appointments",
                "--variant",
                "mongodb",
                "--rate",
                "120",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "run");

        let options = RunOptions::from_matches(args);
        assert_eq!(options.request, "Clinic appointments");
        assert_eq!(options.variant, ContentVariant::Document);
        assert_eq!(options.rate, Some(120));
        assert_eq!(options.latency, Duration::from_millis(800));
        assert_eq!(options.orchestrator_config().unwrap().reveal_rate_cps, 120);
    }

    #[test]
    fn zero_rate_and_unknown_variant_are_rejected() {
        assert!(cli()
            .try_get_matches_from(["schemaforge", "run", "--request", "x", "--rate", "0"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["schemaforge", "parse", "--variant", "graph", "f.txt"])
            .is_err());
    }

    #[test]
    fn json_flag_is_global() {
        let matches = cli()
            .try_get_matches_from(["schemaforge", "normalize", "notes.md", "--json"])
            .unwrap();
        assert!(matches.get_flag("json"));
    }

    #[test]
    fn config_file_is_applied_before_rate_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.toml");
        std::fs::write(&path, "reveal_rate_cps = 90\ntick_interval_ms = 25\n").unwrap();

        let options = RunOptions {
            request: "x".into(),
            variant: ContentVariant::Relational,
            rate: None,
            latency: Duration::ZERO,
            config: Some(path.clone()),
            out: None,
        };
        let config = options.orchestrator_config().unwrap();
        assert_eq!(config.reveal_rate_cps, 90);
        assert_eq!(config.tick_interval_ms, 25);

        let overridden = RunOptions {
            rate: Some(300),
            ..options
        };
        assert_eq!(overridden.orchestrator_config().unwrap().reveal_rate_cps, 300);
    }

    #[test]
    fn parse_file_normalizes_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("design.md");
        std::fs::write(
            &path,
            "<thinking>draft</thinking>\n```sql\nCREATE TABLE orders (id BIGINT PRIMARY KEY);\n```\n",
        )
        .unwrap();

        let outcome = parse_file(&path, ContentVariant::Relational).unwrap();
        let artifacts = outcome.artifacts().unwrap();
        assert_eq!(artifacts.entity_names(), ["orders".to_string()]);
        assert!(render_outcome(&outcome).ends_with("; orders"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = parse_file(Path::new("/nonexistent/plan.md"), ContentVariant::Vector)
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/plan.md"));
    }

    #[tokio::test(start_paused = true)]
    async fn offline_run_reports_every_task_and_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            request: "Warehouse inventory and shipments".into(),
            variant: ContentVariant::Relational,
            rate: Some(2000),
            latency: Duration::from_millis(200),
            config: None,
            out: Some(dir.path().to_path_buf()),
        };

        let mut lines = Vec::new();
        let snapshot = run_session(&options, |line| lines.push(line))
            .await
            .unwrap();

        assert_eq!(snapshot.session.status, SessionStatus::Completed);
        assert!(snapshot
            .tasks
            .iter()
            .all(|record| record.task.status == TaskStatus::Completed));
        assert_eq!(lines.iter().filter(|line| line.starts_with('[')).count(), 4);
        assert!(lines[0].starts_with("[1/4] "));
        assert!(lines.last().unwrap().ends_with("Completed"));

        let written = JsonFileStore::new(dir.path()).load(snapshot.id()).await.unwrap();
        assert_eq!(written, snapshot);
        assert!(render_summary(&snapshot).contains("Completed, 100%"));
    }
}
