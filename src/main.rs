//! CovSBOM Desktop - command-line entry point
//!
//! Runs one analysis session end to end: choose a project, stream the
//! analyzer log, then print the dependency list and the requested call trees.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use covsbom_desktop::commands::analysis::{self, AnalysisState};
use covsbom_desktop::models::response::{CommandResponse, DependencyTreeResponse};
use covsbom_desktop::models::session::{OutputStream, SessionStage, SessionUpdateEvent};
use covsbom_desktop::models::settings::SettingsUpdate;
use covsbom_desktop::services::dialog::StdinDirectoryPicker;
use covsbom_desktop::storage::ConfigService;

/// Exit status after Ctrl-C
const INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "covsbom-desktop")]
#[command(about = "Run a CovSBOM analysis and browse third-party call trees")]
#[command(version)]
struct Args {
    /// Project root to analyze; prompted for when omitted
    path: Option<PathBuf>,

    /// Config file (defaults to ~/.covsbom/config.json when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Analyzer executable
    #[arg(long, value_name = "PROGRAM")]
    analyzer: Option<String>,

    /// Analyzer argument placed before --process-directory (repeatable)
    #[arg(long = "analyzer-arg", value_name = "ARG", allow_hyphen_values = true)]
    analyzer_args: Vec<String>,

    /// Delay between the completion message and the results, in milliseconds
    #[arg(long, value_name = "MS")]
    grace_ms: Option<u64>,

    /// Maximum call nesting accepted in the report
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Print the call tree of every dependency whose key contains this text (repeatable)
    #[arg(long, value_name = "TEXT")]
    dependency: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn settings_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            analyzer_program: self.analyzer.clone(),
            analyzer_args: (!self.analyzer_args.is_empty()).then(|| self.analyzer_args.clone()),
            grace_period_ms: self.grace_ms,
            max_nesting_depth: self.max_depth,
            ..Default::default()
        }
    }
}

fn into_result<T>(response: CommandResponse<T>) -> Result<T> {
    if response.success {
        response.data.context("command returned no data")
    } else {
        Err(anyhow!(response
            .error
            .unwrap_or_else(|| "unknown error".to_string())))
    }
}

fn print_update(event: &SessionUpdateEvent) {
    match event {
        SessionUpdateEvent::LogAppended { stream, line, .. } => match stream {
            OutputStream::Stdout => println!("{}", line),
            OutputStream::Stderr => eprintln!("{}", line),
        },
        SessionUpdateEvent::StageChanged { from, to, .. } => {
            info!("{} -> {}", from, to);
        }
        SessionUpdateEvent::ReportLoaded {
            dependency_count, ..
        } => {
            debug!(dependency_count, "Report loaded");
        }
        SessionUpdateEvent::Created { .. } => {}
    }
}

/// Echo session updates until the receiver closes
async fn follow_updates(updates: &mut broadcast::Receiver<SessionUpdateEvent>) {
    loop {
        match updates.recv().await {
            Ok(event) => print_update(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("{} log updates were not shown", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn render_tree(tree: &DependencyTreeResponse) {
    println!();
    println!(
        "{}  (entries: {}, max depth: {})",
        tree.key, tree.metrics.entry_count, tree.metrics.max_depth
    );
    let mut stack: Vec<_> = tree.root.children.iter().rev().map(|node| (node, 1)).collect();
    while let Some((node, indent)) = stack.pop() {
        println!("{}{}", "  ".repeat(indent), node.display_label);
        stack.extend(node.children.iter().rev().map(|child| (child, indent + 1)));
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap_or_default()),
        )
        .init();

    let mut config_service =
        ConfigService::load(args.config.as_deref()).context("failed to load configuration")?;
    config_service.update_config(args.settings_update())?;
    let state = AnalysisState::new(config_service.get_config_clone())?;

    let selected = match args.path.clone() {
        Some(path) => Some(into_result(analysis::select_root_path(&state, path).await)?),
        None => {
            let picker = StdinDirectoryPicker::new(io::BufReader::new(io::stdin()))
                .with_prompt("Project directory: ");
            into_result(analysis::pick_root_path(&state, &picker).await)?
        }
    };
    if selected.is_none() {
        eprintln!("No project selected");
        return Ok(ExitCode::SUCCESS);
    }

    let manager = state.manager().clone();
    let mut updates = manager.subscribe();
    let started = into_result(analysis::start_analysis(&state).await)?;
    info!(session_id = %started.id, "Analysis started");

    let session = {
        let follow = follow_updates(&mut updates);
        tokio::pin!(follow);
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping analyzer");
                into_result(analysis::reset_session(&state).await)?;
                return Ok(ExitCode::from(INTERRUPTED));
            }
            session = manager.wait_for_outcome() => session?,
            _ = &mut follow => return Err(anyhow!("session updates stopped unexpectedly")),
        }
    };
    while let Ok(event) = updates.try_recv() {
        print_update(&event);
    }

    if session.stage != SessionStage::Results {
        eprintln!(
            "Analysis failed: {}",
            session.error_message.as_deref().unwrap_or("unknown error")
        );
        for line in &session.error_log_tail {
            eprintln!("  | {}", line);
        }
        return Ok(ExitCode::FAILURE);
    }

    let dependencies = into_result(analysis::list_dependencies(&state).await)?;
    println!();
    println!("{} dependencies", dependencies.len());
    for dependency in &dependencies {
        println!("  {}  ({} calls)", dependency.key, dependency.call_count);
    }

    for dependency in dependencies
        .iter()
        .filter(|d| args.dependency.iter().any(|text| d.key.contains(text.as_str())))
    {
        match into_result(analysis::get_dependency_tree(&state, dependency.key.clone()).await) {
            Ok(tree) => render_tree(&tree),
            Err(e) => {
                eprintln!("Cannot show {}: {}", dependency.key, e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    manager.shutdown().await?;
    Ok(ExitCode::SUCCESS)
}
