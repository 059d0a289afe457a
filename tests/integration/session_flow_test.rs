//! Session Flow Integration Tests
//!
//! Drives the full session stage machine against `sh` scripts standing in
//! for the analyzer. Scripts run in a scratch working directory and write
//! their report where the real analyzer would.

use std::path::PathBuf;
use std::time::Duration;

use covsbom_desktop::commands::analysis::{self, AnalysisState};
use covsbom_desktop::models::session::{SessionStage, SessionUpdateEvent};
use covsbom_desktop::models::settings::AppConfig;
use covsbom_desktop::services::analysis::AnalysisSessionManager;
use covsbom_desktop::utils::error::{AppError, ErrorKind};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

const SAMPLE_REPORT: &str = r#"{"groupId=a, artifactId=b": [{"methodName": "foo", "lineNumbers": ["10"], "declarationInfo": {"innerMethodCalls": []}}]}"#;

const NESTED_REPORT: &str = r#"{"groupId=a, artifactId=b": [{"methodName": "a", "lineNumbers": ["1"], "declarationInfo": {"innerMethodCalls": [{"methodName": "b", "lineNumbers": ["2"], "declarationInfo": {"innerMethodCalls": [{"methodName": "c", "lineNumbers": ["3"], "declarationInfo": {"innerMethodCalls": [{"methodName": "d", "lineNumbers": ["4"]}]}}]}}]}}]}"#;

const OUTCOME_TIMEOUT: Duration = Duration::from_secs(20);

/// Shell snippet that writes `report` where the loader looks for it
fn write_report(report: &str) -> String {
    format!(
        "out=\"CovSBOM_output/analysis/$(basename \"$2\")\"; mkdir -p \"$out\"; printf '%s' '{}' > \"$out/final_report_package_based.json\"; ",
        report
    )
}

struct Fixture {
    work: TempDir,
    project: PathBuf,
    config: AppConfig,
}

fn fixture(script: &str) -> Fixture {
    let work = tempfile::tempdir().unwrap();
    let project = work.path().join("my-app");
    std::fs::create_dir(&project).unwrap();

    let mut config = AppConfig::default();
    config.analyzer.program = "sh".to_string();
    config.analyzer.args = vec!["-c".to_string(), script.to_string(), "analyzer".to_string()];
    config.analyzer.working_dir = Some(work.path().to_path_buf());
    config.grace_period_ms = 50;

    Fixture {
        work,
        project,
        config,
    }
}

impl Fixture {
    fn manager(&self) -> AnalysisSessionManager {
        AnalysisSessionManager::new(self.config.clone()).unwrap()
    }
}

async fn run_to_outcome(manager: &AnalysisSessionManager) -> covsbom_desktop::AnalysisSession {
    timeout(OUTCOME_TIMEOUT, manager.wait_for_outcome())
        .await
        .expect("analysis did not settle")
        .unwrap()
}

fn drain(updates: &mut broadcast::Receiver<SessionUpdateEvent>) -> Vec<SessionUpdateEvent> {
    let mut events = Vec::new();
    while let Ok(event) = updates.try_recv() {
        events.push(event);
    }
    events
}

/// Signalable and not a zombie waiting to be reaped
fn process_alive(pid: &str) -> bool {
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let state = stat.rsplit(')').next().and_then(|rest| rest.trim().chars().next());
        return state != Some('Z');
    }
    std::process::Command::new("kill")
        .args(["-0", pid])
        .status()
        .unwrap()
        .success()
}

async fn wait_for_line(updates: &mut broadcast::Receiver<SessionUpdateEvent>, wanted: &str) {
    timeout(OUTCOME_TIMEOUT, async {
        loop {
            if let Ok(SessionUpdateEvent::LogAppended { line, .. }) = updates.recv().await {
                if line.contains(wanted) {
                    break;
                }
            }
        }
    })
    .await
    .expect("expected analyzer line never arrived");
}

fn stage_changes(events: &[SessionUpdateEvent]) -> Vec<(SessionStage, SessionStage)> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionUpdateEvent::StageChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Success path
// ============================================================================

#[tokio::test]
async fn test_successful_analysis_reaches_results_once() {
    let script = format!(
        "{}echo \"Processing $2\"; echo 'End of analysis'; echo 'End of analysis'; exit 0",
        write_report(SAMPLE_REPORT)
    );
    let fx = fixture(&script);
    let manager = fx.manager();
    let mut updates = manager.subscribe();

    manager.select_root_path(&fx.project).unwrap();
    let started = manager.start_analysis().unwrap();
    assert_eq!(started.stage, SessionStage::Analyze);

    let session = run_to_outcome(&manager).await;
    assert_eq!(session.stage, SessionStage::Results);
    assert_eq!(session.id, started.id);
    assert!(session.log[0].starts_with("Processing "));
    assert_eq!(session.log[1], "End of analysis");

    let events = drain(&mut updates);
    assert_eq!(
        stage_changes(&events),
        vec![
            (SessionStage::Select, SessionStage::Analyze),
            (SessionStage::Analyze, SessionStage::Results),
        ]
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionUpdateEvent::ReportLoaded { dependency_count: 1, .. })));

    let dependencies = manager.list_dependencies().unwrap();
    assert_eq!(dependencies.len(), 1);
    assert_eq!(dependencies[0].group_id.as_deref(), Some("a"));
    assert_eq!(dependencies[0].artifact_id.as_deref(), Some("b"));
    assert_eq!(dependencies[0].call_count, 1);

    let tree = manager.dependency_tree("groupId=a, artifactId=b").unwrap();
    assert_eq!(tree.root.children.len(), 1);
    assert_eq!(tree.root.children[0].display_label, "foo");
    assert_eq!(tree.metrics.entry_count, 1);
    assert_eq!(tree.metrics.max_depth, 0);

    assert!(matches!(
        manager.dependency_tree("groupId=x, artifactId=y"),
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_dependency_list_counts_top_level_calls() {
    let script = format!("{}echo 'End of analysis'", write_report(NESTED_REPORT));
    let fx = fixture(&script);
    let manager = fx.manager();
    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();
    assert_eq!(run_to_outcome(&manager).await.stage, SessionStage::Results);

    let dependencies = manager.list_dependencies().unwrap();
    assert_eq!(dependencies[0].call_count, 1);

    let tree = manager.dependency_tree(&dependencies[0].key).unwrap();
    assert_eq!(tree.metrics.entry_count, 4);
    assert_eq!(tree.metrics.max_depth, 3);
}

#[tokio::test]
async fn test_command_layer_flow() {
    let script = format!("{}echo 'End of analysis'", write_report(SAMPLE_REPORT));
    let fx = fixture(&script);
    let state = AnalysisState::new(fx.config.clone()).unwrap();

    let response = analysis::select_root_path(&state, fx.project.clone()).await;
    assert!(response.success);
    let response = analysis::start_analysis(&state).await;
    assert!(response.success);

    run_to_outcome(state.manager()).await;

    let log = analysis::get_session_log(&state, 0).await.data.unwrap();
    assert_eq!(log.lines, vec!["End of analysis"]);
    assert_eq!(log.next_offset, 1);

    let dependencies = analysis::list_dependencies(&state).await.data.unwrap();
    let tree = analysis::get_dependency_tree(&state, dependencies[0].key.clone())
        .await
        .data
        .unwrap();
    assert_eq!(tree.key, "groupId=a, artifactId=b");

    let session = analysis::reset_session(&state).await.data.unwrap();
    assert_eq!(session.stage, SessionStage::Select);
    assert!(!analysis::list_dependencies(&state).await.success);
}

#[tokio::test]
async fn test_reset_after_results_allows_new_run() {
    let script = format!("{}echo 'End of analysis'", write_report(SAMPLE_REPORT));
    let fx = fixture(&script);
    let manager = fx.manager();

    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();
    let first = run_to_outcome(&manager).await;
    assert_eq!(first.stage, SessionStage::Results);

    assert!(matches!(
        manager.select_root_path(&fx.project),
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        manager.start_analysis(),
        Err(AppError::InvalidInput(_))
    ));

    manager.reset().await.unwrap();
    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();
    let second = run_to_outcome(&manager).await;
    assert_eq!(second.stage, SessionStage::Results);
    assert_ne!(second.id, first.id);
}

// ============================================================================
// Failure paths
// ============================================================================

#[tokio::test]
async fn test_nonzero_exit_before_sentinel_is_failure() {
    let fx = fixture("echo compiling; echo 'ERROR: boom' >&2; exit 2");
    let manager = fx.manager();
    let mut updates = manager.subscribe();

    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();
    let session = run_to_outcome(&manager).await;

    assert_eq!(session.stage, SessionStage::Error);
    assert_eq!(session.error_kind, Some(ErrorKind::AnalysisFailure));
    assert_eq!(session.exit_code, Some(2));
    assert!(session.error_message.unwrap().contains("code 2"));
    assert!(session.error_log_tail.contains(&"ERROR: boom".to_string()));
    assert!(session.error_log_tail.contains(&"compiling".to_string()));

    assert_eq!(
        stage_changes(&drain(&mut updates)),
        vec![
            (SessionStage::Select, SessionStage::Analyze),
            (SessionStage::Analyze, SessionStage::Error),
        ]
    );
}

#[tokio::test]
async fn test_clean_exit_without_sentinel_is_failure() {
    let fx = fixture("echo 'analysis stopped early'; exit 0");
    let manager = fx.manager();
    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();

    let session = run_to_outcome(&manager).await;
    assert_eq!(session.stage, SessionStage::Error);
    assert_eq!(session.error_kind, Some(ErrorKind::AnalysisFailure));
    assert_eq!(session.exit_code, Some(0));
}

#[tokio::test]
async fn test_missing_report_moves_results_to_error() {
    let fx = fixture("echo 'End of analysis'; exit 0");
    let manager = fx.manager();
    let mut updates = manager.subscribe();
    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();

    let session = run_to_outcome(&manager).await;
    assert_eq!(session.stage, SessionStage::Error);
    assert_eq!(session.error_kind, Some(ErrorKind::ParseError));
    assert_eq!(
        stage_changes(&drain(&mut updates)),
        vec![
            (SessionStage::Select, SessionStage::Analyze),
            (SessionStage::Analyze, SessionStage::Results),
            (SessionStage::Results, SessionStage::Error),
        ]
    );
}

#[tokio::test]
async fn test_report_nesting_limit_moves_to_error() {
    let script = format!("{}echo 'End of analysis'", write_report(NESTED_REPORT));
    let mut fx = fixture(&script);
    fx.config.max_nesting_depth = 2;
    let manager = fx.manager();
    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();

    let session = run_to_outcome(&manager).await;
    assert_eq!(session.stage, SessionStage::Error);
    assert_eq!(session.error_kind, Some(ErrorKind::DepthExceeded));
}

#[tokio::test]
async fn test_missing_analyzer_is_launch_error() {
    let mut fx = fixture("");
    fx.config.analyzer.program = "covsbom-no-such-analyzer".to_string();
    let manager = fx.manager();
    manager.select_root_path(&fx.project).unwrap();

    assert!(matches!(manager.start_analysis(), Err(AppError::Launch(_))));
    let session = manager.snapshot().unwrap();
    assert_eq!(session.stage, SessionStage::Error);
    assert_eq!(session.error_kind, Some(ErrorKind::LaunchError));
    assert!(session.log.is_empty());
}

// ============================================================================
// Concurrency and reset
// ============================================================================

#[tokio::test]
async fn test_reset_terminates_running_analyzer() {
    let fx = fixture("echo $$ > analyzer.pid; echo started; exec sleep 30");
    let manager = fx.manager();
    let mut updates = manager.subscribe();
    manager.select_root_path(&fx.project).unwrap();
    let started = manager.start_analysis().unwrap();

    assert!(matches!(
        manager.start_analysis(),
        Err(AppError::SessionBusy(_))
    ));

    wait_for_line(&mut updates, "started").await;

    let pid = std::fs::read_to_string(fx.work.path().join("analyzer.pid"))
        .unwrap()
        .trim()
        .to_string();

    let session = timeout(OUTCOME_TIMEOUT, manager.reset())
        .await
        .expect("reset hung")
        .unwrap();
    assert_eq!(session.stage, SessionStage::Select);
    assert_ne!(session.id, started.id);
    assert!(session.log.is_empty());
    assert!(session.root_path.is_none());

    assert!(!process_alive(&pid), "analyzer process {} survived reset", pid);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let after = manager.snapshot().unwrap();
    assert_eq!(after.stage, SessionStage::Select);
    assert!(after.log.is_empty());
}

#[tokio::test]
async fn test_reset_kills_analyzer_helper_processes() {
    let fx = fixture("sleep 30 >/dev/null 2>&1 & echo $! > helper.pid; echo started; wait");
    let manager = fx.manager();
    let mut updates = manager.subscribe();
    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();
    wait_for_line(&mut updates, "started").await;

    let helper = std::fs::read_to_string(fx.work.path().join("helper.pid"))
        .unwrap()
        .trim()
        .to_string();
    assert!(process_alive(&helper));

    timeout(OUTCOME_TIMEOUT, manager.reset())
        .await
        .expect("reset hung")
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!process_alive(&helper), "helper process {} survived reset", helper);
}

#[tokio::test]
async fn test_reset_during_grace_period_cancels_results() {
    let script = format!(
        "{}echo 'End of analysis'; exec sleep 30",
        write_report(SAMPLE_REPORT)
    );
    let mut fx = fixture(&script);
    fx.config.grace_period_ms = 5_000;
    let manager = fx.manager();
    let mut updates = manager.subscribe();
    manager.select_root_path(&fx.project).unwrap();
    manager.start_analysis().unwrap();

    wait_for_line(&mut updates, "End of analysis").await;

    manager.reset().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.stage().unwrap(), SessionStage::Select);
    assert!(!drain(&mut updates).iter().any(|e| matches!(
        e,
        SessionUpdateEvent::StageChanged {
            to: SessionStage::Results,
            ..
        }
    )));
}
