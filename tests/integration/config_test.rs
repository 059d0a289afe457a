//! Configuration Integration Tests
//!
//! Loading config files and feeding them to the session manager.

use std::io::Write;

use covsbom_desktop::models::settings::SettingsUpdate;
use covsbom_desktop::services::analysis::{AnalysisSessionManager, LaunchConfig, ResultLoader};
use covsbom_desktop::storage::ConfigService;
use covsbom_desktop::utils::error::AppError;
use tempfile::NamedTempFile;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_file() {
    let file = config_file(
        r#"{
            "analyzer": {
                "program": "/usr/bin/java",
                "args": ["-Xmx4g", "-jar", "/opt/covsbom/ast_generator.jar"],
                "workingDir": "/opt/covsbom"
            },
            "sentinel": "End of analysis",
            "gracePeriodMs": 500,
            "maxNestingDepth": 200,
            "logTailLines": 5,
            "eventBuffer": 64,
            "report": {
                "outputDir": "out",
                "fileName": "report.json"
            }
        }"#,
    );
    let service = ConfigService::load(Some(file.path())).unwrap();
    let config = service.get_config_clone();

    let launch = LaunchConfig::from_config(&config);
    assert_eq!(launch.program, "/usr/bin/java");
    assert_eq!(launch.buffer, 64);
    assert_eq!(
        launch.command_args(std::path::Path::new("/src/shop")),
        vec![
            "-Xmx4g",
            "-jar",
            "/opt/covsbom/ast_generator.jar",
            "--process-directory",
            "/src/shop"
        ]
    );

    let loader = ResultLoader::from_config(&config);
    assert_eq!(
        loader.report_path(std::path::Path::new("/src/shop")).unwrap(),
        std::path::PathBuf::from("/opt/covsbom/out/shop/report.json")
    );

    assert!(AnalysisSessionManager::new(config).is_ok());
}

#[test]
fn test_cli_overrides_apply_on_top_of_file() {
    let file = config_file(r#"{"gracePeriodMs": 500}"#);
    let mut service = ConfigService::load(Some(file.path())).unwrap();
    service
        .update_config(SettingsUpdate {
            analyzer_program: Some("sh".to_string()),
            max_nesting_depth: Some(10),
            ..Default::default()
        })
        .unwrap();
    let config = service.get_config_clone();
    assert_eq!(config.grace_period_ms, 500);
    assert_eq!(config.analyzer.program, "sh");
    assert_eq!(config.max_nesting_depth, 10);
}

#[test]
fn test_unknown_types_rejected() {
    let file = config_file(r#"{"gracePeriodMs": "soon"}"#);
    assert!(matches!(
        ConfigService::load(Some(file.path())),
        Err(AppError::Config(_))
    ));
}
