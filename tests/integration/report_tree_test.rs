//! Report and Tree Integration Tests
//!
//! Parsing real-shaped reports and building call trees from them.

use covsbom_core::{
    count_reachable, parse_report, truncate_label, CoreError, MethodCallEntry, TreeBuilder,
    DEFAULT_MAX_NESTING_DEPTH,
};
use covsbom_desktop::services::analysis::ResultLoader;

const SAMPLE_REPORT: &str = r#"{
    "groupId=a, artifactId=b": [
        {"methodName": "foo", "lineNumbers": ["10"], "declarationInfo": {"innerMethodCalls": []}}
    ]
}"#;

const ANALYZER_REPORT: &str = r#"{
    "groupId=org.apache.commons, artifactId=commons-lang3, version=3.12.0": [
        {
            "declaringType": "org.apache.commons.lang3.StringUtils",
            "methodName": "isBlank",
            "methodSignature": "isBlank(java.lang.CharSequence)",
            "fullExpression": "StringUtils.isBlank(name)",
            "currentLayer": 0,
            "lineNumber": ["14", "27"],
            "declarationInfo": {
                "sourceFilePath": "StringUtils.java",
                "declarationStartLine": 3510,
                "declarationEndLine": 3522,
                "methodName": "isBlank",
                "declarationSignature": "public static boolean isBlank(final CharSequence cs)",
                "innerMethodCalls": [
                    {"methodName": "length", "lineNumber": [3511], "currentLayer": 1},
                    {"methodName": "isWhitespaceCharacterSequence", "lineNumber": ["3515"], "currentLayer": 1}
                ]
            }
        }
    ],
    "groupId=com.google.guava, artifactId=guava": [
        {"methodName": "of", "lineNumber": ["8"]}
    ]
}"#;

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_sample_report_end_to_end() {
    let report = ResultLoader::default()
        .parse(SAMPLE_REPORT.to_string())
        .await
        .unwrap();
    assert_eq!(report.len(), 1);
    let entries = report.get("groupId=a, artifactId=b").unwrap();
    assert_eq!(entries.len(), 1);

    let tree = TreeBuilder::default().build(entries).unwrap();
    assert_eq!(tree.root.children.len(), 1);
    assert_eq!(tree.root.children[0].display_label, "foo");
    assert!(tree.root.children[0].is_leaf());
    assert_eq!(tree.metrics.entry_count, 1);
    assert_eq!(tree.metrics.max_depth, 0);
}

#[test]
fn test_analyzer_shaped_report() {
    let report = parse_report(ANALYZER_REPORT, DEFAULT_MAX_NESTING_DEPTH).unwrap();
    let keys: Vec<_> = report.keys().map(|k| k.as_str().to_string()).collect();
    assert_eq!(
        keys,
        vec![
            "groupId=org.apache.commons, artifactId=commons-lang3, version=3.12.0",
            "groupId=com.google.guava, artifactId=guava",
        ]
    );

    let first = report.keys().next().unwrap();
    assert_eq!(first.group_id(), Some("org.apache.commons"));
    assert_eq!(first.artifact_id(), Some("commons-lang3"));

    let (_, entries) = report.iter().next().unwrap();
    assert_eq!(entries[0].line_numbers, vec!["14", "27"]);
    assert_eq!(entries[0].inner_calls()[0].line_numbers, vec!["3511"]);
}

#[test]
fn test_analyzer_report_tree() {
    let report = parse_report(ANALYZER_REPORT, DEFAULT_MAX_NESTING_DEPTH).unwrap();
    let (_, entries) = report.iter().next().unwrap();
    let tree = TreeBuilder::default().build(entries).unwrap();

    let is_blank = &tree.root.children[0];
    assert_eq!(is_blank.display_label, "isBlank");
    let labels: Vec<_> = is_blank.children.iter().map(|n| n.display_label.as_str()).collect();
    assert_eq!(labels, vec!["length", "isWhitespaceChara..."]);
    assert_eq!(is_blank.children[1].full_label, "isWhitespaceCharacterSequence");
    assert_eq!(tree.metrics.entry_count, 3);
    assert_eq!(tree.metrics.max_depth, 1);
    assert_eq!(tree.metrics.entry_count, count_reachable(entries));
}

#[test]
fn test_duplicate_keys_rejected() {
    let text = r#"{
        "groupId=a, artifactId=b": [{"methodName": "x", "lineNumbers": ["1"]}],
        "groupId=a, artifactId=b": [{"methodName": "y", "lineNumbers": ["2"]}]
    }"#;
    assert!(matches!(
        parse_report(text, DEFAULT_MAX_NESTING_DEPTH),
        Err(CoreError::Parse(_))
    ));
}

#[test]
fn test_non_mapping_top_level_rejected() {
    assert!(matches!(
        parse_report("[]", DEFAULT_MAX_NESTING_DEPTH),
        Err(CoreError::Parse(_))
    ));
}

#[test]
fn test_missing_required_fields_rejected() {
    let no_name = r#"{"k": [{"lineNumbers": ["1"]}]}"#;
    let no_lines = r#"{"k": [{"methodName": "x"}]}"#;
    let empty_lines = r#"{"k": [{"methodName": "x", "lineNumbers": []}]}"#;
    for text in [no_name, no_lines, empty_lines] {
        assert!(
            matches!(parse_report(text, DEFAULT_MAX_NESTING_DEPTH), Err(CoreError::Parse(_))),
            "accepted: {}",
            text
        );
    }
}

// ============================================================================
// Tree building
// ============================================================================

fn chain(depth: usize) -> MethodCallEntry {
    let mut entry = MethodCallEntry::new("bottom", vec!["1".to_string()]);
    for i in 0..depth {
        entry = MethodCallEntry::new(format!("m{}", i), vec!["1".to_string()])
            .with_inner_calls(vec![entry]);
    }
    entry
}

#[test]
fn test_entry_count_matches_reachable() {
    let entries = vec![
        chain(3),
        MethodCallEntry::new("solo", vec!["4".to_string()]),
        MethodCallEntry::new("fan", vec!["5".to_string()]).with_inner_calls(vec![
            chain(1),
            MethodCallEntry::new("leaf", vec!["6".to_string()]),
        ]),
    ];
    let tree = TreeBuilder::default().build(&entries).unwrap();
    assert_eq!(tree.metrics.entry_count, count_reachable(&entries));
    assert_eq!(tree.metrics.entry_count, 4 + 1 + 4);
    assert_eq!(tree.metrics.max_depth, 3);
}

#[test]
fn test_depth_guard() {
    let entries = vec![chain(12)];
    let err = TreeBuilder::new(10).build(&entries).unwrap_err();
    assert!(matches!(err, CoreError::DepthExceeded { limit: 10, .. }));
    assert!(TreeBuilder::new(12).build(&entries).is_ok());
}

#[test]
fn test_rebuild_is_identical() {
    let entries = vec![chain(4), MethodCallEntry::new("other", vec!["2".to_string()])];
    let builder = TreeBuilder::default();
    assert_eq!(builder.build(&entries).unwrap(), builder.build(&entries).unwrap());
}

#[test]
fn test_truncation_boundary() {
    assert_eq!(truncate_label("exactlyTwentyCharsXY"), "exactlyTwentyCharsXY");
    let label = truncate_label("exactlyTwentyCharsXYZ");
    assert_eq!(label, "exactlyTwentyChar...");
    assert_eq!(label.chars().count(), 20);
}
