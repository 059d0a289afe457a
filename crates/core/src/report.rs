//! Dependency Report Model
//!
//! Types for the analyzer's package-based report and the parser that turns the
//! raw JSON document into a [`DependencyReport`].
//!
//! The report is an external contract: a JSON object mapping a dependency
//! descriptor (`groupId=<g>, artifactId=<a>[, ...]`) to an ordered array of
//! method call entries, recursively nested through
//! `declarationInfo.innerMethodCalls`. Key order and entry order are kept
//! exactly as they appear in the document.

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default ceiling for call-graph nesting, shared with the tree builder.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 1000;

// ============================================================================
// Dependency Key
// ============================================================================

/// Unique descriptor of one analyzed dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyKey(String);

impl DependencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// All `name=value` fields of the descriptor, in order.
    ///
    /// Segments without an `=` are skipped.
    pub fn fields(&self) -> Vec<(&str, &str)> {
        self.0
            .split(',')
            .filter_map(|part| part.trim().split_once('='))
            .map(|(name, value)| (name.trim(), value.trim()))
            .collect()
    }

    /// Look up a single descriptor field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn group_id(&self) -> Option<&str> {
        self.field("groupId")
    }

    pub fn artifact_id(&self) -> Option<&str> {
        self.field("artifactId")
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DependencyKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

// ============================================================================
// Method Call Entries
// ============================================================================

/// One third-party method call observed by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCallEntry {
    /// Fully qualified type that declares the called method
    #[serde(default)]
    pub declaring_type: String,
    /// Simple method name
    pub method_name: String,
    /// Resolved method signature
    #[serde(default)]
    pub method_signature: String,
    /// Source text of the call expression
    #[serde(default)]
    pub full_expression: String,
    /// Analyzer recursion layer the call was found at
    #[serde(default)]
    pub current_layer: i64,
    /// Line numbers of every call site (never empty in a valid report)
    #[serde(alias = "lineNumber", deserialize_with = "line_numbers")]
    pub line_numbers: Vec<String>,
    /// Where the called method is declared, with the calls it makes in turn
    #[serde(default)]
    pub declaration_info: Option<DeclarationInfo>,
}

/// Declaration site of a called method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationInfo {
    #[serde(default)]
    pub source_file_path: String,
    #[serde(default)]
    pub declaration_start_line: i64,
    #[serde(default)]
    pub declaration_end_line: i64,
    #[serde(default)]
    pub method_name: String,
    #[serde(default)]
    pub declaration_signature: String,
    /// Calls made from inside this declaration; depth is not bounded by the analyzer
    #[serde(default)]
    pub inner_method_calls: Vec<MethodCallEntry>,
}

impl MethodCallEntry {
    /// Create an entry with the two required fields.
    pub fn new(method_name: impl Into<String>, line_numbers: Vec<String>) -> Self {
        Self {
            declaring_type: String::new(),
            method_name: method_name.into(),
            method_signature: String::new(),
            full_expression: String::new(),
            current_layer: 0,
            line_numbers,
            declaration_info: None,
        }
    }

    /// Attach a declaration carrying the given inner calls
    pub fn with_inner_calls(mut self, inner: Vec<MethodCallEntry>) -> Self {
        let info = self.declaration_info.get_or_insert_with(DeclarationInfo::default);
        info.inner_method_calls = inner;
        self
    }

    /// Inner calls of this entry, empty when there is no declaration info.
    pub fn inner_calls(&self) -> &[MethodCallEntry] {
        self.declaration_info
            .as_ref()
            .map(|info| info.inner_method_calls.as_slice())
            .unwrap_or(&[])
    }
}

/// Number of entries transitively reachable from `entries`, the entries included.
pub fn count_reachable(entries: &[MethodCallEntry]) -> usize {
    let mut pending: Vec<&MethodCallEntry> = entries.iter().collect();
    let mut count = 0;
    while let Some(entry) = pending.pop() {
        count += 1;
        pending.extend(entry.inner_calls());
    }
    count
}

/// Accept line numbers as strings or as bare integers.
fn line_numbers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LineNumbersVisitor;

    impl<'de> Visitor<'de> for LineNumbersVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an array of line numbers")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut lines = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(value) = seq.next_element::<serde_json::Value>()? {
                match value {
                    serde_json::Value::String(s) => lines.push(s),
                    serde_json::Value::Number(n) => lines.push(n.to_string()),
                    other => {
                        return Err(de::Error::custom(format!(
                            "invalid line number: {}",
                            other
                        )))
                    }
                }
            }
            Ok(lines)
        }
    }

    deserializer.deserialize_seq(LineNumbersVisitor)
}

// ============================================================================
// Dependency Report
// ============================================================================

/// Parsed report: dependency key -> ordered method call entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyReport {
    dependencies: Vec<(DependencyKey, Vec<MethodCallEntry>)>,
}

impl DependencyReport {
    /// Build a report from already-parsed parts. Keys must be unique.
    pub fn new(dependencies: Vec<(DependencyKey, Vec<MethodCallEntry>)>) -> CoreResult<Self> {
        let mut seen = HashSet::new();
        for (key, _) in &dependencies {
            if !seen.insert(key.as_str()) {
                return Err(CoreError::parse(format!("duplicate dependency key: {}", key)));
            }
        }
        Ok(Self { dependencies })
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Dependency keys in document order
    pub fn keys(&self) -> impl Iterator<Item = &DependencyKey> {
        self.dependencies.iter().map(|(key, _)| key)
    }

    /// Entries recorded for a dependency key
    pub fn get(&self, key: &str) -> Option<&[MethodCallEntry]> {
        self.dependencies
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DependencyKey, &[MethodCallEntry])> {
        self.dependencies
            .iter()
            .map(|(key, entries)| (key, entries.as_slice()))
    }

    /// Check the invariants serde cannot express: non-empty line numbers
    /// and bounded nesting.
    fn validate(&self, max_depth: usize) -> CoreResult<()> {
        let mut pending: Vec<(&MethodCallEntry, usize)> = Vec::new();
        for (key, entries) in &self.dependencies {
            pending.extend(entries.iter().map(|entry| (entry, 0)));
            while let Some((entry, depth)) = pending.pop() {
                if depth > max_depth {
                    return Err(CoreError::depth_exceeded(depth, max_depth));
                }
                if entry.line_numbers.is_empty() {
                    return Err(CoreError::parse(format!(
                        "entry '{}' under '{}' has no line numbers",
                        entry.method_name, key
                    )));
                }
                pending.extend(entry.inner_calls().iter().map(|inner| (inner, depth + 1)));
            }
        }
        Ok(())
    }
}

impl Serialize for DependencyReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.dependencies.len()))?;
        for (key, entries) in &self.dependencies {
            map.serialize_entry(key, entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DependencyReport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ReportVisitor;

        impl<'de> Visitor<'de> for ReportVisitor {
            type Value = DependencyReport;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping from dependency key to method call entries")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut seen = HashSet::new();
                let mut dependencies = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(key) = map.next_key::<String>()? {
                    if !seen.insert(key.clone()) {
                        return Err(de::Error::custom(format!(
                            "duplicate dependency key: {}",
                            key
                        )));
                    }
                    let entries = map.next_value::<Vec<MethodCallEntry>>()?;
                    dependencies.push((DependencyKey(key), entries));
                }
                Ok(DependencyReport { dependencies })
            }
        }

        deserializer.deserialize_map(ReportVisitor)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// JSON nesting levels consumed per call-graph layer:
/// entry object -> declarationInfo object -> innerMethodCalls array.
const LEVELS_PER_LAYER: usize = 3;
/// Levels above the first entry: report object -> entries array -> entry.
const TOP_LEVELS: usize = 3;
/// Room inside the deepest allowed entry (declarationInfo + empty array).
const ENTRY_HEADROOM: usize = 2;

/// Parse a report document, rejecting anything nested deeper than `max_depth`
/// call-graph layers (top-level entries are layer 0).
///
/// The deserializer recurses once per JSON level, so callers handling large
/// limits should run this on a thread with a generous stack.
pub fn parse_report(text: &str, max_depth: usize) -> CoreResult<DependencyReport> {
    check_nesting(text, max_depth)?;

    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let report = DependencyReport::deserialize(&mut deserializer)
        .map_err(|e| CoreError::parse(e.to_string()))?;
    deserializer
        .end()
        .map_err(|e| CoreError::parse(e.to_string()))?;

    report.validate(max_depth)?;
    Ok(report)
}

/// Lexical pre-scan bounding bracket nesting before any recursive descent.
fn check_nesting(text: &str, max_depth: usize) -> CoreResult<()> {
    let budget = TOP_LEVELS + LEVELS_PER_LAYER * max_depth + ENTRY_HEADROOM;
    let mut level = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                level += 1;
                if level > budget {
                    let layer = (level - TOP_LEVELS) / LEVELS_PER_LAYER;
                    return Err(CoreError::depth_exceeded(layer.max(max_depth + 1), max_depth));
                }
            }
            b'}' | b']' => level = level.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}
