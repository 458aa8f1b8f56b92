//! Parsing, canonicalization and persistence of a finished run's report
//!
//! The reader only ever sees a completely captured stream. Every failure
//! past this point (malformed text, schema mismatch, unwritable artifact)
//! is logged and folded into [`ReadOutcome`] rather than returned as an
//! error, so a bad report never aborts a repeat sequence.

use crate::defaults::{ARTIFACT_PREFIX, ARTIFACT_TIMESTAMP_FORMAT};
use crate::error::{AppError, Result};
use crate::logging::{LogLevel, Logger};
use crate::models::{Config, MeasurementResult};
use crate::types::Role;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::path::{Path, PathBuf};

/// What a captured stream reduced to
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The stream held nothing but whitespace
    Empty,
    /// No JSON document could be read; nothing was persisted
    Malformed { reason: String },
    /// Valid JSON that does not fit the report schema
    Undecodable {
        canonical: String,
        artifact: Option<PathBuf>,
        reason: String,
    },
    Decoded {
        result: Box<MeasurementResult>,
        canonical: String,
        artifact: Option<PathBuf>,
    },
}

impl ReadOutcome {
    pub fn result(&self) -> Option<&MeasurementResult> {
        match self {
            Self::Decoded { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<MeasurementResult> {
        match self {
            Self::Decoded { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// Indented form of the document, when it was valid JSON
    pub fn canonical(&self) -> Option<&str> {
        match self {
            Self::Decoded { canonical, .. } | Self::Undecodable { canonical, .. } => Some(canonical),
            _ => None,
        }
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Self::Decoded { artifact, .. } | Self::Undecodable { artifact, .. } => artifact.as_deref(),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Turns the bytes of a finished run into a [`MeasurementResult`]
#[derive(Debug, Clone)]
pub struct ResultReader {
    output_dir: Option<PathBuf>,
    logger: Logger,
}

impl ResultReader {
    /// Reader that persists artifacts into `output_dir` when one is given
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        let mut logger = Logger::new("REPORT");
        logger.set_level(LogLevel::Warn);
        Self { output_dir, logger }
    }

    /// Reader using the artifact directory configured for `role`
    pub fn for_role(config: &Config, role: Role) -> Self {
        Self::new(config.output_dir(role).map(Path::to_path_buf))
            .with_logger(Logger::with_config("REPORT", config))
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Reduce one finalized stream to its first report
    pub async fn read(&self, bytes: &[u8]) -> ReadOutcome {
        self.read_all(bytes).await.into_iter().next().unwrap_or(ReadOutcome::Empty)
    }

    /// Reduce a finalized stream that may hold several reports
    ///
    /// A server left running prints one document per test it serves. Each
    /// one is canonicalized, persisted and decoded on its own. Only a stream
    /// whose first document fails to parse is `Malformed`; garbage after at
    /// least one good document is logged and dropped.
    pub async fn read_all(&self, bytes: &[u8]) -> Vec<ReadOutcome> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            self.logger.debug("Captured output is empty").log().await;
            return vec![ReadOutcome::Empty];
        }

        let (documents, stopped) = parse_documents(bytes);
        if documents.is_empty() {
            let e = stopped.unwrap_or_else(|| AppError::malformed_output("no JSON document found"));
            self.logger.warn(&format!("Discarding non-JSON tool output: {}", e))
                .field("bytes", bytes.len())
                .error_info(&e)
                .log()
                .await;
            return vec![ReadOutcome::Malformed { reason: e.to_string() }];
        }

        if let Some(e) = stopped {
            self.logger.warn(&format!("Ignoring output after report {}: {}", documents.len(), e))
                .error_info(&e)
                .log()
                .await;
        }

        let at = Local::now();
        let mut outcomes = Vec::with_capacity(documents.len());
        for (index, value) in documents.into_iter().enumerate() {
            outcomes.push(self.reduce(value, &document_artifact_name(&at, index)).await);
        }
        outcomes
    }

    async fn reduce(&self, value: serde_json::Value, name: &str) -> ReadOutcome {
        let canonical = match canonicalize(&value) {
            Ok(text) => text,
            Err(e) => {
                return ReadOutcome::Malformed { reason: e.to_string() };
            }
        };
        self.logger.debug(&format!("Report:\n{}", canonical)).log().await;

        let artifact = match &self.output_dir {
            Some(dir) => self.persist(&dir.join(name), &canonical).await,
            None => None,
        };

        match serde_json::from_value::<MeasurementResult>(value) {
            Ok(result) => {
                if let Some(error) = &result.error {
                    self.logger.warn(&format!("Tool reported a failed test: {}", error)).log().await;
                }
                ReadOutcome::Decoded { result: Box::new(result), canonical, artifact }
            }
            Err(e) => {
                let error = AppError::malformed_output(format!("Report does not match schema: {}", e));
                self.logger.warn(&error.to_string()).error_info(&error).log().await;
                ReadOutcome::Undecodable { canonical, artifact, reason: e.to_string() }
            }
        }
    }

    async fn persist(&self, path: &Path, canonical: &str) -> Option<PathBuf> {
        // Same-second repeats share a name; the later write wins.
        match tokio::fs::write(path, canonical).await {
            Ok(()) => {
                self.logger.info(&format!("Saved result to {}", path.display())).log().await;
                Some(path.to_path_buf())
            }
            Err(e) => {
                let error = AppError::persistence(path, e.to_string());
                self.logger.warn(&error.to_string()).error_info(&error).log().await;
                None
            }
        }
    }
}

/// Parse a stream that must hold exactly one JSON object
pub fn parse_document(bytes: &[u8]) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::malformed_output(e.to_string()))?;

    if !value.is_object() {
        return Err(AppError::malformed_output("top-level value is not an object"));
    }

    Ok(value)
}

/// Split a stream into consecutive JSON objects
///
/// Scanning stops at the first value that fails to parse or is not an
/// object; that failure is returned alongside the documents read so far.
pub fn parse_documents(bytes: &[u8]) -> (Vec<serde_json::Value>, Option<AppError>) {
    let mut documents = Vec::new();
    for item in serde_json::Deserializer::from_slice(bytes).into_iter::<serde_json::Value>() {
        match item {
            Ok(value) if value.is_object() => documents.push(value),
            Ok(_) => return (documents, Some(AppError::malformed_output("top-level value is not an object"))),
            Err(e) => return (documents, Some(AppError::malformed_output(e.to_string()))),
        }
    }
    (documents, None)
}

/// Four-space indented rendering of a document
pub fn canonicalize(value: &serde_json::Value) -> Result<String> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buffer).map_err(|e| AppError::internal(format!("Non UTF-8 JSON output: {}", e)))
}

/// `iperf3_2026-10-19T14-03-59.json`
pub fn artifact_name(at: &DateTime<Local>) -> String {
    format!("{}{}.json", ARTIFACT_PREFIX, at.format(ARTIFACT_TIMESTAMP_FORMAT))
}

/// Name of the `index`th report of one stream; the first keeps the plain name
pub fn document_artifact_name(at: &DateTime<Local>, index: usize) -> String {
    if index == 0 {
        return artifact_name(at);
    }
    format!("{}{}_{}.json", ARTIFACT_PREFIX, at.format(ARTIFACT_TIMESTAMP_FORMAT), index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const MINIMAL: &[u8] = br#"{"start":{},"intervals":[],"end":{}}"#;

    #[tokio::test]
    async fn test_minimal_document_decodes() {
        let reader = ResultReader::new(None);
        let outcome = reader.read(MINIMAL).await;

        let result = outcome.result().expect("decoded result");
        assert!(result.intervals.is_empty());
        assert!(outcome.artifact().is_none());
    }

    #[tokio::test]
    async fn test_plain_text_is_malformed() {
        let reader = ResultReader::new(None);
        let outcome = reader.read(b"not json").await;

        assert!(outcome.is_malformed());
        assert!(outcome.result().is_none());
    }

    #[tokio::test]
    async fn test_truncated_document_is_malformed() {
        let reader = ResultReader::new(None);
        let outcome = reader.read(br#"{"start":{"connected":[{"socket":5}"#).await;
        assert!(outcome.is_malformed());
    }

    #[tokio::test]
    async fn test_non_object_is_malformed() {
        let reader = ResultReader::new(None);
        assert!(reader.read(b"\"not json\"").await.is_malformed());
        assert!(reader.read(b"[1, 2]").await.is_malformed());
    }

    #[tokio::test]
    async fn test_whitespace_is_empty() {
        let reader = ResultReader::new(None);
        assert_eq!(reader.read(b"").await, ReadOutcome::Empty);
        assert_eq!(reader.read(b" \n\t").await, ReadOutcome::Empty);
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_undecodable() {
        let dir = TempDir::new().unwrap();
        let reader = ResultReader::new(Some(dir.path().to_path_buf()));
        let outcome = reader.read(br#"{"intervals": "sometimes"}"#).await;

        match &outcome {
            ReadOutcome::Undecodable { canonical, artifact, .. } => {
                assert!(canonical.contains("\"intervals\": \"sometimes\""));
                assert!(artifact.as_ref().unwrap().exists());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(outcome.result().is_none());
    }

    #[tokio::test]
    async fn test_artifact_is_written_in_canonical_form() {
        let dir = TempDir::new().unwrap();
        let reader = ResultReader::new(Some(dir.path().to_path_buf()));
        let outcome = reader.read(MINIMAL).await;

        let artifact = outcome.artifact().expect("artifact path").to_path_buf();
        assert_eq!(artifact.parent(), Some(dir.path()));

        let name = artifact.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("iperf3_"));
        assert!(name.ends_with(".json"));

        let contents = std::fs::read_to_string(&artifact).unwrap();
        assert_eq!(contents, outcome.canonical().unwrap());
        assert!(contents.contains("\n    \"start\": {}"));
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_result() {
        let dir = TempDir::new().unwrap();
        let reader = ResultReader::new(Some(dir.path().join("missing")));
        let outcome = reader.read(MINIMAL).await;

        assert!(outcome.result().is_some());
        assert!(outcome.artifact().is_none());
    }

    #[test]
    fn test_canonical_indent() {
        let value: serde_json::Value = serde_json::from_str(r#"{"end":{"sum_sent":{"bytes":1}}}"#).unwrap();
        let text = canonicalize(&value).unwrap();
        assert_eq!(text, "{\n    \"end\": {\n        \"sum_sent\": {\n            \"bytes\": 1\n        }\n    }\n}");
    }

    #[test]
    fn test_canonical_keeps_tool_key_order() {
        let value = parse_document(br#"{"start":{},"intervals":[],"end":{}}"#).unwrap();
        let text = canonicalize(&value).unwrap();
        assert_eq!(text, "{\n    \"start\": {},\n    \"intervals\": [],\n    \"end\": {}\n}");
    }

    #[tokio::test]
    async fn test_concatenated_documents_are_each_saved() {
        let dir = TempDir::new().unwrap();
        let reader = ResultReader::new(Some(dir.path().to_path_buf()));
        let parts: [&[u8]; 4] = [MINIMAL, b"\n", MINIMAL, b"\n"];
        let stream = parts.concat();

        let outcomes = reader.read_all(&stream).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|outcome| outcome.result().is_some()));

        let artifacts: Vec<_> = outcomes.iter().filter_map(|o| o.artifact()).collect();
        assert_eq!(artifacts.len(), 2);
        assert_ne!(artifacts[0], artifacts[1]);
        assert!(artifacts.iter().all(|path| path.exists()));

        let first = reader.read(&stream).await;
        assert!(first.result().is_some());
    }

    #[tokio::test]
    async fn test_trailing_garbage_after_report_is_dropped() {
        let reader = ResultReader::new(None);
        let parts: [&[u8]; 2] = [MINIMAL, b"\niperf3: interrupt - the server has terminated\n"];
        let stream = parts.concat();

        let outcomes = reader.read_all(&stream).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result().is_some());
    }

    #[test]
    fn test_parse_documents_stops_at_non_object() {
        let (documents, stopped) = parse_documents(br#"{"a":1} {"b":2} [3] {"c":4}"#);
        assert_eq!(documents.len(), 2);
        assert!(stopped.is_some());

        let (documents, stopped) = parse_documents(br#"{"a":1}"#);
        assert_eq!(documents.len(), 1);
        assert!(stopped.is_none());
    }

    #[test]
    fn test_artifact_name_format() {
        let at = Local.with_ymd_and_hms(2026, 10, 19, 9, 5, 3).unwrap();
        assert_eq!(artifact_name(&at), "iperf3_2026-10-19T09-05-03.json");
        assert_eq!(document_artifact_name(&at, 0), "iperf3_2026-10-19T09-05-03.json");
        assert_eq!(document_artifact_name(&at, 2), "iperf3_2026-10-19T09-05-03_3.json");
    }
}
