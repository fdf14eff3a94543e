//! Diagnostics collaborator
//!
//! The engine reports failed checks and dispatch errors here. Records are
//! observational only: nothing is read back by the engine.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What produced a diagnostic record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A named check failed on a response
    CheckFailed,
    /// A request could not be completed
    DispatchFailed,
}

/// Free-text diagnostic with the fields a reader needs to locate the failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub kind: DiagnosticKind,
    pub timestamp: DateTime<Utc>,
    /// Route the request belonged to
    pub route: String,
    /// Check name, for check failures
    pub check: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub message: String,
}

impl DiagnosticRecord {
    pub fn check_failed(
        route: impl Into<String>,
        check: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let route = route.into();
        let check = check.into();
        let expected = expected.into();
        let actual = actual.into();
        Self {
            kind: DiagnosticKind::CheckFailed,
            timestamp: Utc::now(),
            message: format!(
                "{} failed '{}': expected {}, got {}",
                route, check, expected, actual
            ),
            route,
            check: Some(check),
            expected: Some(expected),
            actual: Some(actual),
        }
    }

    pub fn dispatch_failed(route: impl Into<String>, cause: impl fmt::Display) -> Self {
        let route = route.into();
        Self {
            kind: DiagnosticKind::DispatchFailed,
            timestamp: Utc::now(),
            message: format!("{} request failed: {}", route, cause),
            route,
            check: None,
            expected: None,
            actual: None,
        }
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Sink for diagnostic records
pub trait Diagnostics: Send + Sync {
    fn record(&self, record: DiagnosticRecord);
}

/// Forwards diagnostics to `tracing` at warn level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record(&self, record: DiagnosticRecord) {
        match record.kind {
            DiagnosticKind::CheckFailed => tracing::warn!(
                target: "loadgate::diagnostics",
                route = %record.route,
                check = record.check.as_deref().unwrap_or_default(),
                expected = record.expected.as_deref().unwrap_or_default(),
                actual = record.actual.as_deref().unwrap_or_default(),
                "{}",
                record.message
            ),
            DiagnosticKind::DispatchFailed => tracing::warn!(
                target: "loadgate::diagnostics",
                route = %record.route,
                "{}",
                record.message
            ),
        }
    }
}

/// Keeps every record in memory, mostly for tests and summaries
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn record(&self, record: DiagnosticRecord) {
        self.records.lock().push(record);
    }
}
