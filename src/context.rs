//! Per-test reporting state and test outcomes.
//!
//! A [`TestContext`] is handed to each phase of a disruption test. Anything a
//! test wants reported beyond pass/fail (flakes, extra JUnit cases, the
//! intervals it evaluated) is recorded on it as a [`Summary`], and the runner
//! turns the summaries into report entries and files once the test finishes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use disruptwatch_probes::ProbeError;
use disruptwatch_types::{Intervals, IntervalsDocument};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, warn};

/// Why a test did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    #[error("{0}")]
    Failed(String),

    #[error("skipped: {0}")]
    Skipped(String),
}

impl TestError {
    pub fn failed(message: impl Into<String>) -> Self {
        TestError::Failed(message.into())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        TestError::Skipped(reason.into())
    }
}

impl From<ProbeError> for TestError {
    fn from(err: ProbeError) -> Self {
        TestError::Failed(err.to_string())
    }
}

/// Final result of one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
}

impl From<Result<(), TestError>> for Outcome {
    fn from(result: Result<(), TestError>) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(TestError::Failed(message)) => Outcome::Failed(message),
            Err(TestError::Skipped(reason)) => Outcome::Skipped(reason),
        }
    }
}

/// A sub-test reported as its own JUnit case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdditionalTest {
    pub name: String,
    /// Empty when the sub-test passed.
    pub failure: Option<String>,
    pub duration: Duration,
}

/// Something a test recorded for the report.
#[derive(Debug, Clone)]
pub enum Summary {
    AdditionalTest(AdditionalTest),
    /// A problem that does not fail the test.
    Flake(String),
    /// Intervals the test evaluated.
    AdditionalEvents(Intervals),
}

impl Summary {
    pub fn kind(&self) -> &'static str {
        match self {
            Summary::AdditionalTest(_) => "AdditionalTest",
            Summary::Flake(_) => "Flake",
            Summary::AdditionalEvents(_) => "AdditionalEvents",
        }
    }

    pub fn human_readable(&self) -> String {
        match self {
            Summary::AdditionalTest(test) => format!(
                "{}: {}",
                test.name,
                test.failure.as_deref().unwrap_or_default()
            ),
            Summary::Flake(message) => message.clone(),
            Summary::AdditionalEvents(intervals) => intervals.strings().join("\n"),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Summary::AdditionalTest(test) => serde_json::to_string(test),
            Summary::Flake(_) => serde_json::to_string(&serde_json::json!({ "type": "Flake" })),
            Summary::AdditionalEvents(intervals) => {
                serde_json::to_string(&IntervalsDocument::new(intervals.clone()))
            }
        }
    }
}

/// Reporting state for one test.
#[derive(Debug, Clone)]
pub struct TestContext {
    name: String,
    namespace: String,
    summaries: Vec<Summary>,
}

impl TestContext {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            summaries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base name for namespaces the test creates.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn summaries(&self) -> &[Summary] {
        &self.summaries
    }

    pub fn push(&mut self, summary: Summary) {
        self.summaries.push(summary);
    }

    /// Record a problem that should be reported without failing the test.
    pub fn record_flake(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(test = %self.name, "flake: {}", message);
        self.summaries.push(Summary::Flake(message));
    }

    /// Attach intervals to the test's report.
    pub fn record_events(&mut self, intervals: Intervals) {
        self.summaries.push(Summary::AdditionalEvents(intervals));
    }

    /// Report a sub-test with a known duration. `None` means it passed.
    pub fn record_junit_result(
        &mut self,
        name: impl Into<String>,
        duration: Duration,
        failure: Option<String>,
    ) {
        self.summaries.push(Summary::AdditionalTest(AdditionalTest {
            name: name.into(),
            failure,
            duration,
        }));
    }

    /// Run `fut`, report it as a sub-test named `name`, and return its result.
    pub async fn record_junit<T, E, F>(&mut self, name: impl Into<String>, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let result = fut.await;
        let failure = result.as_ref().err().map(|e| e.to_string());
        self.record_junit_result(name, start.elapsed(), failure);
        result
    }

    /// The first flake recorded, if any.
    pub fn flake(&self) -> Option<&str> {
        self.summaries.iter().find_map(|s| match s {
            Summary::Flake(message) => Some(message.as_str()),
            _ => None,
        })
    }

    pub fn additional_tests(&self) -> impl Iterator<Item = &AdditionalTest> {
        self.summaries.iter().filter_map(|s| match s {
            Summary::AdditionalTest(test) => Some(test),
            _ => None,
        })
    }

    /// Write every summary except sub-tests as
    /// `<dir>/<Kind>_<case name>_<RFC3339 time>.json`.
    ///
    /// Failures are logged and skipped; the paths actually written are returned.
    pub fn write_summaries(&self, dir: &Path, case_name: &str, at: DateTime<Utc>) -> Vec<PathBuf> {
        let stamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let safe_name = filesystem_safe_name(case_name);
        let mut written = Vec::new();

        for summary in &self.summaries {
            if matches!(summary, Summary::AdditionalTest(_)) {
                continue;
            }

            let path = dir.join(format!("{}_{}_{}.json", summary.kind(), safe_name, stamp));
            let result = summary
                .to_json()
                .map_err(std::io::Error::from)
                .and_then(|json| std::fs::write(&path, json));
            match result {
                Ok(()) => written.push(path),
                Err(e) => error!("Failed to write file {} with test data: {}", path.display(), e),
            }
        }

        written
    }
}

/// Replace everything but ASCII letters, digits and `_` with `_`, collapsing runs.
pub fn filesystem_safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use disruptwatch_types::{Condition, Interval};

    #[test]
    fn filesystem_safe_names() {
        assert_eq!(
            filesystem_safe_name("[sig-network-edge] Application behind service load balancer"),
            "_sig_network_edge_Application_behind_service_load_balancer"
        );
        assert_eq!(filesystem_safe_name("a//b__c"), "a_b_c");
        assert_eq!(filesystem_safe_name("v1.0"), "v1_0");
    }

    #[test]
    fn outcome_from_result() {
        assert_eq!(Outcome::from(Ok(())), Outcome::Passed);
        assert_eq!(
            Outcome::from(Err(TestError::failed("boom"))),
            Outcome::Failed("boom".to_string())
        );
        assert_eq!(
            Outcome::from(Err(TestError::skipped("unsupported"))),
            Outcome::Skipped("unsupported".to_string())
        );
    }

    #[test]
    fn probe_errors_fail_the_test() {
        let err: TestError = ProbeError::Status(503).into();
        assert_eq!(err, TestError::Failed("server returned status 503".to_string()));
    }

    #[test]
    fn first_flake_wins() {
        let mut ctx = TestContext::new("svc", "svc");
        assert!(ctx.flake().is_none());
        ctx.record_flake("first");
        ctx.record_flake("second");
        assert_eq!(ctx.flake(), Some("first"));
    }

    #[tokio::test]
    async fn record_junit_reports_sub_tests() {
        let mut ctx = TestContext::new("svc", "svc");

        let ok: Result<u32, String> = ctx.record_junit("passes", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        let err: Result<u32, String> = ctx
            .record_junit("fails", async { Err("nope".to_string()) })
            .await;
        assert!(err.is_err());

        let tests: Vec<_> = ctx.additional_tests().collect();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].name, "passes");
        assert!(tests[0].failure.is_none());
        assert_eq!(tests[1].failure.as_deref(), Some("nope"));
        assert_eq!(ctx.summaries()[1].human_readable(), "fails: nope");
    }

    #[test]
    fn writes_summary_files() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let mut ctx = TestContext::new("svc", "svc");
        ctx.record_flake("a little down");
        ctx.record_events(
            vec![Interval::instant(Condition::error("disruption/svc", "down"), at)].into(),
        );
        ctx.record_junit_result("sub", Duration::from_secs(1), None);

        let written = ctx.write_summaries(dir.path(), "Service LB", at);
        assert_eq!(written.len(), 2);
        assert_eq!(
            written[0].file_name().unwrap().to_str().unwrap(),
            "Flake_Service_LB_2024-03-01T12:00:00Z.json"
        );

        let flake = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(flake, r#"{"type":"Flake"}"#);

        let events: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[1]).unwrap()).unwrap();
        assert_eq!(events["version"]["major"], 1);
        assert_eq!(events["intervals"][0]["locator"], "disruption/svc");
    }

    #[test]
    fn unwritable_directory_is_logged_not_fatal() {
        let mut ctx = TestContext::new("svc", "svc");
        ctx.record_flake("x");
        let written = ctx.write_summaries(Path::new("/nonexistent/dir"), "svc", Utc::now());
        assert!(written.is_empty());
    }
}
