//! JUnit XML reports.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `type` of a failure that should not fail the job.
pub const FLAKE: &str = "Flake";
/// `type` of an ordinary failure.
pub const FAILURE: &str = "Failure";
/// `type` of an error raised by a panic.
pub const PANIC: &str = "Panic";

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: String,
    pub kind: String,
    pub value: String,
}

impl Failure {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            value: message.clone(),
            message,
            kind: kind.to_string(),
        }
    }
}

/// Same shape as [`Failure`], rendered as `<error>`.
pub type CaseError = Failure;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub classname: String,
    /// Seconds.
    pub time: f64,
    pub failures: Vec<Failure>,
    pub errors: Vec<CaseError>,
    pub skipped: Option<String>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, classname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classname: classname.into(),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        !self.failures.is_empty() || !self.errors.is_empty()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSuite {
    pub name: String,
    pub package: String,
    /// Seconds.
    pub time: f64,
    pub tests: usize,
    pub failures: usize,
    pub errors: usize,
    pub skipped: usize,
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            ..Default::default()
        }
    }

    /// Recompute the suite counters from its cases.
    pub fn update(&mut self) {
        self.tests = self.cases.len();
        self.failures = self.cases.iter().filter(|c| !c.failures.is_empty()).count();
        self.errors = self.cases.iter().filter(|c| !c.errors.is_empty()).count();
        self.skipped = self.cases.iter().filter(|c| c.is_skipped()).count();
    }

    /// Turn flake-only cases into a failing and a passing entry.
    ///
    /// Every `Flake` failure is retyped to `Failure`. A case whose failures
    /// were all flakes, with no errors and no skip, also gets a passing twin
    /// with the same name, class and time, appended at the end of the suite.
    /// Counters are left alone, so calling [`TestSuite::update`] first keeps
    /// the twins out of them.
    pub fn finalize_flakes(&mut self) {
        let mut twins = Vec::new();

        for case in &mut self.cases {
            let mut all_flakes =
                !case.failures.is_empty() && case.errors.is_empty() && case.skipped.is_none();
            for failure in &mut case.failures {
                if failure.kind == FLAKE {
                    failure.kind = FAILURE.to_string();
                } else {
                    all_flakes = false;
                }
            }
            if all_flakes {
                twins.push(TestCase {
                    name: case.name.clone(),
                    classname: case.classname.clone(),
                    time: case.time,
                    ..Default::default()
                });
            }
        }

        self.cases.extend(twins);
    }

    /// Names of failed cases that have no passing entry of the same name.
    pub fn hard_failures(&self) -> Vec<&str> {
        let passed = |name: &str| {
            self.cases
                .iter()
                .any(|c| c.name == name && !c.is_failed() && !c.is_skipped())
        };
        self.cases
            .iter()
            .filter(|c| c.is_failed() && !passed(&c.name))
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            out,
            "<testsuite name=\"{}\" package=\"{}\" tests=\"{}\" skipped=\"{}\" failures=\"{}\" errors=\"{}\" time=\"{:.3}\">",
            xml_attr(&self.name),
            xml_attr(&self.package),
            self.tests,
            self.skipped,
            self.failures,
            self.errors,
            self.time
        );

        for case in &self.cases {
            let _ = write!(
                out,
                "  <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\"",
                xml_attr(&case.name),
                xml_attr(&case.classname),
                case.time
            );
            if !case.is_failed() && !case.is_skipped() {
                out.push_str("/>\n");
                continue;
            }
            out.push_str(">\n");

            if let Some(skipped) = &case.skipped {
                let _ = writeln!(out, "    <skipped message=\"{}\"/>", xml_attr(skipped));
            }
            for failure in &case.failures {
                let _ = writeln!(
                    out,
                    "    <failure message=\"{}\" type=\"{}\">{}</failure>",
                    xml_attr(&failure.message),
                    xml_attr(&failure.kind),
                    xml_escape(&failure.value)
                );
            }
            for error in &case.errors {
                let _ = writeln!(
                    out,
                    "    <error message=\"{}\" type=\"{}\">{}</error>",
                    xml_attr(&error.message),
                    xml_attr(&error.kind),
                    xml_escape(&error.value)
                );
            }
            out.push_str("  </testcase>\n");
        }

        out.push_str("</testsuite>\n");
        out
    }

    /// File name for this suite: `junit_<package>_<unix seconds>.xml`.
    pub fn file_name(&self, unix_seconds: i64) -> String {
        format!("junit_{}_{}.xml", self.package, unix_seconds)
    }

    /// Write the report into `dir`, creating it if needed.
    pub fn write_report(&self, dir: &Path, unix_seconds: i64) -> Result<PathBuf, ReportError> {
        let path = dir.join(self.file_name(unix_seconds));
        std::fs::create_dir_all(dir)
            .and_then(|()| std::fs::write(&path, self.to_xml()))
            .map_err(|source| ReportError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Escape character data. Characters XML 1.0 does not allow are replaced
/// with U+FFFD.
fn xml_escape(input: &str) -> String {
    escape(input, false)
}

/// Escape an attribute value. Whitespace other than spaces is written as a
/// character reference so parsers do not normalise it away.
fn xml_attr(input: &str) -> String {
    escape(input, true)
}

fn escape(input: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\r' if attribute => out.push_str("&#13;"),
            '\t' if attribute => out.push_str("&#9;"),
            c if is_xml_char(c) => out.push(c),
            _ => out.push('\u{FFFD}'),
        }
    }
    out
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
