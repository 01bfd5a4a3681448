//! Runs invariant tests alongside a disruptive operation.
//!
//! Every registered test is set up concurrently. Once all of them report
//! ready (or exit early), the disruption runs; when it finishes the tests are
//! told it is done, and each one gets to observe the aftermath and evaluate
//! what it recorded. Results land in a single JUnit suite.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use futures_util::FutureExt;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::context::{TestContext, TestError};
use crate::duration::format_duration;
use crate::junit::{CaseError, Failure, TestCase, TestSuite, FAILURE, FLAKE, PANIC};

/// Classname of invariant test cases.
pub const DISRUPTION_TESTS_CLASS: &str = "disruption_tests";

/// Prefix for namespaces of tests that come from the upstream e2e suite.
pub const UPSTREAM_NAMESPACE_PREFIX: &str = "e2e-k8s-";

/// What is being disrupted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpgradeKind {
    #[default]
    ControlPlane,
    Nodes,
    Cluster,
}

/// Describes the disruption tests are registered against.
#[derive(Debug, Clone, Default)]
pub struct UpgradeContext {
    pub kind: UpgradeKind,
    pub from_version: Option<String>,
    pub to_version: Option<String>,
}

/// Registration-time properties of a test.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// Name shown in reports. Defaults to the test's name.
    pub display_name: Option<String>,
    /// Set to skip the test for this disruption, with the reason.
    pub skip: Option<String>,
    /// Upstream tests get the `e2e-k8s-` namespace prefix.
    pub upstream: bool,
}

/// Signals the end of the disruption to a running test.
#[derive(Debug, Clone)]
pub struct Done(watch::Receiver<bool>);

impl Done {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self(rx)
    }

    /// Wait until the disruption has finished.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|done| *done).await;
    }

    pub fn is_done(&self) -> bool {
        *self.0.borrow()
    }
}

/// A test checking an invariant while a disruption runs.
///
/// `name` must be usable as a namespace base name. `test` should return
/// once it has seen `done` and evaluated what it observed.
#[async_trait]
pub trait DisruptionTest: Send {
    fn name(&self) -> &str;

    fn capabilities(&self, _upgrade: &UpgradeContext) -> Capabilities {
        Capabilities::default()
    }

    /// Prepare the test. The disruption does not start until every test has
    /// finished setup.
    async fn setup(&mut self, ctx: &mut TestContext) -> Result<(), TestError>;

    async fn test(&mut self, ctx: &mut TestContext, done: Done) -> Result<(), TestError>;

    /// Runs after `test`, including when it panics.
    async fn teardown(&mut self, _ctx: &mut TestContext) -> Result<(), TestError> {
        Ok(())
    }
}

/// Tells the runner a test is ready. Fires at most once; dropping it counts.
struct ReadySignal(Option<oneshot::Sender<()>>);

impl ReadySignal {
    fn fire(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ReadySignal {
    fn drop(&mut self) {
        self.fire();
    }
}

struct Registered {
    test: Box<dyn DisruptionTest>,
    case: TestCase,
    ctx: TestContext,
    skip: Option<String>,
}

type Caught = Result<Result<(), TestError>, Box<dyn Any + Send>>;

/// Run `disruption` while `invariants` check the system.
///
/// The suite is named `description`; `test_name` names the package, the
/// report file and the case for the disruption itself. The finished suite
/// is written to `settings.report_dir` (if set) and returned. Report write
/// failures are logged.
pub async fn run<F>(
    settings: &Settings,
    description: &str,
    test_name: &str,
    upgrade: &UpgradeContext,
    invariants: Vec<Box<dyn DisruptionTest>>,
    disruption: F,
) -> TestSuite
where
    F: Future<Output = Result<(), TestError>>,
{
    let suite_start = Instant::now();
    let report_dir = settings.report_dir.as_deref();
    if let Some(dir) = report_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!("cannot create report directory {}: {}", dir.display(), e);
        }
    }

    let mut suite = TestSuite::new(description, test_name);
    let mut disruption_case = TestCase::new(test_name, test_name);

    let mut registered: Vec<Registered> = invariants
        .into_iter()
        .map(|test| register(test, upgrade))
        .collect();

    let (done_tx, done_rx) = watch::channel(false);
    let mut ready = Vec::with_capacity(registered.len());
    let tests: Vec<_> = registered
        .iter_mut()
        .map(|r| {
            let (ready_tx, ready_rx) = oneshot::channel();
            ready.push(ready_rx);
            execute(
                r,
                ReadySignal(Some(ready_tx)),
                Done::new(done_rx.clone()),
                report_dir,
            )
        })
        .collect();

    let disrupt = async move {
        for rx in ready {
            let _ = rx.await;
        }
        info!("all tests ready, starting disruption");

        let start = Instant::now();
        let result = AssertUnwindSafe(disruption).catch_unwind().await;
        let elapsed = start.elapsed();
        info!("disruption finished after {}", format_duration(elapsed));

        let _ = done_tx.send(true);
        (result, elapsed)
    };

    let (extra_cases, (result, elapsed)) = tokio::join!(join_all(tests), disrupt);

    apply_result(&mut disruption_case, result, None);
    disruption_case.time = elapsed.as_secs_f64();
    suite.cases.push(disruption_case);
    suite.cases.extend(registered.into_iter().map(|r| r.case));
    suite.cases.extend(extra_cases.into_iter().flatten());

    suite.time = suite_start.elapsed().as_secs_f64();
    suite.update();
    suite.finalize_flakes();

    match report_dir {
        Some(dir) => match suite.write_report(dir, Utc::now().timestamp()) {
            Ok(path) => info!("wrote JUnit report to {}", path.display()),
            Err(e) => error!("{}", e),
        },
        None => debug!("no report directory configured, not writing JUnit"),
    }

    suite
}

fn register(test: Box<dyn DisruptionTest>, upgrade: &UpgradeContext) -> Registered {
    let capabilities = test.capabilities(upgrade);
    let display_name = capabilities
        .display_name
        .unwrap_or_else(|| test.name().to_string());
    let namespace = namespace_base_name(test.name(), capabilities.upstream);
    debug!(test = test.name(), namespace, "registered disruption test");

    Registered {
        case: TestCase::new(display_name, DISRUPTION_TESTS_CLASS),
        ctx: TestContext::new(test.name(), namespace),
        skip: capabilities.skip,
        test,
    }
}

async fn execute(
    r: &mut Registered,
    mut ready: ReadySignal,
    done: Done,
    report_dir: Option<&Path>,
) -> Vec<TestCase> {
    let start = Instant::now();
    let result = AssertUnwindSafe(phases(
        r.test.as_mut(),
        &mut r.ctx,
        r.skip.as_deref(),
        &mut ready,
        done,
    ))
    .catch_unwind()
    .await;
    drop(ready);

    r.case.time = start.elapsed().as_secs_f64();
    finalize(&mut r.case, result, &r.ctx, report_dir)
}

async fn phases(
    test: &mut dyn DisruptionTest,
    ctx: &mut TestContext,
    skip: Option<&str>,
    ready: &mut ReadySignal,
    done: Done,
) -> Result<(), TestError> {
    if let Some(reason) = skip {
        info!("skipping test {}: {}", test.name(), reason);
        return Err(TestError::Skipped(format!(
            "skipping test {}: {}",
            test.name(),
            reason
        )));
    }

    info!("setting up {}", test.name());
    test.setup(ctx).await?;
    ready.fire();

    let result = AssertUnwindSafe(test.test(ctx, done)).catch_unwind().await;
    if let Err(e) = test.teardown(ctx).await {
        warn!("teardown of {} failed: {}", test.name(), e);
    }

    match result {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Turn a finished test into report entries. Returns its sub-test cases.
fn finalize(
    case: &mut TestCase,
    result: Caught,
    ctx: &TestContext,
    report_dir: Option<&Path>,
) -> Vec<TestCase> {
    let extra = ctx
        .additional_tests()
        .map(|test| {
            let mut sub = TestCase::new(test.name.clone(), "");
            sub.time = test.duration.as_secs_f64();
            if let Some(failure) = &test.failure {
                sub.failures.push(Failure::new(FAILURE, failure.clone()));
            }
            sub
        })
        .collect();

    if let Some(dir) = report_dir {
        ctx.write_summaries(dir, &case.name, Utc::now());
    }

    apply_result(case, result, Some(ctx));
    extra
}

fn apply_result(case: &mut TestCase, result: Caught, ctx: Option<&TestContext>) {
    match result {
        Ok(Ok(())) => {
            if let Some(flake) = ctx.and_then(TestContext::flake) {
                case.failures.push(Failure::new(FLAKE, flake));
            }
        }
        Ok(Err(TestError::Failed(message))) => {
            error!("{} failed: {}", case.name, message);
            case.failures = vec![Failure::new(FAILURE, message)];
        }
        Ok(Err(TestError::Skipped(reason))) => {
            case.skipped = Some(reason);
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("{} panicked: {}", case.name, message);
            case.errors = vec![CaseError::new(PANIC, message)];
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Namespace base name for a test: runs of characters other than ASCII word
/// characters and `-` become a single `-`, then leading and trailing `-` are
/// trimmed.
pub fn namespace_base_name(test_name: &str, upstream: bool) -> String {
    let mut ns = String::with_capacity(test_name.len());
    let mut in_run = false;
    for c in test_name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            ns.push(c);
            in_run = false;
        } else if !in_run {
            ns.push('-');
            in_run = true;
        }
    }

    let ns = ns.trim_matches('-');
    if upstream {
        format!("{}{}", UPSTREAM_NAMESPACE_PREFIX, ns)
    } else {
        ns.to_string()
    }
}

/// Sleep for `duration` as a stand-in disruption.
pub async fn wait_disruption(duration: Duration) -> Result<(), TestError> {
    info!("waiting {} in place of a disruption", format_duration(duration));
    tokio::time::sleep(duration).await;
    Ok(())
}

/// Run an external command as the disruption. A non-zero exit fails it.
pub async fn command_disruption(command: &[String]) -> Result<(), TestError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| TestError::failed("the upgrade command is empty"))?;

    info!("running upgrade: {}", command.join(" "));
    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|e| TestError::failed(format!("failed to start {}: {}", program, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(TestError::failed(format!(
            "upgrade command {} exited with {}",
            program, status
        )))
    }
}
