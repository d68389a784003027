//! End-to-end orchestrator tests with scripted collaborators.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use buildsmith::agents::{
    FixRequest, GenerationRequest, Generator, Plan, PlanRequest, PlannedTask, Planner,
    ReviewIssue, ReviewRequest, ReviewVerdict, Reviewer, Severity,
};
use buildsmith::config::{BuildsmithToml, Config};
use buildsmith::errors::BuildError;
use buildsmith::firewall::{AuditAction, AuditLog};
use buildsmith::orchestrator::{
    BuildOrchestrator, BuildState, BuildStatus, Collaborators, FixOutcome, ReviewReport,
    StateStore, TaskStatus,
};

// =========================================
// Scripted collaborators
// =========================================

/// Plans `count` tasks, each producing `src/<slug>_<n>.py`.
struct FixedPlanner {
    slug: &'static str,
    count: usize,
    calls: AtomicUsize,
}

impl FixedPlanner {
    fn new(slug: &'static str, count: usize) -> Arc<Self> {
        Arc::new(Self {
            slug,
            count,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Planner for FixedPlanner {
    async fn plan(&self, _request: &PlanRequest) -> Result<Plan> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tasks = (1..=self.count)
            .map(|n| PlannedTask {
                id: Some(format!("task_{:02}", n)),
                name: Some(format!("{} {}", self.slug, n)),
                description: format!("Write module {}", n),
                agent: Some("coder".to_string()),
                files: vec![format!("src/{}_{}.py", self.slug, n)],
            })
            .collect();
        Ok(Plan {
            decisions: serde_yaml::from_str("stack:\n  language: python\n").unwrap(),
            tasks,
        })
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Step {
    /// Emit every planned file
    Write,
    Fail,
    /// Cancel the build and never return
    Cancel,
    /// Snapshot the persisted state, then write
    Capture,
    /// Emit one fixed response instead of the planned files
    Raw(&'static str),
}

/// Scripted answers to `Generator::fix`, consumed in order.
#[derive(Clone, Copy)]
enum FixStep {
    /// Rewrite the requested file with clean content
    Clean,
    Fail,
    Cancel,
    Raw(&'static str),
}

struct ScriptedCoder {
    steps: Mutex<Vec<Step>>,
    fix_steps: Mutex<Vec<FixStep>>,
    cancel: CancellationToken,
    state_file: PathBuf,
    captured: Mutex<Option<BuildState>>,
    generate_calls: AtomicUsize,
    fix_calls: AtomicUsize,
}

impl ScriptedCoder {
    fn new(steps: &[Step], cancel: &CancellationToken, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.to_vec()),
            fix_steps: Mutex::new(Vec::new()),
            cancel: cancel.clone(),
            state_file: config.state_file.clone(),
            captured: Mutex::new(None),
            generate_calls: AtomicUsize::new(0),
            fix_calls: AtomicUsize::new(0),
        })
    }

    fn writing(cancel: &CancellationToken, config: &Config) -> Arc<Self> {
        Self::new(&[], cancel, config)
    }

    fn script_fixes(&self, steps: &[FixStep]) {
        self.fix_steps.lock().unwrap().extend_from_slice(steps);
    }
}

fn file_blocks(files: &[String], marker: &str) -> String {
    files
        .iter()
        .map(|path| format!("```file:{}\n# {}\nprint('{}')\n```\n", path, marker, path))
        .collect()
}

#[async_trait]
impl Generator for ScriptedCoder {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.is_empty() { Step::Write } else { steps.remove(0) }
        };
        match step {
            Step::Write => Ok(file_blocks(&request.files, "generated")),
            Step::Fail => anyhow::bail!("backend exploded"),
            Step::Cancel => {
                self.cancel.cancel();
                std::future::pending().await
            }
            Step::Capture => {
                let state = StateStore::new(self.state_file.clone()).load()?;
                *self.captured.lock().unwrap() = Some(state);
                Ok(file_blocks(&request.files, "generated"))
            }
            Step::Raw(response) => Ok(response.to_string()),
        }
    }

    async fn fix(&self, request: &FixRequest) -> Result<String> {
        self.fix_calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.fix_steps.lock().unwrap();
            if steps.is_empty() {
                FixStep::Clean
            } else {
                steps.remove(0)
            }
        };
        match step {
            FixStep::Clean => Ok(file_blocks(&[request.path.clone()], "fixed")),
            FixStep::Fail => anyhow::bail!("fix backend unavailable"),
            FixStep::Cancel => {
                self.cancel.cancel();
                std::future::pending().await
            }
            FixStep::Raw(response) => Ok(response.to_string()),
        }
    }
}

struct ScriptedReviewer {
    verdict: ReviewVerdict,
    reviewed: Mutex<Vec<String>>,
    /// Deleted while the review is in flight
    remove_on_review: Option<PathBuf>,
}

impl ScriptedReviewer {
    fn new(passed: bool, issues: Vec<ReviewIssue>) -> Arc<Self> {
        Arc::new(Self {
            verdict: ReviewVerdict { passed, issues },
            reviewed: Mutex::new(Vec::new()),
            remove_on_review: None,
        })
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewVerdict> {
        *self.reviewed.lock().unwrap() = request.files.keys().cloned().collect();
        if let Some(ref path) = self.remove_on_review {
            fs::remove_file(path)?;
        }
        Ok(self.verdict.clone())
    }
}

// =========================================
// Helpers
// =========================================

fn project(spec: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let config = Config::with_settings(dir.path().to_path_buf(), BuildsmithToml::default(), false);
    config.ensure_directories().unwrap();
    fs::write(&config.spec_file, spec).unwrap();
    fs::write(&config.rules_file, "# Build Rules\n- Keep it simple\n").unwrap();
    (dir, config)
}

fn orchestrator(
    config: &Config,
    planner: Arc<FixedPlanner>,
    coder: Arc<ScriptedCoder>,
    reviewer: Option<Arc<ScriptedReviewer>>,
) -> BuildOrchestrator {
    let collaborators = Collaborators {
        planner,
        generator: coder,
        reviewer: reviewer.map(|r| r as Arc<dyn Reviewer>),
    };
    BuildOrchestrator::new(config.clone(), collaborators).unwrap()
}

fn files_under(root: &Path) -> BTreeSet<String> {
    walk(root, root)
}

fn walk(root: &Path, dir: &Path) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(walk(root, &path));
        } else {
            let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            found.insert(rel);
        }
    }
    found
}

// =========================================
// Task failure isolation
// =========================================

#[tokio::test]
async fn test_failed_task_does_not_abort_build() {
    let (_dir, config) = project("# Todo app\nA list of tasks.");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::new(&[Step::Write, Step::Fail, Step::Capture], &cancel, &config);
    let mut orch = orchestrator(&config, FixedPlanner::new("mod", 3), coder.clone(), None);

    orch.run(None, &cancel).await.unwrap();

    // State as persisted while task 3 was in flight
    let mid = coder.captured.lock().unwrap().clone().unwrap();
    assert_eq!(mid.status, BuildStatus::Building);
    assert_eq!(mid.tasks[0].status, TaskStatus::Completed);
    assert_eq!(mid.tasks[1].status, TaskStatus::Failed);
    assert!(mid.tasks[1].error.as_deref().unwrap().contains("backend exploded"));
    assert_eq!(mid.tasks[2].status, TaskStatus::InProgress);
    assert_eq!(mid.current_task_index, 1);
    assert_eq!(mid.errors.len(), 1);

    let state = orch.state();
    assert_eq!(state.status, BuildStatus::Completed);
    assert!(state.completed_at.is_some());
    assert_eq!(state.tasks[2].status, TaskStatus::Completed);
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].starts_with("Task 'mod 2' failed"));
    assert_eq!(state.files_written, vec!["src/mod_1.py", "src/mod_3.py"]);

    let persisted = StateStore::new(config.state_file.clone()).load().unwrap();
    assert_eq!(&persisted, state);
}

#[tokio::test]
async fn test_at_most_one_task_in_progress_when_persisted() {
    let (_dir, config) = project("# App");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::new(&[Step::Write, Step::Capture], &cancel, &config);
    let mut orch = orchestrator(&config, FixedPlanner::new("m", 3), coder.clone(), None);

    orch.run(None, &cancel).await.unwrap();

    let mid = coder.captured.lock().unwrap().clone().unwrap();
    assert_eq!(mid.in_progress_count(), 1);
    assert_eq!(mid.current_task_index, 1);
    assert_eq!(mid.tasks[2].status, TaskStatus::Pending);
}

// =========================================
// Cancellation and resume
// =========================================

#[tokio::test]
async fn test_cancel_reverts_task_and_resume_finishes_same_files() {
    let (dir, config) = project("# App\nThree modules.");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::new(&[Step::Write, Step::Cancel], &cancel, &config);
    let planner = FixedPlanner::new("mod", 3);
    let mut orch = orchestrator(&config, planner.clone(), coder, None);

    let err = orch.run(None, &cancel).await.unwrap_err();
    assert!(BuildError::is_cancellation(&err));

    let paused = StateStore::new(config.state_file.clone()).load().unwrap();
    let build_id = paused.build_id.clone();
    assert_eq!(paused.status, BuildStatus::Building);
    assert_eq!(paused.tasks[0].status, TaskStatus::Completed);
    assert_eq!(paused.tasks[1].status, TaskStatus::Pending);
    assert!(paused.tasks[1].started_at.is_none());
    assert_eq!(paused.tasks[2].status, TaskStatus::Pending);
    assert_eq!(paused.current_task_index, 1);
    assert!(paused.errors.is_empty());

    // Resume with a fresh process: no re-planning, remaining tasks only
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::writing(&cancel, &config);
    let mut orch = orchestrator(&config, planner.clone(), coder.clone(), None);
    orch.run(None, &cancel).await.unwrap();

    assert_eq!(planner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(coder.generate_calls.load(Ordering::SeqCst), 2);
    let state = orch.state();
    assert_eq!(state.build_id, build_id);
    assert_eq!(state.status, BuildStatus::Completed);
    assert!(state.tasks.iter().all(|t| t.status == TaskStatus::Completed));

    // Same files as a build that was never interrupted
    let (clean_dir, clean_config) = project("# App\nThree modules.");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::writing(&cancel, &clean_config);
    let mut clean = orchestrator(&clean_config, FixedPlanner::new("mod", 3), coder, None);
    clean.run(None, &cancel).await.unwrap();

    let resumed = files_under(&dir.path().join("src"));
    assert_eq!(resumed, files_under(&clean_dir.path().join("src")));
    assert_eq!(resumed.len(), 3);
    assert_eq!(state.files_written, clean.state().files_written);
}

#[tokio::test]
async fn test_changed_spec_starts_fresh_build() {
    let (_dir, config) = project("# App v1");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::new(&[Step::Cancel], &cancel, &config);
    let mut orch = orchestrator(&config, FixedPlanner::new("old", 2), coder, None);
    assert!(orch.run(None, &cancel).await.is_err());
    let stale = StateStore::new(config.state_file.clone()).load().unwrap();
    assert_eq!(stale.tasks.len(), 2);

    fs::write(&config.spec_file, "# App v2\nNow with accounts.").unwrap();
    let cancel = CancellationToken::new();
    let planner = FixedPlanner::new("new", 1);
    let coder = ScriptedCoder::writing(&cancel, &config);
    let mut orch = orchestrator(&config, planner.clone(), coder, None);
    orch.run(None, &cancel).await.unwrap();

    let state = orch.state();
    assert_ne!(state.build_id, stale.build_id);
    assert_ne!(state.spec_hash, stale.spec_hash);
    assert_eq!(planner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.tasks.len(), 1);
    assert_eq!(state.tasks[0].name, "new 1");
    assert_eq!(state.files_written, vec!["src/new_1.py"]);
}

#[tokio::test]
async fn test_completed_build_is_not_resumed() {
    let (_dir, config) = project("# App");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::writing(&cancel, &config);
    let planner = FixedPlanner::new("m", 1);
    let mut orch = orchestrator(&config, planner.clone(), coder.clone(), None);
    orch.run(None, &cancel).await.unwrap();
    let first_id = orch.state().build_id.clone();

    let mut again = orchestrator(&config, planner.clone(), coder, None);
    again.run(None, &cancel).await.unwrap();

    assert_ne!(again.state().build_id, first_id);
    assert_eq!(planner.calls.load(Ordering::SeqCst), 2);
}

// =========================================
// Firewall
// =========================================

#[tokio::test]
async fn test_traversal_candidate_denied_and_audited() {
    let (dir, config) = project("# App");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::new(
        &[Step::Raw(
            "```file:src/ok.py\nok = True\n```\n```file:../../etc/passwd\nroot::0:0::/:/bin/sh\n```",
        )],
        &cancel,
        &config,
    );
    let mut orch = orchestrator(&config, FixedPlanner::new("m", 1), coder, None);
    orch.run(None, &cancel).await.unwrap();

    let state = orch.state();
    assert_eq!(state.tasks[0].status, TaskStatus::Completed);
    assert_eq!(state.tasks[0].files_written, vec!["src/ok.py"]);
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("../../etc/passwd"));
    assert_eq!(files_under(&dir.path().join("src")).len(), 1);

    let records = AuditLog::new(config.audit_log.clone()).records().unwrap();
    let denied: Vec<_> = records
        .iter()
        .filter(|r| r.action == AuditAction::Denied)
        .collect();
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].target, "../../etc/passwd");
    assert!(
        records
            .iter()
            .any(|r| r.action == AuditAction::Permitted && r.target == "src/ok.py")
    );
}

#[tokio::test]
async fn test_malicious_content_never_written() {
    let (dir, config) = project("# App");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::new(
        &[Step::Raw(
            "```file:src/setup.py\nimport os\nos.system(\"rm -rf ~\")\n```",
        )],
        &cancel,
        &config,
    );
    let mut orch = orchestrator(&config, FixedPlanner::new("m", 1), coder, None);
    orch.run(None, &cancel).await.unwrap();

    assert!(orch.state().files_written.is_empty());
    assert!(orch.state().errors[0].contains("MALICIOUS_CONTENT_PATTERN"));
    assert!(!dir.path().join("src/setup.py").exists());
}

// =========================================
// Review
// =========================================

fn issue(file: &str, severity: Severity, message: &str) -> ReviewIssue {
    ReviewIssue {
        file: file.to_string(),
        severity,
        message: message.to_string(),
    }
}

#[tokio::test]
async fn test_review_fixes_each_error_once() {
    let (dir, config) = project("# App");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::writing(&cancel, &config);
    let reviewer = ScriptedReviewer::new(
        false,
        vec![
            issue("src/m_1.py", Severity::Error, "undefined name"),
            issue("src/m_2.py", Severity::Warning, "missing docstring"),
        ],
    );
    let mut orch = orchestrator(
        &config,
        FixedPlanner::new("m", 2),
        coder.clone(),
        Some(reviewer.clone()),
    );
    orch.run(None, &cancel).await.unwrap();

    assert_eq!(coder.fix_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *reviewer.reviewed.lock().unwrap(),
        vec!["src/m_1.py", "src/m_2.py"]
    );
    let fixed = fs::read_to_string(dir.path().join("src/m_1.py")).unwrap();
    assert!(fixed.starts_with("# fixed"));
    let untouched = fs::read_to_string(dir.path().join("src/m_2.py")).unwrap();
    assert!(untouched.starts_with("# generated"));

    let report = ReviewReport::load(&config.review_file).unwrap();
    assert!(!report.passed);
    assert_eq!(report.build_id, orch.state().build_id);
    assert_eq!(report.issues.len(), 2);
    assert_eq!(report.fixes.len(), 1);
    assert_eq!(report.fixes[0].outcome, FixOutcome::Applied);
    assert_eq!(orch.state().status, BuildStatus::Completed);
}

#[tokio::test]
async fn test_review_ignores_untracked_files() {
    let (_dir, config) = project("# App");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::writing(&cancel, &config);
    let reviewer = ScriptedReviewer::new(
        false,
        vec![issue("src/elsewhere.py", Severity::Error, "broken import")],
    );
    let mut orch = orchestrator(
        &config,
        FixedPlanner::new("m", 1),
        coder.clone(),
        Some(reviewer),
    );
    orch.run(None, &cancel).await.unwrap();

    assert_eq!(coder.fix_calls.load(Ordering::SeqCst), 0);
    let report = ReviewReport::load(&config.review_file).unwrap();
    assert_eq!(report.fixes[0].outcome, FixOutcome::Untracked);
}

#[tokio::test]
async fn test_review_disabled_by_setting() {
    let (_dir, mut config) = project("# App");
    config.settings.build.review = false;
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::writing(&cancel, &config);
    let reviewer = ScriptedReviewer::new(true, Vec::new());
    let mut orch = orchestrator(&config, FixedPlanner::new("m", 1), coder, Some(reviewer.clone()));
    orch.run(None, &cancel).await.unwrap();

    assert!(reviewer.reviewed.lock().unwrap().is_empty());
    assert!(!config.review_file.exists());
}

/// One-task build whose review flags `src/m_1.py` as an error.
fn review_with_one_error(
    config: &Config,
    fixes: &[FixStep],
) -> (BuildOrchestrator, Arc<ScriptedCoder>, CancellationToken) {
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::writing(&cancel, config);
    coder.script_fixes(fixes);
    let reviewer = ScriptedReviewer::new(
        false,
        vec![issue("src/m_1.py", Severity::Error, "unsafe input handling")],
    );
    let orch = orchestrator(config, FixedPlanner::new("m", 1), coder.clone(), Some(reviewer));
    (orch, coder, cancel)
}

#[tokio::test]
async fn test_review_fix_denied_by_firewall() {
    let (dir, config) = project("# App");
    let (mut orch, coder, cancel) =
        review_with_one_error(&config, &[FixStep::Raw("```file:src/m_1.py\neval(x)\n```")]);
    orch.run(None, &cancel).await.unwrap();

    assert_eq!(coder.fix_calls.load(Ordering::SeqCst), 1);
    let content = fs::read_to_string(dir.path().join("src/m_1.py")).unwrap();
    assert!(content.starts_with("# generated"));
    assert!(!content.contains("eval("));

    let state = orch.state();
    assert_eq!(state.status, BuildStatus::Completed);
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].starts_with("Firewall blocked 'src/m_1.py'"));
    assert!(state.errors[0].contains("MALICIOUS_CONTENT_PATTERN"));

    let report = ReviewReport::load(&config.review_file).unwrap();
    assert_eq!(report.fixes[0].outcome, FixOutcome::Denied);
    let denied = AuditLog::new(config.audit_log.clone())
        .records()
        .unwrap()
        .into_iter()
        .filter(|r| r.action == AuditAction::Denied)
        .count();
    assert_eq!(denied, 1);
}

#[tokio::test]
async fn test_review_fix_for_other_file_is_not_written() {
    let (dir, config) = project("# App");
    let (mut orch, _coder, cancel) =
        review_with_one_error(&config, &[FixStep::Raw("```file:src/other.py\nx = 2\n```")]);
    orch.run(None, &cancel).await.unwrap();

    assert!(!dir.path().join("src/other.py").exists());
    let content = fs::read_to_string(dir.path().join("src/m_1.py")).unwrap();
    assert!(content.starts_with("# generated"));

    let state = orch.state();
    assert_eq!(state.files_written, vec!["src/m_1.py"]);
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("did not return a block"));
    let report = ReviewReport::load(&config.review_file).unwrap();
    assert_eq!(report.fixes[0].outcome, FixOutcome::NoFileBlock);
}

#[tokio::test]
async fn test_review_fix_failure_does_not_abort_build() {
    let (_dir, config) = project("# App");
    let (mut orch, _coder, cancel) = review_with_one_error(&config, &[FixStep::Fail]);
    orch.run(None, &cancel).await.unwrap();

    let state = orch.state();
    assert_eq!(state.status, BuildStatus::Completed);
    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("fix backend unavailable"));
    let report = ReviewReport::load(&config.review_file).unwrap();
    assert_eq!(report.fixes[0].outcome, FixOutcome::Failed);
}

#[tokio::test]
async fn test_review_cancellation_propagates() {
    let (_dir, config) = project("# App");
    let (mut orch, _coder, cancel) = review_with_one_error(&config, &[FixStep::Cancel]);

    let err = orch.run(None, &cancel).await.unwrap_err();
    assert!(BuildError::is_cancellation(&err));

    let persisted = StateStore::new(config.state_file.clone()).load().unwrap();
    assert_eq!(persisted.status, BuildStatus::Reviewing);
    assert!(persisted.completed_at.is_none());
    assert!(persisted.tasks.iter().all(|t| t.status == TaskStatus::Completed));
    assert!(!config.review_file.exists());
}

#[tokio::test]
async fn test_review_fix_of_unreadable_file_fails() {
    let (_dir, config) = project("# App");
    let cancel = CancellationToken::new();
    let coder = ScriptedCoder::writing(&cancel, &config);
    let reviewer = Arc::new(ScriptedReviewer {
        verdict: ReviewVerdict {
            passed: false,
            issues: vec![issue("src/m_1.py", Severity::Error, "syntax error")],
        },
        reviewed: Mutex::new(Vec::new()),
        remove_on_review: Some(config.project_dir.join("src/m_1.py")),
    });
    let mut orch = orchestrator(
        &config,
        FixedPlanner::new("m", 1),
        coder.clone(),
        Some(reviewer),
    );
    orch.run(None, &cancel).await.unwrap();

    assert_eq!(coder.fix_calls.load(Ordering::SeqCst), 0);
    assert!(orch.state().errors[0].contains("no longer readable"));
    let report = ReviewReport::load(&config.review_file).unwrap();
    assert_eq!(report.fixes[0].outcome, FixOutcome::Failed);
}
