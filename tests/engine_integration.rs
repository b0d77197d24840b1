//! End-to-end engine scenarios against mock collaborators.
//!
//! Each test wires a full environment from the public API: a scripted
//! Git executor, an in-memory filesystem, a mock audit service, a mock
//! GitHub client, and a recording reporter.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gitfleet::audit::{MockAudit, RepoInspection};
use gitfleet::core::state::State;
use gitfleet::core::task::TaskDefinition;
use gitfleet::engine::{
    Environment, ExecuteError, Executor, Operation, OperationError, OperationNode, RuntimeOptions,
};
use gitfleet::forge::MockGithub;
use gitfleet::fsio::MemoryFilesystem;
use gitfleet::git::{MockGit, ShellRepositoryManager};
use gitfleet::report::{codes, RecordingReporter};
use gitfleet::task::TaskOperation;

struct Wiring {
    git: MockGit,
    fs: MemoryFilesystem,
    github: MockGithub,
    reporter: RecordingReporter,
    environment: Arc<Environment>,
}

fn inspection(path: &str, owner_repo: &str) -> RepoInspection {
    RepoInspection {
        path: PathBuf::from(path),
        canonical_owner_repo: owner_repo.into(),
        final_owner_repo: owner_repo.into(),
        local_branch: "main".into(),
        remote_default_branch: "main".into(),
        remote_protocol: "ssh".into(),
        remote_url: format!("git@github.com:{owner_repo}.git"),
    }
}

fn wire(inspections: Vec<RepoInspection>) -> Wiring {
    let git = MockGit::new();
    let fs = MemoryFilesystem::new();
    let github = MockGithub::new();
    let reporter = RecordingReporter::new();
    let environment = Arc::new(
        Environment::builder()
            .git(Arc::new(git.clone()))
            .filesystem(Arc::new(fs.clone()))
            .audit(Arc::new(MockAudit::with_inspections(inspections)))
            .reporter(Arc::new(reporter.clone()))
            .repositories(Arc::new(ShellRepositoryManager::new(Arc::new(git.clone()))))
            .github(Arc::new(github.clone()))
            .build()
            .expect("all collaborators present"),
    );
    Wiring {
        git,
        fs,
        github,
        reporter,
        environment,
    }
}

fn roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/work")]
}

/// Operation that records when it ran, with an optional artificial delay.
struct Tracked {
    name: String,
    order: Arc<std::sync::Mutex<Vec<String>>>,
    delay: Option<Duration>,
    running: Arc<AtomicUsize>,
    peak_concurrency: Arc<AtomicUsize>,
}

impl Tracked {
    fn new(
        name: &str,
        order: &Arc<std::sync::Mutex<Vec<String>>>,
        delay: Option<Duration>,
        running: &Arc<AtomicUsize>,
        peak: &Arc<AtomicUsize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            order: Arc::clone(order),
            delay,
            running: Arc::clone(running),
            peak_concurrency: Arc::clone(peak),
        })
    }
}

#[async_trait]
impl Operation for Tracked {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        _environment: &Environment,
        _state: &State,
    ) -> Result<(), OperationError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrency.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.order.lock().unwrap().push(self.name.clone());
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Failing(&'static str, &'static str);

#[async_trait]
impl Operation for Failing {
    fn name(&self) -> &str {
        self.0
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        _environment: &Environment,
        _state: &State,
    ) -> Result<(), OperationError> {
        Err(OperationError::Other(anyhow::anyhow!(self.1)))
    }
}

/// Scenario 1: dependency-only staging. A -> B, A -> C; B and C run in
/// parallel after A, and execute returns only when both finished.
#[tokio::test]
async fn dependency_only_staging_runs_fan_out_in_parallel() {
    let w = wire(vec![inspection("/work/one", "octo/one")]);
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let a = Tracked::new("a", &order, None, &running, &peak);
    let b = Tracked::new("b", &order, Some(Duration::from_millis(30)), &running, &peak);
    let c = Tracked::new("c", &order, Some(Duration::from_millis(30)), &running, &peak);

    let nodes = vec![
        OperationNode::new("a", a),
        OperationNode::new("b", b).depends_on(["a"]),
        OperationNode::new("c", c).depends_on(["a"]),
    ];
    let executor = Executor::new(w.environment, nodes);
    let outcome = executor
        .execute(&CancellationToken::new(), &roots(), &RuntimeOptions::default())
        .await
        .expect("workflow succeeds");

    let order = order.lock().unwrap().clone();
    assert_eq!(order[0], "a");
    assert_eq!(order.len(), 3, "all operations completed before return");
    assert_eq!(outcome.stages.len(), 2);
    assert_eq!(outcome.stages[1].operations, vec!["b", "c"]);
    // B and C overlapped inside their stage.
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(
        w.reporter.events_with_code(codes::OPERATION_SUCCESS).len(),
        3
    );
}

/// Scenario 2: the clean-worktree guard skips a dirty repository with
/// the status carried in the event; no git mutations happen.
#[tokio::test]
async fn clean_worktree_guard_skips_dirty_repository() {
    let w = wire(vec![inspection("/work/one", "octo/one")]);
    w.git.respond("rev-parse --abbrev-ref HEAD", "main\n");
    w.git.respond("status --porcelain", " M README.md\n");

    let mut task = TaskDefinition::named("touch-readme");
    task.ensure_clean = true;
    task.files = vec![serde_json::from_str(
        r##"{"path": "README.md", "content": "# Hello\n"}"##,
    )
    .unwrap()];

    let executor = Executor::from_operations(
        w.environment,
        vec![Arc::new(TaskOperation::new(task))],
    );
    executor
        .execute(&CancellationToken::new(), &roots(), &RuntimeOptions::default())
        .await
        .expect("skips are not failures");

    let skips = w.reporter.events_with_code(codes::TASK_SKIP);
    assert_eq!(skips.len(), 1);
    assert_eq!(
        skips[0].details.get("reason"),
        Some(&"repository dirty".to_string())
    );
    assert_eq!(
        skips[0].details.get("status"),
        Some(&"M README.md".to_string())
    );
    assert_eq!(w.git.calls_matching("checkout"), 0);
    assert_eq!(w.git.calls_matching("commit"), 0);
    assert!(w.fs.writes().is_empty());
}

/// Scenario 3: an ignored-dirty pattern lets the task proceed.
#[tokio::test]
async fn ignored_dirty_pattern_passes_guard() {
    let w = wire(vec![inspection("/work/one", "octo/one")]);
    w.git.respond("rev-parse --abbrev-ref HEAD", "main\n");
    w.git.respond("status --porcelain", "?? .DS_Store\n");
    w.git.respond("rev-parse --verify --quiet main", "abc\n");

    let mut task = TaskDefinition::named("touch-readme");
    task.ensure_clean = true;
    task.safeguards.ignored_dirty_patterns = vec![".DS_Store".into()];
    task.files = vec![serde_json::from_str(
        r##"{"path": "README.md", "content": "# Hello\n"}"##,
    )
    .unwrap()];

    let executor = Executor::from_operations(
        w.environment,
        vec![Arc::new(TaskOperation::new(task))],
    );
    executor
        .execute(&CancellationToken::new(), &roots(), &RuntimeOptions::default())
        .await
        .expect("task applies");

    assert_eq!(w.reporter.events_with_code(codes::TASK_APPLY).len(), 1);
    assert_eq!(w.git.calls_matching("checkout -B"), 1);
}

/// Scenario 4: an empty push remote makes the pull-request-open variant
/// skip with the configuration hint.
#[tokio::test]
async fn missing_push_remote_skips_pull_request_open() {
    let w = wire(vec![inspection("/work/one", "octo/one")]);
    w.git.respond("rev-parse --abbrev-ref HEAD", "main\n");
    w.git.respond("rev-parse --verify --quiet main", "abc\n");

    let mut task = TaskDefinition::named("publish");
    task.files = vec![serde_json::from_str(
        r##"{"path": "README.md", "content": "# Hello\n"}"##,
    )
    .unwrap()];
    task.pull_request = Some(serde_json::from_str(r#"{"title": "Publish"}"#).unwrap());

    let executor = Executor::from_operations(
        w.environment,
        vec![Arc::new(TaskOperation::new(task))],
    );
    executor
        .execute(&CancellationToken::new(), &roots(), &RuntimeOptions::default())
        .await
        .expect("skips are not failures");

    let skips = w.reporter.events_with_code(codes::TASK_SKIP);
    assert_eq!(skips.len(), 1);
    assert_eq!(
        skips[0].details.get("reason"),
        Some(&"push remote not configured (set task.branch.push_remote)".to_string())
    );
    assert!(w.github.created_pull_requests().is_empty());
    assert_eq!(w.git.calls_matching("push"), 0);
}

/// Scenario 5: a single overwrite file whose on-disk bytes equal the
/// rendered content plans as `unchanged` and the task skips entirely.
#[tokio::test]
async fn identical_content_yields_no_changes_skip() {
    let w = wire(vec![inspection("/work/one", "octo/one")]);
    w.fs.insert("/work/one/README.md", "# Hello\n");

    let mut task = TaskDefinition::named("touch-readme");
    task.files = vec![serde_json::from_str(
        r##"{"path": "README.md", "content": "# Hello\n"}"##,
    )
    .unwrap()];

    let executor = Executor::from_operations(
        w.environment,
        vec![Arc::new(TaskOperation::new(task))],
    );
    executor
        .execute(&CancellationToken::new(), &roots(), &RuntimeOptions::default())
        .await
        .expect("skip is success");

    let skips = w.reporter.events_with_code(codes::TASK_SKIP);
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].details.get("reason"), Some(&"no changes".to_string()));
    assert!(w.fs.writes().is_empty());
    assert!(w.git.calls().is_empty());
}

/// Scenario 6: two failing operations in one stage aggregate into one
/// error with the `(and N more failures)` message and both leaves in
/// the failures list.
#[tokio::test]
async fn failure_aggregation_joins_messages() {
    let w = wire(vec![inspection("/work/one", "octo/one")]);
    let nodes = vec![
        OperationNode::new("first", Arc::new(Failing("first", "boom"))),
        OperationNode::new("second", Arc::new(Failing("second", "bang"))),
    ];
    let executor = Executor::new(w.environment, nodes);

    let err = executor
        .execute(&CancellationToken::new(), &roots(), &RuntimeOptions::default())
        .await
        .expect_err("failures must surface");

    match err {
        ExecuteError::Failures { failures, outcome } => {
            assert!(failures.to_string().ends_with("(and 1 more failures)"));
            assert_eq!(outcome.failures.len(), 2);
            let messages: Vec<_> = outcome
                .failures
                .iter()
                .map(|f| f.message.as_str())
                .collect();
            assert!(messages.iter().any(|m| m.contains("boom")));
            assert!(messages.iter().any(|m| m.contains("bang")));
        }
        other => panic!("expected Failures, got {other}"),
    }
    // Each failure reached the error stream exactly once.
    assert_eq!(w.reporter.error_lines().len(), 2);
}

/// Full happy path: file change, branch, commit, push, pull request.
#[tokio::test]
async fn full_pull_request_flow() {
    let w = wire(vec![inspection("/work/one", "octo/one")]);
    w.git.respond("rev-parse --abbrev-ref HEAD", "main\n");
    w.git.respond("rev-parse --verify --quiet main", "abc\n");
    w.git
        .respond("remote get-url origin", "git@github.com:octo/one.git\n");

    let task: TaskDefinition = serde_json::from_str(
        r#"{
            "name": "add-editorconfig",
            "branch": {"push_remote": "origin"},
            "files": [{"path": ".editorconfig", "content": "root = true\n"}],
            "pull_request": {"title": "Add editorconfig", "draft": true}
        }"#,
    )
    .unwrap();

    let executor = Executor::from_operations(
        w.environment,
        vec![Arc::new(TaskOperation::new(task))],
    );
    let outcome = executor
        .execute(&CancellationToken::new(), &roots(), &RuntimeOptions::default())
        .await
        .expect("flow succeeds");

    assert_eq!(
        w.fs.contents(std::path::Path::new("/work/one/.editorconfig")),
        Some("root = true\n".to_string())
    );
    let calls = w.git.calls();
    assert!(calls.iter().any(|c| c == "checkout -B automation/add-editorconfig main"));
    assert!(calls.iter().any(|c| c == "add .editorconfig"));
    assert!(calls
        .iter()
        .any(|c| c == "commit -m Apply task add-editorconfig"));
    assert!(calls
        .iter()
        .any(|c| c == "push --set-upstream origin automation/add-editorconfig"));

    let created = w.github.created_pull_requests();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].repository, "octo/one");
    assert_eq!(created[0].base, "main");
    assert!(created[0].draft);

    assert!(outcome.failures.is_empty());
    assert_eq!(w.reporter.events_with_code(codes::TASK_APPLY).len(), 1);
}

/// Caller-supplied variables flow into templates as seeds.
#[tokio::test]
async fn seeded_variables_render_into_templates() {
    let w = wire(vec![inspection("/work/one", "octo/one")]);
    w.git.respond("rev-parse --abbrev-ref HEAD", "main\n");
    w.git.respond("rev-parse --verify --quiet main", "abc\n");

    let task: TaskDefinition = serde_json::from_str(
        r#"{
            "name": "stamp",
            "files": [{"path": "STAMP", "content": "ticket={{ env.ticket }}\n"}]
        }"#,
    )
    .unwrap();

    let executor = Executor::from_operations(
        w.environment,
        vec![Arc::new(TaskOperation::new(task))],
    );
    let options = RuntimeOptions {
        variables: BTreeMap::from([("ticket".to_string(), "FLEET-9".to_string())]),
        ..RuntimeOptions::default()
    };
    executor
        .execute(&CancellationToken::new(), &roots(), &options)
        .await
        .expect("flow succeeds");

    assert_eq!(
        w.fs.contents(std::path::Path::new("/work/one/STAMP")),
        Some("ticket=FLEET-9\n".to_string())
    );
}

/// Repository headers appear once per run of consecutive events for the
/// same repository.
#[tokio::test]
async fn repository_headers_are_not_repeated() {
    let w = wire(vec![
        inspection("/work/one", "octo/one"),
        inspection("/work/two", "octo/two"),
    ]);
    w.git.respond("rev-parse --abbrev-ref HEAD", "main\n");
    w.git.respond("rev-parse --verify --quiet main", "abc\n");

    let task: TaskDefinition = serde_json::from_str(
        r#"{"name": "touch", "files": [{"path": "x", "content": "y\n"}]}"#,
    )
    .unwrap();

    let executor = Executor::from_operations(
        w.environment,
        vec![Arc::new(TaskOperation::new(task))],
    );
    executor
        .execute(&CancellationToken::new(), &roots(), &RuntimeOptions::default())
        .await
        .expect("flow succeeds");

    // Each repository emitted several events (plan, switch, apply) but
    // exactly one header.
    assert_eq!(w.reporter.headers().len(), 2);
}
