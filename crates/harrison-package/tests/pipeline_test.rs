use chrono::{DateTime, TimeZone, Utc};
use harrison_core::{PipelineConfig, ResolveFrom};
use harrison_package::{
    BuildContext, BuildStep, NoBuild, Pipeline, PipelineError, ShellBuild,
};
use harrison_remote::{CommandOutput, RemoteError, RemoteExecutor};
use mockall::mock;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

mock! {
    Executor {}

    impl RemoteExecutor for Executor {
        async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError>;
        async fn ensure_dir(&self, path: &str) -> Result<(), RemoteError>;
        async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), RemoteError>;
    }
}

type Log = Arc<Mutex<Vec<String>>>;

const BASE: &str = "~/.harrison/shop/package";
const REMOTE_ARCHIVE: &str = "/home/deploy/.harrison/shop/package/20240101000000-abc1234.tar.gz";

fn new_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn config(tmp: &Path) -> PipelineConfig {
    PipelineConfig {
        host: "build.example.com".to_owned(),
        commit_ref: "main".to_owned(),
        purge: false,
        local_package_dir: tmp.join("pkg"),
        remote_work_dir: "~/.harrison".to_owned(),
        exclude_patterns: vec![".git".to_owned()],
        project_name: "shop".to_owned(),
        repository_url: "git@example.com:acme/shop.git".to_owned(),
        resolve_from: ResolveFrom::Remote,
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_owned(),
        stderr: String::new(),
        exit_code: 0,
    }
}

fn failed(stderr: &str, exit_code: i32) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_owned(),
        exit_code,
    }
}

/// Canned build host: resolves every ref to `sha`, answers `readlink`, and
/// fails any command containing `fail_on`. Every call is recorded in `log`.
fn scripted_host(log: &Log, sha: &'static str, fail_on: Option<&'static str>) -> MockExecutor {
    let mut mock = MockExecutor::new();

    let exec_log = Arc::clone(log);
    mock.expect_exec().returning(move |command| {
        exec_log.lock().unwrap().push(command.to_owned());
        if fail_on.is_some_and(|f| command.contains(f)) {
            return Ok(failed("fatal: simulated failure", 128));
        }
        if command.contains("git rev-parse") {
            Ok(ok(&format!("{sha}\n")))
        } else if command.contains("readlink -m") {
            Ok(ok(&format!("{REMOTE_ARCHIVE}\n")))
        } else {
            Ok(ok(""))
        }
    });

    let dir_log = Arc::clone(log);
    mock.expect_ensure_dir().returning(move |path| {
        dir_log.lock().unwrap().push(format!("ensure_dir {path}"));
        Ok(())
    });

    let download_log = Arc::clone(log);
    mock.expect_download().returning(move |remote, local| {
        download_log
            .lock()
            .unwrap()
            .push(format!("download {remote} -> {}", local.display()));
        Ok(())
    });

    mock
}

fn recorded(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ── Happy path ──

#[tokio::test]
async fn run_issues_steps_in_order() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(config(tmp.path()), scripted_host(&log, "abc1234", None));

    let outcome = pipeline.run_at(&NoBuild, new_year()).await.unwrap();

    let local = tmp.path().join("pkg/20240101000000-abc1234.tar.gz");
    assert_eq!(
        recorded(&log),
        vec![
            format!(
                "cd {BASE}/cached && git fetch origin --prune --quiet && \
                 {{ git rev-parse --verify --quiet --short 'origin/main^{{commit}}' || \
                 git rev-parse --verify --short 'main^{{commit}}' ; }}"
            ),
            format!("ensure_dir {BASE}"),
            format!(
                "cd {BASE} && if [ -d cached ] ; then cd cached && git fetch origin --prune ; \
                 else git clone git@example.com:acme/shop.git cached ; fi"
            ),
            format!(
                "cd {BASE} && cd cached && git checkout --quiet --force --detach abc1234 && \
                 git reset --hard abc1234 && git clean -f -d -x"
            ),
            format!("cd {BASE} && rm -rf abc1234 && cp -a cached abc1234"),
            format!(
                "cd {BASE} && rm -f 20240101000000-abc1234.tar.gz && cd abc1234 && \
                 tar --exclude '.git' -czf ../20240101000000-abc1234.tar.gz ."
            ),
            format!("cd {BASE} && readlink -m 20240101000000-abc1234.tar.gz"),
            format!("download {REMOTE_ARCHIVE} -> {}", local.display()),
        ]
    );

    assert_eq!(outcome.commit.short_sha(), "abc1234");
    assert_eq!(outcome.artifact.name(), "20240101000000-abc1234");
    assert_eq!(outcome.local_path, local);
    assert_eq!(outcome.remote_path, REMOTE_ARCHIVE);
    assert!(!outcome.purged);
}

#[tokio::test]
async fn run_creates_local_package_dir() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let mut cfg = config(tmp.path());
    cfg.local_package_dir = tmp.path().join("deep/nested/pkg");
    let pipeline = Pipeline::new(cfg, scripted_host(&log, "abc1234", None));

    pipeline.run_at(&NoBuild, new_year()).await.unwrap();

    assert!(tmp.path().join("deep/nested/pkg").is_dir());
}

#[tokio::test]
async fn without_purge_package_dir_is_left_alone() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(config(tmp.path()), scripted_host(&log, "abc1234", None));

    pipeline.run_at(&NoBuild, new_year()).await.unwrap();

    assert!(!recorded(&log).iter().any(|c| c.contains("rm -rf package")));
}

#[tokio::test]
async fn purge_removes_package_dir_last() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let mut cfg = config(tmp.path());
    cfg.purge = true;
    let pipeline = Pipeline::new(cfg, scripted_host(&log, "abc1234", None));

    let outcome = pipeline.run_at(&NoBuild, new_year()).await.unwrap();

    assert!(outcome.purged);
    let calls = recorded(&log);
    assert_eq!(
        calls.last().unwrap(),
        &format!("cd {BASE} && cd .. && rm -rf package")
    );
    // purge happens only after the download
    let download = calls.iter().position(|c| c.starts_with("download ")).unwrap();
    assert_eq!(download, calls.len() - 2);
}

// ── Excludes ──

#[tokio::test]
async fn no_exclude_patterns_no_exclude_flags() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let mut cfg = config(tmp.path());
    cfg.exclude_patterns = vec![];
    let pipeline = Pipeline::new(cfg, scripted_host(&log, "abc1234", None));

    pipeline.run_at(&NoBuild, new_year()).await.unwrap();

    let tar = recorded(&log)
        .into_iter()
        .find(|c| c.contains("tar "))
        .unwrap();
    assert!(!tar.contains("--exclude"));
}

#[tokio::test]
async fn exclude_patterns_render_one_flag_each_in_order() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let mut cfg = config(tmp.path());
    cfg.exclude_patterns = vec!["*.log".to_owned(), "tmp".to_owned()];
    let pipeline = Pipeline::new(cfg, scripted_host(&log, "abc1234", None));

    pipeline.run_at(&NoBuild, new_year()).await.unwrap();

    let tar = recorded(&log)
        .into_iter()
        .find(|c| c.contains("tar "))
        .unwrap();
    assert_eq!(tar.matches("--exclude").count(), 2);
    assert!(tar.contains("tar --exclude '*.log' --exclude 'tmp' -czf"));
}

// ── Build step ──

#[tokio::test]
async fn shell_build_runs_in_commit_dir_between_copy_and_archive() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(config(tmp.path()), scripted_host(&log, "abc1234", None));
    let build = ShellBuild::new(vec!["npm ci".to_owned(), "npm run build".to_owned()]);

    pipeline.run_at(&build, new_year()).await.unwrap();

    let calls = recorded(&log);
    let copy = calls.iter().position(|c| c.contains("cp -a cached")).unwrap();
    let tar = calls.iter().position(|c| c.contains("tar ")).unwrap();
    assert_eq!(calls[copy + 1], format!("cd {BASE}/abc1234 && npm ci"));
    assert_eq!(calls[copy + 2], format!("cd {BASE}/abc1234 && npm run build"));
    assert_eq!(tar, copy + 3);
}

#[tokio::test]
async fn failing_build_aborts_before_archive() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(
        config(tmp.path()),
        scripted_host(&log, "abc1234", Some("npm ci")),
    );
    let build = ShellBuild::new(vec!["npm ci".to_owned(), "npm run build".to_owned()]);

    let err = pipeline.run_at(&build, new_year()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::RemoteCommand {
            exit_status: 128,
            ..
        }
    ));
    assert_eq!(err.command(), Some(format!("cd {BASE}/abc1234 && npm ci").as_str()));
    let calls = recorded(&log);
    assert!(!calls.iter().any(|c| c.contains("npm run build")));
    assert!(!calls.iter().any(|c| c.contains("tar ")));
    assert!(!calls.iter().any(|c| c.starts_with("download ")));
}

/// Custom build step that inspects its context.
struct RecordingBuild {
    seen: Mutex<Option<(String, String)>>,
}

impl BuildStep for RecordingBuild {
    async fn build<E: RemoteExecutor>(
        &self,
        ctx: &BuildContext<'_, E>,
    ) -> Result<(), PipelineError> {
        let output = ctx.run("git log -1 --format=%h").await?;
        assert!(output.success());
        *self.seen.lock().unwrap() = Some((ctx.build_dir(), ctx.commit().to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn custom_build_step_sees_commit_and_build_dir() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(config(tmp.path()), scripted_host(&log, "abc1234", None));
    let build = RecordingBuild {
        seen: Mutex::new(None),
    };

    pipeline.run_at(&build, new_year()).await.unwrap();

    let seen = build.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.0, format!("{BASE}/abc1234"));
    assert_eq!(seen.1, "abc1234");
}

// ── Failures ──

#[tokio::test]
async fn checkout_failure_stops_before_archive_and_download() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(
        config(tmp.path()),
        scripted_host(&log, "abc1234", Some("git reset --hard")),
    );

    let err = pipeline.run_at(&NoBuild, new_year()).await.unwrap_err();

    match &err {
        PipelineError::RemoteCommand {
            host,
            command,
            exit_status,
            output,
        } => {
            assert_eq!(host, "build.example.com");
            assert!(command.contains("git reset --hard abc1234"));
            assert_eq!(*exit_status, 128);
            assert_eq!(output, "fatal: simulated failure");
        }
        other => panic!("expected RemoteCommand, got {other:?}"),
    }
    assert!(err.to_string().contains("git reset --hard abc1234"));

    let calls = recorded(&log);
    assert!(!calls.iter().any(|c| c.contains("cp -a")));
    assert!(!calls.iter().any(|c| c.contains("tar ")));
    assert!(!calls.iter().any(|c| c.starts_with("download ")));
}

#[tokio::test]
async fn failure_before_purge_skips_purge() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let mut cfg = config(tmp.path());
    cfg.purge = true;
    let pipeline = Pipeline::new(cfg, scripted_host(&log, "abc1234", Some("tar ")));

    let result = pipeline.run_at(&NoBuild, new_year()).await;

    assert!(result.is_err());
    assert!(!recorded(&log).iter().any(|c| c.contains("rm -rf package")));
}

#[tokio::test]
async fn unresolvable_ref_fails_before_touching_anything() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(
        config(tmp.path()),
        scripted_host(&log, "abc1234", Some("git rev-parse")),
    );

    let err = pipeline.run_at(&NoBuild, new_year()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::CommitResolution { ref commit_ref, .. } if commit_ref == "main"
    ));
    // the cache exists, so no first-run hint
    assert!(!err.to_string().contains("hint:"));
    let calls = recorded(&log);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], format!("test -d {BASE}/cached"));
    assert!(!tmp.path().join("pkg").exists());
}

#[tokio::test]
async fn resolution_without_cache_suggests_local_resolution() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|command| command.contains("git rev-parse"))
        .times(1)
        .returning(|_| Ok(failed("sh: cd: can't cd to cached", 2)));
    mock.expect_exec()
        .withf(|command| command.starts_with("test -d "))
        .times(1)
        .returning(|_| Ok(failed("", 1)));
    mock.expect_ensure_dir().never();
    mock.expect_download().never();

    let pipeline = Pipeline::new(config(tmp.path()), mock);
    let err = pipeline.run_at(&NoBuild, new_year()).await.unwrap_err();

    assert!(matches!(err, PipelineError::CommitResolution { .. }));
    let message = err.to_string();
    assert!(message.contains("can't cd to cached"));
    assert!(message.contains(&format!("hint: {BASE}/cached has not been cloned yet")));
    assert!(message.contains("resolve = \"local\""));
}

#[tokio::test]
async fn garbage_rev_parse_output_is_resolution_error() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|command| command.contains("git rev-parse"))
        .times(1)
        .returning(|_| Ok(ok("main\n")));
    mock.expect_ensure_dir().never();
    mock.expect_download().never();

    let pipeline = Pipeline::new(config(tmp.path()), mock);
    let err = pipeline.run_at(&NoBuild, new_year()).await.unwrap_err();

    assert!(matches!(err, PipelineError::CommitResolution { .. }));
}

#[tokio::test]
async fn empty_commit_ref_is_rejected_without_remote_calls() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    mock.expect_exec().never();
    mock.expect_ensure_dir().never();
    mock.expect_download().never();

    let mut cfg = config(tmp.path());
    cfg.commit_ref = " ".to_owned();
    let pipeline = Pipeline::new(cfg, mock);

    let err = pipeline.run_at(&NoBuild, new_year()).await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_| {
        Err(RemoteError::Spawn {
            program: "ssh",
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    });

    let pipeline = Pipeline::new(config(tmp.path()), mock);
    let err = pipeline.run_at(&NoBuild, new_year()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transport { ref host, .. } if host == "build.example.com"
    ));
}

#[tokio::test]
async fn remote_dir_creation_failure_names_mkdir_command() {
    let tmp = TempDir::new().unwrap();
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|command| command.contains("git rev-parse"))
        .returning(|_| Ok(ok("abc1234\n")));
    mock.expect_ensure_dir().times(1).returning(|path| {
        Err(RemoteError::EnsureDir {
            path: path.to_owned(),
            exit_code: 1,
            stderr: "Permission denied".to_owned(),
        })
    });
    mock.expect_download().never();

    let pipeline = Pipeline::new(config(tmp.path()), mock);
    let err = pipeline.run_at(&NoBuild, new_year()).await.unwrap_err();

    match &err {
        PipelineError::RemoteCommand {
            host,
            command,
            exit_status,
            output,
        } => {
            assert_eq!(host, "build.example.com");
            assert_eq!(command, &format!("mkdir -p {BASE}"));
            assert_eq!(*exit_status, 1);
            assert_eq!(output, "Permission denied");
        }
        other => panic!("expected RemoteCommand, got {other:?}"),
    }
    assert!(!err.to_string().contains("could not reach"));
}

#[tokio::test]
async fn download_failure_is_transfer_error() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let mut mock = MockExecutor::new();
    let exec_log = Arc::clone(&log);
    mock.expect_exec().returning(move |command| {
        exec_log.lock().unwrap().push(command.to_owned());
        if command.contains("git rev-parse") {
            Ok(ok("abc1234\n"))
        } else if command.contains("readlink -m") {
            Ok(ok(&format!("{REMOTE_ARCHIVE}\n")))
        } else {
            Ok(ok(""))
        }
    });
    mock.expect_ensure_dir().returning(|_| Ok(()));
    mock.expect_download().times(1).returning(|remote, local| {
        Err(RemoteError::Download {
            remote_path: remote.to_owned(),
            local_path: local.to_path_buf(),
            stderr: "scp: connection lost".to_owned(),
        })
    });

    let mut cfg = config(tmp.path());
    cfg.purge = true;
    let pipeline = Pipeline::new(cfg, mock);
    let err = pipeline.run_at(&NoBuild, new_year()).await.unwrap_err();

    match err {
        PipelineError::Transfer {
            remote_path,
            local_path,
            ..
        } => {
            assert_eq!(remote_path, REMOTE_ARCHIVE);
            assert_eq!(
                local_path,
                tmp.path().join("pkg/20240101000000-abc1234.tar.gz")
            );
        }
        other => panic!("expected Transfer, got {other:?}"),
    }
    assert!(!recorded(&log).iter().any(|c| c.contains("rm -rf package")));
}

// ── Naming ──

#[tokio::test]
async fn same_ref_twice_embeds_same_sha() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(config(tmp.path()), scripted_host(&log, "abc1234", None));

    let first = pipeline.run_at(&NoBuild, new_year()).await.unwrap();
    let later = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
    let second = pipeline.run_at(&NoBuild, later).await.unwrap();

    assert_eq!(first.commit, second.commit);
    assert!(first.artifact.name().ends_with("-abc1234"));
    assert!(second.artifact.name().ends_with("-abc1234"));
    assert_ne!(first.local_path, second.local_path);
}

#[tokio::test]
async fn same_second_different_sha_do_not_collide() {
    let tmp = TempDir::new().unwrap();
    let log_a = Log::default();
    let log_b = Log::default();

    let a = Pipeline::new(config(tmp.path()), scripted_host(&log_a, "abc1234", None))
        .run_at(&NoBuild, new_year())
        .await
        .unwrap();
    let b = Pipeline::new(config(tmp.path()), scripted_host(&log_b, "def5678", None))
        .run_at(&NoBuild, new_year())
        .await
        .unwrap();

    assert_ne!(a.local_path, b.local_path);
    assert_eq!(
        b.local_path,
        PathBuf::from(tmp.path()).join("pkg/20240101000000-def5678.tar.gz")
    );
}

#[tokio::test]
async fn archive_and_download_share_one_name() {
    let tmp = TempDir::new().unwrap();
    let log = Log::default();
    let pipeline = Pipeline::new(config(tmp.path()), scripted_host(&log, "abc1234", None));

    let outcome = pipeline.run_at(&NoBuild, new_year()).await.unwrap();

    let file_name = outcome.artifact.file_name();
    let calls = recorded(&log);
    let tar = calls.iter().find(|c| c.contains("tar ")).unwrap();
    let readlink = calls.iter().find(|c| c.contains("readlink")).unwrap();
    assert!(tar.contains(&format!("../{file_name}")));
    assert!(readlink.ends_with(&file_name));
    assert!(outcome.local_path.ends_with(&file_name));
}
