// ABOUTME: Integration tests for hooks system.
// ABOUTME: Tests hook discovery, execution, and environment variable passing.

use convoy::collaborators::ProcessRunner;
use convoy::hooks::{HookContext, HookPoint, HookRunner};
use convoy::mode::Mode;
use convoy::types::UnitId;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

fn create_hook(dir: &TempDir, name: &str, script: &str) {
    let hooks_dir = dir.path().join(".convoy").join("hooks");
    fs::create_dir_all(&hooks_dir).unwrap();

    let hook_path = hooks_dir.join(name);
    fs::write(&hook_path, script).unwrap();

    // Make executable
    let mut perms = fs::metadata(&hook_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&hook_path, perms).unwrap();
}

fn test_context() -> HookContext {
    HookContext {
        unit: UnitId::new("api").unwrap(),
        mode: Mode::Deploy,
        version: "1.4.0".to_string(),
        image: Some("ghcr.io/acme/api:1.4.0".to_string()),
        digest: None,
    }
}

/// Test: pre-deploy hook runs and its output is captured.
#[tokio::test]
async fn pre_deploy_hook_runs() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(
        &temp_dir,
        "pre-deploy",
        "#!/bin/sh\necho 'pre-deploy ran'\nexit 0\n",
    );

    let runner = HookRunner::new(temp_dir.path());
    assert!(runner.hook_exists(HookPoint::PreDeploy));

    let result = runner
        .run(HookPoint::PreDeploy, &test_context(), &ProcessRunner)
        .await;
    assert!(result.is_some());

    let result = result.unwrap();
    assert!(result.success);
    assert_eq!(result.exit_code, Some(0));
    assert!(result.stdout.contains("pre-deploy ran"));
}

/// Test: hook receives environment variables.
#[tokio::test]
async fn hook_receives_environment() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(
        &temp_dir,
        "pre-build",
        "#!/bin/sh\necho \"UNIT=$CONVOY_UNIT\"\necho \"MODE=$CONVOY_MODE\"\necho \"IMAGE=$CONVOY_IMAGE\"\necho \"DIGEST=${CONVOY_DIGEST:-none}\"\n",
    );

    let runner = HookRunner::new(temp_dir.path());
    let result = runner
        .run(HookPoint::PreBuild, &test_context(), &ProcessRunner)
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.stdout.contains("UNIT=api"));
    assert!(result.stdout.contains("MODE=deploy"));
    assert!(result.stdout.contains("IMAGE=ghcr.io/acme/api:1.4.0"));
    assert!(result.stdout.contains("DIGEST=none"));
}

/// Test: hooks run inside the unit directory.
#[tokio::test]
async fn hook_runs_in_unit_directory() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("marker.txt"), "here").unwrap();
    create_hook(&temp_dir, "post-destroy", "#!/bin/sh\ncat marker.txt\n");

    let runner = HookRunner::new(temp_dir.path());
    let result = runner
        .run(HookPoint::PostDestroy, &test_context(), &ProcessRunner)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.stdout.trim(), "here");
}

/// Test: failing hook reports its exit code and stderr.
#[tokio::test]
async fn failing_hook_reports_failure() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(
        &temp_dir,
        "pre-destroy",
        "#!/bin/sh\necho 'refusing' >&2\nexit 3\n",
    );

    let runner = HookRunner::new(temp_dir.path());
    let result = runner
        .run(HookPoint::PreDestroy, &test_context(), &ProcessRunner)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.stderr.contains("refusing"));
}

/// Test: missing hook is skipped.
#[tokio::test]
async fn missing_hook_is_skipped() {
    let temp_dir = TempDir::new().unwrap();

    let runner = HookRunner::new(temp_dir.path());
    assert!(!runner.hook_exists(HookPoint::PostDeploy));

    let result = runner
        .run(HookPoint::PostDeploy, &test_context(), &ProcessRunner)
        .await;
    assert!(result.is_none());
}

/// Test: a directory named like a hook is not a hook.
#[tokio::test]
async fn directory_is_not_a_hook() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".convoy/hooks/pre-deploy")).unwrap();

    let runner = HookRunner::new(temp_dir.path());
    assert!(!runner.hook_exists(HookPoint::PreDeploy));
}

/// Test: non-executable hook fails instead of being skipped.
#[tokio::test]
async fn non_executable_hook_fails() {
    let temp_dir = TempDir::new().unwrap();
    let hooks_dir = temp_dir.path().join(".convoy").join("hooks");
    fs::create_dir_all(&hooks_dir).unwrap();
    fs::write(hooks_dir.join("pre-deploy"), "#!/bin/sh\nexit 0\n").unwrap();
    let mut perms = fs::metadata(hooks_dir.join("pre-deploy"))
        .unwrap()
        .permissions();
    perms.set_mode(0o644);
    fs::set_permissions(hooks_dir.join("pre-deploy"), perms).unwrap();

    let runner = HookRunner::new(temp_dir.path());
    let result = runner
        .run(HookPoint::PreDeploy, &test_context(), &ProcessRunner)
        .await
        .unwrap();

    assert!(!result.success);
}
