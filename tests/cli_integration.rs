//! Integration tests driving the collab binary end to end.
//!
//! These run the real executable against real repositories. The only
//! remote they touch is a bare repository on the local filesystem.

use std::path::{Path, PathBuf};
use std::process::Command as SysCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use collabvault::manifest;

fn collab() -> Command {
    Command::cargo_bin("collab").unwrap()
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = SysCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A committed repository that is not yet a vault.
fn git_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init", "-b", "main"]);
    run_git(dir.path(), &["config", "user.email", "ada@example.com"]);
    run_git(dir.path(), &["config", "user.name", "Ada"]);
    std::fs::create_dir_all(dir.path().join("learnings")).unwrap();
    std::fs::write(dir.path().join("learnings/seed.md"), "first note\n").unwrap();
    run_git(dir.path(), &["add", "-A"]);
    run_git(dir.path(), &["commit", "-m", "seed"]);
    dir
}

fn init_vault(dir: &Path) {
    collab()
        .args([
            "--cwd",
            dir.to_str().unwrap(),
            "init",
            "--vault",
            "team-docs",
            "--identity",
            "ada@example.com",
        ])
        .assert()
        .success();
}

/// A bare repository standing in for the team remote.
fn hub() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init", "--bare", "hub.git"]);
    let path = dir.path().join("hub.git");
    (dir, path)
}

#[test]
fn help_lists_every_command() {
    collab()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("join"))
                .and(predicate::str::contains("sync"))
                .and(predicate::str::contains("merge"))
                .and(predicate::str::contains("status"))
                .and(predicate::str::contains("members"))
                .and(predicate::str::contains("daemon"))
                .and(predicate::str::contains("completion")),
        );
}

#[test]
fn version_prints_the_binary_name() {
    collab()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("collab"));
}

#[test]
fn init_reports_the_new_vault() {
    let repo = git_repo();

    collab()
        .args([
            "--cwd",
            repo.path().to_str().unwrap(),
            "init",
            "--vault",
            "team-docs",
            "--identity",
            "ada@example.com",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("initialized vault 'team-docs' on branch 'main'")
                .and(predicate::str::contains("first master")),
        );

    assert!(manifest::manifest_exists(repo.path()));
}

#[test]
fn init_twice_points_at_join() {
    let repo = git_repo();
    init_vault(repo.path());

    collab()
        .args([
            "--cwd",
            repo.path().to_str().unwrap(),
            "init",
            "--vault",
            "other",
            "--identity",
            "bob@example.com",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(
            predicate::str::contains("already a vault")
                .and(predicate::str::contains("collab join")),
        );
}

#[test]
fn init_outside_a_repository_fails() {
    let dir = TempDir::new().unwrap();

    collab()
        .args([
            "--cwd",
            dir.path().to_str().unwrap(),
            "init",
            "--vault",
            "team-docs",
            "--identity",
            "ada@example.com",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not inside a git repository"));
}

#[test]
fn status_outside_a_vault_exits_with_the_manifest_code() {
    let repo = git_repo();

    collab()
        .args(["--cwd", repo.path().to_str().unwrap(), "status"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("no vault manifest"));
}

#[test]
fn status_reports_membership_and_review_state() {
    let repo = git_repo();
    init_vault(repo.path());

    collab()
        .args(["--cwd", repo.path().to_str().unwrap(), "status"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("vault 'team-docs'")
                .and(predicate::str::contains("main (origin)"))
                .and(predicate::str::contains("(1 master)"))
                .and(predicate::str::contains("ada@example.com"))
                .and(predicate::str::contains("nothing awaiting review"))
                .and(predicate::str::contains("last sync: never")),
        );
}

#[test]
fn members_add_list_remove_flow() {
    let repo = git_repo();
    init_vault(repo.path());
    let cwd = repo.path().to_str().unwrap();

    collab()
        .args(["--cwd", cwd, "members", "--add", "grace@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "added collaborator 'grace@example.com'",
        ));

    collab()
        .args([
            "--cwd",
            cwd,
            "members",
            "--add",
            "bob@example.com",
            "--role",
            "master",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("added master 'bob@example.com'"));

    collab()
        .args(["--cwd", cwd, "members"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ada@example.com")
                .and(predicate::str::contains("grace@example.com"))
                .and(predicate::str::contains("bob@example.com"))
                .and(predicate::str::contains("collaborator")),
        );

    collab()
        .args(["--cwd", cwd, "members", "--remove", "grace@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "removed collaborator 'grace@example.com'",
        ));

    collab()
        .args(["--cwd", cwd, "members"])
        .assert()
        .success()
        .stdout(predicate::str::contains("grace@example.com").not());
}

#[test]
fn removing_the_last_master_is_refused() {
    let repo = git_repo();
    init_vault(repo.path());

    collab()
        .args([
            "--cwd",
            repo.path().to_str().unwrap(),
            "members",
            "--remove",
            "ada@example.com",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("at least one master"));
}

#[test]
fn join_is_rejected_for_existing_members() {
    let repo = git_repo();
    init_vault(repo.path());
    let cwd = repo.path().to_str().unwrap();

    collab()
        .args(["--cwd", cwd, "join", "--identity", "grace@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "'grace@example.com' joined vault 'team-docs'",
        ));

    collab()
        .args(["--cwd", cwd, "join", "--identity", "grace@example.com"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("already a member"));
}

#[test]
fn sync_against_a_file_hub_publishes() {
    let repo = git_repo();
    init_vault(repo.path());
    let (_hub_dir, hub_path) = hub();
    run_git(
        repo.path(),
        &["remote", "add", "origin", hub_path.to_str().unwrap()],
    );
    let cwd = repo.path().to_str().unwrap();

    // First cycle publishes the vault (the uncommitted manifest rides
    // along as a local change).
    collab()
        .args(["--cwd", cwd, "sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains("published merged result to the team"));

    // Second cycle has nothing to do and still succeeds.
    collab()
        .args(["--cwd", cwd, "sync"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("already in sync")
                .and(predicate::str::contains("published").not()),
        );
}

#[test]
fn merge_without_a_review_branch_fails() {
    let repo = git_repo();
    init_vault(repo.path());
    let (_hub_dir, hub_path) = hub();
    run_git(
        repo.path(),
        &["remote", "add", "origin", hub_path.to_str().unwrap()],
    );

    collab()
        .args(["--cwd", repo.path().to_str().unwrap(), "merge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no review branch exists"));
}

#[test]
fn daemon_with_zero_interval_exits_immediately() {
    let repo = git_repo();
    init_vault(repo.path());

    collab()
        .args([
            "--cwd",
            repo.path().to_str().unwrap(),
            "daemon",
            "--interval",
            "0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to schedule"));
}

#[test]
fn completion_emits_a_bash_script() {
    collab()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_collab"));
}
