//! End-to-end tests for the `todos` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("todos").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

/// A device whose data directory uses `store` as its snapshot.
fn device(data_dir: &Path, store: &Path) -> Command {
    let mut cmd = cli(data_dir);
    cmd.arg("--store").arg(store);
    cmd
}

fn stdout_line(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap().trim().to_string()
}

fn init(data_dir: &Path, name: &str) {
    cli(data_dir)
        .args(["init", "--name", name])
        .assert()
        .success();
}

// ============================================================================
// Local lists and todos
// ============================================================================

#[test]
fn commands_fail_before_init() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .arg("lists")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn init_twice_fails() {
    let dir = TempDir::new().unwrap();
    init(dir.path(), "alice");
    cli(dir.path())
        .args(["init", "--name", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn add_list_and_todos() {
    let dir = TempDir::new().unwrap();
    init(dir.path(), "alice");

    let list = stdout_line(cli(dir.path()).args(["add-list", "Groceries"]));
    let todo = stdout_line(cli(dir.path()).args(["add-todo", &list, "Milk", "--tag", "dairy"]));
    assert!(todo.starts_with(&format!("{list}.todos.")));

    cli(dir.path())
        .arg("lists")
        .assert()
        .success()
        .stdout(predicate::str::contains("Groceries"));
    cli(dir.path())
        .args(["todos", &list])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ ] Milk #dairy"));

    cli(dir.path()).args(["done", &todo]).assert().success();
    cli(dir.path()).args(["untag", &todo, "dairy"]).assert().success();
    cli(dir.path())
        .args(["todos", &list])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] Milk\n"));
}

#[test]
fn edit_rename_and_remove() {
    let dir = TempDir::new().unwrap();
    init(dir.path(), "alice");

    let list = stdout_line(cli(dir.path()).args(["add-list", "Groceries"]));
    cli(dir.path())
        .args(["rename-list", &list, "Shopping"])
        .assert()
        .success();
    let todo = stdout_line(cli(dir.path()).args(["add-todo", &list, "Milk"]));
    cli(dir.path())
        .args(["edit", &todo, "Oat milk"])
        .assert()
        .success();
    cli(dir.path())
        .args(["todos", &list])
        .assert()
        .success()
        .stdout(predicate::str::contains("Oat milk"));

    cli(dir.path()).args(["rm", &todo]).assert().success();
    cli(dir.path())
        .args(["todos", &list])
        .assert()
        .success()
        .stdout(predicate::str::contains("No todos."));
    cli(dir.path())
        .arg("lists")
        .assert()
        .success()
        .stdout(predicate::str::contains("Shopping"));
}

#[test]
fn malformed_todo_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    init(dir.path(), "alice");
    cli(dir.path())
        .args(["done", "not-a-todo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed key"));
}

#[test]
fn init_with_seed_loads_demo_lists() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .args(["init", "--name", "alice", "--seed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded:    22 todos"));

    cli(dir.path())
        .arg("lists")
        .assert()
        .success()
        .stdout(predicate::str::contains("Meteor Principles"))
        .stdout(predicate::str::contains("Favorite Scientists"));
}

#[test]
fn status_reports_counts() {
    let dir = TempDir::new().unwrap();
    init(dir.path(), "alice");
    cli(dir.path()).args(["add-list", "Groceries"]).assert().success();
    cli(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Principal: alice"))
        .stdout(predicate::str::contains("Lists:     1 (0 shared)"));
}

// ============================================================================
// Two devices on one store
// ============================================================================

#[test]
fn share_and_join_by_invite() {
    let store_dir = TempDir::new().unwrap();
    let store = store_dir.path().join("shared.json");
    let alice = TempDir::new().unwrap();
    let bob = TempDir::new().unwrap();
    init(alice.path(), "alice");
    init(bob.path(), "bob");

    let list = stdout_line(device(alice.path(), &store).args(["add-list", "Groceries"]));
    device(alice.path(), &store)
        .args(["share", &list, "--member", "alice", "--member", "bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/$sync/todos/db/tb/"));

    let code = stdout_line(device(alice.path(), &store).args(["invite", &list]));
    let joined = stdout_line(device(bob.path(), &store).args(["join", &code]));
    assert_eq!(joined, list);

    device(bob.path(), &store)
        .args(["add-todo", &list, "Milk"])
        .assert()
        .success();
    device(alice.path(), &store)
        .args(["todos", &list])
        .assert()
        .success()
        .stdout(predicate::str::contains("Milk"));
    device(bob.path(), &store)
        .arg("lists")
        .assert()
        .success()
        .stdout(predicate::str::contains("Groceries  [shared]"));
}

#[test]
fn non_member_cannot_join() {
    let store_dir = TempDir::new().unwrap();
    let store = store_dir.path().join("shared.json");
    let alice = TempDir::new().unwrap();
    let eve = TempDir::new().unwrap();
    init(alice.path(), "alice");
    init(eve.path(), "eve");

    let list = stdout_line(device(alice.path(), &store).args(["add-list", "Groceries"]));
    device(alice.path(), &store)
        .args(["share", &list, "--member", "alice"])
        .assert()
        .success();

    let code = stdout_line(device(alice.path(), &store).args(["invite", &list]));
    device(eve.path(), &store)
        .args(["join", &code])
        .assert()
        .failure()
        .stderr(predicate::str::contains("permission denied"));
}
