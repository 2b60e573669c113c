//! Tests for the mgsh binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn mgsh(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mgsh").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("MGSH_CONTROLLER")
        .env_remove("MGSH_MODEL")
        .env_remove("MGSH_MACRO_DIR");
    cmd
}

const MODEL: &str = r#"{
  "attributes": {"name": "server-one"},
  "children": {
    "deployment": {
      "app.war": {"attributes": {"enabled": true}},
      "old.war": {"attributes": {"enabled": false}}
    }
  }
}"#;

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    mgsh(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("mgsh "));
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    mgsh(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("end-try"));
}

#[test]
fn test_single_command() {
    let home = TempDir::new().unwrap();
    mgsh(&home)
        .args(["-c", "echo", "hello"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn test_single_command_failure() {
    let home = TempDir::new().unwrap();
    mgsh(&home)
        .args(["-c", "no-such-command"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown command: no-such-command"));
}

#[test]
fn test_unknown_option() {
    let home = TempDir::new().unwrap();
    mgsh(&home).arg("--frobnicate").assert().code(2);
}

#[test]
fn test_script_against_model() {
    let home = TempDir::new().unwrap();
    let model = home.path().join("model.json");
    fs::write(&model, MODEL).unwrap();
    let script = home.path().join("check.mgsh");
    fs::write(
        &script,
        "# report enabled deployments\n\
         for d in :read-children-names(child-type=deployment)\n\
         \x20   if result == true of /deployment=$d:read-attribute(name=enabled)\n\
         \x20       echo $d is enabled\n\
         \x20   end-if\n\
         end-for\n",
    )
    .unwrap();

    mgsh(&home)
        .arg("--model")
        .arg(&model)
        .arg(&script)
        .assert()
        .success()
        .stdout("app.war is enabled\n");
}

#[test]
fn test_script_stops_at_first_failure() {
    let home = TempDir::new().unwrap();
    let script = home.path().join("fail.mgsh");
    fs::write(&script, "echo one\nbogus\necho two\n").unwrap();

    mgsh(&home)
        .arg(&script)
        .assert()
        .failure()
        .stdout("one\n")
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_script_with_unclosed_block() {
    let home = TempDir::new().unwrap();
    let script = home.path().join("open.mgsh");
    fs::write(&script, "try\necho never\n").unwrap();

    mgsh(&home)
        .arg(&script)
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("'try' block was not closed"));
}

#[test]
fn test_error_printed_once() {
    let home = TempDir::new().unwrap();
    let script = home.path().join("nested.mgsh");
    fs::write(&script, "for x in (1)\ntry\nbogus\nfinally\necho cleanup\nend-try\nend-for\n").unwrap();

    let output = mgsh(&home).arg(&script).output().unwrap();
    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "cleanup\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Unknown command: bogus").count(), 1);
}
