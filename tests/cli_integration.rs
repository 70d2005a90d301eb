//! CLI integration tests for gantt
//!
//! These tests run the binary against plan files in a temporary directory
//! and check both what it prints and what it writes back.

use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const RELEASE_PLAN: &str = r#"{
  "name": "release",
  "tasks": [
    {
      "id": "design",
      "name": "Design",
      "start": "2020-01-01T00:00:00Z",
      "end": "2020-01-03T00:00:00Z",
      "constraint": { "type": "not_earlier_than", "date": "2020-01-01T00:00:00Z" }
    },
    { "id": "build", "name": "Build", "start": "2020-01-03T00:00:00Z", "end": "2020-01-06T00:00:00Z" },
    { "id": "ship", "name": "Ship", "start": "2020-01-06T00:00:00Z", "end": "2020-01-07T00:00:00Z" }
  ],
  "dependencies": [
    { "from": "design", "to": "build", "type": "end_start" },
    { "from": "build", "to": "ship", "type": "end_start" }
  ]
}"#;

/// Test environment with an isolated global config directory
struct Env {
    dir: TempDir,
    config_dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Writes `content` as a plan file and returns its path
    fn plan(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn release(&self) -> PathBuf {
        self.plan("release.json", RELEASE_PLAN)
    }

    /// Get a command instance for the gantt binary
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("gantt"));
        cmd.env("GANTT_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

fn read_json(path: &PathBuf) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Start and end of a task as stored in the plan file
fn stored_dates(plan: &serde_json::Value, id: &str) -> (String, String) {
    let task = plan["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == id)
        .unwrap_or_else(|| panic!("task {} not in plan", id));
    (
        task["start"].as_str().unwrap().to_string(),
        task["end"].as_str().unwrap().to_string(),
    )
}

// =============================================================================
// Schedule Tests
// =============================================================================

#[test]
fn test_schedule_prints_tree() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("schedule")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("design"))
        .stdout(predicate::str::contains("2020-01-06"))
        .stdout(predicate::str::contains("would move").not());
}

#[test]
fn test_schedule_reports_moves_without_writing() {
    let env = Env::new();
    let plan = env.plan(
        "late.json",
        &RELEASE_PLAN.replace(
            r#""start": "2020-01-06T00:00:00Z", "end": "2020-01-07T00:00:00Z""#,
            r#""start": "2020-01-04T00:00:00Z", "end": "2020-01-05T00:00:00Z""#,
        ),
    );
    let before = fs::read_to_string(&plan).unwrap();

    env.cmd()
        .arg("schedule")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 task(s) would move"));

    assert_eq!(fs::read_to_string(&plan).unwrap(), before);
}

#[test]
fn test_schedule_write_saves_enforced_dates() {
    let env = Env::new();
    let plan = env.plan(
        "late.json",
        &RELEASE_PLAN.replace(
            r#""start": "2020-01-06T00:00:00Z", "end": "2020-01-07T00:00:00Z""#,
            r#""start": "2020-01-04T00:00:00Z", "end": "2020-01-05T00:00:00Z""#,
        ),
    );

    env.cmd()
        .arg("schedule")
        .arg(&plan)
        .arg("--write")
        .assert()
        .success()
        .stdout(predicate::str::contains("Schedule enforced"));

    let stored = read_json(&plan);
    assert_eq!(
        stored_dates(&stored, "ship"),
        ("2020-01-06T00:00:00Z".to_string(), "2020-01-07T00:00:00Z".to_string())
    );
}

#[test]
fn test_schedule_yaml_plan() {
    let env = Env::new();
    let plan = env.plan(
        "plan.yaml",
        r#"
name: yaml
tasks:
  - id: a
    start: 2020-01-01T00:00:00Z
    end: 2020-01-03T00:00:00Z
  - id: b
    start: 2020-01-01T00:00:00Z
    end: 2020-01-02T00:00:00Z
dependencies:
  - from: a
    to: b
    type: end_start
"#,
    );

    env.cmd()
        .arg("schedule")
        .arg(&plan)
        .arg("--write")
        .assert()
        .success();

    let content = fs::read_to_string(&plan).unwrap();
    assert!(content.contains("2020-01-03T00:00:00Z"));
    assert!(content.contains("2020-01-04T00:00:00Z"));
}

#[test]
fn test_unsupported_extension_fails() {
    let env = Env::new();
    let plan = env.plan("plan.txt", RELEASE_PLAN);

    env.cmd()
        .arg("schedule")
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported plan file"));
}

#[test]
fn test_invalid_plan_fails() {
    let env = Env::new();
    let plan = env.plan(
        "broken.json",
        r#"{ "tasks": [], "dependencies": [ { "from": "a", "to": "b" } ] }"#,
    );

    env.cmd()
        .arg("schedule")
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid plan"));
}

// =============================================================================
// Edit Tests
// =============================================================================

#[test]
fn test_move_pushes_dependants() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("move")
        .arg(&plan)
        .arg("design")
        .arg("--start")
        .arg("2020-01-05")
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved design"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("ship"));

    let stored = read_json(&plan);
    assert_eq!(
        stored_dates(&stored, "build"),
        ("2020-01-07T00:00:00Z".to_string(), "2020-01-10T00:00:00Z".to_string())
    );
    assert_eq!(
        stored_dates(&stored, "ship"),
        ("2020-01-10T00:00:00Z".to_string(), "2020-01-11T00:00:00Z".to_string())
    );
}

#[test]
fn test_move_dry_run_leaves_file() {
    let env = Env::new();
    let plan = env.release();
    let before = fs::read_to_string(&plan).unwrap();

    env.cmd()
        .arg("move")
        .arg(&plan)
        .arg("design")
        .arg("--start")
        .arg("2020-01-05")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));

    assert_eq!(fs::read_to_string(&plan).unwrap(), before);
}

#[test]
fn test_move_unknown_task_fails() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("move")
        .arg(&plan)
        .arg("nope")
        .arg("--start")
        .arg("2020-01-05")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_resize_pushes_dependants() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("resize")
        .arg(&plan)
        .arg("build")
        .arg("--end")
        .arg("2020-01-08")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resized build"));

    let stored = read_json(&plan);
    assert_eq!(
        stored_dates(&stored, "ship"),
        ("2020-01-08T00:00:00Z".to_string(), "2020-01-09T00:00:00Z".to_string())
    );
}

#[test]
fn test_link_creating_cycle_fails() {
    let env = Env::new();
    let plan = env.release();
    let before = fs::read_to_string(&plan).unwrap();

    env.cmd()
        .arg("link")
        .arg(&plan)
        .arg("ship")
        .arg("design")
        .assert()
        .failure()
        .stderr(predicate::str::contains("would create a cycle"));

    assert_eq!(fs::read_to_string(&plan).unwrap(), before);
}

#[test]
fn test_link_over_containment_fails() {
    let env = Env::new();
    let plan = env.plan(
        "phases.json",
        r#"{
  "tasks": [
    { "id": "phase", "start": "2020-01-01T00:00:00Z", "end": "2020-01-03T00:00:00Z", "children": ["a"] },
    { "id": "a", "start": "2020-01-01T00:00:00Z", "end": "2020-01-03T00:00:00Z" }
  ]
}"#,
    );
    let before = fs::read_to_string(&plan).unwrap();

    env.cmd()
        .arg("link")
        .arg(&plan)
        .arg("a")
        .arg("phase")
        .arg("--type")
        .arg("end-end")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already links a -> phase"))
        .stdout(predicate::str::contains("Linked").not());

    assert_eq!(fs::read_to_string(&plan).unwrap(), before);
}

#[test]
fn test_link_and_unlink() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("link")
        .arg(&plan)
        .arg("design")
        .arg("ship")
        .arg("--type")
        .arg("start-start")
        .assert()
        .success()
        .stdout(predicate::str::contains("Linked design -> ship (start-start)"));

    let stored = read_json(&plan);
    assert_eq!(stored["dependencies"].as_array().unwrap().len(), 3);

    env.cmd()
        .arg("unlink")
        .arg(&plan)
        .arg("design")
        .arg("ship")
        .assert()
        .success();

    env.cmd()
        .arg("unlink")
        .arg(&plan)
        .arg("design")
        .arg("ship")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No dependency from design to ship"));
}

#[test]
fn test_add_and_remove() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("add")
        .arg(&plan)
        .arg("Write docs")
        .arg("--id")
        .arg("docs")
        .arg("--start")
        .arg("2020-01-02")
        .arg("--end")
        .arg("2020-01-04")
        .assert()
        .success()
        .stdout(predicate::str::contains("Added task docs"));

    let stored = read_json(&plan);
    assert_eq!(
        stored_dates(&stored, "docs"),
        ("2020-01-02T00:00:00Z".to_string(), "2020-01-04T00:00:00Z".to_string())
    );

    env.cmd()
        .arg("remove")
        .arg(&plan)
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed build"));

    let stored = read_json(&plan);
    let ids: Vec<_> = stored["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["design", "ship", "docs"]);
    assert!(stored["dependencies"].as_array().unwrap().is_empty());
}

#[test]
fn test_add_to_container_grows_it() {
    let env = Env::new();
    let plan = env.plan(
        "phases.json",
        r#"{
  "tasks": [
    { "id": "phase", "start": "2020-01-01T00:00:00Z", "end": "2020-01-03T00:00:00Z", "children": ["a"] },
    { "id": "a", "start": "2020-01-01T00:00:00Z", "end": "2020-01-03T00:00:00Z" }
  ]
}"#,
    );

    env.cmd()
        .arg("add")
        .arg(&plan)
        .arg("Late work")
        .arg("--id")
        .arg("b")
        .arg("--parent")
        .arg("phase")
        .arg("--start")
        .arg("2020-01-01")
        .arg("--end")
        .arg("2020-01-06")
        .assert()
        .success();

    let stored = read_json(&plan);
    assert_eq!(stored_dates(&stored, "phase").1, "2020-01-06T00:00:00Z");
    assert_eq!(stored["tasks"][0]["children"], serde_json::json!(["a", "b"]));
}

#[test]
fn test_add_rejects_reversed_dates() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("add")
        .arg(&plan)
        .arg("Backwards")
        .arg("--start")
        .arg("2020-01-05")
        .arg("--end")
        .arg("2020-01-02")
        .assert()
        .failure()
        .stderr(predicate::str::contains("End date must not be before the start date"));
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_check_link() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("check-link")
        .arg(&plan)
        .arg("design")
        .arg("ship")
        .assert()
        .success()
        .stdout(predicate::str::contains("can be linked"));

    env.cmd()
        .arg("check-link")
        .arg(&plan)
        .arg("ship")
        .arg("design")
        .assert()
        .failure()
        .stderr(predicate::str::contains("would create a cycle"));

    env.cmd()
        .arg("check-link")
        .arg(&plan)
        .arg("ship")
        .arg("ghost")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Task not found: ghost"));
}

#[test]
fn test_critical_path() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("critical-path")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("Critical path (3 tasks)"));
}

#[test]
fn test_critical_path_json() {
    let env = Env::new();
    let plan = env.release();

    let output = env
        .cmd()
        .arg("--format")
        .arg("json")
        .arg("critical-path")
        .arg(&plan)
        .output()
        .unwrap();
    assert!(output.status.success());

    let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<_> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["design", "build", "ship"]);
}

#[test]
fn test_critical_path_empty_plan() {
    let env = Env::new();
    let plan = env.plan("empty.json", "{}");

    env.cmd()
        .arg("critical-path")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("No critical path"));
}

#[test]
fn test_inspect() {
    let env = Env::new();
    let plan = env.release();

    env.cmd()
        .arg("inspect")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tasks:        3"))
        .stdout(predicate::str::contains("Initial:      design"))
        .stdout(predicate::str::contains("Latest:       ship"))
        .stdout(predicate::str::contains("Deadline").not());
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_project_deadline_is_reported() {
    let env = Env::new();
    let plan = env.release();
    fs::write(
        env.dir.path().join("gantt.toml"),
        "[scheduling]\ndeadline = \"2020-01-06\"\n",
    )
    .unwrap();

    env.cmd()
        .arg("inspect")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("Deadline 2020-01-06: missed by ship"));
}

#[test]
fn test_project_start_moves_tasks() {
    let env = Env::new();
    let plan = env.release();
    fs::write(
        env.dir.path().join("gantt.toml"),
        "[scheduling]\nproject_start = \"2020-01-02\"\n",
    )
    .unwrap();

    env.cmd()
        .arg("schedule")
        .arg(&plan)
        .arg("--write")
        .assert()
        .success();

    let stored = read_json(&plan);
    assert_eq!(
        stored_dates(&stored, "design"),
        ("2020-01-02T00:00:00Z".to_string(), "2020-01-04T00:00:00Z".to_string())
    );
}

#[test]
fn test_global_default_format() {
    let env = Env::new();
    let plan = env.release();
    fs::write(
        env.config_dir.path().join("config.toml"),
        "default_format = \"json\"\n",
    )
    .unwrap();

    let output = env
        .cmd()
        .arg("move")
        .arg(&plan)
        .arg("design")
        .arg("--start")
        .arg("2020-01-02")
        .arg("--dry-run")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["message"], "Moved design");
    assert_eq!(report["written"], false);
    assert_eq!(report["changed"].as_array().unwrap().len(), 3);
}
