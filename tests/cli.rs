//! Binary-level tests driving `fieldsync` through assert_cmd.

use std::path::PathBuf;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("data").join("fieldsync.db")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A command isolated from the caller's config and environment.
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("fieldsync").unwrap();
        cmd.arg("--db")
            .arg(self.db())
            .arg("--json")
            .env("FIELDSYNC_CONFIG", self.path("config.json"))
            .env("FIELDSYNC_ACTOR", "tech-test")
            .env_remove("FIELDSYNC_DB")
            .env_remove("FIELDSYNC_TEST_DB")
            .env_remove("FIELDSYNC_ENDPOINT")
            .env_remove("FIELDSYNC_TOKEN")
            .env_remove("FIELDSYNC_MAX_ATTEMPTS")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    fn init(&self) {
        self.cmd().arg("init").assert().success();
    }
}

/// The structured error is the last stderr line; log lines may precede it.
fn error_json(stderr: &[u8]) -> Value {
    let text = String::from_utf8_lossy(stderr);
    let line = text.lines().rev().find(|l| !l.trim().is_empty()).unwrap();
    serde_json::from_str(line).unwrap()
}

#[test]
fn version_reports_package_version() {
    let ws = Workspace::new();
    let out = ws.run_json(&["version"]);
    assert_eq!(out["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn init_creates_database_once() {
    let ws = Workspace::new();
    let out = ws.run_json(&["init"]);
    assert!(ws.db().exists());
    assert_eq!(out["reinitialized"], false);

    let assert = ws.cmd().arg("init").assert().code(2);
    let err = error_json(&assert.get_output().stderr);
    assert_eq!(err["error"]["code"], "ALREADY_INITIALIZED");

    let out = ws.run_json(&["init", "--force"]);
    assert_eq!(out["reinitialized"], true);
}

#[test]
fn commands_require_init() {
    let ws = Workspace::new();
    let assert = ws.cmd().args(["queue", "list"]).assert().code(2);
    let err = error_json(&assert.get_output().stderr);
    assert_eq!(err["error"]["code"], "NOT_INITIALIZED");
}

#[test]
fn enqueue_then_list_show_remove() {
    let ws = Workspace::new();
    ws.init();

    let first = ws.run_json(&[
        "enqueue",
        "job",
        "update",
        r#"{"id": "job_1", "status": "Done", "updated_at": 1000}"#,
    ]);
    let id = first["id"].as_str().unwrap().to_string();
    assert_eq!(first["pending"], 1);

    std::fs::write(ws.path("node.json"), r#"{"id": "node_1", "updated_at": 2000}"#).unwrap();
    let node_arg = format!("@{}", ws.path("node.json").display());
    let second = ws.run_json(&["enqueue", "node", "create", &node_arg]);
    assert_eq!(second["pending"], 2);

    let list = ws.run_json(&["queue", "list"]);
    assert_eq!(list["count"], 2);
    assert_eq!(list["items"][0]["id"], id.as_str());
    assert_eq!(list["items"][0]["entity_id"], "job_1");
    assert_eq!(list["items"][1]["entity_type"], "node");

    let show = ws.run_json(&["queue", "show", &id]);
    assert_eq!(show["item"]["payload"]["status"], "Done");
    assert!(show["history"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["event_type"] == "enqueued"));

    ws.run_json(&["queue", "remove", &id]);
    let list = ws.run_json(&["queue", "list"]);
    assert_eq!(list["count"], 1);

    let assert = ws.cmd().args(["queue", "remove", &id]).assert().code(3);
    let err = error_json(&assert.get_output().stderr);
    assert_eq!(err["error"]["code"], "QUEUE_ITEM_NOT_FOUND");
}

#[test]
fn enqueue_rejects_bad_input() {
    let ws = Workspace::new();
    ws.init();

    let assert = ws
        .cmd()
        .args(["enqueue", "truck", "update", r#"{"id": "t1"}"#])
        .assert()
        .code(4);
    let err = error_json(&assert.get_output().stderr);
    assert_eq!(err["error"]["code"], "INVALID_ARGUMENT");

    ws.cmd()
        .args(["enqueue", "job", "update", "not json"])
        .assert()
        .code(4);
}

#[test]
fn clear_requires_confirmation() {
    let ws = Workspace::new();
    ws.init();
    ws.run_json(&["enqueue", "route", "create", r#"{"id": "r1", "updated_at": 1}"#]);

    ws.cmd().args(["queue", "clear"]).assert().code(4);
    let out = ws.run_json(&["queue", "clear", "--yes"]);
    assert_eq!(out["cleared"], 1);
    assert_eq!(ws.run_json(&["queue", "list"])["count"], 0);
}

#[test]
fn push_without_endpoint_is_a_config_error() {
    let ws = Workspace::new();
    ws.init();
    let assert = ws.cmd().arg("push").assert().code(7);
    let err = error_json(&assert.get_output().stderr);
    assert_eq!(err["error"]["code"], "CONFIG_ERROR");
}

#[test]
fn push_to_unreachable_endpoint_keeps_item_for_retry() {
    let ws = Workspace::new();
    ws.init();
    ws.run_json(&["enqueue", "job", "update", r#"{"id": "job_9", "updated_at": 5}"#]);

    let out = ws.run_json(&["push", "--endpoint", "http://127.0.0.1:9", "--timeout-ms", "2000"]);
    assert_eq!(out["report"]["synced"], 0);
    assert_eq!(out["report"]["failed"], 1);
    assert_eq!(out["pending"], 1);

    let list = ws.run_json(&["queue", "list"]);
    assert_eq!(list["items"][0]["retry_count"], 1);
    assert!(list["items"][0]["next_eligible_at"].is_i64());
}

#[test]
fn dead_letters_start_empty_and_export() {
    let ws = Workspace::new();
    ws.init();

    let list = ws.run_json(&["dead-letter", "list"]);
    assert_eq!(list["count"], 0);

    let target = ws.path("out.jsonl");
    let out = ws.run_json(&["dead-letter", "export", target.to_str().unwrap()]);
    assert_eq!(out["exported"], 0);
    assert!(target.exists());

    let assert = ws.cmd().args(["dead-letter", "requeue", "sq_missing"]).assert().code(3);
    let err = error_json(&assert.get_output().stderr);
    assert_eq!(err["error"]["code"], "DEAD_LETTER_NOT_FOUND");
}

#[test]
fn delta_follows_the_watermark() {
    let ws = Workspace::new();
    ws.init();

    ws.run_json(&["record", "save", "job", r#"{"id": "job_1", "updated_at": 100}"#]);
    ws.run_json(&["record", "save", "node", r#"{"id": "node_1", "updated_at": 300}"#]);
    ws.run_json(&["record", "save", "job", r#"{"id": "job_2", "updated_at": 200}"#]);

    let all = ws.run_json(&["delta"]);
    assert_eq!(all["count"], 3);
    assert!(all["watermark"].is_null());

    let since = ws.run_json(&["delta", "--since", "150"]);
    let ids: Vec<&str> = since["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["entity_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["job_2", "node_1"]);

    let jobs = ws.run_json(&["delta", "--type", "job"]);
    assert_eq!(jobs["count"], 2);

    let committed = ws.run_json(&["delta", "--commit"]);
    assert_eq!(committed["committed"], 300);

    let after = ws.run_json(&["delta"]);
    assert_eq!(after["watermark"], 300);
    assert_eq!(after["count"], 0);
}

#[test]
fn record_list_filters_unsynced() {
    let ws = Workspace::new();
    ws.init();
    ws.run_json(&["record", "save", "job", r#"{"id": "job_1", "updated_at": 100}"#]);

    let list = ws.run_json(&["record", "list", "--unsynced"]);
    assert_eq!(list["count"], 1);
    assert_eq!(list["records"][0]["unsynced_changes"], true);

    ws.cmd()
        .args(["record", "save", "job", r#"{"title": "no id"}"#])
        .assert()
        .code(4);
}

#[test]
fn completions_are_generated() {
    let ws = Workspace::new();
    let output = ws.cmd().args(["completions", "bash"]).assert().success();
    let script = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert!(script.contains("fieldsync"));
}
