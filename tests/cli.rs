//! End-to-end checks of the `pumpsync` binary.
//!
//! Every test gets its own database and config file through
//! `PUMPSYNC_DB` / `PUMPSYNC_CONFIG`. Stdout is not a terminal under the
//! test harness, so commands answer in JSON.

use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("pumpsync").unwrap();
        cmd.env("HOME", self.dir.path())
            .env("PUMPSYNC_DB", self.path("data/pumpsync.db"))
            .env("PUMPSYNC_CONFIG", self.path("config.json"))
            .env_remove("PUMPSYNC_URL")
            .env_remove("PUMPSYNC_SECRET")
            .env_remove("PUMPSYNC_ENABLED")
            .env_remove("PUMPSYNC_DEVICE")
            .env_remove("RUST_LOG");
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    fn init(&self) -> Value {
        self.json(&["init"])
    }

    fn write_log(&self) -> PathBuf {
        let path = self.path("log.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"seq_id":1,"device_id":7,"type_id":399,"payload":[0,0,0,0,0,0,110,0],"device_time":"2024-05-01T10:00:00Z"}"#,
                "\n",
                r#"{"seq_id":2,"device_id":7,"type_id":399,"payload":[0,0,0,0,0,0,112,0],"device_time":"2024-05-01T10:05:00Z"}"#,
                "\n",
                r#"{"seq_id":3,"device_id":7,"type_id":33,"payload":[],"device_time":"2024-05-01T10:07:00Z"}"#,
                "\n"
            ),
        )
        .unwrap();
        path
    }
}

#[test]
fn test_init_creates_database_and_config() {
    let env = TestEnv::new();

    let output = env.init();
    assert_eq!(output["config_created"], true);
    assert!(env.path("data/pumpsync.db").exists());
    assert!(env.path("config.json").exists());

    let second = env.cmd().arg("init").assert().failure().code(2);
    let stderr = String::from_utf8_lossy(&second.get_output().stderr).to_string();
    assert!(stderr.contains("ALREADY_INITIALIZED"), "stderr: {stderr}");

    env.cmd().args(["init", "--force"]).assert().success();
}

#[test]
fn test_commands_require_init() {
    let env = TestEnv::new();
    let assert = env.cmd().args(["sync", "run"]).assert().failure().code(2);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("NOT_INITIALIZED"), "stderr: {stderr}");
}

#[test]
fn test_config_set_and_show() {
    let env = TestEnv::new();
    env.init();

    env.json(&[
        "config",
        "set",
        "--url",
        "https://ns.example/",
        "--secret",
        "abcdefgh",
        "--categories",
        "bolus,cgm",
        "--interval",
        "5",
    ]);

    let shown = env.json(&["config", "show"]);
    assert_eq!(shown["remote_url"], "https://ns.example");
    assert_eq!(shown["remote_secret"], "****efgh");
    assert_eq!(shown["enabled"], false);
    assert_eq!(shown["valid"], true);
    assert_eq!(shown["sync_interval_minutes"], 5);
    assert_eq!(
        shown["enabled_categories"],
        serde_json::json!(["cgm_reading", "bolus"])
    );
}

#[test]
fn test_config_set_rejects_unknown_category() {
    let env = TestEnv::new();
    env.init();

    let assert = env
        .cmd()
        .args(["config", "set", "--categories", "glucos"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("INVALID_CATEGORY"), "stderr: {stderr}");
}

#[test]
fn test_log_import_is_idempotent() {
    let env = TestEnv::new();
    env.init();
    let log = env.write_log();
    let log = log.to_str().unwrap();

    let first = env.json(&["log", "import", log]);
    assert_eq!(first["imported"], 3);
    assert_eq!(first["skipped"], 0);

    let again = env.json(&["log", "import", log]);
    assert_eq!(again["imported"], 0);
    assert_eq!(again["skipped"], 3);

    let stats = env.json(&["log", "stats"]);
    assert_eq!(stats["device_id"], 7);
    assert_eq!(stats["count"], 3);
    assert_eq!(stats["oldest_seq_id"], 1);
    assert_eq!(stats["latest_seq_id"], 3);
}

#[test]
fn test_sync_run_reports_disabled_and_invalid_config() {
    let env = TestEnv::new();
    env.init();
    let log = env.write_log();
    env.json(&["log", "import", log.to_str().unwrap()]);

    let disabled = env.json(&["sync", "run"]);
    assert_eq!(disabled["status"], "disabled");

    env.json(&["config", "set", "--enabled", "true"]);
    let invalid = env.json(&["sync", "run"]);
    assert_eq!(invalid["status"], "invalid_config");

    // Neither outcome creates a cursor.
    let status = env.json(&["sync", "status"]);
    assert!(status["cursor"].is_null());
    assert_eq!(status["pending"], 3);
    assert_eq!(status["device_id"], 7);
}

#[test]
fn test_sync_reset_without_cursor() {
    let env = TestEnv::new();
    env.init();

    let output = env.json(&["sync", "reset"]);
    assert_eq!(output["reset"], false);
}

#[test]
fn test_retroactive_rejects_reversed_window() {
    let env = TestEnv::new();
    env.init();
    let log = env.write_log();
    env.json(&["log", "import", log.to_str().unwrap()]);

    env.cmd()
        .args([
            "sync",
            "retroactive",
            "--start",
            "2024-05-02",
            "--end",
            "2024-05-01",
        ])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn test_version_and_completions() {
    let env = TestEnv::new();

    let version = env.json(&["version"]);
    assert_eq!(version["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(version["categories"].as_array().unwrap().len(), 10);

    let output = env.cmd().args(["completions", "bash"]).assert().success();
    let script = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(script.contains("pumpsync"));
}
