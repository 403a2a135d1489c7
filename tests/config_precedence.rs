use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn audit_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cloud-audit"));
    cmd.env("HOME", home);
    cmd.env_remove("CLOUD_AUDIT_CONFIG");
    cmd.env_remove("CLOUD_AUDIT_LOG");
    cmd.env_remove("CLOUD_AUDIT_REGION");
    cmd.env_remove("CLOUD_AUDIT_DISABLED");
    cmd.env_remove("CLOUD_AUDIT_IDLE_DAYS");
    cmd.env_remove("CLOUD_AUDIT_CPU_PERCENT");
    cmd.env_remove("CLOUD_AUDIT_NETWORK_OUT_BYTES");
    cmd.env_remove("CLOUD_AUDIT_IMAGE_AGE_DAYS");
    cmd.env_remove("CLOUD_AUDIT_FUNCTION_WINDOW_DAYS");
    cmd.env_remove("CLOUD_AUDIT_DATABASE_WINDOW_DAYS");
    cmd.env_remove("CLOUD_AUDIT_UI_COLOR");
    cmd.env_remove("CLOUD_AUDIT_UI_MAX_TABLE_ROWS");
    cmd.env_remove("CLOUD_AUDIT_REPORT_MAX_LABEL_LEN");
    cmd
}

fn show_config(cmd: &mut Command) -> serde_json::Value {
    let out: Output = cmd
        .args(["--json", "config", "--show"])
        .output()
        .expect("run cloud-audit");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("parse json")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("cloud-audit-config-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

fn write_default_config(home: &Path, toml: &str) {
    write_file(
        home.join(".config/cloud-audit/config.toml").as_path(),
        toml.as_bytes(),
    );
}

#[test]
fn defaults_without_config_file() {
    let home = make_temp_home();
    let v = show_config(&mut audit_cmd(&home));
    assert_eq!(v["audit"]["region"], "us-east-1");
    assert_eq!(v["thresholds"]["idle_days"], 7);
    assert_eq!(v["thresholds"]["cpu_percent"], 5.0);
    assert_eq!(v["thresholds"]["network_out_bytes"], 5_000_000.0);
    assert_eq!(v["thresholds"]["image_age_days"], 30);
    assert_eq!(v["report"]["max_label_len"], 31);
    assert!(v.get("config_path").is_none());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_file_overrides_defaults() {
    let home = make_temp_home();
    write_default_config(
        &home,
        r#"
[audit]
region = "eu-central-1"
disabled = ["cost-estimates"]

[thresholds]
idle_days = 14
cpu_percent = 2.5
"#,
    );

    let v = show_config(&mut audit_cmd(&home));
    assert_eq!(v["audit"]["region"], "eu-central-1");
    assert_eq!(v["audit"]["disabled"][0], "cost-estimates");
    assert_eq!(v["thresholds"]["idle_days"], 14);
    assert_eq!(v["thresholds"]["cpu_percent"], 2.5);
    assert!(
        v["config_path"]
            .as_str()
            .expect("config_path")
            .ends_with("config.toml")
    );
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn env_overrides_config_file() {
    let home = make_temp_home();
    write_default_config(
        &home,
        r#"
[audit]
region = "eu-central-1"

[thresholds]
idle_days = 14
"#,
    );

    let mut cmd = audit_cmd(&home);
    cmd.env("CLOUD_AUDIT_REGION", "ap-south-1");
    cmd.env("CLOUD_AUDIT_IDLE_DAYS", "3");
    cmd.env("CLOUD_AUDIT_DISABLED", "buckets, databases");
    let v = show_config(&mut cmd);
    assert_eq!(v["audit"]["region"], "ap-south-1");
    assert_eq!(v["thresholds"]["idle_days"], 3);
    assert_eq!(
        v["audit"]["disabled"],
        serde_json::json!(["buckets", "databases"])
    );
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn window_thresholds_follow_env() {
    let home = make_temp_home();
    write_default_config(
        &home,
        "[thresholds]\nfunction_window_days = 60\ndatabase_window_days = 14\n",
    );

    let v = show_config(&mut audit_cmd(&home));
    assert_eq!(v["thresholds"]["function_window_days"], 60);
    assert_eq!(v["thresholds"]["database_window_days"], 14);

    let mut cmd = audit_cmd(&home);
    cmd.env("CLOUD_AUDIT_FUNCTION_WINDOW_DAYS", "90");
    cmd.env("CLOUD_AUDIT_DATABASE_WINDOW_DAYS", "3");
    let v = show_config(&mut cmd);
    assert_eq!(v["thresholds"]["function_window_days"], 90);
    assert_eq!(v["thresholds"]["database_window_days"], 3);
    assert!(v["thresholds"].get("file_system_window_days").is_none());

    let out = audit_cmd(&home)
        .env("CLOUD_AUDIT_DATABASE_WINDOW_DAYS", "a week")
        .args(["config", "--show"])
        .output()
        .expect("run cloud-audit");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn explicit_config_flag_wins_over_env_path() {
    let home = make_temp_home();
    let from_env = home.join("env.toml");
    let from_flag = home.join("flag.toml");
    write_file(&from_env, b"[audit]\nregion = \"us-west-1\"\n");
    write_file(&from_flag, b"[audit]\nregion = \"us-west-2\"\n");

    let mut cmd = audit_cmd(&home);
    cmd.env("CLOUD_AUDIT_CONFIG", &from_env);
    cmd.arg("--config").arg(&from_flag);
    let v = show_config(&mut cmd);
    assert_eq!(v["audit"]["region"], "us-west-2");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn missing_explicit_config_exits_2() {
    let home = make_temp_home();
    let out = audit_cmd(&home)
        .args(["--config"])
        .arg(home.join("absent.toml"))
        .args(["config", "--show"])
        .output()
        .expect("run cloud-audit");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unknown_config_key_exits_2() {
    let home = make_temp_home();
    write_default_config(&home, "[thresholds]\nidle = 3\n");
    let out = audit_cmd(&home)
        .args(["config", "--show"])
        .output()
        .expect("run cloud-audit");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_value_exits_2() {
    let home = make_temp_home();
    let out = audit_cmd(&home)
        .env("CLOUD_AUDIT_CPU_PERCENT", "lots")
        .args(["config", "--show"])
        .output()
        .expect("run cloud-audit");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn audit_flags_override_env() {
    let home = make_temp_home();
    let snap = home.join("inventory.json");
    write_file(
        &snap,
        br#"{"compute":{"instances":[{"instance_id":"i-1","state":"stopped","launch_time":"2024-01-01T00:00:00Z","instance_type":"t3.micro"}]}}"#,
    );

    let out = audit_cmd(&home)
        .env("CLOUD_AUDIT_IDLE_DAYS", "3")
        .env("CLOUD_AUDIT_REGION", "ap-south-1")
        .args(["--json", "audit", "--snapshot"])
        .arg(&snap)
        .args(["--idle-days", "9", "--region", "sa-east-1"])
        .output()
        .expect("run cloud-audit");
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["region"], "sa-east-1");
    assert_eq!(v["sheets"][0]["rows"][0]["Idle Days"], 9);
    let _ = std::fs::remove_dir_all(&home);
}
