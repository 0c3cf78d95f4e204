// tests/config_env.rs
//
// Config file discovery and env overrides. Env-mutating, so serial.

use std::fs;
use std::path::PathBuf;

use serial_test::serial;
use wellness_pillars::config::{
    AppConfig, ENV_AUTOSAVE_MS, ENV_CONFIG_PATH, ENV_DATA_DIR, ENV_REMOTE_TOKEN, ENV_REMOTE_URL,
    ENV_USER_ID,
};
use wellness_pillars::scoring::ScoreStrategy;

fn clear_env() {
    for k in [
        ENV_CONFIG_PATH,
        ENV_DATA_DIR,
        ENV_REMOTE_URL,
        ENV_USER_ID,
        ENV_REMOTE_TOKEN,
        ENV_AUTOSAVE_MS,
    ] {
        std::env::remove_var(k);
    }
}

#[test]
#[serial]
fn env_path_is_loaded_and_env_vars_override() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wellness.toml");
    fs::write(
        &path,
        r#"
[storage]
data_dir = "from-file"

[remote]
base_url = "https://mirror.example"
api_token = "ENV"

[scoring]
default_strategy = "pillar_weighted"

[autosave]
delay_ms = 1500
"#,
    )
    .unwrap();

    std::env::set_var(ENV_CONFIG_PATH, &path);
    std::env::set_var(ENV_DATA_DIR, "/var/lib/wellness");
    std::env::set_var(ENV_USER_ID, "alice");
    std::env::set_var(ENV_REMOTE_TOKEN, "s3cret");

    let cfg = AppConfig::load_default().expect("load");
    assert_eq!(cfg.storage.data_dir, PathBuf::from("/var/lib/wellness"));
    assert_eq!(cfg.remote.user_id.as_deref(), Some("alice"));
    assert_eq!(cfg.remote.api_token.as_deref(), Some("s3cret"));
    assert_eq!(cfg.scoring.default_strategy, ScoreStrategy::PillarWeighted);
    assert_eq!(cfg.autosave.delay_ms, 1500);
    assert!(cfg.remote_enabled());

    clear_env();
}

#[test]
#[serial]
fn missing_env_path_is_an_error() {
    clear_env();
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    assert!(AppConfig::load_default().is_err());
    clear_env();
}

#[test]
#[serial]
fn token_placeholder_without_env_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.toml");
    fs::write(&path, "[remote]\napi_token = \"ENV\"\n").unwrap();
    std::env::set_var(ENV_CONFIG_PATH, &path);
    assert!(AppConfig::load_default().is_err());
    clear_env();
}

#[test]
#[serial]
fn bad_autosave_override_is_rejected() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.toml");
    fs::write(&path, "").unwrap();
    std::env::set_var(ENV_CONFIG_PATH, &path);
    std::env::set_var(ENV_AUTOSAVE_MS, "soon");
    assert!(AppConfig::load_default().is_err());
    clear_env();
}
