use std::fs;

use agent_api::AgentApiConfig;
use agent_cli::config::{resolve, FileConfig, Overrides};

#[test]
fn loads_a_config_file_and_layers_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("agent.json");
    fs::write(
        &path,
        r#"{"base_url": "http://localhost:9000", "max_iterations": 4, "timeout_sec": 30}"#,
    )
    .expect("write config");

    let file = FileConfig::load(&path).expect("load");
    assert_eq!(file.model, None);

    let config = resolve(AgentApiConfig::default(), Some(&file), &Overrides::default())
        .expect("resolve");
    assert_eq!(config.base_url, "http://localhost:9000");
    assert_eq!(config.max_iterations, 4);
    assert_eq!(config.timeout, Some(std::time::Duration::from_secs(30)));
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("agent.json");
    fs::write(&path, r#"{"base_url": "http://x", "temperature": 0.2}"#).expect("write config");

    let error = FileConfig::load(&path).expect_err("unknown key");
    assert!(error.to_string().contains("invalid config file"));
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.json");

    let error = FileConfig::load(&path).expect_err("missing");
    assert!(error.to_string().contains("absent.json"));
}
