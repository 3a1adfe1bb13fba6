use super::template::default_config_toml;
use super::*;
use crate::schema::TeammyConfig;
use std::path::Path;
use teammy_common::ConfigError;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_teammy_config.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r##"
[realtime]
api_base_url = "https://teammy.example.edu/api/"
connect_timeout_secs = 5

[auth]
primary_key = "session"
"##,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.realtime.api_base_url, "https://teammy.example.edu/api/");
    assert_eq!(config.realtime.connect_timeout_secs, 5);
    assert_eq!(config.auth.primary_key, "session");
    // Defaults preserved
    assert_eq!(config.auth.fallback_key, "token");
    assert_eq!(config.realtime.hub_path, "/groupChatHub");
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let result = load_from_path(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn load_config_with_invalid_values_keeps_parsed_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[realtime]
connect_timeout_secs = 500
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.realtime.connect_timeout_secs, 500);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("teammy").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.realtime.hub_path, "/groupChatHub");
    assert_eq!(config.auth.primary_key, "userInfo");
}

#[test]
fn default_config_toml_is_valid() {
    let config: TeammyConfig = toml::from_str(&default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_path_is_reasonable() {
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("teammy"));
        assert!(path_str.ends_with("config.toml"));
    }
}

#[test]
fn create_default_config_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[logging]\nlevel = \"DEBUG\"\n").unwrap();

    create_default_config(&path).unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.logging.level, crate::schema::LogLevel::Debug);
}
