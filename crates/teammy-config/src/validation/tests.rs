use super::*;

fn errors_for(config: &TeammyConfig) -> String {
    match validate(config) {
        Err(ConfigError::ValidationError(msg)) => msg,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn default_config_is_valid() {
    assert!(validate(&TeammyConfig::default()).is_ok());
}

#[test]
fn rejects_base_url_without_scheme() {
    let mut config = TeammyConfig::default();
    config.realtime.api_base_url = "teammy.example.edu/api".into();
    assert!(errors_for(&config).contains("realtime.api_base_url"));
}

#[test]
fn accepts_websocket_base_url() {
    let mut config = TeammyConfig::default();
    config.realtime.api_base_url = "wss://teammy.example.edu".into();
    assert!(validate(&config).is_ok());
}

#[test]
fn rejects_relative_hub_path() {
    let mut config = TeammyConfig::default();
    config.realtime.hub_path = "groupChatHub".into();
    assert!(errors_for(&config).contains("realtime.hub_path"));
}

#[test]
fn rejects_out_of_range_connect_timeout() {
    let mut config = TeammyConfig::default();
    config.realtime.connect_timeout_secs = 0;
    assert!(errors_for(&config).contains("realtime.connect_timeout_secs = 0"));
}

#[test]
fn rejects_server_timeout_not_exceeding_keepalive() {
    let mut config = TeammyConfig::default();
    config.realtime.keepalive_interval_secs = 30;
    config.realtime.server_timeout_secs = 30;
    assert!(errors_for(&config).contains("server_timeout_secs"));
}

#[test]
fn rejects_inverted_reconnect_delays() {
    let mut config = TeammyConfig::default();
    config.realtime.reconnect.base_delay_ms = 5_000;
    config.realtime.reconnect.max_delay_ms = 1_000;
    assert!(errors_for(&config).contains("max_delay_ms"));
}

#[test]
fn rejects_blank_storage_keys() {
    let mut config = TeammyConfig::default();
    config.auth.primary_key = " ".into();
    config.auth.fallback_key = String::new();
    let msg = errors_for(&config);
    assert!(msg.contains("auth.primary_key"));
    assert!(msg.contains("auth.fallback_key"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = TeammyConfig::default();
    config.realtime.hub_path = "hub".into();
    config.realtime.connect_timeout_secs = 500;
    let msg = errors_for(&config);
    assert_eq!(msg.split("; ").count(), 2);
}
