//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Teammy Realtime Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[realtime]
# api_base_url = "http://localhost:5000/api"   # trailing /api is stripped for the hub
# hub_path = "/groupChatHub"
# connect_timeout_secs = 15      # 1-120
# keepalive_interval_secs = 15   # 1-300
# server_timeout_secs = 30       # must exceed keepalive_interval_secs
# log_frames = false

[realtime.reconnect]
# enabled = true
# base_delay_ms = 1000
# max_delay_ms = 30000
# max_attempts = 0               # 0 = unlimited
# jitter = true

[auth]
# storage_path = ""              # empty = <data_dir>/teammy/storage.json
# primary_key = "userInfo"       # JSON with accessToken / access_token
# fallback_key = "token"         # raw token

[logging]
# level = "INFO"                 # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
