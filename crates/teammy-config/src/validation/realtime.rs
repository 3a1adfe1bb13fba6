//! Validation for the realtime and auth sections.

use crate::schema::TeammyConfig;

use super::helpers::{validate_not_blank, validate_range};

const URL_SCHEMES: [&str; 4] = ["http://", "https://", "ws://", "wss://"];

pub(crate) fn validate_endpoint(errors: &mut Vec<String>, config: &TeammyConfig) {
    let rt = &config.realtime;
    let url = rt.api_base_url.trim();
    if !URL_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        errors.push(format!(
            "realtime.api_base_url = {url:?} must start with http://, https://, ws:// or wss://"
        ));
    }
    if !rt.hub_path.starts_with('/') {
        errors.push(format!(
            "realtime.hub_path = {:?} must start with '/'",
            rt.hub_path
        ));
    }
}

pub(crate) fn validate_timing(errors: &mut Vec<String>, config: &TeammyConfig) {
    let rt = &config.realtime;
    validate_range(
        errors,
        "realtime.connect_timeout_secs",
        rt.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "realtime.keepalive_interval_secs",
        rt.keepalive_interval_secs,
        1,
        300,
    );
    if rt.server_timeout_secs <= rt.keepalive_interval_secs {
        errors.push(format!(
            "realtime.server_timeout_secs = {} must exceed keepalive_interval_secs = {}",
            rt.server_timeout_secs, rt.keepalive_interval_secs
        ));
    }
}

pub(crate) fn validate_reconnect(errors: &mut Vec<String>, config: &TeammyConfig) {
    let reconnect = &config.realtime.reconnect;
    if reconnect.base_delay_ms == 0 {
        errors.push("realtime.reconnect.base_delay_ms must be positive".into());
    }
    if reconnect.max_delay_ms < reconnect.base_delay_ms {
        errors.push(format!(
            "realtime.reconnect.max_delay_ms = {} is below base_delay_ms = {}",
            reconnect.max_delay_ms, reconnect.base_delay_ms
        ));
    }
}

pub(crate) fn validate_auth(errors: &mut Vec<String>, config: &TeammyConfig) {
    validate_not_blank(errors, "auth.primary_key", &config.auth.primary_key);
    validate_not_blank(errors, "auth.fallback_key", &config.auth.fallback_key);
}
