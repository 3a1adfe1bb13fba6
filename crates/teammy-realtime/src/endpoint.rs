//! Hub endpoint derivation from the REST base URL.

use url::Url;

use crate::error::RealtimeError;

/// Hub path appended to the stripped base URL.
pub const DEFAULT_HUB_PATH: &str = "/groupChatHub";

/// Derive the hub URL from the REST base URL.
///
/// Trailing slashes and one trailing `/api` segment are removed from `base`
/// before `hub_path` is appended.
pub fn hub_url(base: &str, hub_path: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    let root = trimmed
        .strip_suffix("/api")
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    if hub_path.starts_with('/') {
        format!("{root}{hub_path}")
    } else {
        format!("{root}/{hub_path}")
    }
}

/// Build the WebSocket URL for a connection attempt.
///
/// `http`/`https` become `ws`/`wss`; a non-empty token is appended as the
/// `access_token` query parameter.
pub fn websocket_url(hub_url: &str, access_token: &str) -> Result<Url, RealtimeError> {
    let mut url =
        Url::parse(hub_url).map_err(|e| RealtimeError::InvalidUrl(format!("{hub_url}: {e}")))?;

    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        "ws" | "wss" => None,
        other => {
            return Err(RealtimeError::InvalidUrl(format!(
                "{hub_url}: unsupported scheme {other}"
            )))
        }
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| RealtimeError::InvalidUrl(format!("{hub_url}: cannot use {scheme}")))?;
    }

    if !access_token.is_empty() {
        url.query_pairs_mut()
            .append_pair("access_token", access_token);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_api_suffix() {
        assert_eq!(
            hub_url("https://teammy.example.edu/api", DEFAULT_HUB_PATH),
            "https://teammy.example.edu/groupChatHub"
        );
    }

    #[test]
    fn strips_api_suffix_with_trailing_slash() {
        assert_eq!(
            hub_url("https://teammy.example.edu/api/", DEFAULT_HUB_PATH),
            "https://teammy.example.edu/groupChatHub"
        );
    }

    #[test]
    fn keeps_base_without_api_suffix() {
        assert_eq!(
            hub_url("http://localhost:5000", DEFAULT_HUB_PATH),
            "http://localhost:5000/groupChatHub"
        );
        assert_eq!(
            hub_url("http://localhost:5000/", "groupChatHub"),
            "http://localhost:5000/groupChatHub"
        );
    }

    #[test]
    fn only_strips_a_whole_api_segment() {
        assert_eq!(
            hub_url("https://rapi.example.edu/capi", DEFAULT_HUB_PATH),
            "https://rapi.example.edu/capi/groupChatHub"
        );
    }

    #[test]
    fn websocket_url_switches_scheme() {
        let url = websocket_url("https://teammy.example.edu/groupChatHub", "").unwrap();
        assert_eq!(url.as_str(), "wss://teammy.example.edu/groupChatHub");

        let url = websocket_url("http://localhost:5000/groupChatHub", "").unwrap();
        assert_eq!(url.scheme(), "ws");
    }

    #[test]
    fn websocket_url_appends_encoded_token() {
        let url = websocket_url("http://localhost:5000/groupChatHub", "a b+c").unwrap();
        assert_eq!(url.query(), Some("access_token=a+b%2Bc"));
    }

    #[test]
    fn websocket_url_rejects_garbage() {
        assert!(matches!(
            websocket_url("not a url", "t"),
            Err(RealtimeError::InvalidUrl(_))
        ));
        assert!(matches!(
            websocket_url("ftp://example.edu/hub", ""),
            Err(RealtimeError::InvalidUrl(_))
        ));
    }
}
