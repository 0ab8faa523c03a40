//! Client configuration: endpoint, credentials, and tuning knobs.

use std::time::Duration;

use url::Url;

use crate::error::UspError;

/// Default service endpoint (scheme and host only; the recognition mode
/// supplies the path).
pub const DEFAULT_ENDPOINT: &str = "wss://speech.platform.bing.com";

/// Default language for recognition requests.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Credentials applied to the connection handshake.
///
/// Token acquisition is the caller's concern; the engine only attaches
/// what it is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// Service subscription key, sent as `Ocp-Apim-Subscription-Key`.
    SubscriptionKey(String),
    /// Pre-acquired access token, sent as `Authorization: Bearer …`.
    BearerToken(String),
}

impl Auth {
    /// Header name and value for the connection request.
    pub(crate) fn header(&self) -> (&'static str, String) {
        match self {
            Auth::SubscriptionKey(key) => ("Ocp-Apim-Subscription-Key", key.clone()),
            Auth::BearerToken(token) => ("Authorization", format!("Bearer {token}")),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Auth::SubscriptionKey(key) => key.is_empty(),
            Auth::BearerToken(token) => token.is_empty(),
        }
    }
}

/// Recognition mode, selecting the service path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognitionMode {
    /// Short commands and queries; aggressive end-of-speech detection.
    #[default]
    Interactive,
    /// Multi-party conversation audio.
    Conversation,
    /// Long-form dictation with punctuation.
    Dictation,
}

impl RecognitionMode {
    /// The service path for this mode.
    pub fn path(&self) -> &'static str {
        match self {
            RecognitionMode::Interactive => {
                "/speech/recognition/interactive/cognitiveservices/v1"
            }
            RecognitionMode::Conversation => {
                "/speech/recognition/conversation/cognitiveservices/v1"
            }
            RecognitionMode::Dictation => "/speech/recognition/dictation/cognitiveservices/v1",
        }
    }
}

/// Result detail level requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Display text only.
    #[default]
    Simple,
    /// N-best lists with confidence and lexical forms.
    Detailed,
}

impl OutputFormat {
    /// The query parameter value for this format.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Simple => "simple",
            OutputFormat::Detailed => "detailed",
        }
    }
}

/// Configuration for one client session.
#[derive(Debug, Clone)]
pub struct UspConfig {
    /// Service endpoint, scheme and host (`wss://…`). The recognition
    /// mode's path and the query parameters are appended when connecting.
    pub endpoint: String,

    /// Credentials for the connection handshake.
    pub auth: Auth,

    /// Recognition language, e.g. `en-US`.
    pub language: String,

    /// Recognition mode.
    pub mode: RecognitionMode,

    /// Result detail level.
    pub output_format: OutputFormat,

    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,

    /// How long a `write` may wait on a full audio queue before it fails
    /// with a connection timeout instead of hanging the caller.
    pub write_timeout: Duration,

    /// Depth of the bounded audio queue between `write` and the run loop.
    pub audio_queue_depth: usize,

    /// Maximum payload of one outbound audio frame. Larger writes are
    /// split into frames of at most this size.
    pub audio_chunk_size: usize,
}

impl Default for UspConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth: Auth::SubscriptionKey(String::new()),
            language: DEFAULT_LANGUAGE.to_string(),
            mode: RecognitionMode::default(),
            output_format: OutputFormat::default(),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(30),
            audio_queue_depth: 32,
            audio_chunk_size: 8192,
        }
    }
}

impl UspConfig {
    /// Validate the configuration before a session is created.
    pub(crate) fn validate(&self) -> Result<(), UspError> {
        if self.auth.is_empty() {
            return Err(UspError::AuthError(
                "a subscription key or bearer token is required".to_string(),
            ));
        }

        let url = Url::parse(&self.endpoint).map_err(|e| {
            UspError::InvalidParameter(format!("invalid endpoint {:?}: {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(UspError::InvalidParameter(format!(
                "endpoint scheme must be ws or wss, got {:?}",
                url.scheme()
            )));
        }

        if self.language.is_empty() {
            return Err(UspError::InvalidParameter(
                "language must not be empty".to_string(),
            ));
        }
        if self.audio_queue_depth == 0 {
            return Err(UspError::InvalidParameter(
                "audio queue depth must be nonzero".to_string(),
            ));
        }
        if self.audio_chunk_size == 0 {
            return Err(UspError::InvalidParameter(
                "audio chunk size must be nonzero".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the full WebSocket URL with the mode path and query
    /// parameters.
    pub fn build_websocket_url(&self) -> String {
        let mut url = String::with_capacity(128);
        url.push_str(self.endpoint.trim_end_matches('/'));
        url.push_str(self.mode.path());
        url.push_str("?language=");
        url.push_str(&self.language);
        url.push_str("&format=");
        url.push_str(self.output_format.as_str());
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> UspConfig {
        UspConfig {
            auth: Auth::SubscriptionKey("test_subscription_key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_requires_credentials() {
        let config = UspConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, UspError::AuthError(_)));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_websocket_endpoint() {
        let config = UspConfig {
            endpoint: "https://speech.platform.bing.com".to_string(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, UspError::InvalidParameter(_)));
    }

    #[test]
    fn test_rejects_unparseable_endpoint() {
        let config = UspConfig {
            endpoint: "not a url".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_tuning_values() {
        let config = UspConfig {
            audio_queue_depth: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());

        let config = UspConfig {
            audio_chunk_size: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_websocket_url() {
        let config = UspConfig {
            language: "de-DE".to_string(),
            output_format: OutputFormat::Detailed,
            ..valid_config()
        };
        let url = config.build_websocket_url();
        assert!(url.starts_with(
            "wss://speech.platform.bing.com/speech/recognition/interactive/cognitiveservices/v1?"
        ));
        assert!(url.contains("language=de-DE"));
        assert!(url.contains("format=detailed"));
    }

    #[test]
    fn test_build_websocket_url_trims_trailing_slash() {
        let config = UspConfig {
            endpoint: "ws://127.0.0.1:9000/".to_string(),
            mode: RecognitionMode::Dictation,
            ..valid_config()
        };
        let url = config.build_websocket_url();
        assert!(url.starts_with(
            "ws://127.0.0.1:9000/speech/recognition/dictation/cognitiveservices/v1?"
        ));
    }

    #[test]
    fn test_mode_paths() {
        assert!(RecognitionMode::Interactive.path().contains("/interactive/"));
        assert!(RecognitionMode::Conversation.path().contains("/conversation/"));
        assert!(RecognitionMode::Dictation.path().contains("/dictation/"));
    }

    #[test]
    fn test_auth_headers() {
        let (name, value) = Auth::SubscriptionKey("abc".to_string()).header();
        assert_eq!(name, "Ocp-Apim-Subscription-Key");
        assert_eq!(value, "abc");

        let (name, value) = Auth::BearerToken("tok".to_string()).header();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Bearer tok");
    }
}
