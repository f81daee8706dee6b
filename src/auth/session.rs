use super::Identity;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

/// Prefix marking a base64url-encoded session cookie value
pub const BASE64_PREFIX: &str = "base64-";

/// Sessions this close to expiry are refreshed instead of validated
pub const EXPIRY_MARGIN_SECS: i64 = 10;

/// Provider session stored in the session cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Decode a cookie value, accepting both `base64-<b64url json>` and raw JSON
    pub fn decode(value: &str) -> Option<Self> {
        let json = match value.strip_prefix(BASE64_PREFIX) {
            Some(encoded) => {
                let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')).ok()?;
                String::from_utf8(bytes).ok()?
            }
            None => value.to_string(),
        };
        serde_json::from_str(&json).ok()
    }

    /// Encode for storage in the session cookie
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and integers cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(json))
    }

    /// Fill in `expires_at` from `expires_in` when the provider only sent the latter
    pub fn with_expiry_from(mut self, now: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now + secs);
        }
        self
    }

    /// Whether the access token must be renewed before use
    pub fn needs_refresh(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now <= EXPIRY_MARGIN_SECS,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_in: Some(3600),
            expires_at: Some(1_700_003_600),
            user: None,
        }
    }

    #[test]
    fn test_decode_base64_cookie() {
        let encoded = sample().encode();
        assert!(encoded.starts_with(BASE64_PREFIX));
        assert_eq!(Session::decode(&encoded), Some(sample()));
    }

    #[test]
    fn test_decode_plain_json_cookie() {
        let json = r#"{"access_token":"a","refresh_token":"r","expires_at":10}"#;
        let session = Session::decode(json).unwrap();
        assert_eq!(session.access_token, "a");
        assert_eq!(session.token_type, "bearer");
        assert_eq!(session.expires_at, Some(10));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Session::decode("base64-!!!").is_none());
        assert!(Session::decode("not json").is_none());
        assert!(Session::decode(r#"{"access_token":"a"}"#).is_none());
    }

    #[test]
    fn test_needs_refresh() {
        let session = sample();
        assert!(!session.needs_refresh(1_700_000_000));
        assert!(session.needs_refresh(1_700_003_595));
        assert!(session.needs_refresh(1_700_010_000));

        let no_expiry = Session {
            expires_at: None,
            ..sample()
        };
        assert!(!no_expiry.needs_refresh(i64::MAX));
    }

    #[test]
    fn test_with_expiry_from() {
        let session = Session {
            expires_at: None,
            ..sample()
        }
        .with_expiry_from(100);
        assert_eq!(session.expires_at, Some(3700));

        let kept = sample().with_expiry_from(100);
        assert_eq!(kept.expires_at, Some(1_700_003_600));
    }
}
