use serde::{Deserialize, Serialize};
use std::fmt;

/// Application (consumer) credentials issued by the remote API.
///
/// # Examples
///
/// ```
/// use core_auth::ConsumerCredentials;
///
/// let credentials = ConsumerCredentials::new("key", "secret");
/// assert_eq!(credentials.key, "key");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

impl ConsumerCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Access token pair obtained out of band for the mirrored account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
