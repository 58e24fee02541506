use std::time::Duration;

/// Validation session lifetimes
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a session stays open (in seconds)
    pub session_ttl: u64,

    /// How long a single code or token stays valid (in seconds)
    ///
    /// Kept longer than the display refresh so a code generated just before
    /// a scan still validates.
    pub credential_ttl: u64,

    /// Length of opaque tokens
    pub token_length: usize,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            session_ttl: 180,
            credential_ttl: 15,
            token_length: 32,
        }
    }
}

impl SessionConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl)
    }
}
