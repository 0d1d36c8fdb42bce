//! Process-wide configuration: signing secret and default debounce delay.

use std::time::Duration;

/// Default debounce window when none is configured.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Suffix mixed into a derived signing key so the stream verifier never
/// shares a key verbatim with other consumers of the application secret.
const KEY_SUFFIX: &str = "livecast";

/// Configuration shared by the broadcaster, debouncer and verifier.
#[derive(Clone, Debug)]
pub struct Config {
    signing_key: String,
    debounce_delay: Duration,
}

impl Config {
    /// Create a config with an explicit signing key.
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            debounce_delay: DEFAULT_DEBOUNCE,
        }
    }

    /// Create a config from the environment.
    ///
    /// Reads `LIVECAST_SIGNING_KEY` and, optionally, `LIVECAST_DEBOUNCE_MS`.
    /// When no key is set, one is derived from the application secret in
    /// `SECRET_KEY_BASE` suffixed with `"livecast"`.
    pub fn from_env() -> crate::LivecastResult<Self> {
        let signing_key = match std::env::var("LIVECAST_SIGNING_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => Self::derived_key()?,
        };

        let mut config = Self::new(signing_key);
        if let Ok(ms) = std::env::var("LIVECAST_DEBOUNCE_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| crate::LivecastError::config("LIVECAST_DEBOUNCE_MS must be an integer"))?;
            config.debounce_delay = Duration::from_millis(ms);
        }
        Ok(config)
    }

    fn derived_key() -> crate::LivecastResult<String> {
        match std::env::var("SECRET_KEY_BASE") {
            Ok(base) if !base.is_empty() => Ok(format!("{base}{KEY_SUFFIX}")),
            _ => Err(crate::LivecastError::config(
                "no signing key: set LIVECAST_SIGNING_KEY or SECRET_KEY_BASE",
            )),
        }
    }

    /// Override the default debounce delay.
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// The secret used to sign and verify stream tokens.
    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }

    /// Debounce window applied when a broadcast does not specify one.
    pub fn debounce_delay(&self) -> Duration {
        self.debounce_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_and_default_delay() {
        let config = Config::new("s3cret");
        assert_eq!(config.signing_key(), "s3cret");
        assert_eq!(config.debounce_delay(), Duration::from_millis(500));
    }

    #[test]
    fn delay_override() {
        let config = Config::new("k").with_debounce_delay(Duration::from_secs(2));
        assert_eq!(config.debounce_delay(), Duration::from_secs(2));
    }
}
