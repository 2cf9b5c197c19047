//! Environment variables
//!
//! Every setting can be overridden with a `CONFIRMD_` prefixed variable, applied on top of the
//! config file.

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use confirm_engine::FingerprintPolicy;

use crate::config::Settings;

/// Origin of the wallet's own requests
pub const ENV_INTERNAL_ORIGIN: &str = "CONFIRMD_INTERNAL_ORIGIN";
/// `true` or `false`
pub const ENV_ALWAYS_REQUIRE_PASSWORD: &str = "CONFIRMD_ALWAYS_REQUIRE_PASSWORD";
/// Hex secret key of the signer
pub const ENV_SECRET_KEY: &str = "CONFIRMD_SECRET_KEY";
/// `content` or `constant`
pub const ENV_SIGNING_FINGERPRINT: &str = "CONFIRMD_SIGNING_FINGERPRINT";
/// Console log level
pub const ENV_LOG_LEVEL: &str = "CONFIRMD_LOG_LEVEL";

impl Settings {
    /// Override settings with the variables that are set
    pub fn from_env(mut self) -> Result<Self> {
        if let Ok(origin) = env::var(ENV_INTERNAL_ORIGIN) {
            self.info.internal_origin = origin;
        }

        if let Ok(always) = env::var(ENV_ALWAYS_REQUIRE_PASSWORD) {
            self.info.always_require_password = always
                .parse()
                .map_err(|_| anyhow!("{ENV_ALWAYS_REQUIRE_PASSWORD} must be true or false"))?;
        }

        if let Ok(secret_key) = env::var(ENV_SECRET_KEY) {
            self.signer.secret_key = Some(secret_key);
        }

        if let Ok(policy) = env::var(ENV_SIGNING_FINGERPRINT) {
            self.signing.fingerprint = FingerprintPolicy::from_str(&policy)?;
        }

        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            self.logging.console_level = level;
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_settings() {
        env::set_var(ENV_INTERNAL_ORIGIN, "chrome-extension://from-env");
        env::set_var(ENV_ALWAYS_REQUIRE_PASSWORD, "true");
        env::set_var(ENV_SIGNING_FINGERPRINT, "constant");

        let settings = Settings::default().from_env().unwrap();

        env::set_var(ENV_ALWAYS_REQUIRE_PASSWORD, "sometimes");
        let invalid = Settings::default().from_env();

        env::remove_var(ENV_INTERNAL_ORIGIN);
        env::remove_var(ENV_ALWAYS_REQUIRE_PASSWORD);
        env::remove_var(ENV_SIGNING_FINGERPRINT);

        assert_eq!(settings.info.internal_origin, "chrome-extension://from-env");
        assert!(settings.info.always_require_password);
        assert_eq!(settings.signing.fingerprint, FingerprintPolicy::Constant);
        assert!(invalid.is_err());
    }
}
