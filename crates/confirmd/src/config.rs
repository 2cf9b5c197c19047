//! Daemon settings

use std::path::PathBuf;

use bitcoin::hashes::{sha256, Hash};
use config::{Config, ConfigError, File};
use confirm_engine::{FingerprintPolicy, DEFAULT_INTERNAL_ORIGIN};
use serde::{Deserialize, Serialize};

/// Wallet behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// Origin of the wallet's own requests, they never open the popup
    pub internal_origin: String,
    /// Lock the keyring whenever a signing request is queued
    pub always_require_password: bool,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            internal_origin: DEFAULT_INTERNAL_ORIGIN.to_owned(),
            always_require_password: false,
        }
    }
}

/// In-process signer
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SignerConfig {
    /// Hex secret key of the in-process signer, a random key is used when unset
    pub secret_key: Option<String>,
}

impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret_key = self
            .secret_key
            .as_ref()
            .map(|key| format!("<hashed: {}>", sha256::Hash::hash(key.as_bytes())));

        f.debug_struct("SignerConfig")
            .field("secret_key", &secret_key)
            .finish()
    }
}

/// Signing family
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Signing {
    /// How duplicate signing requests are detected
    pub fingerprint: FingerprintPolicy,
}

/// Logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level of the stderr log, `RUST_LOG` wins over it
    pub console_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: "info".to_owned(),
        }
    }
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// `[info]`
    #[serde(default)]
    pub info: Info,
    /// `[signer]`
    #[serde(default)]
    pub signer: SignerConfig,
    /// `[signing]`
    #[serde(default)]
    pub signing: Signing,
    /// `[logging]`
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from the file, falling back to the defaults when it can not be read
    #[must_use]
    pub fn new<P>(config_file_name: Option<P>) -> Self
    where
        P: Into<PathBuf>,
    {
        let default_settings = Self::default();
        // attempt to construct settings with file
        let from_file = Self::new_from_default(&default_settings, config_file_name);
        match from_file {
            Ok(f) => f,
            Err(e) => {
                tracing::error!("Error reading config file, falling back to defaults. Error: {e}");
                default_settings
            }
        }
    }

    fn new_from_default<P>(
        default: &Settings,
        config_file_name: Option<P>,
    ) -> Result<Self, ConfigError>
    where
        P: Into<PathBuf>,
    {
        let (config, required) = match config_file_name {
            Some(value) => (value.into(), true),
            None => {
                let mut default_config_file_name = home::home_dir()
                    .ok_or(ConfigError::NotFound("Config Path".to_string()))?
                    .join(crate::DEFAULT_WORK_DIR);
                default_config_file_name.push("config.toml");
                (default_config_file_name, false)
            }
        };

        let config: Config = Config::builder()
            // use defaults
            .add_source(Config::try_from(default)?)
            // override with file contents
            .add_source(File::from(config).required(required))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("confirmd-{}-{name}.toml", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn file_overrides_defaults() {
        let path = write_config(
            "overrides",
            r#"
[info]
internal_origin = "chrome-extension://wallet"
always_require_password = true

[signing]
fingerprint = "constant"
"#,
        );

        let settings = Settings::new(Some(&path));
        fs::remove_file(&path).unwrap();

        assert_eq!(settings.info.internal_origin, "chrome-extension://wallet");
        assert!(settings.info.always_require_password);
        assert_eq!(settings.signing.fingerprint, FingerprintPolicy::Constant);
        assert_eq!(settings.logging.console_level, "info");
        assert!(settings.signer.secret_key.is_none());
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let path = write_config("broken", "[info\ninternal_origin = ");

        let settings = Settings::new(Some(&path));
        fs::remove_file(&path).unwrap();

        assert_eq!(settings.info.internal_origin, DEFAULT_INTERNAL_ORIGIN);
        assert_eq!(settings.signing.fingerprint, FingerprintPolicy::Content);
    }

    #[test]
    fn secret_key_is_not_printed() {
        let signer = SignerConfig {
            secret_key: Some("0101".to_owned()),
        };
        assert!(!format!("{signer:?}").contains("0101"));
    }
}
