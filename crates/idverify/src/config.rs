//! Configuration management for idverify.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "idverify";

/// Environment variable prefix.
const ENV_PREFIX: &str = "IDVERIFY_";

/// Bucket identifier the matching service expects in every request.
pub const DEFAULT_SOURCE_BUCKET: &str = "face-recogonization";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `IDVERIFY_`, `__` between sections)
/// 2. TOML config file at `~/.config/idverify/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote service endpoints.
    pub endpoints: EndpointConfig,
    /// Camera configuration.
    pub camera: CameraConfig,
    /// Operator preferences.
    pub preferences: Preferences,
    /// History ledger configuration.
    pub history: HistoryConfig,
}

/// Remote service endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL of the login service; `/login` is appended.
    pub login_base_url: Option<String>,
    /// Full URL of the face verification service.
    pub verify_url: Option<String>,
    /// Bucket identifier sent with every verification request.
    pub source_bucket: String,
}

/// Camera configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

/// Operator preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Preferences {
    /// Take a still as soon as the camera goes live.
    pub auto_capture: bool,
    /// Sound the terminal bell on shutter.
    pub sound_enabled: bool,
    /// Encode stills at high JPEG quality.
    pub high_quality: bool,
    /// Print a one-line summary when a verification completes.
    pub notifications: bool,
}

/// History ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record transport failures in the ledger as "No Match".
    pub record_failures: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            login_base_url: None,
            verify_url: None,
            source_bucket: DEFAULT_SOURCE_BUCKET.to_string(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_capture: false,
            sound_enabled: true,
            high_quality: true,
            notifications: true,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            record_failures: true,
        }
    }
}

/// A single operator preference, addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    /// See [`Preferences::auto_capture`].
    AutoCapture,
    /// See [`Preferences::sound_enabled`].
    Sound,
    /// See [`Preferences::high_quality`].
    HighQuality,
    /// See [`Preferences::notifications`].
    Notifications,
}

impl Preference {
    /// All preferences, in display order.
    pub const ALL: [Preference; 4] = [
        Self::AutoCapture,
        Self::Sound,
        Self::HighQuality,
        Self::Notifications,
    ];

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AutoCapture => "Auto Capture",
            Self::Sound => "Sound Effects",
            Self::HighQuality => "High Quality Images",
            Self::Notifications => "Notifications",
        }
    }

    /// Parse a preference from its config key or a short alias.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "auto_capture" | "auto" => Some(Self::AutoCapture),
            "sound_enabled" | "sound" => Some(Self::Sound),
            "high_quality" | "quality" => Some(Self::HighQuality),
            "notifications" => Some(Self::Notifications),
            _ => None,
        }
    }
}

impl Preferences {
    /// Current value of a preference.
    #[must_use]
    pub fn get(&self, pref: Preference) -> bool {
        match pref {
            Preference::AutoCapture => self.auto_capture,
            Preference::Sound => self.sound_enabled,
            Preference::HighQuality => self.high_quality,
            Preference::Notifications => self.notifications,
        }
    }

    /// Flip a preference and return its new value.
    pub fn toggle(&mut self, pref: Preference) -> bool {
        let slot = match pref {
            Preference::AutoCapture => &mut self.auto_capture,
            Preference::Sound => &mut self.sound_enabled,
            Preference::HighQuality => &mut self.high_quality,
            Preference::Notifications => &mut self.notifications,
        };
        *slot = !*slot;
        *slot
    }

    /// JPEG quality implied by the high-quality preference.
    #[must_use]
    pub fn jpeg_quality(&self) -> u8 {
        if self.high_quality {
            92
        } else {
            70
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// Endpoints may be left unset here; their absence is reported when the
    /// corresponding call is attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "camera resolution must be non-zero (got {}x{})",
                    self.camera.width, self.camera.height
                ),
            });
        }

        for (key, url) in [
            ("login_base_url", &self.endpoints.login_base_url),
            ("verify_url", &self.endpoints.verify_url),
        ] {
            if let Some(url) = url {
                validate_http_url(key, url)?;
            }
        }

        if self.endpoints.source_bucket.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "source_bucket must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Full URL of the login call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEndpoint`] if no login base URL is configured.
    pub fn login_url(&self) -> Result<String> {
        let base = non_blank(self.endpoints.login_base_url.as_deref()).ok_or(
            Error::MissingEndpoint {
                key: "endpoints.login_base_url",
            },
        )?;
        Ok(format!("{}/login", base.trim_end_matches('/')))
    }

    /// Full URL of the verification call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEndpoint`] if no verification URL is configured.
    pub fn verify_url(&self) -> Result<String> {
        non_blank(self.endpoints.verify_url.as_deref())
            .map(str::to_string)
            .ok_or(Error::MissingEndpoint {
                key: "endpoints.verify_url",
            })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn validate_http_url(key: &str, url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Ok(());
    }
    let parsed = reqwest::Url::parse(url.trim()).map_err(|e| Error::ConfigValidation {
        message: format!("{key} is not a valid URL ({url}): {e}"),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::ConfigValidation {
            message: format!("{key} must use http or https, not {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.endpoints.login_base_url.is_none());
        assert!(config.endpoints.verify_url.is_none());
        assert_eq!(config.endpoints.source_bucket, "face-recogonization");
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert!(config.history.record_failures);
    }

    #[test]
    fn test_default_preferences() {
        let prefs = Preferences::default();

        assert!(!prefs.auto_capture);
        assert!(prefs.sound_enabled);
        assert!(prefs.high_quality);
        assert!(prefs.notifications);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_resolution() {
        let mut config = Config::default();
        config.camera.width = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("resolution"));
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = Config::default();
        config.endpoints.verify_url = Some("not a url".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("verify_url"));
    }

    #[test]
    fn test_validate_non_http_scheme() {
        let mut config = Config::default();
        config.endpoints.login_base_url = Some("ftp://example.com".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http or https"));
    }

    #[test]
    fn test_validate_empty_bucket() {
        let mut config = Config::default();
        config.endpoints.source_bucket = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_login_url_missing() {
        let config = Config::default();
        let err = config.login_url().unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_login_url_blank_counts_as_missing() {
        let mut config = Config::default();
        config.endpoints.login_base_url = Some("   ".to_string());
        assert!(config.login_url().is_err());
    }

    #[test]
    fn test_login_url_appends_path() {
        let mut config = Config::default();
        config.endpoints.login_base_url = Some("https://auth.example.com/dev/".to_string());

        assert_eq!(
            config.login_url().unwrap(),
            "https://auth.example.com/dev/login"
        );
    }

    #[test]
    fn test_verify_url() {
        let mut config = Config::default();
        assert!(config.verify_url().is_err());

        config.endpoints.verify_url = Some("https://match.example.com/verify".to_string());
        assert_eq!(
            config.verify_url().unwrap(),
            "https://match.example.com/verify"
        );
    }

    #[test]
    fn test_preference_toggle() {
        let mut prefs = Preferences::default();
        assert!(prefs.toggle(Preference::AutoCapture));
        assert!(prefs.auto_capture);
        assert!(!prefs.toggle(Preference::Sound));
        assert!(!prefs.get(Preference::Sound));
    }

    #[test]
    fn test_preference_from_key() {
        assert_eq!(Preference::from_key("sound"), Some(Preference::Sound));
        assert_eq!(
            Preference::from_key("high_quality"),
            Some(Preference::HighQuality)
        );
        assert_eq!(Preference::from_key("volume"), None);
    }

    #[test]
    fn test_jpeg_quality() {
        let mut prefs = Preferences::default();
        assert_eq!(prefs.jpeg_quality(), 92);
        prefs.toggle(Preference::HighQuality);
        assert_eq!(prefs.jpeg_quality(), 70);
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("idverify"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_from_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "idverify.toml",
                r#"
                [endpoints]
                login_base_url = "https://auth.example.com"

                [preferences]
                auto_capture = true
                "#,
            )?;
            jail.set_env(
                "IDVERIFY_ENDPOINTS__VERIFY_URL",
                "https://match.example.com/verify",
            );

            let config = Config::load_from(Some(PathBuf::from("idverify.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(
                config.login_url().map_err(|e| e.to_string())?,
                "https://auth.example.com/login"
            );
            assert_eq!(
                config.verify_url().map_err(|e| e.to_string())?,
                "https://match.example.com/verify"
            );
            assert!(config.preferences.auto_capture);
            assert!(config.preferences.sound_enabled);
            Ok(())
        });
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("source_bucket"));
        assert!(json.contains("record_failures"));
    }
}
