//! Configuration management for image-intake
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `IMAGE_INTAKE_` prefix, `__` for nesting)
//! 2. `UPLOAD_PATH_TEMP`, mapped onto `storage.temp_segment`
//! 3. `./config.toml` (development)
//! 4. `~/.config/image-intake/config.toml` (user config, XDG)
//! 5. `/etc/image-intake/config.toml` (system config)
//! 6. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # config.toml
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! allowed_origin = "http://localhost:3000"
//!
//! [storage]
//! public_dir = "./public"
//! temp_segment = "temp"
//! allow_svg = false
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use image_intake::config::IntakeConfig;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = IntakeConfig::load()?;
//! let layout = config.storage.layout()?;
//!
//! println!("uploads land in {}", layout.temp_dir().display());
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Application name used for config directories
pub const APP_NAME: &str = "image-intake";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "IMAGE_INTAKE_";

/// Unprefixed variable selecting the temp upload sub-path
pub const UPLOAD_PATH_TEMP_VAR: &str = "UPLOAD_PATH_TEMP";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration sources could not be merged or extracted
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Defaults could not be serialized into the base layer
    #[error("Failed to serialize default configuration: {0}")]
    Defaults(#[from] toml::ser::Error),

    /// The temp segment is not a plain relative path
    #[error("Invalid temp segment '{segment}': {reason}")]
    InvalidTempSegment {
        /// Configured value
        segment: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Storage directories could not be created
    #[error("Failed to prepare storage directory: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Load(Box::new(error))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// The single origin allowed by CORS
    pub allowed_origin: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Upload storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageSettings {
    /// Public root served by the static asset guard
    pub public_dir: PathBuf,

    /// Sub-path of the public root where accepted uploads land
    pub temp_segment: String,

    /// Accept SVG uploads
    pub allow_svg: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("./public"),
            temp_segment: "temp".to_string(),
            allow_svg: false,
        }
    }
}

impl StorageSettings {
    /// Validates these settings into a [`StorageLayout`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTempSegment`] if the temp segment is
    /// empty, absolute, or contains `.` or `..` components.
    pub fn layout(&self) -> Result<StorageLayout, ConfigError> {
        StorageLayout::new(&self.public_dir, &self.temp_segment)
    }
}

/// Complete image-intake configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct IntakeConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,
}

impl IntakeConfig {
    /// Load configuration from the standard locations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Self::defaults()?;

        // System config: /etc/image-intake/config.toml
        let system_config = PathBuf::from("/etc").join(APP_NAME).join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // User config: ~/.config/image-intake/config.toml
        let user_config = Self::recommended_path();
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // Local config: ./config.toml
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        Self::extract(Self::with_environment(figment))
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables still override the file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - The file contains invalid TOML syntax
    /// - Configuration values fail type conversion
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let figment = Self::defaults()?.merge(Toml::file(path.as_ref()));
        Self::extract(Self::with_environment(figment))
    }

    /// Get the recommended XDG config path
    ///
    /// # Example
    ///
    /// ```rust
    /// use image_intake::config::IntakeConfig;
    ///
    /// let path = IntakeConfig::recommended_path();
    /// // Returns: ~/.config/image-intake/config.toml
    /// ```
    #[must_use]
    pub fn recommended_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| config_dir.join(APP_NAME).join("config.toml"),
        )
    }

    /// Render as TOML, for `check-config`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn defaults() -> Result<Figment, ConfigError> {
        Ok(Figment::new().merge(Toml::string(&toml::to_string(&Self::default())?)))
    }

    fn with_environment(figment: Figment) -> Figment {
        figment
            .merge(
                Env::raw()
                    .only(&[UPLOAD_PATH_TEMP_VAR])
                    .map(|_| "storage.temp_segment".into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }
}

/// Resolved storage directories and public URL prefix
///
/// Built once at startup and immutable afterwards.
///
/// # Examples
///
/// ```rust
/// use image_intake::config::StorageLayout;
///
/// let layout = StorageLayout::new("/srv/public", "temp")?;
/// assert_eq!(layout.public_prefix(), "/temp/");
/// assert_eq!(layout.temp_dir(), std::path::Path::new("/srv/public/temp"));
///
/// assert!(StorageLayout::new("/srv/public", "../etc").is_err());
/// # Ok::<(), image_intake::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    public_root: PathBuf,
    temp_dir: PathBuf,
    public_prefix: String,
}

impl StorageLayout {
    /// Builds a layout from a public root and a temp segment
    ///
    /// The temp segment may contain `/` to nest several levels deep.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTempSegment`] if the temp segment is not a
    /// plain relative path.
    pub fn new(public_root: impl Into<PathBuf>, temp_segment: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidTempSegment {
            segment: temp_segment.to_string(),
            reason,
        };

        let segment = temp_segment.trim_matches('/');
        if segment.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if segment.contains('\\') {
            return Err(invalid("must use '/' as separator"));
        }
        let parts: Vec<&str> = segment.split('/').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid("must not contain empty components"));
        }
        let plain = Path::new(segment)
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !plain || parts.iter().any(|part| *part == "." || *part == "..") {
            return Err(invalid("must not contain '.' or '..'"));
        }

        let public_root = public_root.into();
        let temp_dir = parts
            .iter()
            .fold(public_root.clone(), |dir, part| dir.join(part));

        Ok(Self {
            public_root,
            temp_dir,
            public_prefix: format!("/{segment}/"),
        })
    }

    /// Root directory served to clients
    #[must_use]
    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    /// Directory accepted uploads are written to
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// URL prefix of accepted uploads, with leading and trailing `/`
    #[must_use]
    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Creates the public root and temp directory if missing
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.temp_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn from_toml(toml: &str) -> IntakeConfig {
        let figment = IntakeConfig::defaults().unwrap().merge(Toml::string(toml));
        IntakeConfig::extract(figment).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = IntakeConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.allowed_origin, "http://localhost:3000");
        assert_eq!(config.storage.temp_segment, "temp");
        assert_eq!(config.storage.public_dir, PathBuf::from("./public"));
        assert!(!config.storage.allow_svg);
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let config = from_toml(
            r#"
            [server]
            port = 8080

            [storage]
            temp_segment = "uploads/tmp"
            allow_svg = true
            "#,
        );

        assert_eq!(config.server.port, 8080);
        // Untouched keys keep their defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.temp_segment, "uploads/tmp");
        assert!(config.storage.allow_svg);
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let figment = IntakeConfig::defaults()
            .unwrap()
            .merge(Toml::string("[server]\nport = \"not a port\""));
        assert!(matches!(
            IntakeConfig::extract(figment),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_upload_path_temp_variable() {
        Jail::expect_with(|jail| {
            jail.set_env(UPLOAD_PATH_TEMP_VAR, "incoming");
            let config = IntakeConfig::extract(IntakeConfig::with_environment(
                IntakeConfig::defaults().unwrap(),
            ))
            .unwrap();

            assert_eq!(config.storage.temp_segment, "incoming");
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("intake.toml", "[server]\nport = 8080\n")?;
            jail.set_env("IMAGE_INTAKE_SERVER__PORT", 9090);
            jail.set_env("IMAGE_INTAKE_STORAGE__ALLOW_SVG", true);

            let config = IntakeConfig::load_from("intake.toml").unwrap();
            assert_eq!(config.server.port, 9090);
            assert!(config.storage.allow_svg);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        Jail::expect_with(|_| {
            let config = IntakeConfig::load_from("/nonexistent/path/config.toml").unwrap();
            assert_eq!(config.server.port, 3000);
            Ok(())
        });
    }

    #[test]
    fn test_recommended_path() {
        let path = IntakeConfig::recommended_path();
        assert!(path.to_str().unwrap().ends_with("config.toml"));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = IntakeConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("temp_segment = \"temp\""));
        assert_eq!(from_toml(&rendered), config);
    }

    #[test]
    fn test_layout_default() {
        let layout = StorageSettings::default().layout().unwrap();
        assert_eq!(layout.public_root(), Path::new("./public"));
        assert_eq!(layout.temp_dir(), Path::new("./public/temp"));
        assert_eq!(layout.public_prefix(), "/temp/");
    }

    #[test]
    fn test_layout_nested_segment() {
        let layout = StorageLayout::new("/srv/public", "/uploads/tmp/").unwrap();
        assert_eq!(layout.temp_dir(), Path::new("/srv/public/uploads/tmp"));
        assert_eq!(layout.public_prefix(), "/uploads/tmp/");
    }

    #[test]
    fn test_layout_rejects_escaping_segments() {
        for segment in ["", "/", "..", "../etc", "a/../../b", "./temp", "a//b", "a\\b"] {
            assert!(
                matches!(
                    StorageLayout::new("/srv/public", segment),
                    Err(ConfigError::InvalidTempSegment { .. })
                ),
                "{segment:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_ensure_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path().join("public"), "temp").unwrap();
        layout.ensure_dirs().unwrap();
        assert!(layout.temp_dir().is_dir());
    }
}
