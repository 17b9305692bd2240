use cashid_core::{MetadataRequest, RequestBuilder};
use cashid_verify::UserActionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RootError, RootResult};

/// Configuration for a CashID service.
///
/// Loaded from a TOML file (typically `~/.cashid/config.toml`):
///
/// ```toml
/// domain = "demo.example"
/// path = "/api/auth"
/// nonce_ttl_secs = 600
///
/// [metadata.required]
/// identity = ["name", "age"]
///
/// [metadata.optional]
/// contact = ["email"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Domain the service issues challenges for and accepts responses from.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Resource path responses are posted to, including its leading `/`.
    #[serde(default = "default_path")]
    pub path: String,

    /// Lifetime of an issued nonce.
    #[serde(default = "default_nonce_ttl")]
    pub nonce_ttl_secs: u64,

    /// Budget for a single validation before it is abandoned.
    #[serde(default = "default_validation_timeout")]
    pub validation_timeout_ms: u64,

    #[serde(default)]
    pub user_actions: UserActionPolicy,

    /// Metadata requested with every challenge.
    #[serde(default)]
    pub metadata: MetadataRequest,
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_path() -> String {
    "/api/cashid".to_string()
}

fn default_nonce_ttl() -> u64 {
    600
}

fn default_validation_timeout() -> u64 {
    5000
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            path: default_path(),
            nonce_ttl_secs: default_nonce_ttl(),
            validation_timeout_ms: default_validation_timeout(),
            user_actions: UserActionPolicy::default(),
            metadata: MetadataRequest::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: ServiceConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        self.builder()?;
        if self.nonce_ttl_secs == 0 {
            return Err(RootError::Config("nonce_ttl_secs must be > 0".into()));
        }
        if self.validation_timeout_ms == 0 {
            return Err(RootError::Config("validation_timeout_ms must be > 0".into()));
        }
        if let Some(field) = self
            .metadata
            .required
            .iter()
            .find(|f| self.metadata.optional.contains(*f))
        {
            return Err(RootError::Config(format!(
                "metadata field '{}' is both required and optional",
                field.name()
            )));
        }
        Ok(())
    }

    pub fn builder(&self) -> RootResult<RequestBuilder> {
        Ok(RequestBuilder::new(&self.domain, &self.path)?)
    }

    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce_ttl_secs)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".cashid/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashid_core::MetadataField;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.domain, "localhost");
        assert_eq!(config.path, "/api/cashid");
        assert_eq!(config.nonce_ttl(), Duration::from_secs(600));
        assert_eq!(config.validation_timeout(), Duration::from_secs(5));
        assert_eq!(config.user_actions, UserActionPolicy::Exempt);
        assert!(config.metadata.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
domain = "demo.example"
path = "/api/auth"
nonce_ttl_secs = 120
user_actions = "require_issued"

[metadata.required]
identity = ["name", "age"]

[metadata.optional]
contact = ["email"]
"#;
        let config: ServiceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.domain, "demo.example");
        assert_eq!(config.path, "/api/auth");
        assert_eq!(config.nonce_ttl_secs, 120);
        assert_eq!(config.validation_timeout_ms, 5000);
        assert_eq!(config.user_actions, UserActionPolicy::RequireIssued);
        assert!(config.metadata.required.contains(MetadataField::Name));
        assert!(config.metadata.required.contains(MetadataField::Age));
        assert!(config.metadata.optional.contains(MetadataField::Email));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_unknown_metadata_field() {
        let toml_str = r#"
[metadata.required]
identity = ["email"]
"#;
        assert!(toml::from_str::<ServiceConfig>(toml_str).is_err());
    }

    #[test]
    fn test_config_validate_bad_domain() {
        let mut config = ServiceConfig::default();
        config.domain = String::new();
        assert!(matches!(config.validate(), Err(RootError::Build(_))));
    }

    #[test]
    fn test_config_validate_bad_path() {
        let mut config = ServiceConfig::default();
        config.path = "api".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_ttl() {
        let mut config = ServiceConfig::default();
        config.nonce_ttl_secs = 0;
        assert!(matches!(config.validate(), Err(RootError::Config(_))));
    }

    #[test]
    fn test_config_validate_zero_timeout() {
        let mut config = ServiceConfig::default();
        config.validation_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_overlapping_metadata() {
        let mut config = ServiceConfig::default();
        config.metadata.required.insert(MetadataField::Email);
        config.metadata.optional.insert(MetadataField::Email);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_config_load_missing_file() {
        let path = std::env::temp_dir().join("cashid-config-does-not-exist.toml");
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = std::env::temp_dir().join(format!("cashid-config-{}", std::process::id()));
        let path = dir.join("config.toml");

        let mut config = ServiceConfig::default();
        config.domain = "demo.example".into();
        config.metadata.required.insert(MetadataField::Nickname);
        config.save(&path).unwrap();

        let loaded = ServiceConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_default_config_path() {
        let path = ServiceConfig::default_config_path();
        assert!(path.to_string_lossy().ends_with(".cashid/config.toml"));
    }
}
