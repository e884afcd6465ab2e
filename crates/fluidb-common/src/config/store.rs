//! Row store configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_KEY_NAME};
use crate::error::{FluidError, FluidResult};

/// SQL dialect spoken by the connection.
///
/// Chosen once, by the caller, when the store is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// SQLite.
    #[default]
    Sqlite,
    /// MySQL and MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
}

impl DialectKind {
    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Sqlite => "sqlite",
            DialectKind::MySql => "mysql",
            DialectKind::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = FluidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DialectKind::Sqlite),
            "mysql" | "mariadb" => Ok(DialectKind::MySql),
            "postgres" | "postgresql" | "pgsql" => Ok(DialectKind::Postgres),
            other => Err(FluidError::InvalidConfig {
                message: format!("unknown dialect '{}'", other),
            }),
        }
    }
}

/// Row store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Dialect of the connection.
    #[serde(default)]
    pub dialect: DialectKind,

    /// Start in fluid mode. Fluid mode cannot be left once entered.
    #[serde(default)]
    pub fluid: bool,

    /// Query cache capacity; 0 disables caching.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Trim leading and trailing whitespace from text values.
    #[serde(default = "default_true")]
    pub trim_strings: bool,

    /// Store empty text as NULL.
    #[serde(default = "default_true")]
    pub empty_string_to_null: bool,

    /// Store integral floats, decimals and canonical numeric text as integers.
    #[serde(default = "default_true")]
    pub recognize_integers: bool,

    /// Wrap writes issued outside a transaction in one.
    #[serde(default = "default_true")]
    pub implicit_transactions: bool,

    /// Key column for tables without a registered key.
    #[serde(default = "default_key")]
    pub default_key: String,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_key() -> String {
    DEFAULT_KEY_NAME.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::default(),
            fluid: false,
            cache_capacity: default_cache_capacity(),
            trim_strings: true,
            empty_string_to_null: true,
            recognize_integers: true,
            implicit_transactions: true,
            default_key: default_key(),
        }
    }
}

impl StoreConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for configuration.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> FluidResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> FluidResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| FluidError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> FluidResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to a TOML string.
    pub fn to_toml(&self) -> FluidResult<String> {
        toml::to_string_pretty(self).map_err(|e| FluidError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> FluidResult<()> {
        if self.default_key.trim().is_empty() {
            return Err(FluidError::InvalidConfig {
                message: "default_key must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`StoreConfig`].
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dialect.
    pub fn dialect(mut self, dialect: DialectKind) -> Self {
        self.config.dialect = dialect;
        self
    }

    /// Starts the store in fluid mode.
    pub fn fluid(mut self, fluid: bool) -> Self {
        self.config.fluid = fluid;
        self
    }

    /// Sets the query cache capacity.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Toggles string trimming.
    pub fn trim_strings(mut self, enabled: bool) -> Self {
        self.config.trim_strings = enabled;
        self
    }

    /// Toggles empty-string-to-null conversion.
    pub fn empty_string_to_null(mut self, enabled: bool) -> Self {
        self.config.empty_string_to_null = enabled;
        self
    }

    /// Toggles integer recognition.
    pub fn recognize_integers(mut self, enabled: bool) -> Self {
        self.config.recognize_integers = enabled;
        self
    }

    /// Toggles implicit write transactions.
    pub fn implicit_transactions(mut self, enabled: bool) -> Self {
        self.config.implicit_transactions = enabled;
        self
    }

    /// Sets the default key column name.
    pub fn default_key(mut self, name: impl Into<String>) -> Self {
        self.config.default_key = name.into();
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> StoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.dialect, DialectKind::Sqlite);
        assert_eq!(config.cache_capacity, 50);
        assert_eq!(config.default_key, "id");
        assert!(config.trim_strings);
        assert!(config.empty_string_to_null);
        assert!(config.recognize_integers);
        assert!(config.implicit_transactions);
        assert!(!config.fluid);
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::builder()
            .dialect(DialectKind::Postgres)
            .fluid(true)
            .cache_capacity(3)
            .trim_strings(false)
            .build();

        assert_eq!(config.dialect, DialectKind::Postgres);
        assert!(config.fluid);
        assert_eq!(config.cache_capacity, 3);
        assert!(!config.trim_strings);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = StoreConfig::from_toml("dialect = \"mysql\"\ncache_capacity = 0\n").unwrap();
        assert_eq!(config.dialect, DialectKind::MySql);
        assert_eq!(config.cache_capacity, 0);
        assert_eq!(config.default_key, "id");
        assert!(config.implicit_transactions);
    }

    #[test]
    fn test_rejects_empty_key() {
        let err = StoreConfig::from_toml("default_key = \"\"").unwrap_err();
        assert!(matches!(err, FluidError::InvalidConfig { .. }));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fluidb.toml");

        let config = StoreConfig::builder()
            .fluid(true)
            .default_key("pk")
            .build();
        config.save(&path).unwrap();

        let loaded = StoreConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("MariaDB".parse::<DialectKind>().unwrap(), DialectKind::MySql);
        assert_eq!("pgsql".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert!("oracle".parse::<DialectKind>().is_err());
    }
}
