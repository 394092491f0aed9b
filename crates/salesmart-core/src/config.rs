//! Runtime configuration for the sales ETL driver.
//!
//! Loaded from a TOML file. Every section has defaults, so a minimal file only
//! needs the bucket and database.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::reconcile::record_columns;

pub const DEFAULT_CONFIG_PATH: &str = "salesmart.toml";

pub const DEFAULT_MANDATORY_COLUMNS: [&str; 8] = [
    "customer_id",
    "store_id",
    "product_name",
    "sales_date",
    "sales_person_id",
    "price",
    "quantity",
    "total_cost",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid SQL identifier for table '{field}': {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub object_store: ObjectStoreConfig,
    pub encryption: EncryptionConfig,
    pub database: DatabaseConfig,
    pub tables: TableNames,
    pub schema: SchemaConfig,
    pub paths: LocalPaths,
    pub incentive: IncentiveConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// When true, `access_key` / `secret_key` hold ciphertext produced by `encrypt-secret`.
    pub credentials_encrypted: bool,
    pub source_prefix: String,
    pub error_prefix: String,
    pub processed_prefix: String,
    pub customer_mart_prefix: String,
    pub sales_mart_prefix: String,
    pub sales_partitioned_prefix: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            force_path_style: false,
            access_key: None,
            secret_key: None,
            credentials_encrypted: true,
            source_prefix: "sales_data/".to_string(),
            error_prefix: "sales_data_error/".to_string(),
            processed_prefix: "sales_data_processed/".to_string(),
            customer_mart_prefix: "customer_data_mart".to_string(),
            sales_mart_prefix: "sales_data_mart".to_string(),
            sales_partitioned_prefix: "sales_partitioned_data_mart".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub key: String,
    pub iv: String,
    pub salt: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key: "my_de_project".to_string(),
            iv: "de_proj_enctrpto".to_string(),
            salt: "myde_AesEncryption".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub customer: String,
    pub product: String,
    pub staging: String,
    pub sales_team: String,
    pub store: String,
    pub customer_mart: String,
    pub sales_team_mart: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            customer: "customer".to_string(),
            product: "product".to_string(),
            staging: "product_staging_table".to_string(),
            sales_team: "sales_team".to_string(),
            store: "store".to_string(),
            customer_mart: "customers_data_mart".to_string(),
            sales_team_mart: "sales_team_data_mart".to_string(),
        }
    }
}

impl TableNames {
    fn validate(&self) -> Result<(), ConfigError> {
        let fields: [(&'static str, &str); 7] = [
            ("customer", &self.customer),
            ("product", &self.product),
            ("staging", &self.staging),
            ("sales_team", &self.sales_team),
            ("store", &self.store),
            ("customer_mart", &self.customer_mart),
            ("sales_team_mart", &self.sales_team_mart),
        ];

        for (field, value) in fields {
            if !is_sql_identifier(value) {
                return Err(ConfigError::InvalidIdentifier {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub mandatory_columns: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            mandatory_columns: DEFAULT_MANDATORY_COLUMNS
                .iter()
                .map(|column| column.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalPaths {
    pub download_dir: PathBuf,
    pub error_dir: PathBuf,
    pub customer_mart_dir: PathBuf,
    pub sales_mart_dir: PathBuf,
    pub sales_partitioned_dir: PathBuf,
}

impl Default for LocalPaths {
    fn default() -> Self {
        Self::under(Path::new("spark_data"))
    }
}

impl LocalPaths {
    /// Every directory rooted under `root`, keeping the default layout.
    pub fn under(root: &Path) -> Self {
        Self {
            download_dir: root.join("file_from_s3"),
            error_dir: root.join("error_files"),
            customer_mart_dir: root.join("customer_data_mart"),
            sales_mart_dir: root.join("sales_team_data_mart"),
            sales_partitioned_dir: root.join("sales_partition_data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncentiveScope {
    /// Top performer per store and month.
    #[default]
    PerStore,
    /// Top performer across all stores per month.
    Global,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct IncentiveConfig {
    pub scope: IncentiveScope,
    pub rate: f64,
}

impl Default for IncentiveConfig {
    fn default() -> Self {
        Self {
            scope: IncentiveScope::PerStore,
            rate: 0.01,
        }
    }
}

impl AppConfig {
    /// Load the config file (explicit path, `SALESMART_CONFIG`, or `salesmart.toml`)
    /// and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SALESMART_CONFIG").map(PathBuf::from));

        // Without an explicit path a missing default file means "all defaults".
        let path = match explicit {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => PathBuf::from(DEFAULT_CONFIG_PATH),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                return Ok(config);
            }
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let mut config = Self::from_toml_str(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) =
            std::env::var("DATABASE_URL").or_else(|_| std::env::var("SALESMART_DATABASE_URL"))
        {
            self.database.url = Some(url);
        }
        if let Ok(endpoint) = std::env::var("S3_ENDPOINT_URL") {
            self.object_store.endpoint = Some(endpoint);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tables.validate()?;

        if self.schema.mandatory_columns.is_empty() {
            return Err(ConfigError::Invalid(
                "schema.mandatory_columns cannot be empty".into(),
            ));
        }
        let absent: Vec<&str> = record_columns()
            .iter()
            .copied()
            .filter(|column| !self.schema.mandatory_columns.iter().any(|m| m == column))
            .collect();
        if !absent.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "schema.mandatory_columns must include every sales record column; missing {absent:?}"
            )));
        }
        if !(self.incentive.rate.is_finite() && self.incentive.rate >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "incentive.rate must be a non-negative number, got {}",
                self.incentive.rate
            )));
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database.url.as_deref().ok_or_else(|| {
            ConfigError::Invalid(
                "database.url (or DATABASE_URL / SALESMART_DATABASE_URL) must be set".into(),
            )
        })
    }
}

/// Plain or schema-qualified identifier: `[A-Za-z_][A-Za-z0-9_]*` segments joined by `.`.
pub fn is_sql_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
