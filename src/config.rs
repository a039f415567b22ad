use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::permissions::PermissionTable;
use crate::polling::PollerConfig;
use crate::queries::list_query::SortMode;
use crate::store::Collection;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;

/// Status polling configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Milliseconds between two status fetches
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 100, max = 3600000))]
    pub interval_ms: u64,

    /// Start polling as soon as the poller is constructed
    #[serde(default)]
    pub auto_start: bool,

    /// Per-fetch timeout in milliseconds; unset means a hanging fetch stalls the poller
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,

    /// Stop after this many failed fetches in a row; unset means retry forever
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            auto_start: false,
            fetch_timeout_ms: None,
            max_consecutive_failures: None,
        }
    }
}

impl PollingConfig {
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.interval_ms),
            auto_start: self.auto_start,
            fetch_timeout: self.fetch_timeout_ms.map(Duration::from_millis),
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}

/// List rendering configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ListingConfig {
    /// "conventional" or "legacy" comparator semantics
    #[serde(default)]
    pub sort_mode: SortMode,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    #[validate(range(min = 1, max = 10000))]
    pub max_page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            sort_mode: SortMode::default(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Document numbering and workflow configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DocumentConfig {
    #[serde(default = "default_invoice_prefix")]
    #[validate(length(min = 1, max = 8), custom = "validate_prefix")]
    pub invoice_prefix: String,

    #[serde(default = "default_quotation_prefix")]
    #[validate(length(min = 1, max = 8), custom = "validate_prefix")]
    pub quotation_prefix: String,

    #[serde(default = "default_sales_order_prefix")]
    #[validate(length(min = 1, max = 8), custom = "validate_prefix")]
    pub sales_order_prefix: String,

    #[serde(default = "default_proforma_prefix")]
    #[validate(length(min = 1, max = 8), custom = "validate_prefix")]
    pub proforma_prefix: String,

    #[serde(default = "default_product_prefix")]
    #[validate(length(min = 1, max = 8), custom = "validate_prefix")]
    pub product_prefix: String,

    /// Days between invoice issue and due date for converted documents
    #[serde(default = "default_payment_terms_days")]
    #[validate(range(max = 365))]
    pub payment_terms_days: u32,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            invoice_prefix: default_invoice_prefix(),
            quotation_prefix: default_quotation_prefix(),
            sales_order_prefix: default_sales_order_prefix(),
            proforma_prefix: default_proforma_prefix(),
            product_prefix: default_product_prefix(),
            payment_terms_days: default_payment_terms_days(),
        }
    }
}

impl DocumentConfig {
    /// Number prefix for records of `collection`.
    pub fn prefix_for(&self, collection: Collection) -> &str {
        match collection {
            Collection::Invoices => &self.invoice_prefix,
            Collection::Quotations => &self.quotation_prefix,
            Collection::SalesOrders => &self.sales_order_prefix,
            Collection::ProformaInvoices => &self.proforma_prefix,
            Collection::Products => &self.product_prefix,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub listing: ListingConfig,

    #[serde(default)]
    pub documents: DocumentConfig,

    /// Role name -> granted capabilities. Replaces the built-in table when set.
    #[serde(default)]
    pub roles: Option<HashMap<String, Vec<String>>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            polling: PollingConfig::default(),
            listing: ListingConfig::default(),
            documents: DocumentConfig::default(),
            roles: None,
        }
    }
}

impl AppConfig {
    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Builds the permission table, preferring configured roles over the built-in set.
    pub fn permission_table(&self) -> PermissionTable {
        match &self.roles {
            Some(roles) => PermissionTable::from_grants(roles.clone()),
            None => PermissionTable::default(),
        }
    }

    /// Validates every section, then cross-field constraints.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        self.polling.validate()?;
        self.listing.validate()?;
        self.documents.validate()?;
        self.validate_additional_constraints()
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.listing.default_page_size > self.listing.max_page_size {
            let mut err = ValidationError::new("default_page_size_exceeds_max");
            err.message = Some("listing.default_page_size must not exceed listing.max_page_size".into());
            errors.add("default_page_size", err);
        }

        if let Some(timeout) = self.polling.fetch_timeout_ms {
            if timeout == 0 {
                let mut err = ValidationError::new("fetch_timeout_ms");
                err.message = Some("polling.fetch_timeout_ms must be greater than 0 when set".into());
                errors.add("fetch_timeout_ms", err);
            }
        }

        if self.polling.max_consecutive_failures == Some(0) {
            let mut err = ValidationError::new("max_consecutive_failures");
            err.message =
                Some("polling.max_consecutive_failures must be greater than 0 when set".into());
            errors.add("max_consecutive_failures", err);
        }

        let prefixes = [
            &self.documents.invoice_prefix,
            &self.documents.quotation_prefix,
            &self.documents.sales_order_prefix,
            &self.documents.proforma_prefix,
            &self.documents.product_prefix,
        ];
        let unique: std::collections::HashSet<&String> = prefixes.iter().copied().collect();
        if unique.len() != prefixes.len() {
            let mut err = ValidationError::new("duplicate_prefix");
            err.message = Some("document number prefixes must be distinct".into());
            errors.add("documents", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_payment_terms_days() -> u32 {
    DEFAULT_PAYMENT_TERMS_DAYS
}

fn default_invoice_prefix() -> String {
    "INV".to_string()
}

fn default_quotation_prefix() -> String {
    "QUO".to_string()
}

fn default_sales_order_prefix() -> String {
    "SO".to_string()
}

fn default_proforma_prefix() -> String {
    "PRO".to_string()
}

fn default_product_prefix() -> String {
    "PRD".to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("prefix");
        err.message = Some("Prefixes may only contain A-Z and 0-9".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("bizdesk={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration from the `config` directory of the
/// working directory.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `{dir}/default.toml`
/// 3. `{dir}/{env}.toml`, env taken from RUN_ENV or APP_ENV
/// 4. Environment variables (APP__*, `__` separates nested keys)
pub fn load_config_from(dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
        .add_source(File::with_name(&dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate_all().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
