//! # Fiscal Configuration
//!
//! Loaded once at startup, validated, then shared read-only behind an `Arc`
//! by the client and the service.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LARDER_FISCAL_TIN=P051234567X                                      │
//! │     LARDER_FISCAL_CMC_KEY=...                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/larder/fiscal.toml (Linux)                               │
//! │     ~/Library/Application Support/com.larder.fiscal/fiscal.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     endpoints, timeouts, 16% standard rate                             │
//! │                                                                         │
//! │  then validate(): tenant identity + business identity must be set      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [authority]
//! base_url = "https://etims-api-sbx.kra.go.ke/etims-api"
//! request_timeout_secs = 5
//! max_attempts = 3
//!
//! [tenant]
//! tin = "P051234567X"
//! branch_id = "00"
//! cmc_key = "..."
//!
//! [business]
//! name = "Mama's Kitchen"
//! address = "Moi Avenue, Nairobi"
//! phone = "0700000000"
//! email = "info@example.com"
//!
//! [tax]
//! default_rate_bps = 1600
//!
//! [registrar]
//! id = "admin"
//! name = "Admin"
//! ```

use larder_core::validation::{require, validate_tax_rate_bps};
use larder_core::{BusinessProfile, FiscalContext, Operation, Registrar, TaxRate, TaxRates};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FiscalError, FiscalResult};
use crate::retry::RetryPolicy;

// =============================================================================
// Endpoint Paths
// =============================================================================

/// One path per operation, appended to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub save_item: String,
    pub save_item_composition: String,
    pub save_sale: String,
    pub save_purchase: String,
    pub save_stock_io: String,
    pub select_codes: String,
    pub select_item_classes: String,
    pub select_branches: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        EndpointPaths {
            save_item: "/items/saveItems".to_string(),
            save_item_composition: "/items/saveItemComposition".to_string(),
            save_sale: "/trnsSales/saveSales".to_string(),
            save_purchase: "/trnsPurchase/savePurchases".to_string(),
            save_stock_io: "/stock/saveStockItems".to_string(),
            select_codes: "/code/selectCodes".to_string(),
            select_item_classes: "/itemClass/selectItemsClass".to_string(),
            select_branches: "/branches/selectBranches".to_string(),
        }
    }
}

impl EndpointPaths {
    pub fn path(&self, operation: Operation) -> &str {
        match operation {
            Operation::SaveItem => &self.save_item,
            Operation::SaveItemComposition => &self.save_item_composition,
            Operation::SaveSale => &self.save_sale,
            Operation::SavePurchase => &self.save_purchase,
            Operation::SaveStockIo => &self.save_stock_io,
            Operation::SelectCodes => &self.select_codes,
            Operation::SelectItemClasses => &self.select_item_classes,
            Operation::SelectBranches => &self.select_branches,
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Where the authority lives and how hard to try.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritySettings {
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub endpoints: EndpointPaths,

    /// Per-attempt HTTP timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Transport attempts per call, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base. The wait after attempt `k` is `base × 2^k`.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Registrations in flight at once during an item sync sweep.
    #[serde(default = "default_sync_concurrency")]
    pub sync_concurrency: usize,
}

fn default_request_timeout() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base() -> u64 {
    1000
}
fn default_sync_concurrency() -> usize {
    4
}

impl Default for AuthoritySettings {
    fn default() -> Self {
        AuthoritySettings {
            base_url: String::new(),
            endpoints: EndpointPaths::default(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            sync_concurrency: default_sync_concurrency(),
        }
    }
}

/// Taxpayer identity sent as headers on every call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantIdentity {
    #[serde(default)]
    pub tin: String,
    #[serde(default)]
    pub branch_id: String,
    /// Communication key issued at device initialisation.
    #[serde(default)]
    pub cmc_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSettings {
    /// Class B.
    #[serde(default = "default_rate")]
    pub default_rate_bps: u32,
    /// Class E.
    #[serde(default = "default_reduced_rate")]
    pub reduced_rate_bps: u32,
    #[serde(default = "default_currency")]
    pub currency_code: String,
    #[serde(default = "default_country")]
    pub country_code: String,
    /// Used for items that carry no classification of their own.
    #[serde(default = "default_item_class")]
    pub default_item_class_code: String,
}

fn default_rate() -> u32 {
    1600
}
fn default_reduced_rate() -> u32 {
    800
}
fn default_currency() -> String {
    "KES".to_string()
}
fn default_country() -> String {
    "KE".to_string()
}
fn default_item_class() -> String {
    "5020230100".to_string()
}

impl Default for TaxSettings {
    fn default() -> Self {
        TaxSettings {
            default_rate_bps: default_rate(),
            reduced_rate_bps: default_reduced_rate(),
            currency_code: default_currency(),
            country_code: default_country(),
            default_item_class_code: default_item_class(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarSettings {
    #[serde(default = "default_registrar")]
    pub id: String,
    #[serde(default = "default_registrar_name")]
    pub name: String,
}

fn default_registrar() -> String {
    "admin".to_string()
}
fn default_registrar_name() -> String {
    "Admin".to_string()
}

impl Default for RegistrarSettings {
    fn default() -> Self {
        RegistrarSettings {
            id: default_registrar(),
            name: default_registrar_name(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete fiscal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiscalConfig {
    #[serde(default)]
    pub authority: AuthoritySettings,

    #[serde(default)]
    pub tenant: TenantIdentity,

    #[serde(default)]
    pub business: BusinessProfile,

    #[serde(default)]
    pub tax: TaxSettings,

    #[serde(default)]
    pub registrar: RegistrarSettings,
}

impl FiscalConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (fiscal.toml)
    /// 3. Environment variables
    ///
    /// Fails when the result does not pass [`validate`](Self::validate).
    pub fn load(config_path: Option<PathBuf>) -> FiscalResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading fiscal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> FiscalResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| FiscalError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FiscalError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| FiscalError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Fiscal config saved");
        Ok(path)
    }

    /// Checks everything a call needs.
    ///
    /// ## Rules
    /// - `base_url`, `tin`, `branch_id`, `cmc_key` present (`MissingConfig`)
    /// - business name, address, phone and email present
    /// - `base_url` is an http(s) URL
    /// - rates within 0-100%, at least one attempt, non-zero concurrency
    pub fn validate(&self) -> FiscalResult<()> {
        let required = [
            ("authority.base_url", &self.authority.base_url),
            ("tenant.tin", &self.tenant.tin),
            ("tenant.branch_id", &self.tenant.branch_id),
            ("tenant.cmc_key", &self.tenant.cmc_key),
            ("business.name", &self.business.name),
            ("business.address", &self.business.address),
            ("business.phone", &self.business.phone),
            ("business.email", &self.business.email),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(FiscalError::MissingConfig(field));
            }
        }

        let url = Url::parse(&self.authority.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FiscalError::InvalidConfig(format!(
                "base_url must be http(s), got: {}",
                self.authority.base_url
            )));
        }

        validate_tax_rate_bps(self.tax.default_rate_bps)
            .and(validate_tax_rate_bps(self.tax.reduced_rate_bps))
            .map_err(|e| FiscalError::InvalidConfig(e.to_string()))?;
        require("tax.country_code", &self.tax.country_code)
            .and(require("registrar.id", &self.registrar.id))
            .map_err(|e| FiscalError::InvalidConfig(e.to_string()))?;

        if self.authority.max_attempts == 0 {
            return Err(FiscalError::InvalidConfig(
                "max_attempts must be greater than 0".into(),
            ));
        }
        if self.authority.sync_concurrency == 0 {
            return Err(FiscalError::InvalidConfig(
                "sync_concurrency must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let strings: [(&str, &mut String); 11] = [
            ("LARDER_FISCAL_BASE_URL", &mut self.authority.base_url),
            ("LARDER_FISCAL_TIN", &mut self.tenant.tin),
            ("LARDER_FISCAL_BRANCH_ID", &mut self.tenant.branch_id),
            ("LARDER_FISCAL_CMC_KEY", &mut self.tenant.cmc_key),
            ("LARDER_BUSINESS_NAME", &mut self.business.name),
            ("LARDER_BUSINESS_ADDRESS", &mut self.business.address),
            ("LARDER_BUSINESS_PHONE", &mut self.business.phone),
            ("LARDER_BUSINESS_EMAIL", &mut self.business.email),
            ("LARDER_REGISTRAR_ID", &mut self.registrar.id),
            ("LARDER_REGISTRAR_NAME", &mut self.registrar.name),
            ("LARDER_ITEM_CLASS_CODE", &mut self.tax.default_item_class_code),
        ];
        for (key, slot) in strings {
            if let Some(value) = lookup(key) {
                debug!(key, "Overriding fiscal setting from environment");
                *slot = value;
            }
        }

        if let Some(value) = lookup("LARDER_FISCAL_MAX_ATTEMPTS") {
            match value.parse() {
                Ok(n) => self.authority.max_attempts = n,
                Err(_) => warn!(%value, "Ignoring non-numeric LARDER_FISCAL_MAX_ATTEMPTS"),
            }
        }
        if let Some(value) = lookup("LARDER_FISCAL_TIMEOUT_SECS") {
            match value.parse() {
                Ok(n) => self.authority.request_timeout_secs = n,
                Err(_) => warn!(%value, "Ignoring non-numeric LARDER_FISCAL_TIMEOUT_SECS"),
            }
        }
        if let Some(value) = lookup("LARDER_TAX_RATE_BPS") {
            match value.parse() {
                Ok(n) => self.tax.default_rate_bps = n,
                Err(_) => warn!(%value, "Ignoring non-numeric LARDER_TAX_RATE_BPS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "larder", "fiscal")
            .map(|dirs| dirs.config_dir().join("fiscal.toml"))
    }

    // =========================================================================
    // Derived Values
    // =========================================================================

    /// Full URL for an operation. A trailing `/` on the base is ignored.
    pub fn endpoint_url(&self, operation: Operation) -> String {
        format!(
            "{}{}",
            self.authority.base_url.trim_end_matches('/'),
            self.authority.endpoints.path(operation)
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.authority.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.authority.max_attempts,
            Duration::from_millis(self.authority.backoff_base_ms),
        )
    }

    pub fn rates(&self) -> TaxRates {
        TaxRates::new(
            TaxRate::from_bps(self.tax.default_rate_bps),
            TaxRate::from_bps(self.tax.reduced_rate_bps),
        )
    }

    /// What the payload builders need.
    pub fn context(&self) -> FiscalContext {
        FiscalContext {
            country_code: self.tax.country_code.to_uppercase(),
            default_item_class_code: self.tax.default_item_class_code.clone(),
            rates: self.rates(),
            registrar: Registrar {
                id: self.registrar.id.clone(),
                name: self.registrar.name.clone(),
            },
            business: self.business.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// A configuration that passes validation.
    pub(crate) fn valid_config(base_url: &str) -> FiscalConfig {
        let mut config = FiscalConfig::default();
        config.authority.base_url = base_url.to_string();
        config.tenant = TenantIdentity {
            tin: "P051234567X".to_string(),
            branch_id: "00".to_string(),
            cmc_key: "cmc-secret".to_string(),
        };
        config.business = BusinessProfile {
            name: "Mama's Kitchen".to_string(),
            address: "Moi Avenue".to_string(),
            phone: "0700000000".to_string(),
            email: "info@example.com".to_string(),
            receipt_top_message: "Karibu".to_string(),
            receipt_bottom_message: "Asante".to_string(),
        };
        config
    }

    #[test]
    fn test_defaults() {
        let config = FiscalConfig::default();
        assert_eq!(config.authority.max_attempts, 3);
        assert_eq!(config.authority.request_timeout_secs, 5);
        assert_eq!(config.tax.default_rate_bps, 1600);
        assert_eq!(config.tax.currency_code, "KES");
        assert_eq!(
            config.authority.endpoints.path(Operation::SaveSale),
            "/trnsSales/saveSales"
        );
    }

    #[test]
    fn test_missing_tenant_fields_fail_validation() {
        assert!(valid_config("https://authority.test").validate().is_ok());

        let mut config = valid_config("https://authority.test");
        config.tenant.cmc_key = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, FiscalError::MissingConfig("tenant.cmc_key")));
        assert!(err.is_config_error());

        let mut config = valid_config("https://authority.test");
        config.authority.base_url.clear();
        assert!(matches!(
            config.validate(),
            Err(FiscalError::MissingConfig("authority.base_url"))
        ));
    }

    #[test]
    fn test_missing_business_fields_fail_validation() {
        let mut config = valid_config("https://authority.test");
        config.business.email.clear();
        assert!(matches!(
            config.validate(),
            Err(FiscalError::MissingConfig("business.email"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = valid_config("ftp://authority.test");
        assert!(matches!(config.validate(), Err(FiscalError::InvalidConfig(_))));

        config.authority.base_url = "https://authority.test".to_string();
        config.tax.default_rate_bps = 12_000;
        assert!(matches!(config.validate(), Err(FiscalError::InvalidConfig(_))));

        config.tax.default_rate_bps = 1600;
        config.authority.max_attempts = 0;
        assert!(matches!(config.validate(), Err(FiscalError::InvalidConfig(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LARDER_FISCAL_TIN", "P000000001Z"),
            ("LARDER_FISCAL_MAX_ATTEMPTS", "5"),
            ("LARDER_FISCAL_TIMEOUT_SECS", "soon"),
            ("LARDER_TAX_RATE_BPS", "1400"),
        ]);

        let mut config = valid_config("https://authority.test");
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.tenant.tin, "P000000001Z");
        assert_eq!(config.authority.max_attempts, 5);
        assert_eq!(config.authority.request_timeout_secs, 5);
        assert_eq!(config.tax.default_rate_bps, 1400);
        assert_eq!(config.tenant.branch_id, "00");
    }

    #[test]
    fn test_endpoint_url_trims_trailing_slash() {
        let config = valid_config("https://authority.test/api/");
        assert_eq!(
            config.endpoint_url(Operation::SaveItem),
            "https://authority.test/api/items/saveItems"
        );
    }

    #[test]
    fn test_context() {
        let mut config = valid_config("https://authority.test");
        config.tax.country_code = "ke".to_string();
        let ctx = config.context();
        assert_eq!(ctx.country_code, "KE");
        assert_eq!(ctx.rates.standard.bps(), 1600);
        assert_eq!(ctx.business.name, "Mama's Kitchen");
    }

    #[test]
    fn test_toml_round_trip_keeps_sections() {
        let config = valid_config("https://authority.test");
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[authority]"));
        assert!(toml_str.contains("[tenant]"));

        let parsed: FiscalConfig = toml::from_str(&toml_str).unwrap();
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: FiscalConfig = toml::from_str(
            r#"
            [authority]
            base_url = "https://authority.test"

            [tax]
            default_rate_bps = 1400
            "#,
        )
        .unwrap();
        assert_eq!(parsed.authority.max_attempts, 3);
        assert_eq!(parsed.tax.reduced_rate_bps, 800);
        assert_eq!(parsed.tax.default_rate_bps, 1400);
    }
}
