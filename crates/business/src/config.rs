//! Service configuration
//!
//! Every tunable is configurable via JSON file or `LOYALTY_*` environment
//! variables, with serde defaults for missing fields.

use crate::error::{LoyaltyError, LoyaltyResult};
use loyalty_core::{Pbkdf2PinHasher, PinScheme, PointsPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the loyalty services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyConfig {
    // === Points ===
    /// Points earned per currency unit on credit (0.01 = 1%)
    #[serde(default = "default_credit_rate")]
    pub credit_rate: Decimal,

    /// Points spent per currency unit on debit
    #[serde(default = "default_debit_rate")]
    pub debit_rate: Decimal,

    // === Append protocol ===
    /// Attempts before a tail conflict is surfaced to the caller
    #[serde(default = "default_max_append_attempts")]
    pub max_append_attempts: u32,

    /// Timeout for a single store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    // === Credentials ===
    /// Scheme for newly registered PINs. Stored digests of either scheme verify.
    #[serde(default)]
    pub pin_scheme: PinSchemeKind,

    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    #[serde(default = "default_min_pin_length")]
    pub min_pin_length: usize,

    #[serde(default = "default_max_pin_length")]
    pub max_pin_length: usize,

    // === Transactions ===
    /// Payment method recorded when the caller gives none
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

/// PIN hashing scheme selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PinSchemeKind {
    /// PBKDF2-HMAC-SHA256 with random salt
    #[default]
    Salted,
    /// Unsalted SHA-256 hex
    Legacy,
}

impl FromStr for PinSchemeKind {
    type Err = LoyaltyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "salted" => Ok(PinSchemeKind::Salted),
            "legacy" => Ok(PinSchemeKind::Legacy),
            other => Err(LoyaltyError::Configuration(format!(
                "unknown pin scheme: {}",
                other
            ))),
        }
    }
}

fn default_credit_rate() -> Decimal {
    Decimal::new(1, 2)
}

fn default_debit_rate() -> Decimal {
    Decimal::ONE
}

fn default_max_append_attempts() -> u32 {
    3
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_pbkdf2_iterations() -> u32 {
    100_000
}

fn default_min_pin_length() -> usize {
    4
}

fn default_max_pin_length() -> usize {
    8
}

fn default_payment_method() -> String {
    "Cash".to_string()
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            credit_rate: default_credit_rate(),
            debit_rate: default_debit_rate(),
            max_append_attempts: default_max_append_attempts(),
            store_timeout_ms: default_store_timeout_ms(),
            pin_scheme: PinSchemeKind::default(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            min_pin_length: default_min_pin_length(),
            max_pin_length: default_max_pin_length(),
            payment_method: default_payment_method(),
        }
    }
}

impl LoyaltyConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> LoyaltyResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LoyaltyError::Configuration(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| LoyaltyError::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overlaid with `LOYALTY_*` environment variables
    pub fn from_env() -> LoyaltyResult<Self> {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay values from a variable lookup (environment in production)
    pub fn overlay<F>(mut self, lookup: F) -> LoyaltyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LOYALTY_CREDIT_RATE") {
            self.credit_rate = parse_var("LOYALTY_CREDIT_RATE", &v)?;
        }
        if let Some(v) = get("LOYALTY_DEBIT_RATE") {
            self.debit_rate = parse_var("LOYALTY_DEBIT_RATE", &v)?;
        }
        if let Some(v) = get("LOYALTY_MAX_APPEND_ATTEMPTS") {
            self.max_append_attempts = parse_var("LOYALTY_MAX_APPEND_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("LOYALTY_STORE_TIMEOUT_MS") {
            self.store_timeout_ms = parse_var("LOYALTY_STORE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("LOYALTY_PIN_SCHEME") {
            self.pin_scheme = v.parse()?;
        }
        if let Some(v) = get("LOYALTY_PBKDF2_ITERATIONS") {
            self.pbkdf2_iterations = parse_var("LOYALTY_PBKDF2_ITERATIONS", &v)?;
        }
        if let Some(v) = get("LOYALTY_MIN_PIN_LENGTH") {
            self.min_pin_length = parse_var("LOYALTY_MIN_PIN_LENGTH", &v)?;
        }
        if let Some(v) = get("LOYALTY_MAX_PIN_LENGTH") {
            self.max_pin_length = parse_var("LOYALTY_MAX_PIN_LENGTH", &v)?;
        }
        if let Some(v) = get("LOYALTY_PAYMENT_METHOD") {
            self.payment_method = v.trim().to_string();
        }

        Ok(self)
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> LoyaltyResult<()> {
        if self.credit_rate <= Decimal::ZERO || self.debit_rate <= Decimal::ZERO {
            return Err(LoyaltyError::Configuration(format!(
                "points rates must be positive (credit {}, debit {})",
                self.credit_rate, self.debit_rate
            )));
        }
        if self.max_append_attempts == 0 {
            return Err(LoyaltyError::Configuration(
                "max_append_attempts must be at least 1".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(LoyaltyError::Configuration(
                "store_timeout_ms must be positive".to_string(),
            ));
        }
        if self.pin_scheme == PinSchemeKind::Salted
            && !(1..=Pbkdf2PinHasher::MAX_ITERATIONS).contains(&self.pbkdf2_iterations)
        {
            return Err(LoyaltyError::Configuration(format!(
                "pbkdf2_iterations must be within 1..={}",
                Pbkdf2PinHasher::MAX_ITERATIONS
            )));
        }
        if self.min_pin_length == 0 || self.min_pin_length > self.max_pin_length {
            return Err(LoyaltyError::Configuration(format!(
                "invalid PIN length bounds {}..={}",
                self.min_pin_length, self.max_pin_length
            )));
        }
        if self.payment_method.trim().is_empty() {
            return Err(LoyaltyError::Configuration(
                "payment_method cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn points_policy(&self) -> LoyaltyResult<PointsPolicy> {
        PointsPolicy::new(self.credit_rate, self.debit_rate)
            .map_err(|e| LoyaltyError::Configuration(e.to_string()))
    }

    pub fn scheme(&self) -> PinScheme {
        match self.pin_scheme {
            PinSchemeKind::Legacy => PinScheme::Legacy,
            PinSchemeKind::Salted => PinScheme::Salted {
                iterations: self.pbkdf2_iterations,
            },
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> LoyaltyResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LoyaltyError::Configuration(format!("{} has invalid value {:?}", name, value)))
}
