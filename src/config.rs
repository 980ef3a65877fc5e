use crate::constants::{DUST_TOLERANCE, MAX_AMOUNT};
use dotenv::dotenv;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Which payment settlement model an engine instance runs.
///
/// The two models keep debts in incompatible shapes, so an engine only ever
/// runs one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SettlementModel {
    /// Payments are ledger entries; every payment triggers a full recompute.
    #[default]
    Ledger,
    /// Debts track a mutable `paid_amount` that is adjusted in place.
    PaidAmount,
}

impl fmt::Display for SettlementModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SettlementModel::Ledger => "ledger",
            SettlementModel::PaidAmount => "paid_amount",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SettlementModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ledger" => Ok(SettlementModel::Ledger),
            "paid_amount" | "paid-amount" => Ok(SettlementModel::PaidAmount),
            other => Err(format!("unknown settlement model `{}`", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub log_level: String,
    pub settlement_model: SettlementModel,
    pub dust_tolerance: f64,
    pub max_amount: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            settlement_model: SettlementModel::default(),
            dust_tolerance: DUST_TOLERANCE,
            max_amount: MAX_AMOUNT,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();

        Self {
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            settlement_model: env::var("SETTLEMENT_MODEL")
                .ok()
                .and_then(|v| match v.parse() {
                    Ok(model) => Some(model),
                    Err(e) => {
                        log::warn!("Ignoring SETTLEMENT_MODEL: {}", e);
                        None
                    }
                })
                .unwrap_or(defaults.settlement_model),
            dust_tolerance: env::var("DUST_TOLERANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|t: &f64| t.is_finite() && *t >= 0.0)
                .unwrap_or(defaults.dust_tolerance),
            max_amount: env::var("MAX_AMOUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m: &f64| m.is_finite() && *m > 0.0)
                .unwrap_or(defaults.max_amount),
        }
    }

    pub fn with_settlement_model(mut self, model: SettlementModel) -> Self {
        self.settlement_model = model;
        self
    }
}

// Global static accessible everywhere
pub static CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::from_env);
