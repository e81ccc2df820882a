use crate::aggregate::DEFAULT_AMOUNT_UNIT;
use crate::error::{DashboardError, Result};
use crate::metrics::MetricsPolicy;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

/// Settings for one dashboard session. Every field has a default so an
/// empty (or absent) `dashboard.toml` is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Department code rows must carry; `None` keeps every department.
    pub scope_code: Option<String>,
    /// Allowed budget types; empty keeps every type.
    pub budget_types: BTreeSet<String>,
    /// Divisor applied to summed amounts (1e6 = millions of euros).
    pub amount_unit: f64,
    pub annex_budget_type: String,
    pub ranking_size: usize,
    pub policy: MetricsPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("ofgl-base-communes.csv"),
            output_dir: PathBuf::from("."),
            scope_code: Some("974".to_string()),
            budget_types: BTreeSet::new(),
            amount_unit: DEFAULT_AMOUNT_UNIT,
            annex_budget_type: "Budget annexe".to_string(),
            ranking_size: 10,
            policy: MetricsPolicy::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: DashboardConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.amount_unit.is_finite() && self.amount_unit > 0.0) {
            return Err(DashboardError::InvalidConfig(format!(
                "amount_unit must be a positive number, got {}",
                self.amount_unit
            )));
        }
        if self.ranking_size == 0 {
            return Err(DashboardError::InvalidConfig(
                "ranking_size must be at least 1".to_string(),
            ));
        }
        self.policy.validate()
    }
}
