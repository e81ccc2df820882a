// Derived figures for one aggregated record.
//
// None of these are observed values. The source data carries neither a
// debt stock nor a spending total, so both are estimated from the
// indicators with the constants in `MetricsPolicy`.
use crate::aggregate::{EntityYearRecord, DEFAULT_AMOUNT_UNIT};
use crate::error::{DashboardError, Result};
use crate::indicator::FinancialIndicator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsPolicy {
    /// Expense estimate never drops below this share of revenue.
    pub expense_floor_ratio: f64,
    /// Years of financing gap capitalised into the debt estimate.
    pub debt_capitalization_years: f64,
    /// Debt estimate as a multiple of revenue when there is no gap figure.
    pub debt_revenue_multiple: f64,
    pub ratio_min: f64,
    pub ratio_max: f64,
    /// Debt ratio reported when revenue is zero or negative.
    pub ratio_default: f64,
}

impl Default for MetricsPolicy {
    fn default() -> Self {
        Self {
            expense_floor_ratio: 0.9,
            debt_capitalization_years: 5.0,
            debt_revenue_multiple: 1.2,
            ratio_min: 0.5,
            ratio_max: 2.5,
            ratio_default: 1.0,
        }
    }
}

impl MetricsPolicy {
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("expense_floor_ratio", self.expense_floor_ratio),
            ("debt_capitalization_years", self.debt_capitalization_years),
            ("debt_revenue_multiple", self.debt_revenue_multiple),
            ("ratio_min", self.ratio_min),
            ("ratio_max", self.ratio_max),
            ("ratio_default", self.ratio_default),
        ];
        if let Some((name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(DashboardError::InvalidPolicy(format!("{} must be finite", name)));
        }
        if !(0.0..=1.0).contains(&self.expense_floor_ratio) {
            return Err(DashboardError::InvalidPolicy(format!(
                "expense_floor_ratio {} must be between 0.0 and 1.0",
                self.expense_floor_ratio
            )));
        }
        if self.debt_capitalization_years < 0.0 || self.debt_revenue_multiple < 0.0 {
            return Err(DashboardError::InvalidPolicy(
                "debt multipliers must not be negative".to_string(),
            ));
        }
        if self.ratio_min > self.ratio_max {
            return Err(DashboardError::InvalidPolicy(format!(
                "ratio_min {} is above ratio_max {}",
                self.ratio_min, self.ratio_max
            )));
        }
        Ok(())
    }
}

/// Where the debt estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtProvenance {
    /// Capitalised financing capacity or need.
    FinancingGap,
    /// Revenue multiple, used when the financing figure is zero or absent.
    RevenueMultiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioBasis {
    Computed,
    /// Computed then pulled back into the policy bounds.
    Clamped,
    /// Revenue was not positive; the policy default stands in.
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ratio {
    pub value: f64,
    pub basis: RatioBasis,
}

impl Ratio {
    pub fn is_defined(&self) -> bool {
        self.basis != RatioBasis::Defaulted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRecord {
    #[serde(flatten)]
    pub base: EntityYearRecord,
    /// Approximation: revenue minus savings, floored at a share of revenue.
    pub expense_estimate: f64,
    /// Proxy, not observed debt.
    pub debt_estimate: f64,
    pub debt_provenance: DebtProvenance,
    pub surplus: f64,
    pub debt_to_revenue: Ratio,
    /// Expense estimate as a percentage of revenue.
    pub expense_to_revenue_pct: Option<f64>,
    /// Euros per inhabitant.
    pub surplus_per_capita: Option<f64>,
    /// Unit of the indicator fields, needed to turn them into euros.
    pub amount_unit: f64,
}

impl DerivedRecord {
    pub fn entity(&self) -> &str {
        &self.base.entity
    }

    pub fn year(&self) -> i32 {
        self.base.year
    }

    /// Euros per inhabitant for `value` expressed in `amount_unit`.
    fn per_capita(&self, value: f64) -> Option<f64> {
        match self.base.population {
            Some(p) if p > 0.0 => Some(value * self.amount_unit / p),
            _ => None,
        }
    }

    /// Indicator in euros per inhabitant; `None` without a population.
    pub fn amount_per_capita(&self, indicator: FinancialIndicator) -> Option<f64> {
        self.per_capita(self.base.value(indicator))
    }

    pub fn expense_per_capita(&self) -> Option<f64> {
        self.per_capita(self.expense_estimate)
    }

    pub fn debt_per_capita(&self) -> Option<f64> {
        self.per_capita(self.debt_estimate)
    }
}

#[derive(Debug, Clone)]
pub struct DerivedMetrics {
    policy: MetricsPolicy,
    amount_unit: f64,
}

impl Default for DerivedMetrics {
    fn default() -> Self {
        Self::new(MetricsPolicy::default(), DEFAULT_AMOUNT_UNIT)
    }
}

impl DerivedMetrics {
    pub fn new(policy: MetricsPolicy, amount_unit: f64) -> Self {
        Self {
            policy,
            amount_unit,
        }
    }

    /// Stateless per-record transform. Never divides by zero: undefined
    /// per-capita values are `None` and an undefined ratio is marked
    /// `Defaulted`.
    pub fn derive(&self, record: EntityYearRecord) -> DerivedRecord {
        let p = &self.policy;
        let revenue = record.revenue;

        let expense_estimate = if revenue > 0.0 {
            (revenue - record.gross_savings).max(revenue * p.expense_floor_ratio)
        } else {
            0.0
        };

        let (debt_estimate, debt_provenance) = if record.financing_capacity != 0.0 {
            (
                record.financing_capacity.abs() * p.debt_capitalization_years,
                DebtProvenance::FinancingGap,
            )
        } else {
            (revenue.max(0.0) * p.debt_revenue_multiple, DebtProvenance::RevenueMultiple)
        };

        let debt_to_revenue = if revenue > 0.0 {
            let raw = debt_estimate / revenue;
            let clamped = raw.max(p.ratio_min).min(p.ratio_max);
            Ratio {
                value: clamped,
                basis: if clamped == raw {
                    RatioBasis::Computed
                } else {
                    RatioBasis::Clamped
                },
            }
        } else {
            Ratio {
                value: p.ratio_default,
                basis: RatioBasis::Defaulted,
            }
        };

        let surplus = revenue - expense_estimate;
        let expense_to_revenue_pct = (revenue > 0.0).then(|| expense_estimate / revenue * 100.0);

        let mut derived = DerivedRecord {
            base: record,
            expense_estimate,
            debt_estimate,
            debt_provenance,
            surplus,
            debt_to_revenue,
            expense_to_revenue_pct,
            surplus_per_capita: None,
            amount_unit: self.amount_unit,
        };
        derived.surplus_per_capita = derived.per_capita(surplus);
        derived
    }

    pub fn derive_all(&self, records: Vec<EntityYearRecord>) -> Vec<DerivedRecord> {
        records.into_iter().map(|r| self.derive(r)).collect()
    }
}
