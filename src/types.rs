// Display rows for tables and CSV exports.
//
// Values are pre-formatted strings so the preview table and the exported
// file show the same thing. Estimated columns say so in their header.
use chrono::{DateTime, Local};
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RoleRow {
    #[serde(rename = "Role")]
    #[tabled(rename = "Role")]
    pub role: String,
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "MatchedBy")]
    #[tabled(rename = "MatchedBy")]
    pub matched_by: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SynthesisRow {
    #[serde(rename = "Commune")]
    #[tabled(rename = "Commune")]
    pub commune: String,
    #[serde(rename = "Exercice")]
    #[tabled(rename = "Exercice")]
    pub year: i32,
    #[serde(rename = "Population")]
    #[tabled(rename = "Population")]
    pub population: String,
    #[serde(rename = "Revenue")]
    #[tabled(rename = "Revenue")]
    pub revenue: String,
    #[serde(rename = "GrossSavings")]
    #[tabled(rename = "GrossSavings")]
    pub gross_savings: String,
    #[serde(rename = "ExpenseEstimate")]
    #[tabled(rename = "ExpenseEstimate")]
    pub expense_estimate: String,
    #[serde(rename = "Surplus")]
    #[tabled(rename = "Surplus")]
    pub surplus: String,
    #[serde(rename = "DebtEstimate")]
    #[tabled(rename = "DebtEstimate")]
    pub debt_estimate: String,
    #[serde(rename = "DebtBasis")]
    #[tabled(rename = "DebtBasis")]
    pub debt_basis: String,
    #[serde(rename = "DebtToRevenue")]
    #[tabled(rename = "DebtToRevenue")]
    pub debt_to_revenue: String,
    #[serde(rename = "ExpensePerCapita")]
    #[tabled(rename = "ExpensePerCapita")]
    pub expense_per_capita: String,
    #[serde(rename = "SurplusPerCapita")]
    #[tabled(rename = "SurplusPerCapita")]
    pub surplus_per_capita: String,
    #[serde(rename = "ExpenseToRevenuePct")]
    #[tabled(rename = "ExpenseToRevenuePct")]
    pub expense_to_revenue_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Commune")]
    #[tabled(rename = "Commune")]
    pub commune: String,
    #[serde(rename = "Exercice")]
    #[tabled(rename = "Exercice")]
    pub year: i32,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupComparisonRow {
    #[serde(rename = "EPCI")]
    #[tabled(rename = "EPCI")]
    pub group: String,
    #[serde(rename = "Exercice")]
    #[tabled(rename = "Exercice")]
    pub year: i32,
    #[serde(rename = "Communes")]
    #[tabled(rename = "Communes")]
    pub communes: usize,
    #[serde(rename = "Population")]
    #[tabled(rename = "Population")]
    pub population: String,
    #[serde(rename = "GrossSavings")]
    #[tabled(rename = "GrossSavings")]
    pub gross_savings: String,
    #[serde(rename = "FinancingCapacity")]
    #[tabled(rename = "FinancingCapacity")]
    pub financing_capacity: String,
    #[serde(rename = "TaxesAndDuties")]
    #[tabled(rename = "TaxesAndDuties")]
    pub taxes_and_duties: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ServiceRow {
    #[serde(rename = "Service")]
    #[tabled(rename = "Service")]
    pub service: String,
    #[serde(rename = "Budgets")]
    #[tabled(rename = "Budgets")]
    pub budgets: usize,
    #[serde(rename = "TotalAmount")]
    #[tabled(rename = "TotalAmount")]
    pub total_amount: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StratumRow {
    #[serde(rename = "Strate")]
    #[tabled(rename = "Strate")]
    pub stratum: String,
    #[serde(rename = "Communes")]
    #[tabled(rename = "Communes")]
    pub communes: usize,
    #[serde(rename = "MeanSavingsPerCapita")]
    #[tabled(rename = "MeanSavingsPerCapita")]
    pub mean_savings_per_capita: String,
    #[serde(rename = "MedianSavingsPerCapita")]
    #[tabled(rename = "MedianSavingsPerCapita")]
    pub median_savings_per_capita: String,
}

#[derive(Debug, Serialize)]
pub struct OverviewStats {
    pub generated_at: DateTime<Local>,
    pub communes: usize,
    pub entity_years: usize,
    pub total_population: f64,
    pub total_revenue: f64,
    pub total_gross_savings: f64,
    pub total_expense_estimate: f64,
    pub avg_expense_to_revenue_pct: Option<f64>,
    /// Euros per inhabitant, over records with a population.
    pub median_expense_per_capita: Option<f64>,
    /// Share (%) of commune-years with a positive financing capacity, over
    /// those where it was observed and a population is known.
    pub positive_financing_share_pct: Option<f64>,
    /// Unit of the amount totals (1e6 = millions of euros).
    pub amount_unit: f64,
}
