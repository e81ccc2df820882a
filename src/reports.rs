use crate::annex::ServiceSummary;
use crate::indicator::FinancialIndicator;
use crate::metrics::{DebtProvenance, DerivedRecord, RatioBasis};
use crate::schema::ColumnRoles;
use crate::schema::MatchKind;
use crate::types::{
    GroupComparisonRow, OverviewStats, RankingRow, RoleRow, ServiceRow, StratumRow, SynthesisRow,
};
use crate::util::{average, format_number, format_optional, format_population, median};
use chrono::Local;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// What a ranking sorts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMetric {
    Revenue,
    GrossSavings,
    FinancingCapacityPerCapita,
    SurplusPerCapita,
    ExpensePerCapita,
    DebtToRevenue,
}

impl RankingMetric {
    /// `None` when the metric is undefined for the record.
    pub fn value(&self, r: &DerivedRecord) -> Option<f64> {
        match self {
            RankingMetric::Revenue => r.base.observed(FinancialIndicator::Revenue),
            RankingMetric::GrossSavings => r.base.observed(FinancialIndicator::GrossSavings),
            RankingMetric::FinancingCapacityPerCapita => {
                r.base.observed(FinancialIndicator::FinancingCapacityOrNeed)?;
                r.amount_per_capita(FinancialIndicator::FinancingCapacityOrNeed)
            }
            RankingMetric::SurplusPerCapita => r.surplus_per_capita,
            RankingMetric::ExpensePerCapita => r.expense_per_capita(),
            RankingMetric::DebtToRevenue => {
                r.debt_to_revenue.is_defined().then_some(r.debt_to_revenue.value)
            }
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RankingMetric::Revenue => "Revenue",
            RankingMetric::GrossSavings => "Gross savings",
            RankingMetric::FinancingCapacityPerCapita => "Financing capacity per inhabitant (€)",
            RankingMetric::SurplusPerCapita => "Surplus per inhabitant (€)",
            RankingMetric::ExpensePerCapita => "Estimated expense per inhabitant (€)",
            RankingMetric::DebtToRevenue => "Estimated debt / revenue",
        }
    }

    fn decimals(&self) -> usize {
        match self {
            RankingMetric::Revenue | RankingMetric::GrossSavings | RankingMetric::DebtToRevenue => 2,
            _ => 0,
        }
    }
}

/// Which column came from where, for the diagnostic view.
pub fn generate_role_table(roles: &ColumnRoles) -> Vec<RoleRow> {
    roles
        .iter()
        .map(|(role, col)| RoleRow {
            role: role.to_string(),
            column: col.name.clone(),
            matched_by: match &col.matched_by {
                MatchKind::Alias => "alias".to_string(),
                MatchKind::Keyword(k) => format!("keyword \"{}\"", k),
            },
        })
        .collect()
}

/// One formatted row per record, sorted by revenue (descending) then name.
pub fn generate_synthesis(records: &[DerivedRecord]) -> Vec<SynthesisRow> {
    let mut sorted: Vec<&DerivedRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        b.base
            .revenue
            .partial_cmp(&a.base.revenue)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.entity().cmp(b.entity()))
            .then_with(|| a.year().cmp(&b.year()))
    });
    sorted
        .into_iter()
        .map(|r| SynthesisRow {
            commune: r.base.entity.clone(),
            year: r.base.year,
            population: format_population(r.base.population),
            revenue: format_number(r.base.revenue, 2),
            gross_savings: format_number(r.base.gross_savings, 2),
            expense_estimate: format_number(r.expense_estimate, 2),
            surplus: format_number(r.surplus, 2),
            debt_estimate: format_number(r.debt_estimate, 2),
            debt_basis: match r.debt_provenance {
                DebtProvenance::FinancingGap => "financing gap x years".to_string(),
                DebtProvenance::RevenueMultiple => "revenue multiple".to_string(),
            },
            debt_to_revenue: match r.debt_to_revenue.basis {
                RatioBasis::Defaulted => format!("{} (default)", format_number(r.debt_to_revenue.value, 2)),
                RatioBasis::Clamped => format!("{} (clamped)", format_number(r.debt_to_revenue.value, 2)),
                RatioBasis::Computed => format_number(r.debt_to_revenue.value, 2),
            },
            expense_per_capita: format_optional(r.expense_per_capita(), 0),
            surplus_per_capita: format_optional(r.surplus_per_capita, 0),
            expense_to_revenue_pct: format_optional(r.expense_to_revenue_pct, 1),
        })
        .collect()
}

/// Top `n` records for `metric` in `year` (all years when `None`),
/// descending, ties by name. Records where the metric is undefined are left
/// out rather than ranked as zero.
pub fn generate_ranking(
    records: &[DerivedRecord],
    metric: RankingMetric,
    year: Option<i32>,
    n: usize,
) -> Vec<RankingRow> {
    let mut scored: Vec<(f64, &DerivedRecord)> = records
        .iter()
        .filter(|r| year.map_or(true, |y| r.year() == y))
        .filter_map(|r| metric.value(r).map(|v| (v, r)))
        .collect();
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.entity().cmp(b.1.entity()))
    });
    scored
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(idx, (v, r))| RankingRow {
            rank: idx + 1,
            commune: r.base.entity.clone(),
            year: r.base.year,
            value: format_number(v, metric.decimals()),
        })
        .collect()
}

/// Per (group, year) totals. Records without a group are collected under
/// "(sans EPCI)". Sorted by savings, descending.
pub fn generate_group_comparison(records: &[DerivedRecord]) -> Vec<GroupComparisonRow> {
    #[derive(Default)]
    struct Acc {
        communes: HashSet<String>,
        population: f64,
        population_known: bool,
        savings: f64,
        financing: f64,
        taxes: f64,
    }
    let mut map: BTreeMap<(String, i32), Acc> = BTreeMap::new();
    for r in records {
        let group = r.base.group.clone().unwrap_or_else(|| "(sans EPCI)".to_string());
        let e = map.entry((group, r.base.year)).or_default();
        e.communes.insert(r.base.entity.clone());
        if let Some(p) = r.base.population {
            e.population += p;
            e.population_known = true;
        }
        e.savings += r.base.gross_savings;
        e.financing += r.base.financing_capacity;
        e.taxes += r.base.taxes_and_duties;
    }
    let mut rows: Vec<(f64, GroupComparisonRow)> = map
        .into_iter()
        .map(|((group, year), acc)| {
            let row = GroupComparisonRow {
                group,
                year,
                communes: acc.communes.len(),
                population: format_population(acc.population_known.then_some(acc.population)),
                gross_savings: format_number(acc.savings, 2),
                financing_capacity: format_number(acc.financing, 2),
                taxes_and_duties: format_number(acc.taxes, 2),
            };
            (acc.savings, row)
        })
        .collect();
    // Stable sort keeps the BTreeMap order among equal savings.
    rows.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    rows.into_iter().map(|(_, row)| row).collect()
}

/// Gross savings per inhabitant by population band, for `year` (all years
/// when `None`). Only records with a band, observed savings and a known
/// population count. Bands come out in text order.
pub fn generate_stratum_breakdown(records: &[DerivedRecord], year: Option<i32>) -> Vec<StratumRow> {
    let mut by_stratum: BTreeMap<&str, (HashSet<&str>, Vec<f64>)> = BTreeMap::new();
    for r in records.iter().filter(|r| year.map_or(true, |y| r.year() == y)) {
        let Some(stratum) = r.base.stratum.as_deref() else {
            continue;
        };
        if r.base.observed(FinancialIndicator::GrossSavings).is_none() {
            continue;
        }
        let Some(per_capita) = r.amount_per_capita(FinancialIndicator::GrossSavings) else {
            continue;
        };
        let e = by_stratum.entry(stratum).or_default();
        e.0.insert(r.entity());
        e.1.push(per_capita);
    }
    by_stratum
        .into_iter()
        .map(|(stratum, (communes, values))| StratumRow {
            stratum: stratum.to_string(),
            communes: communes.len(),
            mean_savings_per_capita: format_optional(average(&values), 0),
            median_savings_per_capita: format_optional(median(values), 0),
        })
        .collect()
}

pub fn generate_service_rows(summary: &[ServiceSummary]) -> Vec<ServiceRow> {
    summary
        .iter()
        .map(|s| ServiceRow {
            service: s.service.to_string(),
            budgets: s.budgets,
            total_amount: format_number(s.total_amount, 2),
        })
        .collect()
}

/// Headline figures. Population is counted once per commune, from its
/// latest year.
pub fn generate_overview(records: &[DerivedRecord], amount_unit: f64) -> OverviewStats {
    let mut latest: HashMap<&str, (i32, Option<f64>)> = HashMap::new();
    for r in records {
        let e = latest.entry(r.entity()).or_insert((r.year(), r.base.population));
        if r.year() > e.0 {
            *e = (r.year(), r.base.population);
        }
    }
    let total_population = latest.values().filter_map(|(_, p)| *p).sum();
    let ratios: Vec<f64> = records.iter().filter_map(|r| r.expense_to_revenue_pct).collect();
    let financing: Vec<f64> = records
        .iter()
        .filter(|r| r.base.observed(FinancialIndicator::FinancingCapacityOrNeed).is_some())
        .filter_map(|r| r.amount_per_capita(FinancialIndicator::FinancingCapacityOrNeed))
        .collect();
    let positive_financing_share_pct = (!financing.is_empty()).then(|| {
        financing.iter().filter(|v| **v > 0.0).count() as f64 / financing.len() as f64 * 100.0
    });
    OverviewStats {
        generated_at: Local::now(),
        communes: latest.len(),
        entity_years: records.len(),
        total_population,
        total_revenue: records.iter().map(|r| r.base.revenue).sum(),
        total_gross_savings: records.iter().map(|r| r.base.gross_savings).sum(),
        total_expense_estimate: records.iter().map(|r| r.expense_estimate).sum(),
        avg_expense_to_revenue_pct: average(&ratios),
        median_expense_per_capita: median(
            records.iter().filter_map(|r| r.expense_per_capita()).collect(),
        ),
        positive_financing_share_pct,
        amount_unit,
    }
}
