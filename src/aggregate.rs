// Line items → one record per (entity, fiscal year).
//
// Every indicator field is always present on the output. An indicator with
// no matching rows reads as 0.0; `EntityYearRecord::status` tells that case
// apart from a real zero.
//
// Years key the groups as integers. A year cell that is present but not a
// whole number (`2017/2018`, `n/a`) cannot form a key; such rows are counted
// in `rows_unreadable_year`, apart from rows whose key is simply missing.
use crate::error::{DashboardError, Result};
use crate::indicator::FinancialIndicator;
use crate::normalize::{classify, parse_year, Normalized};
use crate::schema::{ColumnRole, ColumnRoles};
use crate::table::RawRecord;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Default unit for aggregated amounts: millions of euros.
pub const DEFAULT_AMOUNT_UNIT: f64 = 1_000_000.0;

/// Per-indicator bookkeeping for one (entity, year).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// Rows whose label matched the indicator.
    pub matched_rows: usize,
    /// Matched rows whose amount was missing or unreadable (summed as 0).
    pub missing_amount_rows: usize,
}

impl Observation {
    pub fn status(&self) -> IndicatorStatus {
        if self.matched_rows == 0 {
            IndicatorStatus::NotObserved
        } else if self.missing_amount_rows == self.matched_rows {
            IndicatorStatus::Unparseable
        } else {
            IndicatorStatus::Observed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorStatus {
    /// At least one matching row had a usable amount.
    Observed,
    /// No row matched; the stored 0.0 is a placeholder.
    NotObserved,
    /// Rows matched but none had a usable amount.
    Unparseable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityYearRecord {
    pub entity: String,
    pub year: i32,
    /// EPCI (or other grouping) of the entity, when the header carries one.
    pub group: Option<String>,
    /// Population band, when the header carries one.
    pub stratum: Option<String>,
    /// Mean population over the group's rows; `None` when unavailable.
    pub population: Option<f64>,
    pub revenue: f64,
    pub gross_savings: f64,
    pub taxes_and_duties: f64,
    pub financing_capacity: f64,
    pub observations: BTreeMap<FinancialIndicator, Observation>,
}

impl EntityYearRecord {
    pub fn new(entity: impl Into<String>, year: i32) -> Self {
        Self {
            entity: entity.into(),
            year,
            group: None,
            stratum: None,
            population: None,
            revenue: 0.0,
            gross_savings: 0.0,
            taxes_and_duties: 0.0,
            financing_capacity: 0.0,
            observations: BTreeMap::new(),
        }
    }

    pub fn value(&self, indicator: FinancialIndicator) -> f64 {
        match indicator {
            FinancialIndicator::Revenue => self.revenue,
            FinancialIndicator::GrossSavings => self.gross_savings,
            FinancialIndicator::TaxesAndDuties => self.taxes_and_duties,
            FinancialIndicator::FinancingCapacityOrNeed => self.financing_capacity,
        }
    }

    fn value_mut(&mut self, indicator: FinancialIndicator) -> &mut f64 {
        match indicator {
            FinancialIndicator::Revenue => &mut self.revenue,
            FinancialIndicator::GrossSavings => &mut self.gross_savings,
            FinancialIndicator::TaxesAndDuties => &mut self.taxes_and_duties,
            FinancialIndicator::FinancingCapacityOrNeed => &mut self.financing_capacity,
        }
    }

    /// Set an indicator directly, marking it observed.
    pub fn with_value(mut self, indicator: FinancialIndicator, value: f64) -> Self {
        *self.value_mut(indicator) = value;
        let obs = self.observations.entry(indicator).or_default();
        obs.matched_rows += 1;
        self
    }

    pub fn with_stratum(mut self, stratum: impl Into<String>) -> Self {
        self.stratum = Some(stratum.into());
        self
    }

    pub fn with_population(mut self, population: f64) -> Self {
        self.population = Some(population);
        self
    }

    pub fn status(&self, indicator: FinancialIndicator) -> IndicatorStatus {
        self.observations
            .get(&indicator)
            .map(Observation::status)
            .unwrap_or(IndicatorStatus::NotObserved)
    }

    /// The value only when it came from data.
    pub fn observed(&self, indicator: FinancialIndicator) -> Option<f64> {
        match self.status(indicator) {
            IndicatorStatus::Observed => Some(self.value(indicator)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    pub input_rows: usize,
    /// Rows dropped because the entity or year cell was missing.
    pub rows_missing_key: usize,
    /// Rows dropped because the year cell held something other than a
    /// whole year.
    pub rows_unreadable_year: usize,
    /// Keyed rows whose label matched no indicator.
    pub unmatched_rows: usize,
    /// Matched rows whose amount could not be normalized.
    pub unparseable_amounts: usize,
    pub unparseable_population: usize,
    pub groups: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub records: Vec<EntityYearRecord>,
    pub report: AggregationReport,
}

#[derive(Default)]
struct GroupAcc {
    sums: [f64; 4],
    observations: [Observation; 4],
    population_sum: f64,
    population_rows: usize,
    group: Option<String>,
    stratum: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IndicatorAggregator {
    amount_unit: f64,
}

impl Default for IndicatorAggregator {
    fn default() -> Self {
        Self {
            amount_unit: DEFAULT_AMOUNT_UNIT,
        }
    }
}

impl IndicatorAggregator {
    /// `amount_unit` divides every summed amount (1.0 keeps raw euros).
    pub fn new(amount_unit: f64) -> Self {
        Self { amount_unit }
    }

    /// Group rows by (entity, year) and sum amounts per indicator.
    ///
    /// Fails with `SchemaIncomplete` when entity, year, category or amount
    /// has no column. Output follows first appearance of each key.
    pub fn aggregate(&self, rows: &[RawRecord], roles: &ColumnRoles) -> Result<Aggregation> {
        let (Some(entity_col), Some(year_col), Some(category_col), Some(amount_col)) = (
            roles.index(ColumnRole::Entity),
            roles.index(ColumnRole::Year),
            roles.index(ColumnRole::Category),
            roles.index(ColumnRole::Amount),
        ) else {
            let missing = roles.missing_required();
            warn!(?missing, "cannot aggregate without every required column");
            return Err(DashboardError::SchemaIncomplete { missing });
        };
        let population_col = roles.index(ColumnRole::Population);
        let group_col = roles.index(ColumnRole::Group);
        let stratum_col = roles.index(ColumnRole::Stratum);

        let mut report = AggregationReport {
            input_rows: rows.len(),
            ..Default::default()
        };
        let mut keys: Vec<(String, i32)> = Vec::new();
        let mut positions: HashMap<(String, i32), usize> = HashMap::new();
        let mut accs: Vec<GroupAcc> = Vec::new();

        for row in rows {
            let year_cell = row.get(year_col);
            let Some(entity) = row.get(entity_col).as_key() else {
                report.rows_missing_key += 1;
                continue;
            };
            if year_cell.is_missing() {
                report.rows_missing_key += 1;
                continue;
            }
            let Some(year) = parse_year(year_cell) else {
                report.rows_unreadable_year += 1;
                continue;
            };
            let key = (entity, year);
            let pos = match positions.get(&key) {
                Some(p) => *p,
                None => {
                    positions.insert(key.clone(), accs.len());
                    keys.push(key);
                    accs.push(GroupAcc::default());
                    accs.len() - 1
                }
            };
            let acc = &mut accs[pos];

            if let Some(col) = population_col {
                match classify(row.get(col)) {
                    Normalized::Value(p) => {
                        acc.population_sum += p;
                        acc.population_rows += 1;
                    }
                    Normalized::Unparseable => report.unparseable_population += 1,
                    Normalized::Absent => {}
                }
            }
            if acc.group.is_none() {
                acc.group = group_col.and_then(|c| row.get(c).as_key());
            }
            if acc.stratum.is_none() {
                acc.stratum = stratum_col.and_then(|c| row.get(c).as_key());
            }

            let matched = row
                .get(category_col)
                .as_key()
                .map(|label| FinancialIndicator::matching(&label))
                .unwrap_or_default();
            if matched.is_empty() {
                report.unmatched_rows += 1;
                continue;
            }
            let amount = match classify(row.get(amount_col)) {
                Normalized::Value(v) => Some(v),
                _ => {
                    report.unparseable_amounts += 1;
                    None
                }
            };
            for indicator in matched {
                let slot = indicator_slot(indicator);
                acc.observations[slot].matched_rows += 1;
                match amount {
                    Some(v) => acc.sums[slot] += v,
                    None => acc.observations[slot].missing_amount_rows += 1,
                }
            }
        }

        let records: Vec<EntityYearRecord> = keys
            .into_iter()
            .zip(accs)
            .map(|((entity, year), acc)| self.finish(entity, year, acc))
            .collect();
        report.groups = records.len();

        if report.unparseable_amounts > 0 {
            warn!(
                count = report.unparseable_amounts,
                "amount cells could not be normalized and were summed as zero"
            );
        }
        if report.rows_unreadable_year > 0 {
            warn!(
                count = report.rows_unreadable_year,
                "rows with an unreadable year skipped"
            );
        }
        if report.rows_missing_key > 0 {
            debug!(count = report.rows_missing_key, "rows without entity or year skipped");
        }
        info!(
            rows = report.input_rows,
            records = report.groups,
            unmatched = report.unmatched_rows,
            "aggregated indicators"
        );
        Ok(Aggregation { records, report })
    }

    fn finish(&self, entity: String, year: i32, acc: GroupAcc) -> EntityYearRecord {
        let mut record = EntityYearRecord::new(entity, year);
        record.group = acc.group;
        record.stratum = acc.stratum;
        record.population = if acc.population_rows > 0 {
            Some(acc.population_sum / acc.population_rows as f64)
        } else {
            None
        };
        for indicator in FinancialIndicator::ALL {
            let slot = indicator_slot(indicator);
            *record.value_mut(indicator) = acc.sums[slot] / self.amount_unit;
            let obs = acc.observations[slot];
            if obs.matched_rows > 0 {
                record.observations.insert(indicator, obs);
            }
        }
        record
    }
}

fn indicator_slot(indicator: FinancialIndicator) -> usize {
    match indicator {
        FinancialIndicator::Revenue => 0,
        FinancialIndicator::GrossSavings => 1,
        FinancialIndicator::TaxesAndDuties => 2,
        FinancialIndicator::FinancingCapacityOrNeed => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaResolver;
    use crate::table::{Cell, RawTable};

    fn table(rows: &[(&str, Cell, &str, Cell, Cell)]) -> RawTable {
        let mut t = RawTable::new(
            ["Commune", "Exercice", "Agrégat", "Montant", "Population totale"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for (commune, year, label, amount, pop) in rows {
            t.push_row(vec![
                Cell::from(*commune),
                year.clone(),
                Cell::from(*label),
                amount.clone(),
                pop.clone(),
            ]);
        }
        t
    }

    fn run(t: &RawTable) -> Aggregation {
        let roles = SchemaResolver::default().resolve(&t.headers);
        IndicatorAggregator::default().aggregate(&t.rows, &roles).unwrap()
    }

    #[test]
    fn sums_matching_rows_per_entity_year() {
        let t = table(&[
            ("Saint-Denis", 2017.into(), "Recettes totales hors emprunts", "100 000 000".into(), "150 000".into()),
            ("Saint-Denis", 2017.into(), "Epargne brute", "5 000 000".into(), "150 000".into()),
            ("Saint-Denis", 2017.into(), "Epargne brute", "1 000 000".into(), "150 000".into()),
            ("Le Port", 2017.into(), "Impôts et taxes", "2 500 000".into(), "35 000".into()),
        ]);
        let agg = run(&t);
        assert_eq!(agg.records.len(), 2);
        let sd = &agg.records[0];
        assert_eq!(sd.entity, "Saint-Denis");
        assert_eq!(sd.revenue, 100.0);
        assert_eq!(sd.gross_savings, 6.0);
        assert_eq!(sd.population, Some(150_000.0));
        assert_eq!(sd.status(FinancialIndicator::TaxesAndDuties), IndicatorStatus::NotObserved);
        assert_eq!(sd.taxes_and_duties, 0.0);
        let port = &agg.records[1];
        assert_eq!(port.taxes_and_duties, 2.5);
    }

    #[test]
    fn insertion_order_is_kept() {
        let t = table(&[
            ("Zeta", 2018.into(), "Epargne brute", "1".into(), Cell::Missing),
            ("Alpha", 2017.into(), "Epargne brute", "1".into(), Cell::Missing),
            ("Zeta", 2017.into(), "Epargne brute", "1".into(), Cell::Missing),
            ("Alpha", 2017.into(), "Epargne brute", "1".into(), Cell::Missing),
        ]);
        let keys: Vec<(String, i32)> = run(&t)
            .records
            .into_iter()
            .map(|r| (r.entity, r.year))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Zeta".to_string(), 2018),
                ("Alpha".to_string(), 2017),
                ("Zeta".to_string(), 2017)
            ]
        );
    }

    #[test]
    fn missing_amount_contributes_nothing() {
        let t = table(&[
            ("Saint-Paul", 2017.into(), "Epargne brute", "abc".into(), Cell::Missing),
            ("Saint-Paul", 2017.into(), "Epargne brute", "3 000 000".into(), Cell::Missing),
            ("Saint-Paul", 2017.into(), "Impôts et taxes", Cell::Missing, Cell::Missing),
        ]);
        let agg = run(&t);
        let r = &agg.records[0];
        assert_eq!(r.gross_savings, 3.0);
        assert_eq!(r.status(FinancialIndicator::GrossSavings), IndicatorStatus::Observed);
        assert_eq!(r.status(FinancialIndicator::TaxesAndDuties), IndicatorStatus::Unparseable);
        assert_eq!(r.observed(FinancialIndicator::TaxesAndDuties), None);
        assert_eq!(agg.report.unparseable_amounts, 2);
        assert_eq!(r.population, None);
    }

    #[test]
    fn rows_without_keys_are_dropped() {
        let t = table(&[
            ("", 2017.into(), "Epargne brute", "1".into(), Cell::Missing),
            ("Cilaos", Cell::Missing, "Epargne brute", "1".into(), Cell::Missing),
            ("Cilaos", "2017".into(), "Epargne brute", "1 000 000".into(), Cell::Missing),
        ]);
        let agg = run(&t);
        assert_eq!(agg.report.rows_missing_key, 2);
        assert_eq!(agg.records.len(), 1);
        assert_eq!(agg.records[0].gross_savings, 1.0);
    }

    #[test]
    fn entity_names_are_trimmed_only() {
        let t = table(&[
            ("  Saint-Denis ", 2017.into(), "Epargne brute", "1".into(), Cell::Missing),
            ("Saint-Denis", 2017.into(), "Epargne brute", "1".into(), Cell::Missing),
            ("SAINT-DENIS", 2017.into(), "Epargne brute", "1".into(), Cell::Missing),
        ]);
        assert_eq!(run(&t).records.len(), 2);
    }

    #[test]
    fn population_is_averaged() {
        let t = table(&[
            ("Bras-Panon", 2017.into(), "Epargne brute", "1".into(), "13 000".into()),
            ("Bras-Panon", 2017.into(), "Impôts et taxes", "1".into(), "13 100".into()),
            ("Bras-Panon", 2017.into(), "Autre", "1".into(), "n.d.".into()),
        ]);
        let agg = run(&t);
        assert_eq!(agg.records[0].population, Some(13_050.0));
        assert_eq!(agg.report.unparseable_population, 1);
        assert_eq!(agg.report.unmatched_rows, 1);
    }

    #[test]
    fn incomplete_schema_is_an_error() {
        let mut t = RawTable::new(vec!["Commune".into(), "Exercice".into(), "Agrégat".into()]);
        t.push_row(["Saint-Denis", "2017", "Epargne brute"]);
        let roles = SchemaResolver::default().resolve(&t.headers);
        let err = IndicatorAggregator::default().aggregate(&t.rows, &roles).unwrap_err();
        match err {
            DashboardError::SchemaIncomplete { missing } => {
                assert_eq!(missing, vec![ColumnRole::Amount])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn raw_unit_keeps_euros() {
        let t = table(&[("Salazie", 2017.into(), "Epargne brute", "1 234,5".into(), Cell::Missing)]);
        let roles = SchemaResolver::default().resolve(&t.headers);
        let agg = IndicatorAggregator::new(1.0).aggregate(&t.rows, &roles).unwrap();
        assert_eq!(agg.records[0].gross_savings, 1234.5);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let t = table(&[
            ("A", 2017.into(), "Epargne brute", "1 000 000".into(), "10".into()),
            ("B", 2017.into(), "Recettes totales", "2 000 000".into(), "20".into()),
            ("A", 2018.into(), "Capacité de financement", "-500 000".into(), "10".into()),
        ]);
        assert_eq!(run(&t), run(&t));
    }

    #[test]
    fn unreadable_year_is_counted_apart() {
        let t = table(&[
            ("Cilaos", "2017/2018".into(), "Epargne brute", "1".into(), Cell::Missing),
            ("Cilaos", "n/a".into(), "Epargne brute", "1".into(), Cell::Missing),
            ("Cilaos", Cell::Missing, "Epargne brute", "1".into(), Cell::Missing),
            ("Cilaos", 2017.into(), "Epargne brute", "1 000 000".into(), Cell::Missing),
        ]);
        let agg = run(&t);
        assert_eq!(agg.report.rows_unreadable_year, 2);
        assert_eq!(agg.report.rows_missing_key, 1);
        assert_eq!(agg.records.len(), 1);
    }

    #[test]
    fn stratum_is_carried_on_the_record() {
        let mut t = RawTable::new(
            ["Commune", "Exercice", "Agrégat", "Montant", "Strate population 2024"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        t.push_row(["Cilaos", "2017", "Epargne brute", "1", ""]);
        t.push_row(["Cilaos", "2017", "Impôts et taxes", "1", "5 000 à 10 000 hab."]);
        let agg = run(&t);
        assert_eq!(agg.records[0].stratum.as_deref(), Some("5 000 à 10 000 hab."));
    }
}
