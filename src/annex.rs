// Annex budgets: the side budgets a commune runs for utilities and
// services, told apart by their free-text label.
use crate::normalize::normalize;
use crate::schema::{ColumnRole, ColumnRoles};
use crate::table::RawRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ServiceType {
    Water,
    Sanitation,
    FuneralServices,
    Spanc,
    Tourism,
    Other,
}

impl ServiceType {
    /// First match wins, in declaration order.
    pub fn classify(label: &str) -> Self {
        let l = label.to_lowercase();
        if l.contains("eau") {
            ServiceType::Water
        } else if l.contains("assain") {
            ServiceType::Sanitation
        } else if l.contains("pompe") && (l.contains("funebre") || l.contains("funèbre")) {
            ServiceType::FuneralServices
        } else if l.contains("spanc") {
            ServiceType::Spanc
        } else if l.contains("touris") {
            ServiceType::Tourism
        } else {
            ServiceType::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::Water => "Eau",
            ServiceType::Sanitation => "Assainissement",
            ServiceType::FuneralServices => "Pompes funèbres",
            ServiceType::Spanc => "SPANC",
            ServiceType::Tourism => "Tourisme",
            ServiceType::Other => "Autres services",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    pub service: ServiceType,
    /// Distinct (entity, budget label) pairs.
    pub budgets: usize,
    /// Summed amount, in the caller's unit.
    pub total_amount: f64,
}

/// Summarise annex-budget rows by service type. Needs the budget type,
/// budget label and amount columns; returns `None` when any is missing so
/// callers can say the breakdown is unavailable.
pub fn summarize_services(
    rows: &[RawRecord],
    roles: &ColumnRoles,
    annex_type: &str,
    amount_unit: f64,
) -> Option<Vec<ServiceSummary>> {
    let type_col = roles.index(ColumnRole::BudgetType)?;
    let label_col = roles.index(ColumnRole::BudgetLabel)?;
    let amount_col = roles.index(ColumnRole::Amount)?;
    let entity_col = roles.index(ColumnRole::Entity);

    let mut totals: BTreeMap<ServiceType, (BTreeSet<(String, String)>, f64)> = BTreeMap::new();
    for row in rows {
        if row.get(type_col).as_key().as_deref() != Some(annex_type) {
            continue;
        }
        let Some(label) = row.get(label_col).as_key() else {
            continue;
        };
        let entity = entity_col
            .and_then(|c| row.get(c).as_key())
            .unwrap_or_default();
        let entry = totals
            .entry(ServiceType::classify(&label))
            .or_insert_with(|| (BTreeSet::new(), 0.0));
        entry.0.insert((entity, label));
        entry.1 += normalize(row.get(amount_col)).unwrap_or(0.0);
    }

    Some(
        totals
            .into_iter()
            .map(|(service, (budgets, total))| ServiceSummary {
                service,
                budgets: budgets.len(),
                total_amount: total / amount_unit,
            })
            .collect(),
    )
}
