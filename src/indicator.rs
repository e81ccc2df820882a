use serde::{Deserialize, Serialize};
use std::fmt;

/// Named quantities extracted from category labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FinancialIndicator {
    /// Total revenue excluding loans ("Recettes totales hors emprunts").
    Revenue,
    /// Épargne brute.
    GrossSavings,
    TaxesAndDuties,
    FinancingCapacityOrNeed,
}

/// Label rule: the label must contain at least one alternative from every
/// group. `[["recette"], ["total"]]` means "recette AND total".
struct LabelRule {
    all_of: &'static [&'static [&'static str]],
}

impl LabelRule {
    fn matches(&self, lowered: &str) -> bool {
        self.all_of
            .iter()
            .all(|any_of| any_of.iter().any(|needle| lowered.contains(needle)))
    }
}

const REVENUE: LabelRule = LabelRule {
    all_of: &[&["recette"], &["total"]],
};
const GROSS_SAVINGS: LabelRule = LabelRule {
    all_of: &[&["epargne", "épargne"], &["brute"]],
};
const TAXES: LabelRule = LabelRule {
    all_of: &[&["impôt", "impot", "taxe"]],
};
const FINANCING: LabelRule = LabelRule {
    all_of: &[&["capacité", "capacite", "besoin", "financement"]],
};

impl FinancialIndicator {
    pub const ALL: [FinancialIndicator; 4] = [
        FinancialIndicator::Revenue,
        FinancialIndicator::GrossSavings,
        FinancialIndicator::TaxesAndDuties,
        FinancialIndicator::FinancingCapacityOrNeed,
    ];

    fn rule(&self) -> &'static LabelRule {
        match self {
            FinancialIndicator::Revenue => &REVENUE,
            FinancialIndicator::GrossSavings => &GROSS_SAVINGS,
            FinancialIndicator::TaxesAndDuties => &TAXES,
            FinancialIndicator::FinancingCapacityOrNeed => &FINANCING,
        }
    }

    /// Case-insensitive label test.
    pub fn matches(&self, label: &str) -> bool {
        self.rule().matches(&label.to_lowercase())
    }

    /// Every indicator a label contributes to. A label may feed several.
    pub fn matching(label: &str) -> Vec<FinancialIndicator> {
        let lowered = label.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .filter(|ind| ind.rule().matches(&lowered))
            .collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            FinancialIndicator::Revenue => "Recettes totales",
            FinancialIndicator::GrossSavings => "Épargne brute",
            FinancialIndicator::TaxesAndDuties => "Impôts et taxes",
            FinancialIndicator::FinancingCapacityOrNeed => "Capacité ou besoin de financement",
        }
    }
}

impl fmt::Display for FinancialIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
