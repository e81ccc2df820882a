// Column-role inference.
//
// Source extracts rename, reorder and drop columns freely, so roles are
// inferred from the header instead of hard-coded. Resolution is data driven:
// each role has a list of exact aliases (the known OFGL headers and their
// standardized forms) and an ordered list of lowercase keywords. Keyword
// hits can be narrowed with required and excluded terms, so a loose keyword
// like `département` only lands on a code column, never on a name column.
use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Entity,
    Year,
    Category,
    Amount,
    Population,
    /// Administrative code the scope filter applies to (department).
    Scope,
    BudgetType,
    BudgetLabel,
    /// Grouping above the entity (EPCI).
    Group,
    /// Population size band (`Strate population 2024`).
    Stratum,
}

impl ColumnRole {
    /// Roles aggregation cannot do without.
    pub const REQUIRED: [ColumnRole; 4] = [
        ColumnRole::Entity,
        ColumnRole::Year,
        ColumnRole::Category,
        ColumnRole::Amount,
    ];

    /// Order in which roles claim columns. Entity goes last because its
    /// keywords (`nom`, `libellé`) are the loosest. Stratum goes before
    /// population so the band column is never read as a head count.
    pub const RESOLUTION_ORDER: [ColumnRole; 10] = [
        ColumnRole::Year,
        ColumnRole::Category,
        ColumnRole::Amount,
        ColumnRole::Stratum,
        ColumnRole::Population,
        ColumnRole::Scope,
        ColumnRole::BudgetType,
        ColumnRole::BudgetLabel,
        ColumnRole::Group,
        ColumnRole::Entity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Entity => "entity",
            ColumnRole::Year => "year",
            ColumnRole::Category => "category",
            ColumnRole::Amount => "amount",
            ColumnRole::Population => "population",
            ColumnRole::Scope => "scope",
            ColumnRole::BudgetType => "budget_type",
            ColumnRole::BudgetLabel => "budget_label",
            ColumnRole::Group => "group",
            ColumnRole::Stratum => "stratum",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a role matcher recognises its column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRule {
    pub role: ColumnRole,
    /// Whole-header matches, checked before keywords. Lowercase.
    pub aliases: Vec<String>,
    /// Substrings in priority order. Lowercase.
    pub keywords: Vec<String>,
    /// A keyword hit also needs one of these in the header (empty: no
    /// constraint). Aliases are not affected.
    pub required_terms: Vec<String>,
    /// A keyword hit is discarded when the header contains any of these.
    pub excluded_terms: Vec<String>,
}

fn lowered(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|s| s.to_lowercase()).collect()
}

impl RoleRule {
    pub fn new(role: ColumnRole, aliases: &[&str], keywords: &[&str]) -> Self {
        Self {
            role,
            aliases: lowered(aliases),
            keywords: lowered(keywords),
            required_terms: Vec::new(),
            excluded_terms: Vec::new(),
        }
    }

    pub fn requiring(mut self, terms: &[&str]) -> Self {
        self.required_terms = lowered(terms);
        self
    }

    pub fn excluding(mut self, terms: &[&str]) -> Self {
        self.excluded_terms = lowered(terms);
        self
    }

    /// Whether a lowercase header may be claimed through a keyword.
    fn admits(&self, header: &str) -> bool {
        let required = self.required_terms.is_empty()
            || self.required_terms.iter().any(|t| header.contains(t.as_str()));
        required && !self.excluded_terms.iter().any(|t| header.contains(t.as_str()))
    }

    fn keyword_rank(&self, header: &str) -> Option<usize> {
        if !self.admits(header) {
            return None;
        }
        self.keywords.iter().position(|k| header.contains(k.as_str()))
    }
}

fn default_rules() -> Vec<RoleRule> {
    vec![
        RoleRule::new(
            ColumnRole::Entity,
            &["nom 2024 commune", "commune", "nom commune", "nom_commune"],
            &["commune", "nom", "libellé", "libelle"],
        ),
        RoleRule::new(
            ColumnRole::Year,
            &["exercice", "année", "annee"],
            &["exercice", "annee", "année"],
        ),
        RoleRule::new(
            ColumnRole::Category,
            &["agrégat", "agregat"],
            &["agrégat", "agregat", "nomenclature"],
        ),
        RoleRule::new(
            ColumnRole::Amount,
            &["montant"],
            &["montant", "solde", "valeur"],
        ),
        RoleRule::new(
            ColumnRole::Population,
            &["population totale", "population"],
            &["population"],
        )
        .excluding(&["strate", "tranche"]),
        RoleRule::new(
            ColumnRole::Scope,
            &[
                "code insee 2024 département",
                "code_departement",
                "code département",
                "code departement",
            ],
            &["code_dep", "département", "departement"],
        )
        .requiring(&["code"]),
        RoleRule::new(
            ColumnRole::BudgetType,
            &["type de budget", "type_budget"],
            &["type de budget", "type_budget", "type budget"],
        ),
        RoleRule::new(
            ColumnRole::BudgetLabel,
            &["libellé budget", "libelle_budget", "libelle budget"],
            &["libellé budget", "libelle budget", "libelle_budget"],
        ),
        RoleRule::new(
            ColumnRole::Group,
            &["nom 2024 epci", "nom_epci"],
            &["nom_epci", "epci"],
        )
        .excluding(&["code", "siren"]),
        RoleRule::new(
            ColumnRole::Stratum,
            &["strate population 2024", "strate_population", "strate population"],
            &["strate"],
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Alias,
    Keyword(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub index: usize,
    pub name: String,
    pub matched_by: MatchKind,
}

/// Role → column assignment. At most one column per role, and a column
/// serves at most one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnRoles {
    columns: BTreeMap<ColumnRole, ResolvedColumn>,
}

impl ColumnRoles {
    pub fn get(&self, role: ColumnRole) -> Option<&ResolvedColumn> {
        self.columns.get(&role)
    }

    pub fn index(&self, role: ColumnRole) -> Option<usize> {
        self.columns.get(&role).map(|c| c.index)
    }

    pub fn name(&self, role: ColumnRole) -> Option<&str> {
        self.columns.get(&role).map(|c| c.name.as_str())
    }

    pub fn has(&self, role: ColumnRole) -> bool {
        self.columns.contains_key(&role)
    }

    pub fn assign(&mut self, role: ColumnRole, column: ResolvedColumn) {
        self.columns.insert(role, column);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColumnRole, &ResolvedColumn)> {
        self.columns.iter().map(|(r, c)| (*r, c))
    }

    /// Required roles with no column, in `REQUIRED` order.
    pub fn missing_required(&self) -> Vec<ColumnRole> {
        ColumnRole::REQUIRED
            .iter()
            .copied()
            .filter(|r| !self.has(*r))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn require_complete(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DashboardError::SchemaIncomplete { missing })
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaResolver {
    rules: Vec<RoleRule>,
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl SchemaResolver {
    /// Replace (or add) the rule for one role.
    pub fn with_rule(mut self, rule: RoleRule) -> Self {
        self.rules.retain(|r| r.role != rule.role);
        self.rules.push(rule);
        self
    }

    /// Infer column roles from a header.
    ///
    /// For each role, in `ColumnRole::RESOLUTION_ORDER`, the candidates are
    /// the columns not yet claimed. An exact alias beats any keyword; among
    /// keyword matches the lower keyword index wins, then the earlier
    /// column. Ranking keywords ahead of position keeps the assignment the
    /// same under any permutation of the header: position only decides
    /// between columns hit by the same keyword of the same role. An empty
    /// header yields an empty assignment.
    pub fn resolve<S: AsRef<str>>(&self, column_names: &[S]) -> ColumnRoles {
        let lowered: Vec<String> = column_names
            .iter()
            .map(|c| c.as_ref().trim().to_lowercase())
            .collect();
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut roles = ColumnRoles::default();

        for role in ColumnRole::RESOLUTION_ORDER {
            let Some(rule) = self.rules.iter().find(|r| r.role == role) else {
                continue;
            };
            if let Some(found) = best_candidate(rule, &lowered, &claimed) {
                debug!(
                    role = role.as_str(),
                    column = column_names[found.index].as_ref(),
                    matched_by = ?found.matched_by,
                    "resolved column role"
                );
                claimed.insert(found.index);
                roles.assign(
                    role,
                    ResolvedColumn {
                        index: found.index,
                        name: column_names[found.index].as_ref().trim().to_string(),
                        matched_by: found.matched_by,
                    },
                );
            } else {
                debug!(role = role.as_str(), "no column matched role");
            }
        }
        roles
    }
}

struct Candidate {
    index: usize,
    matched_by: MatchKind,
}

fn best_candidate(rule: &RoleRule, lowered: &[String], claimed: &HashSet<usize>) -> Option<Candidate> {
    // (rank, column index); alias hits rank below every keyword.
    let mut best: Option<(usize, usize, MatchKind)> = None;
    for (idx, name) in lowered.iter().enumerate() {
        if claimed.contains(&idx) {
            continue;
        }
        let hit = if let Some(a) = rule.aliases.iter().position(|a| a == name) {
            Some((a, MatchKind::Alias))
        } else {
            rule.keyword_rank(name)
                .map(|k| (rule.aliases.len() + k, MatchKind::Keyword(rule.keywords[k].clone())))
        };
        if let Some((rank, kind)) = hit {
            let better = match &best {
                None => true,
                Some((best_rank, best_idx, _)) => (rank, idx) < (*best_rank, *best_idx),
            };
            if better {
                best = Some((rank, idx, kind));
            }
        }
    }
    best.map(|(_, index, matched_by)| Candidate { index, matched_by })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFGL_HEADER: [&str; 32] = [
        "Exercice",
        "Outre-mer",
        "Code Insee 2024 Région",
        "Nom 2024 Région",
        "Code Insee 2024 Département",
        "Nom 2024 Département",
        "Code Siren 2024 EPCI",
        "Nom 2024 EPCI",
        "Strate population 2024",
        "Commune rurale",
        "Commune de montagne",
        "Commune touristique",
        "Tranche revenu par habitant",
        "Présence QPV",
        "Code Insee 2024 Commune",
        "Nom 2024 Commune",
        "Catégorie",
        "Code Siren Collectivité",
        "Code Insee Collectivité",
        "Siret Budget",
        "Libellé Budget",
        "Type de budget",
        "Nomenclature",
        "Agrégat",
        "Montant",
        "Montant en millions",
        "Population totale",
        "Montant en € par habitant",
        "Compte 2024 Disponible",
        "code_type_budget",
        "ordre_analyse1_section1",
        "Population totale du dernier exercice",
    ];

    #[test]
    fn resolves_full_ofgl_header() {
        let roles = SchemaResolver::default().resolve(&OFGL_HEADER);
        assert_eq!(roles.name(ColumnRole::Entity), Some("Nom 2024 Commune"));
        assert_eq!(roles.name(ColumnRole::Year), Some("Exercice"));
        assert_eq!(roles.name(ColumnRole::Category), Some("Agrégat"));
        assert_eq!(roles.name(ColumnRole::Amount), Some("Montant"));
        assert_eq!(roles.name(ColumnRole::Population), Some("Population totale"));
        assert_eq!(roles.name(ColumnRole::Scope), Some("Code Insee 2024 Département"));
        assert_eq!(roles.name(ColumnRole::BudgetType), Some("Type de budget"));
        assert_eq!(roles.name(ColumnRole::BudgetLabel), Some("Libellé Budget"));
        assert_eq!(roles.name(ColumnRole::Group), Some("Nom 2024 EPCI"));
        assert_eq!(roles.name(ColumnRole::Stratum), Some("Strate population 2024"));
        assert!(roles.is_complete());
    }

    #[test]
    fn keyword_priority_beats_column_order() {
        // `nomenclature` sits before `agrégat` but is a lower-priority keyword.
        let roles = SchemaResolver::default().resolve(&[
            "Nomenclature comptable",
            "Agrégat financier",
            "Nom de la commune",
            "Exercice budgétaire",
            "Valeur",
        ]);
        assert_eq!(roles.name(ColumnRole::Category), Some("Agrégat financier"));
        assert_eq!(roles.name(ColumnRole::Entity), Some("Nom de la commune"));
        assert_eq!(roles.name(ColumnRole::Amount), Some("Valeur"));
        assert_eq!(
            roles.get(ColumnRole::Amount).map(|c| &c.matched_by),
            Some(&MatchKind::Keyword("valeur".into()))
        );
    }

    #[test]
    fn order_independent_for_unique_matches() {
        let header = ["Commune", "Année", "Agrégat", "Montant", "Population"];
        let mut reversed = header;
        reversed.reverse();
        let a = SchemaResolver::default().resolve(&header);
        let b = SchemaResolver::default().resolve(&reversed);
        for role in ColumnRole::RESOLUTION_ORDER {
            assert_eq!(a.name(role), b.name(role), "role {}", role);
        }
    }

    #[test]
    fn ties_go_to_the_earlier_column() {
        let roles = SchemaResolver::default().resolve(&["Solde A", "Solde B", "Commune", "Exercice", "Agrégat"]);
        assert_eq!(roles.name(ColumnRole::Amount), Some("Solde A"));
    }

    #[test]
    fn empty_header_assigns_nothing() {
        let empty: [&str; 0] = [];
        let roles = SchemaResolver::default().resolve(&empty);
        assert_eq!(roles.iter().count(), 0);
        assert_eq!(roles.missing_required(), ColumnRole::REQUIRED.to_vec());
    }

    #[test]
    fn missing_amount_is_reported() {
        let roles = SchemaResolver::default().resolve(&["Commune", "Exercice", "Agrégat", "Total"]);
        assert!(!roles.has(ColumnRole::Amount));
        assert_eq!(roles.missing_required(), vec![ColumnRole::Amount]);
        let err = roles.require_complete().unwrap_err();
        assert!(matches!(
            err,
            DashboardError::SchemaIncomplete { ref missing } if missing == &vec![ColumnRole::Amount]
        ));
    }

    #[test]
    fn columns_are_not_shared_between_roles() {
        // "Nomenclature" would satisfy both category and entity via `nom`.
        let roles = SchemaResolver::default().resolve(&["Nomenclature", "Exercice", "Montant"]);
        assert_eq!(roles.name(ColumnRole::Category), Some("Nomenclature"));
        assert!(!roles.has(ColumnRole::Entity));
    }

    #[test]
    fn custom_rule_replaces_default() {
        let resolver = SchemaResolver::default()
            .with_rule(RoleRule::new(ColumnRole::Amount, &[], &["total"]));
        let roles = resolver.resolve(&["Commune", "Exercice", "Agrégat", "Total"]);
        assert_eq!(roles.name(ColumnRole::Amount), Some("Total"));
    }

    #[test]
    fn department_name_is_not_a_scope_column() {
        let roles = SchemaResolver::default().resolve(&[
            "Exercice",
            "Nom 2024 Département",
            "Nom 2024 Commune",
            "Agrégat",
            "Montant",
        ]);
        assert!(!roles.has(ColumnRole::Scope));
        assert_eq!(roles.name(ColumnRole::Entity), Some("Nom 2024 Commune"));

        let roles = SchemaResolver::default().resolve(&[
            "Nom Département",
            "Code Insee Département",
            "Commune",
            "Exercice",
            "Agrégat",
            "Montant",
        ]);
        assert_eq!(roles.name(ColumnRole::Scope), Some("Code Insee Département"));
    }

    #[test]
    fn epci_code_is_not_a_group_column() {
        let header = ["Commune", "Exercice", "Agrégat", "Montant", "Code Siren 2024 EPCI"];
        assert!(!SchemaResolver::default().resolve(&header).has(ColumnRole::Group));

        let roles = SchemaResolver::default().resolve(&[
            "Code Siren 2024 EPCI",
            "EPCI de rattachement",
            "Commune",
            "Exercice",
            "Agrégat",
            "Montant",
        ]);
        assert_eq!(roles.name(ColumnRole::Group), Some("EPCI de rattachement"));
    }

    #[test]
    fn stratum_is_not_a_population_column() {
        let roles = SchemaResolver::default().resolve(&[
            "Strate population 2024",
            "Commune",
            "Exercice",
            "Agrégat",
            "Montant",
        ]);
        assert!(!roles.has(ColumnRole::Population));
        assert_eq!(roles.name(ColumnRole::Stratum), Some("Strate population 2024"));
    }

    #[test]
    fn keyword_only_header_under_every_rotation() {
        let header = [
            "Nomenclature comptable",
            "Agrégat financier",
            "Solde A",
            "Valeur",
            "Nom de la commune",
            "Exercice budgétaire",
        ];
        let names = |h: &[&str]| -> Vec<(ColumnRole, String)> {
            SchemaResolver::default()
                .resolve(h)
                .iter()
                .map(|(role, col)| (role, col.name.clone()))
                .collect()
        };
        let expected = names(&header);
        assert_eq!(
            expected,
            vec![
                (ColumnRole::Entity, "Nom de la commune".to_string()),
                (ColumnRole::Year, "Exercice budgétaire".to_string()),
                (ColumnRole::Category, "Agrégat financier".to_string()),
                (ColumnRole::Amount, "Solde A".to_string()),
            ]
        );
        for shift in 1..header.len() {
            let mut rotated = header;
            rotated.rotate_left(shift);
            assert_eq!(names(&rotated), expected, "rotation {}", shift);
            rotated.reverse();
            assert_eq!(names(&rotated), expected, "reversed rotation {}", shift);
        }
    }
}
