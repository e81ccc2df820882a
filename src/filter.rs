// Row selection ahead of aggregation.
//
// Clauses are independent row predicates combined with AND, so the order
// they are added in does not change the result. A missing cell never
// matches.
use crate::normalize::normalize;
use crate::schema::{ColumnRole, ColumnRoles};
use crate::table::{Cell, RawRecord};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

type Predicate<'a> = Box<dyn Fn(&Cell) -> bool + 'a>;

struct Clause<'a> {
    column: usize,
    predicate: Predicate<'a>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterReport {
    pub input_rows: usize,
    pub kept_rows: usize,
    /// Roles a filter was requested on but which the header lacks; those
    /// filters were not applied.
    pub skipped: Vec<ColumnRole>,
}

#[derive(Default)]
pub struct RecordFilter<'a> {
    clauses: Vec<Clause<'a>>,
    skipped: Vec<ColumnRole>,
}

impl<'a> RecordFilter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arbitrary predicate on a column position.
    pub fn column<F>(mut self, column: usize, predicate: F) -> Self
    where
        F: Fn(&Cell) -> bool + 'a,
    {
        self.clauses.push(Clause {
            column,
            predicate: Box::new(predicate),
        });
        self
    }

    /// Add a predicate on the column resolved for `role`. An unresolved role
    /// is recorded in the report and the clause is dropped.
    pub fn role<F>(mut self, roles: &ColumnRoles, role: ColumnRole, predicate: F) -> Self
    where
        F: Fn(&Cell) -> bool + 'a,
    {
        match roles.index(role) {
            Some(idx) => self.column(idx, predicate),
            None => {
                warn!(role = role.as_str(), "filter column not found, filter not applied");
                self.skipped.push(role);
                self
            }
        }
    }

    /// Keep rows whose scope column equals `code` (text or numeric).
    pub fn scope(self, roles: &ColumnRoles, code: &'a str) -> Self {
        self.role(roles, ColumnRole::Scope, move |cell| code_matches(cell, code))
    }

    /// Keep rows whose budget type is one of `allowed`. An empty set adds no
    /// clause.
    pub fn budget_types(self, roles: &ColumnRoles, allowed: &'a BTreeSet<String>) -> Self {
        if allowed.is_empty() {
            return self;
        }
        self.role(roles, ColumnRole::BudgetType, move |cell| {
            cell.as_key().is_some_and(|v| allowed.contains(&v))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, row: &RawRecord) -> bool {
        self.clauses.iter().all(|c| {
            let cell = row.get(c.column);
            !cell.is_missing() && (c.predicate)(cell)
        })
    }

    pub fn apply(&self, rows: &[RawRecord]) -> (Vec<RawRecord>, FilterReport) {
        let kept: Vec<RawRecord> = rows.iter().filter(|r| self.matches(r)).cloned().collect();
        debug!(
            input = rows.len(),
            kept = kept.len(),
            clauses = self.clauses.len(),
            "filtered records"
        );
        let report = FilterReport {
            input_rows: rows.len(),
            kept_rows: kept.len(),
            skipped: self.skipped.clone(),
        };
        (kept, report)
    }
}

/// Equality between a cell and an administrative code. `974`, `"974"` and
/// `" 974 "` all match `"974"`; non-numeric codes such as `2A` compare as
/// trimmed text.
pub fn code_matches(cell: &Cell, code: &str) -> bool {
    let code = code.trim();
    match cell.as_key() {
        None => false,
        Some(k) if k == code => true,
        Some(_) => match (normalize(cell), code.parse::<f64>().ok()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}
