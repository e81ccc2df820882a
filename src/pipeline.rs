// One pass from a loaded table to derived records.
//
// Stages are pure functions over an immutable table; a filter change means
// running the whole thing again.
use crate::aggregate::{AggregationReport, IndicatorAggregator};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::filter::{FilterReport, RecordFilter};
use crate::metrics::{DerivedMetrics, DerivedRecord};
use crate::schema::{ColumnRole, ColumnRoles, SchemaResolver};
use crate::table::{RawRecord, RawTable};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineStatus {
    Complete,
    /// Required roles had no column; nothing was aggregated.
    SchemaIncomplete { missing: Vec<ColumnRole> },
    /// The filters left no rows.
    EmptyScope,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub roles: ColumnRoles,
    pub status: PipelineStatus,
    pub filter: FilterReport,
    pub aggregation: AggregationReport,
    pub records: Vec<DerivedRecord>,
    /// Rows that passed the filters, kept for breakdowns that work on line
    /// items (annex budgets).
    #[serde(skip)]
    pub filtered_rows: Vec<RawRecord>,
}

impl PipelineOutcome {
    fn empty(roles: ColumnRoles, status: PipelineStatus) -> Self {
        Self {
            roles,
            status,
            filter: FilterReport::default(),
            aggregation: AggregationReport::default(),
            records: Vec::new(),
            filtered_rows: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == PipelineStatus::Complete
    }

    /// `SchemaIncomplete` as an error, for callers that want `?`.
    pub fn schema_error(&self) -> Option<DashboardError> {
        match &self.status {
            PipelineStatus::SchemaIncomplete { missing } => Some(DashboardError::SchemaIncomplete {
                missing: missing.clone(),
            }),
            _ => None,
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a DashboardConfig,
    resolver: SchemaResolver,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a DashboardConfig) -> Self {
        Self {
            config,
            resolver: SchemaResolver::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: SchemaResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolve, filter, aggregate, derive.
    ///
    /// Only an invalid configuration is an `Err`. An incomplete header or
    /// an empty selection come back as a status with no records.
    pub fn run(&self, table: &RawTable) -> Result<PipelineOutcome> {
        self.config.validate()?;
        let roles = self.resolver.resolve(&table.headers);

        let missing = roles.missing_required();
        if !missing.is_empty() {
            warn!(?missing, "required columns not found");
            return Ok(PipelineOutcome::empty(
                roles,
                PipelineStatus::SchemaIncomplete { missing },
            ));
        }

        let scope = self
            .config
            .scope_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let mut filter = RecordFilter::new();
        if let Some(code) = scope {
            filter = filter.scope(&roles, code);
        }
        filter = filter.budget_types(&roles, &self.config.budget_types);
        let (rows, filter_report) = filter.apply(&table.rows);

        if rows.is_empty() {
            warn!(input = table.len(), "no rows left after filtering");
            let mut outcome = PipelineOutcome::empty(roles, PipelineStatus::EmptyScope);
            outcome.filter = filter_report;
            return Ok(outcome);
        }

        let aggregation =
            IndicatorAggregator::new(self.config.amount_unit).aggregate(&rows, &roles)?;
        let metrics = DerivedMetrics::new(self.config.policy.clone(), self.config.amount_unit);
        let records = metrics.derive_all(aggregation.records);

        info!(
            rows = rows.len(),
            records = records.len(),
            "pipeline complete"
        );
        Ok(PipelineOutcome {
            roles,
            status: PipelineStatus::Complete,
            filter: filter_report,
            aggregation: aggregation.report,
            records,
            filtered_rows: rows,
        })
    }
}
