//! # Commune Finance
//!
//! Column inference and indicator aggregation for OFGL municipal-finance
//! extracts (Réunion communes).
//!
//! A loaded table goes through five stages:
//!
//! - **Schema resolution**: which header is the commune, the fiscal year,
//!   the aggregate label, the amount, the population.
//! - **Normalization**: French-formatted numbers (`1 234,56`) to `f64`;
//!   unreadable cells stay missing, never zero.
//! - **Filtering**: department code and budget type.
//! - **Aggregation**: one record per (commune, year) with revenue, gross
//!   savings, taxes and financing capacity summed from matching labels.
//! - **Derived metrics**: expense and debt estimates, surplus, ratios and
//!   per-inhabitant figures.
//!
//! ## Example
//!
//! ```rust,ignore
//! use commune_finance::*;
//!
//! let config = DashboardConfig::default();
//! let (table, _) = loader::load_table(&config.input_path)?;
//! let outcome = Pipeline::new(&config).run(&table)?;
//! for record in &outcome.records {
//!     println!("{} {} {:.1} M€", record.entity(), record.year(), record.base.revenue);
//! }
//! ```

pub mod aggregate;
pub mod annex;
pub mod config;
pub mod error;
pub mod filter;
pub mod indicator;
pub mod loader;
pub mod metrics;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod reports;
pub mod schema;
pub mod table;
pub mod types;
pub mod util;

pub use aggregate::{
    Aggregation, AggregationReport, EntityYearRecord, IndicatorAggregator, IndicatorStatus,
    DEFAULT_AMOUNT_UNIT,
};
pub use config::DashboardConfig;
pub use error::{DashboardError, Result};
pub use filter::{FilterReport, RecordFilter};
pub use indicator::FinancialIndicator;
pub use metrics::{DebtProvenance, DerivedMetrics, DerivedRecord, MetricsPolicy, Ratio, RatioBasis};
pub use normalize::normalize;
pub use pipeline::{Pipeline, PipelineOutcome, PipelineStatus};
pub use schema::{ColumnRole, ColumnRoles, SchemaResolver};
pub use table::{Cell, RawRecord, RawTable};
