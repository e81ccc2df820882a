use crate::schema::ColumnRole;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Schema incomplete: no column found for {}", format_roles(.missing))]
    SchemaIncomplete { missing: Vec<ColumnRole> },

    #[error("Input file is empty")]
    EmptyInput,

    #[error("Invalid metrics policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_roles(roles: &[ColumnRole]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, DashboardError>;
