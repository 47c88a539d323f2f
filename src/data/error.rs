use thiserror::Error;

use super::model::{Field, Period};

/// Configuration errors raised by the KPI layer.
///
/// Zero denominators are not errors; metrics fall back to `0.0` instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KpiError {
    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("invalid period `{0}` (expected YYYY, YYYY-MM or YYYY-MM-DD)")]
    InvalidPeriod(String),

    #[error("metric `{metric}` needs field `{field}`, missing for {entity} at {period}")]
    MissingField {
        metric: &'static str,
        field: Field,
        entity: String,
        period: Period,
    },
}

pub type KpiResult<T> = Result<T, KpiError>;
