use strum::IntoStaticStr;
use thiserror::Error;

/// Error code carried by every failed [`crate::QueryResponse`].
pub const INTERNAL_ERROR: i32 = 1;

/// Everything that can stop a report query.
#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ReportError {
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    #[error("Missing time range: `timestamp.{bound}` is absent or zero")]
    MissingTimeRange { bound: &'static str },

    #[error("Failed to build aggregation pipeline: {0}")]
    PipelineBuild(String),

    #[error("Aggregation failed: {0}")]
    Execution(String),

    #[error("No result found for {gt} < timestamp < {lt}")]
    EmptyResultSet { gt: f64, lt: f64 },

    #[error("Unexpected aggregate shape at index {index}, field `{field}`: {reason}")]
    ShapeAssertion {
        index: usize,
        field: &'static str,
        reason: String,
    },

    #[error("Failed to persist report: {0}")]
    Persistence(String),

    #[error("Failed to encode report result: {0}")]
    ResultEncoding(String),
}

impl ReportError {
    /// Stable name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// All kinds share one external code; the kind stays in the logs.
    pub fn error_code(&self) -> i32 {
        INTERNAL_ERROR
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ReportError::MalformedFilter("x".into()).kind(), "malformed_filter");
        assert_eq!(ReportError::MissingTimeRange { bound: "$gt" }.kind(), "missing_time_range");
        assert_eq!(ReportError::EmptyResultSet { gt: 1.0, lt: 2.0 }.kind(), "empty_result_set");
        assert_eq!(
            ReportError::ShapeAssertion {
                index: 0,
                field: "avg_waste",
                reason: "missing".into()
            }
            .kind(),
            "shape_assertion"
        );
        assert_eq!(ReportError::Persistence("x".into()).kind(), "persistence");
        assert_eq!(ReportError::ResultEncoding("x".into()).kind(), "result_encoding");
    }

    #[test]
    fn test_every_kind_maps_to_internal_error() {
        assert_eq!(ReportError::Execution("down".into()).error_code(), INTERNAL_ERROR);
        assert_eq!(ReportError::PipelineBuild("nan".into()).error_code(), 1);
    }

    #[test]
    fn test_messages() {
        let err = ReportError::MissingTimeRange { bound: "$lt" };
        assert_eq!(err.to_string(), "Missing time range: `timestamp.$lt` is absent or zero");

        let err = ReportError::EmptyResultSet { gt: 9.0, lt: 21.0 };
        assert_eq!(err.to_string(), "No result found for 9 < timestamp < 21");

        let err = ReportError::ResultEncoding("bad float".into());
        assert_eq!(err.to_string(), "Failed to encode report result: bad float");
        assert_eq!(err.error_code(), INTERNAL_ERROR);
    }
}
