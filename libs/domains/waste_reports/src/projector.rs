//! Typed decode of raw `$group` output into report lines.

use mongodb::bson::{Bson, Document};
use tracing::error;

use crate::error::{ReportError, ReportResult};
use crate::models::ReportLine;
use crate::pipeline::{AVG_TOTAL_FIELD, AVG_WASTE_FIELD};

/// One line per group, in encounter order. The first malformed group fails
/// the whole projection.
pub fn project(raw: &[Document]) -> ReportResult<Vec<ReportLine>> {
    raw.iter()
        .enumerate()
        .map(|(index, group)| project_group(index, group))
        .collect::<ReportResult<Vec<_>>>()
        .inspect_err(|e| error!(error = %e, groups = raw.len(), "Aggregate result has an unexpected shape"))
}

fn project_group(index: usize, group: &Document) -> ReportResult<ReportLine> {
    let key = match group.get("_id") {
        Some(Bson::Document(key)) => key,
        other => return Err(mismatch(index, "_id", "a document", other)),
    };

    Ok(ReportLine {
        sku: string_field(index, key, "sku", "_id.sku")?,
        name: string_field(index, key, "name", "_id.name")?,
        waste_weight: numeric_field(index, group, AVG_WASTE_FIELD)?,
        total_weight: numeric_field(index, group, AVG_TOTAL_FIELD)?,
    })
}

fn string_field(
    index: usize,
    document: &Document,
    key: &str,
    field: &'static str,
) -> ReportResult<String> {
    match document.get(key) {
        Some(Bson::String(value)) => Ok(value.clone()),
        other => Err(mismatch(index, field, "a string", other)),
    }
}

/// Any BSON number, widened to `f64`.
fn numeric_field(index: usize, document: &Document, field: &'static str) -> ReportResult<f64> {
    match document.get(field) {
        Some(Bson::Double(value)) => Ok(*value),
        Some(Bson::Int32(value)) => Ok(f64::from(*value)),
        Some(Bson::Int64(value)) => Ok(*value as f64),
        other => Err(mismatch(index, field, "a number", other)),
    }
}

fn mismatch(index: usize, field: &'static str, expected: &str, found: Option<&Bson>) -> ReportError {
    let reason = match found {
        Some(value) => format!("expected {expected}, found {:?}", value.element_type()),
        None => "missing".to_string(),
    };
    ReportError::ShapeAssertion {
        index,
        field,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn group(sku: &str, name: &str, waste: Bson, total: Bson) -> Document {
        doc! {
            "_id": { "sku": sku, "name": name },
            "avg_waste": waste,
            "avg_total": total,
        }
    }

    #[test]
    fn test_projects_in_encounter_order() {
        let raw = vec![
            group("sku2", "n2", Bson::Double(105.0), Bson::Double(140.0)),
            group("sku1", "n1", Bson::Double(101.0), Bson::Double(120.0)),
        ];

        let lines = project(&raw).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].sku, "sku2");
        assert_eq!(lines[0].waste_weight, 105.0);
        assert_eq!(lines[1].name, "n1");
        assert_eq!(lines[1].total_weight, 120.0);
    }

    #[test]
    fn test_integer_averages_are_widened() {
        let raw = vec![group("sku1", "n1", Bson::Int32(7), Bson::Int64(1_000_000_000_000))];

        let lines = project(&raw).unwrap();
        assert_eq!(lines[0].waste_weight, 7.0);
        assert_eq!(lines[0].total_weight, 1_000_000_000_000.0);
    }

    #[test]
    fn test_empty_input_projects_to_nothing() {
        assert!(project(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_group_key() {
        let raw = vec![doc! { "avg_waste": 1.0, "avg_total": 2.0 }];

        match project(&raw).unwrap_err() {
            ReportError::ShapeAssertion { index, field, reason } => {
                assert_eq!(index, 0);
                assert_eq!(field, "_id");
                assert_eq!(reason, "missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_mistyped_sku_reports_index_and_field() {
        let raw = vec![
            group("sku1", "n1", Bson::Double(1.0), Bson::Double(2.0)),
            doc! {
                "_id": { "sku": 12345678, "name": "n2" },
                "avg_waste": 1.0,
                "avg_total": 2.0,
            },
        ];

        match project(&raw).unwrap_err() {
            ReportError::ShapeAssertion { index, field, reason } => {
                assert_eq!(index, 1);
                assert_eq!(field, "_id.sku");
                assert!(reason.contains("expected a string"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_null_average_is_rejected() {
        let raw = vec![group("sku1", "n1", Bson::Null, Bson::Double(2.0))];

        assert!(matches!(
            project(&raw).unwrap_err(),
            ReportError::ShapeAssertion { field: "avg_waste", .. }
        ));
    }

    #[test]
    fn test_missing_name() {
        let raw = vec![doc! {
            "_id": { "sku": "sku1" },
            "avg_waste": 1.0,
            "avg_total": 2.0,
        }];

        assert!(matches!(
            project(&raw).unwrap_err(),
            ReportError::ShapeAssertion { field: "_id.name", .. }
        ));
    }
}
