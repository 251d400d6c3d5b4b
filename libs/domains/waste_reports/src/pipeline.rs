//! Aggregation pipeline construction.

use mongodb::bson::{Document, doc};

use crate::error::{ReportError, ReportResult};
use crate::models::TimeRangeFilter;

/// Output field holding the average wasted weight of a group.
pub const AVG_WASTE_FIELD: &str = "avg_waste";

/// Output field holding the average total weight of a group.
pub const AVG_TOTAL_FIELD: &str = "avg_total";

/// `$match` on the exclusive time range, then `$group` by `(sku, name)`
/// averaging `weight` and `totalWeight`.
pub fn build_pipeline(filter: &TimeRangeFilter) -> ReportResult<Vec<Document>> {
    for (bound, value) in [("$gt", filter.gt), ("$lt", filter.lt)] {
        if !value.is_finite() {
            return Err(ReportError::PipelineBuild(format!(
                "bound `timestamp.{bound}` is not a finite number: {value}"
            )));
        }
    }

    Ok(vec![
        doc! {
            "$match": {
                "timestamp": { "$gt": filter.gt, "$lt": filter.lt },
            },
        },
        doc! {
            "$group": {
                "_id": { "sku": "$sku", "name": "$name" },
                (AVG_WASTE_FIELD): { "$avg": "$weight" },
                (AVG_TOTAL_FIELD): { "$avg": "$totalWeight" },
            },
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stages() {
        let pipeline = build_pipeline(&TimeRangeFilter::new(9.0, 21.0)).unwrap();
        assert_eq!(pipeline.len(), 2);

        let range = pipeline[0]
            .get_document("$match")
            .and_then(|m| m.get_document("timestamp"))
            .unwrap();
        assert_eq!(range.get_f64("$gt").unwrap(), 9.0);
        assert_eq!(range.get_f64("$lt").unwrap(), 21.0);

        let group = pipeline[1].get_document("$group").unwrap();
        assert_eq!(
            group.get_document("_id").unwrap(),
            &doc! { "sku": "$sku", "name": "$name" }
        );
        assert_eq!(
            group.get_document(AVG_WASTE_FIELD).unwrap(),
            &doc! { "$avg": "$weight" }
        );
        assert_eq!(
            group.get_document(AVG_TOTAL_FIELD).unwrap(),
            &doc! { "$avg": "$totalWeight" }
        );
    }

    #[test]
    fn test_group_emits_exactly_the_projected_fields() {
        let pipeline = build_pipeline(&TimeRangeFilter::new(9.0, 21.0)).unwrap();
        let group = pipeline[1].get_document("$group").unwrap();

        let keys: Vec<&str> = group.keys().map(String::as_str).collect();
        assert_eq!(keys, ["_id", AVG_WASTE_FIELD, AVG_TOTAL_FIELD]);
    }

    #[test]
    fn test_fractional_bounds_are_preserved() {
        let pipeline = build_pipeline(&TimeRangeFilter::new(1528000000.25, 1529000000.75)).unwrap();
        let range = pipeline[0]
            .get_document("$match")
            .and_then(|m| m.get_document("timestamp"))
            .unwrap();
        assert_eq!(range.get_f64("$gt").unwrap(), 1528000000.25);
        assert_eq!(range.get_f64("$lt").unwrap(), 1529000000.75);
    }

    #[test]
    fn test_non_finite_bounds_are_rejected() {
        for filter in [
            TimeRangeFilter::new(f64::NAN, 21.0),
            TimeRangeFilter::new(9.0, f64::INFINITY),
            TimeRangeFilter::new(f64::NEG_INFINITY, 21.0),
        ] {
            assert!(matches!(
                build_pipeline(&filter),
                Err(ReportError::PipelineBuild(_))
            ));
        }
    }
}
