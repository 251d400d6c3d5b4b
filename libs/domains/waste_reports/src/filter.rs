//! Filter parsing.
//!
//! Accepts `{"timestamp": {"$gt": n, "$lt": n}}` as well as the split form
//! where `timestamp` appears once per bound. Repeated `timestamp` objects are
//! merged, a later bound overriding an earlier one, and the same holds for a
//! bound repeated inside one object. Unknown keys are ignored.

use serde::Deserialize;
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use std::fmt;

use crate::error::{ReportError, ReportResult};
use crate::models::TimeRangeFilter;

/// Unvalidated comparator; `None` and `0` are both rejected later.
#[derive(Debug, Default, Clone, Copy)]
struct Comparator {
    gt: Option<f64>,
    lt: Option<f64>,
}

impl<'de> Deserialize<'de> for Comparator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ComparatorVisitor;

        impl<'de> Visitor<'de> for ComparatorVisitor {
            type Value = Comparator;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a comparator object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Comparator, A::Error> {
                let mut comparator = Comparator::default();

                while let Some(key) = map.next_key::<String>()? {
                    let slot = match key.as_str() {
                        "$gt" => &mut comparator.gt,
                        "$lt" => &mut comparator.lt,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                            continue;
                        }
                    };
                    if let Some(value) = map.next_value::<Option<f64>>()? {
                        *slot = Some(value);
                    }
                }

                Ok(comparator)
            }
        }

        deserializer.deserialize_map(ComparatorVisitor)
    }
}

impl Comparator {
    fn merge(&mut self, later: Comparator) {
        if later.gt.is_some() {
            self.gt = later.gt;
        }
        if later.lt.is_some() {
            self.lt = later.lt;
        }
    }
}

#[derive(Debug, Default)]
struct FilterParams {
    timestamp: Option<Comparator>,
}

impl<'de> Deserialize<'de> for FilterParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamsVisitor;

        impl<'de> Visitor<'de> for ParamsVisitor {
            type Value = FilterParams;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a filter object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FilterParams, A::Error> {
                let mut params = FilterParams::default();

                while let Some(key) = map.next_key::<String>()? {
                    if key == "timestamp" {
                        let next: Comparator = map.next_value()?;
                        params
                            .timestamp
                            .get_or_insert_with(Comparator::default)
                            .merge(next);
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }

                Ok(params)
            }
        }

        deserializer.deserialize_map(ParamsVisitor)
    }
}

/// Parse and validate a time-range filter.
pub fn parse_filter(payload: &[u8]) -> ReportResult<TimeRangeFilter> {
    let params: FilterParams = serde_json::from_slice(payload)
        .map_err(|e| ReportError::MalformedFilter(e.to_string()))?;

    let comparator = params
        .timestamp
        .ok_or(ReportError::MissingTimeRange { bound: "$gt" })?;

    Ok(TimeRangeFilter {
        gt: required_bound(comparator.gt, "$gt")?,
        lt: required_bound(comparator.lt, "$lt")?,
    })
}

fn required_bound(value: Option<f64>, bound: &'static str) -> ReportResult<f64> {
    match value {
        Some(v) if v != 0.0 => Ok(v),
        _ => Err(ReportError::MissingTimeRange { bound }),
    }
}
