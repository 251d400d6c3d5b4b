//! Inbound query events and outbound response events.

use serde::{Deserialize, Serialize};
use stream_worker::StreamJob;
use uuid::Uuid;

use crate::error::ReportError;
use crate::models::ReportLine;

/// A report query read from the query stream.
///
/// `data` carries the filter as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEvent {
    #[serde(rename = "aggregateID")]
    pub aggregate_id: i8,
    #[serde(rename = "correlationID")]
    pub correlation_id: Uuid,
    pub event_action: String,
    pub service_action: String,
    pub uuid: Uuid,
    pub data: String,
    /// Worker-side redelivery counter, absent on events from producers.
    #[serde(default)]
    pub retry_count: u32,
}

impl QueryEvent {
    /// Fresh event with new correlation and event ids.
    pub fn new(
        aggregate_id: i8,
        event_action: impl Into<String>,
        service_action: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            aggregate_id,
            correlation_id: Uuid::new_v4(),
            event_action: event_action.into(),
            service_action: service_action.into(),
            uuid: Uuid::new_v4(),
            data: data.into(),
            retry_count: 0,
        }
    }
}

impl StreamJob for QueryEvent {
    fn job_id(&self) -> String {
        self.uuid.to_string()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

/// The single response to a [`QueryEvent`].
///
/// Exactly one of `result` and `error` is set; `errorCode` accompanies
/// `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(rename = "aggregateID")]
    pub aggregate_id: i8,
    #[serde(rename = "correlationID")]
    pub correlation_id: Uuid,
    pub event_action: String,
    pub service_action: String,
    pub uuid: Uuid,
    /// JSON array of [`ReportLine`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
}

impl QueryResponse {
    fn echo(event: &QueryEvent) -> Self {
        Self {
            aggregate_id: event.aggregate_id,
            correlation_id: event.correlation_id,
            event_action: event.event_action.clone(),
            service_action: event.service_action.clone(),
            uuid: event.uuid,
            result: None,
            error: None,
            error_code: None,
        }
    }

    pub fn success(event: &QueryEvent, lines: &[ReportLine]) -> Self {
        match serde_json::to_string(lines) {
            Ok(result) => Self {
                result: Some(result),
                ..Self::echo(event)
            },
            Err(e) => Self::failure(event, &ReportError::ResultEncoding(e.to_string())),
        }
    }

    pub fn failure(event: &QueryEvent, error: &ReportError) -> Self {
        Self {
            error: Some(error.to_string()),
            error_code: Some(error.error_code()),
            ..Self::echo(event)
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// Decode `result`; `None` for failures.
    pub fn report_lines(&self) -> Option<Result<Vec<ReportLine>, serde_json::Error>> {
        self.result.as_deref().map(serde_json::from_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::INTERNAL_ERROR;

    fn event() -> QueryEvent {
        QueryEvent::new(
            8,
            "query",
            "waste-report",
            r#"{"timestamp":{"$gt":9,"$lt":21}}"#,
        )
    }

    #[test]
    fn test_event_wire_names() {
        let json = r#"{
            "aggregateID": 8,
            "correlationID": "7f0c2a3e-5d0b-4c55-9a4d-3d1f0c4b9e21",
            "eventAction": "query",
            "serviceAction": "waste-report",
            "uuid": "0b6a9f7c-1c2d-4e5f-8a9b-0c1d2e3f4a5b",
            "data": "{\"timestamp\":{\"$gt\":9,\"$lt\":21}}"
        }"#;

        let event: QueryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.aggregate_id, 8);
        assert_eq!(event.event_action, "query");
        assert_eq!(event.retry_count, 0);
        assert_eq!(
            event.correlation_id.to_string(),
            "7f0c2a3e-5d0b-4c55-9a4d-3d1f0c4b9e21"
        );
    }

    #[test]
    fn test_with_retry_keeps_identity() {
        let original = event();
        let retried = original.with_retry();

        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.correlation_id, original.correlation_id);
        assert_eq!(retried.job_id(), original.uuid.to_string());
    }

    #[test]
    fn test_success_response() {
        let event = event();
        let lines = vec![ReportLine {
            sku: "sku1".into(),
            name: "n1".into(),
            waste_weight: 101.0,
            total_weight: 120.0,
        }];

        let response = QueryResponse::success(&event, &lines);
        assert!(response.is_success());
        assert_eq!(response.correlation_id, event.correlation_id);
        assert_eq!(response.report_lines().unwrap().unwrap(), lines);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["aggregateID"], 8);
        assert_eq!(json["serviceAction"], "waste-report");
        assert!(json.get("error").is_none());
        assert!(json.get("errorCode").is_none());
    }

    #[test]
    fn test_failure_response() {
        let event = event();
        let response = QueryResponse::failure(&event, &ReportError::MissingTimeRange { bound: "$gt" });

        assert!(!response.is_success());
        assert!(response.report_lines().is_none());
        assert_eq!(response.uuid, event.uuid);
        assert_eq!(response.error_code, Some(INTERNAL_ERROR));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["errorCode"], 1);
        assert_eq!(json["eventAction"], "query");
        assert!(json.get("result").is_none());
        assert!(json["error"].as_str().unwrap().contains("timestamp.$gt"));
    }

    #[test]
    fn test_encoding_failure_is_not_a_storage_failure() {
        let event = event();
        let response = QueryResponse::failure(&event, &ReportError::ResultEncoding("bad".into()));

        assert!(!response.is_success());
        assert_eq!(response.error_code, Some(INTERNAL_ERROR));
        let message = response.error.unwrap();
        assert!(message.starts_with("Failed to encode report result"));
        assert!(!message.contains("persist"));
    }
}
