use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored waste record. Written by upstream ingestion, only read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "itemID")]
    pub item_id: String,
    #[serde(rename = "wasteID")]
    pub waste_id: String,
    pub sku: String,
    pub name: String,
    pub lot: String,
    /// Wasted weight, expected to be at most `total_weight`.
    pub weight: f64,
    #[serde(rename = "totalWeight")]
    pub total_weight: f64,
    /// Unix seconds
    pub timestamp: i64,
}

impl WasteItem {
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        weight: f64,
        total_weight: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            id: None,
            item_id: Uuid::new_v4().to_string(),
            waste_id: Uuid::new_v4().to_string(),
            sku: sku.into(),
            name: name.into(),
            lot: String::new(),
            weight,
            total_weight,
            timestamp,
        }
    }

    pub fn with_lot(mut self, lot: impl Into<String>) -> Self {
        self.lot = lot.into();
        self
    }
}

/// Validated time range: `gt < timestamp < lt`, both bounds non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeFilter {
    pub gt: f64,
    pub lt: f64,
}

impl TimeRangeFilter {
    pub fn new(gt: f64, lt: f64) -> Self {
        Self { gt, lt }
    }

    /// Both ends exclusive.
    pub fn contains(&self, timestamp: f64) -> bool {
        self.gt < timestamp && timestamp < self.lt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub timestamp: TimeRangeFilter,
}

/// One `(sku, name)` group of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLine {
    pub sku: String,
    pub name: String,
    /// Average wasted weight of the group
    pub waste_weight: f64,
    /// Average total weight of the group
    pub total_weight: f64,
}

impl ReportLine {
    fn to_bson(&self) -> Bson {
        Bson::Document(doc! {
            "sku": self.sku.clone(),
            "name": self.name.clone(),
            "wasteWeight": self.waste_weight,
            "totalWeight": self.total_weight,
        })
    }
}

/// A generated report. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteReport {
    #[serde(rename = "reportID")]
    pub report_id: Uuid,
    #[serde(rename = "searchQuery")]
    pub search_query: SearchQuery,
    #[serde(rename = "reportResult")]
    pub report_result: Vec<ReportLine>,
}

impl WasteReport {
    /// New report with a fresh identity.
    pub fn new(filter: TimeRangeFilter, lines: Vec<ReportLine>) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            search_query: SearchQuery { timestamp: filter },
            report_result: lines,
        }
    }

    /// Stored form; `reportID` is kept as its string representation and `_id`
    /// is left to the store.
    pub fn to_document(&self) -> Document {
        let lines: Vec<Bson> = self.report_result.iter().map(ReportLine::to_bson).collect();
        let range = self.search_query.timestamp;

        doc! {
            "reportID": self.report_id.to_string(),
            "searchQuery": {
                "timestamp": { "gt": range.gt, "lt": range.lt },
            },
            "reportResult": lines,
        }
    }
}
