use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One row of the IBOV day table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `None` when the source cell is missing or not a number. Serialized as `null`.
    pub closing_price: Option<f64>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<IndexRecord>,
}

impl Snapshot {
    pub fn new(generated_at: DateTime<Utc>, records: Vec<IndexRecord>) -> Self {
        Self {
            generated_at,
            records,
        }
    }

    /// `b3_data_<epoch_ms>.json`. Used for both the staged file and the object key.
    pub fn file_name(&self) -> String {
        format!("b3_data_{}.json", self.generated_at.timestamp_millis())
    }
}
