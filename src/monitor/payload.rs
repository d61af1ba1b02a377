use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::{CUSTOM_METRIC_NAMESPACE, LAG_METRIC_NAME, METRIC_DIMENSION_NAMES};
use crate::lag::LagRecord;

/// UTC, second precision: lexical order matches chronological order.
const SORTABLE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Custom metric payload, as accepted by the Azure Monitor custom metrics API.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MetricPayload {
    pub time: String,
    pub data: MetricData,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MetricData {
    #[serde(rename = "baseData")]
    pub base_data: BaseData,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BaseData {
    pub metric: String,
    #[serde(rename = "Namespace")]
    pub namespace: String,
    #[serde(rename = "dimNames")]
    pub dim_names: Vec<String>,
    pub series: Vec<Series>,
}

/// One pre-aggregated value of the metric, for a combination of dimension values.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Series {
    #[serde(rename = "dimValues")]
    pub dim_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    pub sum: u64,
    pub count: u64,
}

impl MetricPayload {
    /// Build the `Lag` payload of a poll cycle.
    ///
    /// Series follow the order of `records`. Each `count` is the 1-based rank of its record:
    /// consumers of the metric already rely on this, so it is not a count of samples.
    ///
    /// # Arguments
    ///
    /// * `now` - Time the payload refers to
    /// * `event_hub` - Name of the Event Hub, first dimension value of every series
    /// * `records` - Lag records of the cycle, already ordered
    pub fn from_lag_records(now: DateTime<Utc>, event_hub: &str, records: &[LagRecord]) -> Self {
        Self {
            time: now.format(SORTABLE_TIME_FORMAT).to_string(),
            data: MetricData {
                base_data: BaseData {
                    metric: LAG_METRIC_NAME.to_string(),
                    namespace: CUSTOM_METRIC_NAMESPACE.to_string(),
                    dim_names: METRIC_DIMENSION_NAMES.iter().map(|d| d.to_string()).collect(),
                    series: records
                        .iter()
                        .enumerate()
                        .map(|(idx, r)| Series {
                            dim_values: vec![event_hub.to_string(), r.reader_group.clone(), r.partition_id.clone()],
                            min: None,
                            max: None,
                            sum: r.lag,
                            count: idx as u64 + 1,
                        })
                        .collect(),
                },
            },
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap() + chrono::Duration::milliseconds(678)
    }

    #[test]
    fn wire_shape() {
        let records = vec![
            LagRecord::new("$Default".to_string(), "0".to_string(), 3),
            LagRecord::new("$Default".to_string(), "1".to_string(), 0),
        ];

        let payload = MetricPayload::from_lag_records(at(), "orders", &records);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "time": "2024-03-01T09:05:07",
                "data": {
                    "baseData": {
                        "metric": "Lag",
                        "Namespace": "Event Hub custom metrics",
                        "dimNames": ["EventHubName", "ConsumerGroup", "PartitionId"],
                        "series": [
                            { "dimValues": ["orders", "$Default", "0"], "sum": 3, "count": 1 },
                            { "dimValues": ["orders", "$Default", "1"], "sum": 0, "count": 2 }
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn unset_min_max_are_omitted() {
        let payload = MetricPayload::from_lag_records(at(), "orders", &[LagRecord::default()]);
        let json = serde_json::to_string(&payload).unwrap();

        assert!(!json.contains("min"));
        assert!(!json.contains("max"));
        assert!(!json.contains("null"));
    }

    #[test]
    fn empty_cycle() {
        let payload = MetricPayload::from_lag_records(at(), "orders", &[]);
        assert!(payload.data.base_data.series.is_empty());
    }
}
