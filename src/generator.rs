//! Dashboard Data Generator
//!
//! Produces mock dashboard snapshots: five gauge metrics and a ten-row
//! service status table, all randomised and stamped with the current time.
//! Every call builds a new snapshot; nothing is cached.

use chrono::Utc;
use rand::Rng;

use crate::protocol::error::SnapshotError;
use crate::protocol::wire::{DashboardSnapshot, Metric, TableRow};

/// Number of metrics in every generated snapshot
pub const METRIC_COUNT: usize = 5;
/// Number of table rows in every generated snapshot
pub const TABLE_ROW_COUNT: usize = 10;

/// Something that can produce dashboard snapshots on demand.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> Result<DashboardSnapshot, SnapshotError>;
}

/// (name, unit, max value)
const METRICS: [(&str, &str, f64); METRIC_COUNT] = [
    ("CPU Usage", "%", 100.0),
    ("Memory Usage", "%", 100.0),
    ("Network Throughput", "MB/s", 1000.0),
    ("Active Users", "users", 5000.0),
    ("Request Rate", "req/s", 2000.0),
];

const STATUSES: [&str; 4] = ["Active", "Idle", "Warning", "Error"];

/// Randomised snapshot source used by the server.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockDataGenerator;

impl MockDataGenerator {
    pub fn new() -> Self {
        MockDataGenerator
    }
}

impl SnapshotSource for MockDataGenerator {
    fn snapshot(&self) -> Result<DashboardSnapshot, SnapshotError> {
        let mut rng = rand::thread_rng();
        let now = Utc::now();

        let metrics = METRICS
            .iter()
            .map(|&(name, unit, max_value)| Metric {
                name: name.to_string(),
                value: round2(rng.gen_range(0.0..=max_value)),
                max_value,
                unit: unit.to_string(),
            })
            .collect();

        let table_data = (1..=TABLE_ROW_COUNT as i64)
            .map(|id| TableRow {
                id,
                name: format!("Service {id:02}"),
                status: STATUSES[rng.gen_range(0..STATUSES.len())].to_string(),
                value: round2(rng.gen_range(0.0..1000.0)),
                last_updated: now - chrono::Duration::seconds(rng.gen_range(0..3600)),
            })
            .collect();

        Ok(DashboardSnapshot {
            timestamp: now,
            metrics,
            table_data,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_shape() {
        let snapshot = MockDataGenerator::new().snapshot().unwrap();
        assert_eq!(snapshot.metrics.len(), METRIC_COUNT);
        assert_eq!(snapshot.table_data.len(), TABLE_ROW_COUNT);
    }

    #[test]
    fn test_metric_values_within_range() {
        let snapshot = MockDataGenerator::new().snapshot().unwrap();
        for metric in &snapshot.metrics {
            assert!(metric.value >= 0.0 && metric.value <= metric.max_value);
            assert!(!metric.unit.is_empty());
        }
    }

    #[test]
    fn test_table_rows_ordered_by_id() {
        let snapshot = MockDataGenerator::new().snapshot().unwrap();
        let ids: Vec<i64> = snapshot.table_data.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        for row in &snapshot.table_data {
            assert!(STATUSES.contains(&row.status.as_str()));
            assert!(row.last_updated <= snapshot.timestamp);
        }
    }

    #[test]
    fn test_each_call_is_fresh() {
        let source = MockDataGenerator::new();
        let first = source.snapshot().unwrap();
        let second = source.snapshot().unwrap();
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(99.999), 100.0);
    }
}
