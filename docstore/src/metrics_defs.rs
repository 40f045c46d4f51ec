//! Metrics definitions for the document store.

use shared::metrics_defs::{MetricDef, MetricType};

pub const TXN_COMMITTED: MetricDef = MetricDef {
    name: "store.txn.committed",
    metric_type: MetricType::Counter,
    description: "Number of committed transactions",
};

pub const TXN_ROLLED_BACK: MetricDef = MetricDef {
    name: "store.txn.rolled_back",
    metric_type: MetricType::Counter,
    description: "Number of transactions rolled back, explicitly or on drop",
};

pub const SNAPSHOT_FLUSH_DURATION: MetricDef = MetricDef {
    name: "store.snapshot.flush.duration",
    metric_type: MetricType::Histogram,
    description: "Time to take and store a snapshot in seconds",
};

pub const SNAPSHOT_BYTES: MetricDef = MetricDef {
    name: "store.snapshot.bytes",
    metric_type: MetricType::Histogram,
    description: "Uncompressed size of the last stored snapshot",
};

pub const SNAPSHOT_FLUSH_FAILED: MetricDef = MetricDef {
    name: "store.snapshot.flush.failed",
    metric_type: MetricType::Counter,
    description: "Number of snapshot flushes that failed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    TXN_COMMITTED,
    TXN_ROLLED_BACK,
    SNAPSHOT_FLUSH_DURATION,
    SNAPSHOT_BYTES,
    SNAPSHOT_FLUSH_FAILED,
];
