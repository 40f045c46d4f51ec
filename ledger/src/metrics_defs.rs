//! Metrics definitions for the connection ledger.

use shared::metrics_defs::{MetricDef, MetricType};

pub const LINKS_UPSERTED: MetricDef = MetricDef {
    name: "ledger.links.upserted",
    metric_type: MetricType::Counter,
    description: "Number of pair records created or updated by add_links, tagged by kind",
};

pub const LINKS_PULLED: MetricDef = MetricDef {
    name: "ledger.links.pulled",
    metric_type: MetricType::Counter,
    description: "Number of pair records an activity reference was removed from",
};

pub const RECORDS_PRUNED: MetricDef = MetricDef {
    name: "ledger.records.pruned",
    metric_type: MetricType::Counter,
    description: "Number of pair records deleted after losing their last reference",
};

pub const CONFLICT_RETRY: MetricDef = MetricDef {
    name: "ledger.conflict.retry",
    metric_type: MetricType::Counter,
    description: "Number of batched upserts retried after a pair key conflict",
};

pub const STATUS_LOOKUP_SIZE: MetricDef = MetricDef {
    name: "ledger.status_lookup.size",
    metric_type: MetricType::Histogram,
    description: "Number of users in a connection status lookup",
};

pub const ALL_METRICS: &[MetricDef] = &[
    LINKS_UPSERTED,
    LINKS_PULLED,
    RECORDS_PRUNED,
    CONFLICT_RETRY,
    STATUS_LOOKUP_SIZE,
];
