//! Metrics definitions for the HTTP API.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "api.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time to handle a request in seconds, tagged by route",
};

pub const RESPONSE_STATUS: MetricDef = MetricDef {
    name: "api.response.status",
    metric_type: MetricType::Counter,
    description: "Number of responses, tagged by route and status code",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUEST_DURATION, RESPONSE_STATUS];
