//! Metrics definitions for accounts and sessions.

use shared::metrics_defs::{MetricDef, MetricType};

pub const LOGIN: MetricDef = MetricDef {
    name: "accounts.login",
    metric_type: MetricType::Counter,
    description: "Login attempts, tagged by role and outcome",
};

pub const SESSION_OPENED: MetricDef = MetricDef {
    name: "accounts.session.opened",
    metric_type: MetricType::Counter,
    description: "Number of device sessions opened, tagged by role",
};

pub const TOKEN_REFRESHED: MetricDef = MetricDef {
    name: "accounts.token.refreshed",
    metric_type: MetricType::Counter,
    description: "Number of access tokens issued through a refresh token",
};

pub const PASSWORD_RESET_REQUESTED: MetricDef = MetricDef {
    name: "accounts.password_reset.requested",
    metric_type: MetricType::Counter,
    description: "Number of password reset emails sent",
};

pub const ALL_METRICS: &[MetricDef] = &[
    LOGIN,
    SESSION_OPENED,
    TOKEN_REFRESHED,
    PASSWORD_RESET_REQUESTED,
];
