//! Request middleware: the authentication gate and HTTP metrics.

pub mod auth;
pub mod http_metrics;
