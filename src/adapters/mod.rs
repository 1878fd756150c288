//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (provider HTTP APIs, HTML pages, the push
//! API, Prometheus). Each sub-module groups adapters by concern.
//!
//! Adapter categories:
//! - `http`: shared provider HTTP client with uniform error mapping
//! - `sources`: one `MetricSource` per data provider + the catalog
//! - `push`: WeChat template-message gateway
//! - `telemetry`: Prometheus registry rendered to a textfile

pub mod http;
pub mod push;
pub mod sources;
pub mod telemetry;
