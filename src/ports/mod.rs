//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use cases require from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MetricSource`: one provider producing one metric value
//! - `PushGateway`: token exchange + template-message delivery

pub mod push;
pub mod source;

pub use push::{
    hint_for, AccessToken, PushGateway, SendReceipt, TemplateMessage, TemplateValue,
};
pub use source::MetricSource;
