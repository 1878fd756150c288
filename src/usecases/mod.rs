//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the report's workflows. Each use case is a self-contained
//! operation.
//!
//! Use cases:
//! - `timed`: deadline + elapsed-time wrapper for any call
//! - `FallbackResolver`: priority-ordered source chain per metric
//! - `ReportCollector`: concurrent fan-out, join and report assembly
//! - `NotificationDispatcher`: token exchange + template message send

pub mod collector;
pub mod dispatcher;
pub mod fallback;
pub mod timed;
