//! # Data Model
//!
//! Pipeline records, collected items and failure templates.
//!
//! [`Pipeline`] records are owned by the
//! [`PipelineRegistry`](crate::registry::PipelineRegistry); every other component
//! refers to them by [`PipelineId`] and reads snapshots through the registry.

pub mod failure_template;
pub mod item;
pub mod pipeline;

pub use failure_template::{FailureContext, FailureTemplate};
pub use item::{ItemFailure, PipelineResult, ProcessedItem, SourceItem};
pub use pipeline::{Pipeline, PipelineId, PipelineRequest, Priority};
