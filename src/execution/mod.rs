//! # Execution
//!
//! Isolated execution units and the collaborator seams they call.
//!
//! ## Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use feedpulse_core::execution::{Collector, StageError};
//! use feedpulse_core::models::SourceItem;
//! use serde_json::Value;
//!
//! struct CommentCollector;
//!
//! #[async_trait]
//! impl Collector for CommentCollector {
//!     async fn collect(
//!         &self,
//!         _source: &str,
//!         source_id: &str,
//!         _options: &Value,
//!     ) -> Result<Vec<SourceItem>, StageError> {
//!         Ok(vec![SourceItem::new(format!("{source_id}-1"), "first!")])
//!     }
//! }
//! ```

pub mod errors;
pub mod outcome;
pub mod traits;
pub mod unit;

pub use errors::{ExecutionError, StageError};
pub use outcome::ExecutionOutcome;
pub(crate) use outcome::UnitMessage;
pub use traits::{Collector, PassthroughProcessor, Processor};
pub use unit::ExecutionUnit;
pub(crate) use unit::{spawn_supervised, UnitHandle};
