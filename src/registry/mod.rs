//! # Registries
//!
//! In-memory registries shared between the public scheduler API and the coordinator.
//!
//! ## Available Registries
//!
//! - **PipelineRegistry**: single source of truth for pipeline records and the only
//!   place status transitions are applied
//! - **CollectorRegistry**: source name → collector lookup used for admission checks
//!
//! ## Architecture
//!
//! ```text
//! Registries
//! ├── PipelineRegistry   (RwLock<HashMap>; many readers, coordinator-only writes)
//! └── CollectorRegistry  (DashMap; runtime registration from any thread)
//! ```

pub mod collector_registry;
pub mod pipeline_registry;

pub use collector_registry::CollectorRegistry;
pub use pipeline_registry::{PipelineRegistry, StatusCounts};
