pub mod publisher;
pub mod types;

pub use publisher::{EventBus, EventSubscription};
pub use types::{EventKind, LifecycleEvent};
