pub mod error;
pub mod metrics;
pub mod profiles;
pub mod service;
pub mod state;

pub use error::LifecycleError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use service::{BringupHooks, Service, ServiceBuilder};
pub use state::ServiceState;
