pub mod bootstrap;
pub mod identity;
pub mod queries;
pub mod service;
pub mod telemetry;

pub use bootstrap::{BootstrapError, Engine};
pub use identity::{RoleProvider, StaticRoleProvider};
pub use queries::{summarize, QueryFilters, RequestQueries, RequestSummary, StatusBucket};
pub use service::WorkflowService;
pub use telemetry::init_logging;
