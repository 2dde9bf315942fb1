pub mod config;
pub mod domain;
pub mod errors;
pub mod gate;
pub mod notify;
pub mod payload;
pub mod resolver;

pub use config::{AppConfig, DatabaseConfig, EngineConfig, LogFormat, LoggingConfig};
pub use domain::actor::{ActorId, DecisionActor, Role};
pub use domain::request::{
    ApprovalRequest, ApprovalStep, Decision, DecisionAction, Level, RequestId, RequestKind,
    RequestStatus,
};
pub use domain::snapshot::RequestSnapshot;
pub use errors::{DenialReason, EngineError, TransitionError, ValidationError};
pub use gate::Gate;
pub use notify::{InMemoryNotificationSink, NotificationError, NotificationEvent, NotificationSink};
pub use payload::RequestPayload;
pub use resolver::{ChainResolver, PolicyConfig};
