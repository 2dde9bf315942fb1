use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::actor::Role;
use crate::domain::request::{RequestId, RequestKind, RequestStatus};

/// Outbound event describing a status change and who should hear about it.
///
/// Delivery is an external collaborator's job; the engine emits these after
/// a transition has been durably persisted and never rolls the transition
/// back on a delivery failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub notify_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        request_id: RequestId,
        kind: RequestKind,
        status: RequestStatus,
        notify_roles: Vec<Role>,
    ) -> Self {
        Self { request_id, kind, status, notify_roles, occurred_at: Utc::now() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

pub trait NotificationSink: Send + Sync {
    fn deliver(&self, event: NotificationEvent) -> Result<(), NotificationError>;
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl InMemoryNotificationSink {
    pub fn events(&self) -> Vec<NotificationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn deliver(&self, event: NotificationEvent) -> Result<(), NotificationError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}
