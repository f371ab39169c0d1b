pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod notification;
pub mod projection;
pub mod service;
pub mod store;

pub use domain::advisor::{Advisor, AdvisorId};
pub use domain::customer::{Customer, CustomerId};
pub use domain::property::{Property, PropertyId};
pub use domain::request::{Request, RequestDraft, RequestId, RequestStatus, RequestTypeId};
pub use errors::{ApplicationError, DomainError, EntityKind, ErrorKind, InterfaceError};
pub use lifecycle::{LifecycleAction, LifecycleEngine, LifecycleEvent, TransitionError};
pub use notification::{
    NoopNotifier, NotificationMessage, NotificationOutbox, NotificationPayload, NotificationQueue,
    Notifier, NotifyError,
};
pub use service::{NotificationSettings, ReassignmentOutcome, RequestService};
pub use store::{RecordStore, RequestLookup, RequestReadModel, StoreError};
