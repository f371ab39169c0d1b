use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::request::RequestStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Create,
    Reassign,
    Cancel,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "created"),
            Self::Reassign => write!(f, "reassigned"),
            Self::Cancel => write!(f, "cancelled"),
        }
    }
}

/// Side effects a caller owes once a transition has been persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleAction {
    NotifyPropertyAdvisor,
    NotifyPreviousAdvisor,
    NotifyNewAdvisor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Option<RequestStatus>,
    pub to: RequestStatus,
    pub event: LifecycleEvent,
    pub actions: Vec<LifecycleAction>,
}
