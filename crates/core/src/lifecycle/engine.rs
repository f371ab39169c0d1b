use thiserror::Error;

use crate::domain::request::RequestStatus;
use crate::lifecycle::states::{LifecycleAction, LifecycleEvent, TransitionOutcome};

/// Request status machine.
///
/// | from   | event    | to        |
/// |--------|----------|-----------|
/// | (none) | Create   | Sent      |
/// | Sent   | Reassign | Assigned  |
/// | Sent   | Cancel   | Cancelled |
///
/// Everything else is rejected; there are no silent no-ops.
#[derive(Clone, Debug, Default)]
pub struct LifecycleEngine;

impl LifecycleEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_state(&self) -> RequestStatus {
        RequestStatus::Sent
    }

    pub fn apply(
        &self,
        current: Option<RequestStatus>,
        event: LifecycleEvent,
    ) -> Result<TransitionOutcome, TransitionError> {
        use LifecycleAction::{NotifyNewAdvisor, NotifyPreviousAdvisor, NotifyPropertyAdvisor};
        use LifecycleEvent::{Cancel, Create, Reassign};
        use RequestStatus::{Assigned, Cancelled, Sent};

        let (to, actions) = match (current, event) {
            (None, Create) => (Sent, vec![NotifyPropertyAdvisor]),
            (Some(Sent), Reassign) => (Assigned, vec![NotifyPreviousAdvisor, NotifyNewAdvisor]),
            (Some(Sent), Cancel) => (Cancelled, Vec::new()),
            (Some(state), Create) => return Err(TransitionError::AlreadyExists { state }),
            (Some(state), Reassign | Cancel) => {
                return Err(TransitionError::RequestNotSent { state, event });
            }
            (None, Reassign | Cancel) => return Err(TransitionError::MissingRequest { event }),
        };

        Ok(TransitionOutcome { from: current, to, event, actions })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("only a sent request can be {event}; current status is {state}")]
    RequestNotSent { state: RequestStatus, event: LifecycleEvent },
    #[error("request already exists with status {state}")]
    AlreadyExists { state: RequestStatus },
    #[error("a request must exist before it can be {event}")]
    MissingRequest { event: LifecycleEvent },
}

#[cfg(test)]
mod tests {
    use crate::domain::request::RequestStatus;
    use crate::lifecycle::engine::{LifecycleEngine, TransitionError};
    use crate::lifecycle::states::{LifecycleAction, LifecycleEvent};

    #[test]
    fn create_starts_in_sent_and_notifies_property_advisor() {
        let engine = LifecycleEngine::new();
        let outcome = engine.apply(None, LifecycleEvent::Create).expect("create");

        assert_eq!(outcome.to, engine.initial_state());
        assert_eq!(outcome.to, RequestStatus::Sent);
        assert_eq!(outcome.actions, vec![LifecycleAction::NotifyPropertyAdvisor]);
    }

    #[test]
    fn reassign_from_sent_notifies_both_advisors() {
        let outcome = LifecycleEngine::new()
            .apply(Some(RequestStatus::Sent), LifecycleEvent::Reassign)
            .expect("sent -> assigned");

        assert_eq!(outcome.from, Some(RequestStatus::Sent));
        assert_eq!(outcome.to, RequestStatus::Assigned);
        assert_eq!(
            outcome.actions,
            vec![LifecycleAction::NotifyPreviousAdvisor, LifecycleAction::NotifyNewAdvisor]
        );
    }

    #[test]
    fn cancel_from_sent_has_no_side_effects() {
        let outcome = LifecycleEngine::new()
            .apply(Some(RequestStatus::Sent), LifecycleEvent::Cancel)
            .expect("sent -> cancelled");

        assert_eq!(outcome.to, RequestStatus::Cancelled);
        assert!(outcome.actions.is_empty());
    }

    #[test]
    fn guards_reject_every_non_sent_state() {
        let engine = LifecycleEngine::new();
        let states = [
            RequestStatus::Assigned,
            RequestStatus::Cancelled,
            RequestStatus::Other(5),
        ];

        for state in states {
            for event in [LifecycleEvent::Reassign, LifecycleEvent::Cancel] {
                let error = engine.apply(Some(state), event).expect_err("must reject");
                assert_eq!(error, TransitionError::RequestNotSent { state, event });
            }
        }
    }

    #[test]
    fn existing_request_cannot_be_created_again() {
        let error = LifecycleEngine::new()
            .apply(Some(RequestStatus::Sent), LifecycleEvent::Create)
            .expect_err("create on existing request");

        assert!(matches!(error, TransitionError::AlreadyExists { state: RequestStatus::Sent }));
    }

    #[test]
    fn cancel_error_message_names_current_status() {
        let error = LifecycleEngine::new()
            .apply(Some(RequestStatus::Assigned), LifecycleEvent::Cancel)
            .expect_err("assigned cannot be cancelled");

        assert_eq!(
            error.to_string(),
            "only a sent request can be cancelled; current status is assigned"
        );
    }
}
