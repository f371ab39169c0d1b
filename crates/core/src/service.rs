//! Request lifecycle orchestration.
//!
//! Every operation follows the same order: validate input, read current
//! state, run the lifecycle guard (and the duplicate rule on create), write,
//! and only then hand notifications to the outbox. A rejected guard never
//! reaches the write, and a committed write is never undone by a failed
//! notification.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::NotificationConfig;
use crate::domain::advisor::{Advisor, AdvisorId};
use crate::domain::customer::CustomerId;
use crate::domain::request::{NewRequest, Request, RequestDraft, RequestId};
use crate::errors::{ApplicationError, DomainError, EntityKind};
use crate::lifecycle::{LifecycleAction, LifecycleEngine, LifecycleEvent};
use crate::notification::{NotificationMessage, NotificationOutbox, NotificationPayload};
use crate::store::{RecordStore, RequestLookup, StoreError};

/// Delivery settings copied out of [`NotificationConfig`] at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationSettings {
    pub endpoint: String,
    pub request_subject: String,
    pub reassignment_subject: String,
}

impl From<&NotificationConfig> for NotificationSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            request_subject: config.request_subject.clone(),
            reassignment_subject: config.reassignment_subject.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentOutcome {
    pub ok: bool,
    pub message: String,
    pub request: Request,
}

#[derive(Default)]
struct Recipients<'a> {
    property_advisor: Option<&'a Advisor>,
    previous_advisor: Option<&'a Advisor>,
    new_advisor: Option<&'a Advisor>,
}

pub struct RequestService {
    store: Arc<dyn RecordStore>,
    outbox: Arc<dyn NotificationOutbox>,
    lifecycle: LifecycleEngine,
    settings: NotificationSettings,
}

impl RequestService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        outbox: Arc<dyn NotificationOutbox>,
        settings: NotificationSettings,
    ) -> Self {
        Self { store, outbox, lifecycle: LifecycleEngine::new(), settings }
    }

    /// Opens a new request against a property and notifies the property's
    /// advisor. Fails with a conflict while the customer still has an open
    /// request for the same property.
    pub async fn create_request(&self, draft: RequestDraft) -> Result<Request, ApplicationError> {
        validate_positive("customer_id", draft.customer_id.0)?;
        validate_positive("property_id", draft.property_id.0)?;
        validate_positive("request_type_id", draft.request_type_id.0)?;

        self.store
            .find_customer(draft.customer_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Customer, draft.customer_id))?;

        let property = self
            .store
            .find_property(draft.property_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Property, draft.property_id))?;
        let advisor_id = property.advisor_id.ok_or_else(|| {
            ApplicationError::not_found(
                EntityKind::Advisor,
                format!("assigned to property {}", property.id),
            )
        })?;
        let advisor = self
            .store
            .find_advisor(advisor_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Advisor, advisor_id))?;

        let outcome = self.lifecycle.apply(None, LifecycleEvent::Create)?;

        let existing = self
            .store
            .find_requests_by_customer_and_property(draft.customer_id, draft.property_id)
            .await?;
        if let Some(open) = existing.iter().find(|request| request.is_open()) {
            warn!(
                event_name = "request.create.rejected",
                customer_id = %draft.customer_id,
                property_id = %draft.property_id,
                open_request_id = %open.id,
                "customer already has an open request for this property"
            );
            return Err(duplicate(&draft));
        }

        let new_request = NewRequest {
            property_id: draft.property_id,
            advisor_id: Some(advisor.id),
            request_type_id: draft.request_type_id,
            status: outcome.to,
            creation_date: Utc::now(),
        };
        let created = match self.store.create_request(draft.customer_id, new_request).await {
            Ok(created) => created,
            Err(StoreError::UniqueViolation(detail)) => {
                warn!(
                    event_name = "request.create.rejected",
                    customer_id = %draft.customer_id,
                    property_id = %draft.property_id,
                    detail = %detail,
                    "store refused a concurrent duplicate request"
                );
                return Err(duplicate(&draft));
            }
            Err(error) => return Err(error.into()),
        };

        info!(
            event_name = "request.created",
            request_id = %created.id,
            customer_id = %created.customer_id,
            property_id = %created.property_id,
            advisor_id = %advisor.id,
            "request created"
        );

        self.dispatch(
            &outcome.actions,
            &created,
            Recipients { property_advisor: Some(&advisor), ..Recipients::default() },
        );
        Ok(created)
    }

    /// Cancels a customer's request. Only a request still in `Sent` can be
    /// cancelled; nobody is notified.
    pub async fn cancel_request(
        &self,
        customer_id: CustomerId,
        request_id: RequestId,
    ) -> Result<Request, ApplicationError> {
        validate_positive("customer_id", customer_id.0)?;
        validate_positive("request_id", request_id.0)?;

        let mut request = self
            .store
            .find_request(RequestLookup::for_customer(customer_id, request_id))
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Request, request_id))?;

        let outcome = self.lifecycle.apply(Some(request.status), LifecycleEvent::Cancel)?;
        request.status = outcome.to;
        let saved = self.store.save_request(request).await?;

        info!(
            event_name = "request.cancelled",
            request_id = %saved.id,
            customer_id = %saved.customer_id,
            "request cancelled"
        );

        self.dispatch(&outcome.actions, &saved, Recipients::default());
        Ok(saved)
    }

    /// Moves a `Sent` request to another advisor and marks it `Assigned`.
    /// Both the previous and the new advisor are notified.
    pub async fn reassign_advisor(
        &self,
        request_id: RequestId,
        new_advisor_id: AdvisorId,
    ) -> Result<ReassignmentOutcome, ApplicationError> {
        validate_positive("request_id", request_id.0)?;
        validate_positive("advisor_id", new_advisor_id.0)?;

        let mut request = self
            .store
            .find_request(RequestLookup::by_id(request_id))
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Request, request_id))?;

        let outcome = self.lifecycle.apply(Some(request.status), LifecycleEvent::Reassign)?;

        let previous_advisor = self.store.find_request_advisor(request.id).await?;
        let new_advisor = self
            .store
            .find_advisor(new_advisor_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Advisor, new_advisor_id))?;

        request.advisor_id = Some(new_advisor.id);
        request.status = outcome.to;
        let saved = self.store.save_request(request).await?;

        info!(
            event_name = "request.reassigned",
            request_id = %saved.id,
            previous_advisor_id = ?previous_advisor.as_ref().map(|advisor| advisor.id.0),
            new_advisor_id = %new_advisor.id,
            "request reassigned"
        );

        self.dispatch(
            &outcome.actions,
            &saved,
            Recipients {
                previous_advisor: previous_advisor.as_ref(),
                new_advisor: Some(&new_advisor),
                ..Recipients::default()
            },
        );

        Ok(ReassignmentOutcome {
            ok: true,
            message: format!("request {} was reassigned successfully", saved.id),
            request: saved,
        })
    }

    fn dispatch(
        &self,
        actions: &[LifecycleAction],
        request: &Request,
        recipients: Recipients<'_>,
    ) {
        for action in actions {
            let (recipient, body, subject) = match action {
                LifecycleAction::NotifyPropertyAdvisor => (
                    recipients.property_advisor,
                    format!(
                        "A request has been made for the property with id {}.",
                        request.property_id
                    ),
                    &self.settings.request_subject,
                ),
                LifecycleAction::NotifyPreviousAdvisor => (
                    recipients.previous_advisor,
                    format!(
                        "Request {} that was under your responsibility has been assigned to another advisor.",
                        request.id
                    ),
                    &self.settings.reassignment_subject,
                ),
                LifecycleAction::NotifyNewAdvisor => (
                    recipients.new_advisor,
                    format!(
                        "The administration has assigned you request {} for review.",
                        request.id
                    ),
                    &self.settings.reassignment_subject,
                ),
            };

            let Some(advisor) = recipient else {
                warn!(
                    event_name = "notification.skipped",
                    request_id = %request.id,
                    action = ?action,
                    "no recipient for notification"
                );
                continue;
            };

            self.outbox.enqueue(NotificationPayload {
                message: NotificationMessage {
                    destination_email: advisor.email.clone(),
                    destination_name: advisor.display_name(),
                    body,
                    subject: subject.clone(),
                },
                endpoint: self.settings.endpoint.clone(),
            });
        }
    }
}

fn duplicate(draft: &RequestDraft) -> ApplicationError {
    DomainError::DuplicateActiveRequest {
        customer_id: draft.customer_id,
        property_id: draft.property_id,
    }
    .into()
}

fn validate_positive(field: &str, value: i64) -> Result<(), ApplicationError> {
    if value <= 0 {
        return Err(ApplicationError::Validation(format!("{field} must be a positive id")));
    }
    Ok(())
}
