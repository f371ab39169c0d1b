//! Outbound notifications.
//!
//! The lifecycle service never waits on delivery. It hands each payload to a
//! [`NotificationOutbox`], which for production is a bounded queue drained by
//! a background worker calling a [`Notifier`]. Delivery is at most once: a
//! full queue, a closed queue, or a failed send is logged and dropped.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub destination_email: String,
    pub destination_name: String,
    pub body: String,
    pub subject: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub message: NotificationMessage,
    pub endpoint: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification endpoint rejected message with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &NotificationMessage, endpoint: &str) -> Result<(), NotifyError>;
}

/// Non-blocking handoff used by the lifecycle service.
pub trait NotificationOutbox: Send + Sync {
    fn enqueue(&self, payload: NotificationPayload);
}

/// Notifier used when delivery is disabled by configuration.
#[derive(Clone, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, message: &NotificationMessage, endpoint: &str) -> Result<(), NotifyError> {
        debug!(
            event_name = "notification.skipped",
            endpoint,
            subject = %message.subject,
            "notification delivery disabled; message dropped"
        );
        Ok(())
    }
}

pub struct NotificationQueue {
    sender: mpsc::Sender<NotificationPayload>,
}

impl NotificationQueue {
    /// Starts the delivery worker. The worker exits once every queue handle
    /// has been dropped and the backlog is drained.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(receiver, notifier));
        (Self { sender }, worker)
    }
}

impl NotificationOutbox for NotificationQueue {
    fn enqueue(&self, payload: NotificationPayload) {
        match self.sender.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(payload)) => warn!(
                event_name = "notification.dropped",
                reason = "queue_full",
                destination = %payload.message.destination_email,
                "notification queue is full; message dropped"
            ),
            Err(TrySendError::Closed(payload)) => warn!(
                event_name = "notification.dropped",
                reason = "queue_closed",
                destination = %payload.message.destination_email,
                "notification worker is gone; message dropped"
            ),
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<NotificationPayload>,
    notifier: Arc<dyn Notifier>,
) {
    info!(event_name = "notification.worker.started", "notification worker started");

    while let Some(payload) = receiver.recv().await {
        match notifier.send(&payload.message, &payload.endpoint).await {
            Ok(()) => debug!(
                event_name = "notification.delivered",
                destination = %payload.message.destination_email,
                subject = %payload.message.subject,
                "notification delivered"
            ),
            Err(error) => warn!(
                event_name = "notification.failed",
                destination = %payload.message.destination_email,
                endpoint = %payload.endpoint,
                error = %error,
                "notification delivery failed; not retried"
            ),
        }
    }

    info!(event_name = "notification.worker.stopped", "notification worker stopped");
}

/// Outbox that keeps every payload in memory instead of delivering it.
#[derive(Clone, Default)]
pub struct InMemoryOutbox {
    payloads: Arc<Mutex<Vec<NotificationPayload>>>,
}

impl InMemoryOutbox {
    pub fn payloads(&self) -> Vec<NotificationPayload> {
        match self.payloads.lock() {
            Ok(payloads) => payloads.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationOutbox for InMemoryOutbox {
    fn enqueue(&self, payload: NotificationPayload) {
        match self.payloads.lock() {
            Ok(mut payloads) => payloads.push(payload),
            Err(poisoned) => poisoned.into_inner().push(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{
        NotificationMessage, NotificationOutbox, NotificationPayload, NotificationQueue, Notifier,
        NotifyError,
    };

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            message: &NotificationMessage,
            endpoint: &str,
        ) -> Result<(), NotifyError> {
            if self.fail_for.as_deref() == Some(message.destination_email.as_str()) {
                return Err(NotifyError::Transport("connection refused".to_string()));
            }
            self.sent
                .lock()
                .expect("recording lock")
                .push((message.destination_email.clone(), endpoint.to_string()));
            Ok(())
        }
    }

    fn payload(email: &str) -> NotificationPayload {
        NotificationPayload {
            message: NotificationMessage {
                destination_email: email.to_string(),
                destination_name: "Advisor".to_string(),
                body: "body".to_string(),
                subject: "subject".to_string(),
            },
            endpoint: "http://notifications.local/email".to_string(),
        }
    }

    #[tokio::test]
    async fn worker_delivers_queued_payloads_in_order() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (queue, worker) = NotificationQueue::spawn(notifier.clone(), 8);

        queue.enqueue(payload("a@example.com"));
        queue.enqueue(payload("b@example.com"));
        drop(queue);
        worker.await.expect("worker joins");

        let sent = notifier.sent.lock().expect("recording lock").clone();
        assert_eq!(
            sent,
            vec![
                ("a@example.com".to_string(), "http://notifications.local/email".to_string()),
                ("b@example.com".to_string(), "http://notifications.local/email".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_delivery_does_not_stop_the_worker() {
        let notifier = Arc::new(RecordingNotifier {
            fail_for: Some("broken@example.com".to_string()),
            ..RecordingNotifier::default()
        });
        let (queue, worker) = NotificationQueue::spawn(notifier.clone(), 8);

        queue.enqueue(payload("broken@example.com"));
        queue.enqueue(payload("ok@example.com"));
        drop(queue);
        worker.await.expect("worker joins");

        let sent = notifier.sent.lock().expect("recording lock").clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ok@example.com");
    }

    #[tokio::test]
    async fn enqueue_after_worker_exit_is_silently_dropped() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (queue, worker) = NotificationQueue::spawn(notifier.clone(), 1);
        worker.abort();
        let _ = worker.await;

        queue.enqueue(payload("late@example.com"));

        assert!(notifier.sent.lock().expect("recording lock").is_empty());
    }
}
