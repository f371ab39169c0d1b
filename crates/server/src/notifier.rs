//! HTTP delivery for advisor notifications.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use estatedesk_core::config::NotificationConfig;
use estatedesk_core::notification::{NotificationMessage, Notifier, NotifyError};

/// Longest slice of a rejection body kept in the error.
const MAX_REJECTION_DETAIL: usize = 256;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailMessage<'a> {
    destination_email: &'a str,
    destination_name: &'a str,
    content_email: &'a str,
    subject_email: &'a str,
}

impl<'a> From<&'a NotificationMessage> for EmailMessage<'a> {
    fn from(message: &'a NotificationMessage) -> Self {
        Self {
            destination_email: &message.destination_email,
            destination_name: &message.destination_name,
            content_email: &message.body,
            subject_email: &message.subject,
        }
    }
}

pub struct HttpNotifier {
    client: Client,
    api_token: Option<SecretString>,
}

impl HttpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, reqwest::Error> {
        let client =
            Client::builder().timeout(Duration::from_secs(config.timeout_secs.max(1))).build()?;
        Ok(Self { client, api_token: config.api_token.clone() })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, message: &NotificationMessage, endpoint: &str) -> Result<(), NotifyError> {
        let mut request = self.client.post(endpoint).json(&EmailMessage::from(message));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| NotifyError::Transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut detail = response.text().await.unwrap_or_default();
        if detail.len() > MAX_REJECTION_DETAIL {
            let mut cut = MAX_REJECTION_DETAIL;
            while !detail.is_char_boundary(cut) {
                cut -= 1;
            }
            detail.truncate(cut);
        }
        Err(NotifyError::Rejected { status: status.as_u16(), detail })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use estatedesk_core::config::AppConfig;
    use estatedesk_core::notification::{NotificationMessage, Notifier, NotifyError};
    use serde_json::{json, Value};

    use super::{EmailMessage, HttpNotifier};

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    fn message() -> NotificationMessage {
        NotificationMessage {
            destination_email: "laura@example.test".to_string(),
            destination_name: "Laura Gomez".to_string(),
            body: "A request has been made for the property with id 5.".to_string(),
            subject: "New request".to_string(),
        }
    }

    async fn capture(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let authorization = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        captured.lock().expect("capture lock").push((authorization, body));
        StatusCode::ACCEPTED
    }

    async fn spawn_endpoint(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}/email")
    }

    #[test]
    fn wire_format_uses_camel_case_field_names() {
        let message = message();

        let value = serde_json::to_value(EmailMessage::from(&message)).expect("serialize");

        assert_eq!(
            value,
            json!({
                "destinationEmail": "laura@example.test",
                "destinationName": "Laura Gomez",
                "contentEmail": "A request has been made for the property with id 5.",
                "subjectEmail": "New request",
            })
        );
    }

    #[tokio::test]
    async fn send_posts_message_with_bearer_token() {
        let captured: Captured = Arc::default();
        let endpoint = spawn_endpoint(
            Router::new().route("/email", post(capture)).with_state(captured.clone()),
        )
        .await;
        let mut config = AppConfig::default().notification;
        config.api_token = Some("notify-token".to_string().into());
        let notifier = HttpNotifier::new(&config).expect("client");

        notifier.send(&message(), &endpoint).await.expect("delivered");

        let captured = captured.lock().expect("capture lock").clone();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].0.as_deref(), Some("Bearer notify-token"));
        assert_eq!(captured[0].1["destinationEmail"], "laura@example.test");
        assert_eq!(captured[0].1["subjectEmail"], "New request");
    }

    #[tokio::test]
    async fn non_success_status_is_reported_as_rejection() {
        let endpoint = spawn_endpoint(Router::new().route(
            "/email",
            post(|| async { (StatusCode::BAD_GATEWAY, "mail relay offline") }),
        ))
        .await;
        let notifier = HttpNotifier::new(&AppConfig::default().notification).expect("client");

        let error = notifier.send(&message(), &endpoint).await.expect_err("rejected");

        assert_eq!(
            error,
            NotifyError::Rejected { status: 502, detail: "mail relay offline".to_string() }
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("local addr");
        drop(listener);
        let notifier = HttpNotifier::new(&AppConfig::default().notification).expect("client");

        let error = notifier
            .send(&message(), &format!("http://{address}/email"))
            .await
            .expect_err("connection refused");

        assert!(matches!(error, NotifyError::Transport(_)));
    }
}
