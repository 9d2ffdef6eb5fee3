//! Admin notification side effect for new suggestions.
//!
//! One POST to a configured serverless mail endpoint. The call is spawned
//! and forgotten: a slow or failing mail hop never blocks the submission
//! and never rolls it back; failures land in the log and nowhere else.

use dial_core::config::NotifyConfig;
use dial_core::model::Suggestion;
use serde_json::json;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    endpoint: Option<String>,
    recipient: String,
}

impl Notifier {
    pub fn new(config: &NotifyConfig) -> Self {
        let endpoint = if config.endpoint.trim().is_empty() {
            None
        } else {
            Some(config.endpoint.clone())
        };
        Self {
            client: reqwest::Client::new(),
            endpoint,
            recipient: config.admin_email.clone(),
        }
    }

    /// A notifier with no endpoint: logs and skips.
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: None,
            recipient: String::new(),
        }
    }

    pub fn notify_new_suggestion(&self, suggestion: &Suggestion) {
        let Some(endpoint) = self.endpoint.clone() else {
            debug!(
                "no notification endpoint configured, skipping mail for '{}'",
                suggestion.name
            );
            return;
        };

        let payload = json!({
            "to": self.recipient,
            "radio_name": suggestion.name,
            "description": suggestion.description,
            "stream_url": suggestion.stream_url,
            "country": suggestion.country,
            "language": suggestion.language,
            "contact_email": suggestion.contact_email,
        });
        let client = self.client.clone();
        let name = suggestion.name.clone();

        tokio::spawn(async move {
            let result = client
                .post(&endpoint)
                .json(&payload)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match result {
                Ok(_) => debug!("suggestion notification for '{}' delivered", name),
                Err(e) => warn!(
                    "failed to deliver suggestion notification for '{}': {}",
                    name, e
                ),
            }
        });
    }
}
