use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::json;

use crate::config::SecretString;
use crate::error::{Error, ErrorCode, Result};
use crate::http;

/// Chat message sent after a successful deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub username: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub text: String,
    pub color: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl Notification {
    pub fn deployed(sender: &str, project: &str, version: &str) -> Self {
        Self {
            username: sender.to_string(),
            attachments: vec![Attachment {
                text: format!("A new version was deployed for {}", project),
                color: "good".to_string(),
                fields: vec![Field {
                    title: "Version".to_string(),
                    value: version.to_string(),
                    short: false,
                }],
            }],
        }
    }

    /// Value of the first field titled `title`.
    pub fn field(&self, title: &str) -> Option<&str> {
        self.attachments
            .iter()
            .flat_map(|a| a.fields.iter())
            .find(|f| f.title == title)
            .map(|f| f.value.as_str())
    }
}

pub trait Notifier {
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Incoming-webhook delivery.
pub struct SlackNotifier {
    client: Client,
    webhook_url: SecretString,
}

impl SlackNotifier {
    pub fn new(client: Client, webhook_url: SecretString) -> Self {
        Self { client, webhook_url }
    }
}

impl Notifier for SlackNotifier {
    fn send(&self, notification: &Notification) -> Result<()> {
        // The webhook URL embeds the credential, so it never appears in errors.
        let response = self
            .client
            .post(self.webhook_url.expose())
            .json(notification)
            .send()
            .map_err(|e| http::request_error(ErrorCode::NotifyFailed, "<webhook>", e))?;

        let (status, body) = http::read_response(response);
        if !(200..300).contains(&status) {
            return Err(Error::notify_failed(
                format!("Notification webhook returned status {}", status),
                json!({ "status": status, "body": body }),
            ));
        }
        Ok(())
    }
}
