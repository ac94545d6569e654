//! Client for the internal mail-sending service.
//!
//! The service accepts a JSON `{to, subject, message, replyTo}` payload
//! over HTTP and answers with `{success, message?}`. Queuing, retries and
//! SMTP details are its responsibility; this crate only submits one
//! message and reports what the service said.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One outbound email, immutable once composed.
///
/// `message` carries the HTML body. Field names follow the mail
/// service's wire contract.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub message: String,
    #[serde(rename = "replyTo")]
    pub reply_to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SendMailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Blocking HTTP client for the mail-sending service.
#[derive(Debug, Clone)]
pub struct MailClient {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl MailClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SendMailError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit one email. A non-2xx response is an error; a 2xx response
    /// is returned as-is, including `success: false` payloads.
    pub fn send(&self, email: &OutgoingEmail) -> Result<MailResponse, SendMailError> {
        let response = self.client.post(&self.endpoint).json(email).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SendMailError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<MailResponse>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_email() -> OutgoingEmail {
        OutgoingEmail {
            to: "alice@example.com".to_string(),
            subject: "Hello".to_string(),
            message: "<p>Hi</p>".to_string(),
            reply_to: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn serializes_reply_to_in_wire_format() {
        let json = serde_json::to_value(sample_email()).unwrap();
        assert_eq!(json["replyTo"], "alice@example.com");
        assert_eq!(json["message"], "<p>Hi</p>");
        assert!(json.get("reply_to").is_none());
    }

    #[test]
    fn send_returns_service_payload_on_success() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/send_mail.php")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"message":"Email sent successfully"}"#)
            .expect(1)
            .create();

        let client = MailClient::new(
            format!("{}/send_mail.php", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let response = client.send(&sample_email()).unwrap();
        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("Email sent successfully"));
        mock.assert();
    }

    #[test]
    fn send_passes_through_failure_payload() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/send_mail.php")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":false,"message":"Invalid recipient email format"}"#)
            .create();

        let client = MailClient::new(
            format!("{}/send_mail.php", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let response = client.send(&sample_email()).unwrap();
        assert!(!response.success);
    }

    #[test]
    fn send_maps_http_error_to_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/send_mail.php")
            .with_status(502)
            .with_body("bad gateway")
            .create();

        let client = MailClient::new(
            format!("{}/send_mail.php", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        match client.send(&sample_email()) {
            Err(SendMailError::Status { status, .. }) => assert_eq!(status, 502),
            other => panic!("expected status error, got {:?}", other),
        }
    }
}
