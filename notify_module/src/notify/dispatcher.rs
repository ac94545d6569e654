use send_mail_module::{MailClient, OutgoingEmail, SendMailError};
use tracing::{error, info};

/// Hands composed emails to the mail-sending service and interprets the
/// outcome as a plain boolean.
///
/// Nothing escapes this boundary: transport errors, non-2xx responses
/// and `success: false` payloads all come back as `false`, logged with
/// the recipient and error detail.
#[derive(Debug, Clone)]
pub struct MailDispatcher {
    client: MailClient,
}

impl MailDispatcher {
    pub fn new(client: MailClient) -> Self {
        Self { client }
    }

    pub fn dispatch(&self, email: &OutgoingEmail) -> bool {
        match self.client.send(email) {
            Ok(response) if response.success => {
                info!("email sent to {}", email.to);
                true
            }
            Ok(response) => {
                error!(
                    "mail service rejected email to {}: {}",
                    email.to,
                    response.message.as_deref().unwrap_or("no detail")
                );
                false
            }
            Err(SendMailError::Status { status, body }) => {
                error!("mail service HTTP {} for {}: {}", status, email.to, body);
                false
            }
            Err(err) => {
                error!("mail transport failure for {}: {}", email.to, err);
                false
            }
        }
    }
}
