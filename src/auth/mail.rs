use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()>;
}

/// Records outgoing messages in the log instead of delivering them.
/// Bodies carry confirmation links and reset tokens, so only the envelope is logged.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "email queued"
        );
        Ok(())
    }
}

pub fn confirmation_email(from: &str, to: &str, username: &str, link: &str) -> EmailMessage {
    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Confirm your email".to_string(),
        body: format!(
            "Hi {username},\n\nplease confirm your email address by opening the link below:\n{link}\n"
        ),
    }
}

pub fn password_reset_email(from: &str, to: &str, username: &str, token: &str) -> EmailMessage {
    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        body: format!(
            "Hi {username},\n\nuse this code to set a new password:\n{token}\n\nIf you did not ask for a reset, ignore this message.\n"
        ),
    }
}
