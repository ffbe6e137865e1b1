use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_email(&self, to: &str, reset_link: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("smtp relay")?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        let from = cfg.from.parse().context("parse SMTP_FROM")?;
        Ok(Self { transport, from })
    }
}

pub fn reset_email_body(reset_link: &str) -> String {
    format!(
        "Kami menerima permintaan reset password untuk akun Anda.\n\n\
         Buka tautan berikut untuk mengatur password baru (berlaku 1 jam):\n\
         {reset_link}\n\n\
         Abaikan email ini jika Anda tidak meminta reset password.\n"
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_reset_email(&self, to: &str, reset_link: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("parse recipient address")?)
            .subject("Reset Password")
            .header(ContentType::TEXT_PLAIN)
            .body(reset_email_body(reset_link))
            .context("build reset email")?;
        self.transport.send(email).await.context("smtp send")?;
        Ok(())
    }
}

/// Test double that records every send instead of talking to a relay.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_reset_email(&self, to: &str, reset_link: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), reset_link.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_body_contains_the_link() {
        let body = reset_email_body("http://localhost:5000/reset-password?token=abc123");
        assert!(body.contains("http://localhost:5000/reset-password?token=abc123"));
        assert!(body.contains("reset password"));
    }

    #[tokio::test]
    async fn recording_mailer_captures_sends() {
        let mailer = RecordingMailer::default();
        mailer
            .send_reset_email("a@x.com", "http://x/reset-password?token=t")
            .await
            .unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@x.com");
    }
}
