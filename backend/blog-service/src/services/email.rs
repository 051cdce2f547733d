/// Outgoing mail
///
/// SMTP when a host is configured; otherwise every message is written as an
/// `.eml` file under the configured directory, which is how development and
/// tests read password reset links.
use crate::config::EmailConfig;
use crate::error::{AppError, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::file::AsyncFileTransport;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
enum Transport {
    Smtp(Arc<AsyncSmtpTransport<Tokio1Executor>>),
    File {
        dir: PathBuf,
        transport: Arc<AsyncFileTransport<Tokio1Executor>>,
    },
}

#[derive(Clone)]
pub struct EmailService {
    transport: Transport,
    from: Mailbox,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Internal(format!("Invalid EMAIL_FROM address: {}", e)))?;

        let transport = match config.smtp_host.as_deref() {
            Some(host) => {
                let builder = if config.use_starttls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                }
                .map_err(|e| {
                    AppError::Internal(format!("Failed to configure SMTP transport: {}", e))
                })?
                .port(config.smtp_port);

                let builder = match (&config.smtp_username, &config.smtp_password) {
                    (Some(username), Some(password)) => {
                        builder.credentials(Credentials::new(username.clone(), password.clone()))
                    }
                    _ => builder,
                };
                Transport::Smtp(Arc::new(builder.build()))
            }
            None => {
                warn!(dir = %config.file_path.display(), "SMTP host not configured; mail goes to files");
                Transport::File {
                    dir: config.file_path.clone(),
                    transport: Arc::new(AsyncFileTransport::new(&config.file_path)),
                }
            }
        };

        Ok(Self { transport, from })
    }

    /// Send a plain-text message
    pub async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| AppError::Internal(format!("Invalid recipient email address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to build email message: {}", e)))?;

        match &self.transport {
            Transport::Smtp(transport) => {
                transport
                    .send(email)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;
            }
            Transport::File { dir, transport } => {
                tokio::fs::create_dir_all(dir).await?;
                transport
                    .send(email)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to write email: {}", e)))?;
            }
        }

        info!(subject, "email sent");
        Ok(())
    }

    pub async fn send_password_reset(&self, recipient: &str, username: &str, link: &str) -> Result<()> {
        let body = format!(
            "You're receiving this email because you requested a password reset for your user account.\n\n\
             Please go to the following page and choose a new password:\n\n\
             {}\n\n\
             Your username, in case you've forgotten: {}\n\n\
             If you did not request this, you can ignore this email.\n",
            link, username
        );
        self.send(recipient, "Password reset", &body).await
    }
}
