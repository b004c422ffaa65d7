//! Email dispatch for the rendered form PDF over SMTP.

use std::path::Path;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use maya_core::config::SmtpConfig;
use maya_core::error::{MayaError, Result};

pub struct Mailer {
    config: SmtpConfig,
}

impl Mailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Send the given PDF as an attachment to the configured recipient.
    pub async fn send_pdf(&self, pdf_path: &Path) -> Result<()> {
        if !pdf_path.exists() {
            return Err(MayaError::Email(format!(
                "PDF file not found at {}",
                pdf_path.display()
            )));
        }

        let bytes = tokio::fs::read(pdf_path).await?;
        let filename = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "filled.pdf".into());

        let content_type = ContentType::parse("application/pdf")
            .map_err(|e| MayaError::Email(e.to_string()))?;
        let attachment = Attachment::new(filename).body(bytes, content_type);

        let email = Message::builder()
            .from(
                self.config
                    .from
                    .parse()
                    .map_err(|e| MayaError::Email(format!("invalid from address: {e}")))?,
            )
            .to(self
                .config
                .to
                .parse()
                .map_err(|e| MayaError::Email(format!("invalid to address: {e}")))?)
            .subject(&self.config.subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(self.config.body.clone()))
                    .singlepart(attachment),
            )
            .map_err(|e| MayaError::Email(e.to_string()))?;

        let password = self
            .config
            .resolve_password()
            .ok_or_else(|| MayaError::Email("SMTP password not configured".into()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| MayaError::Email(e.to_string()))?
            .port(self.config.port)
            .credentials(Credentials::new(self.config.username.clone(), password))
            .build();

        transport
            .send(email)
            .await
            .map_err(|e| MayaError::Email(e.to_string()))?;

        info!(to = %self.config.to, "PDF sent via email");
        Ok(())
    }
}
