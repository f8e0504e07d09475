//! Outbound email for contact-form notifications over SMTP.
//!
//! Bodies are rendered from Askama templates and sent as text + HTML.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::{config::EmailConfig, models::ContactMessage};

#[derive(Template)]
#[template(path = "email/contact_message.html")]
struct ContactMessageHtml<'a> {
    full_name: &'a str,
    email: &'a str,
    phone_number: &'a str,
    message: &'a str,
}

#[derive(Template)]
#[template(path = "email/contact_message.txt")]
struct ContactMessageText<'a> {
    full_name: &'a str,
    email: &'a str,
    phone_number: &'a str,
    message: &'a str,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    notify_to: String,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            notify_to: config.notify_to.clone(),
        })
    }

    /// Tells the shop owner about a new contact-form message.
    pub async fn notify_contact(&self, message: &ContactMessage) -> Result<(), EmailError> {
        let (text, html) = render_contact(message)?;

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(self
                .notify_to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(self.notify_to.clone()))?)
            .subject(contact_subject(message))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(message_id = %message.id, "Contact notification sent");
        Ok(())
    }
}

fn contact_subject(message: &ContactMessage) -> String {
    format!("New Contact Message from {}", message.full_name)
}

/// Renders the plain text and HTML bodies, in that order.
fn render_contact(message: &ContactMessage) -> Result<(String, String), EmailError> {
    let text = ContactMessageText {
        full_name: &message.full_name,
        email: &message.email,
        phone_number: &message.phone_number,
        message: &message.message,
    }
    .render()?;
    let html = ContactMessageHtml {
        full_name: &message.full_name,
        email: &message.email,
        phone_number: &message.phone_number,
        message: &message.message,
    }
    .render()?;
    Ok((text, html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn message(text: &str) -> ContactMessage {
        ContactMessage {
            id: Uuid::new_v4(),
            full_name: "Meera <Admin>".into(),
            email: "meera@example.com".into(),
            phone_number: "9000000000".into(),
            message: text.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn html_body_escapes_user_input() {
        let (_, html) = render_contact(&message("<script>alert(1)</script>")).expect("render");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&#60;script&#62;") || html.contains("&lt;script&gt;"));
        assert!(!html.contains("Meera <Admin>"));
    }

    #[test]
    fn text_body_keeps_message_verbatim() {
        let (text, _) = render_contact(&message("Ring size 7?\nThanks")).expect("render");
        assert!(text.contains("Full Name: Meera <Admin>"));
        assert!(text.contains("Ring size 7?\nThanks"));
        assert!(text.contains("Phone Number: 9000000000"));
    }

    #[test]
    fn subject_names_sender() {
        assert_eq!(
            contact_subject(&message("hi")),
            "New Contact Message from Meera <Admin>"
        );
    }
}
