use std::future::Future;
use std::time::Duration;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};

use crate::domain::SubscriberEmail;
use crate::helpers::error_chain_fmt;

/// SMTP reply codes for rejected credentials.
const AUTH_FAILURE_CODES: [&str; 3] = ["530", "534", "535"];

#[derive(thiserror::Error)]
pub enum EmailError {
    #[error("SMTP authentication failed. Check the sender email and password.")]
    Authentication(#[source] lettre::transport::smtp::Error),
    #[error("SMTP error while sending the email.")]
    Transport(#[source] lettre::transport::smtp::Error),
    #[error("Failed to build the email message.")]
    Message(#[from] lettre::error::Error),
    #[error("Invalid email address.")]
    Address(#[from] lettre::address::AddressError),
}

impl std::fmt::Debug for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<lettre::transport::smtp::Error> for EmailError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        let is_auth_failure = e
            .status()
            .is_some_and(|code| AUTH_FAILURE_CODES.contains(&code.to_string().as_str()));
        if is_auth_failure {
            EmailError::Authentication(e)
        } else {
            EmailError::Transport(e)
        }
    }
}

/// Anything that can deliver a plain text + HTML email.
pub trait Mailer {
    fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> impl Future<Output = Result<(), EmailError>> + Send;
}

/// Opens a fresh authenticated session for every message, upgraded with
/// STARTTLS unless `require_tls` is off.
#[derive(Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    sender: SubscriberEmail,
    password: SecretString,
    timeout: Duration,
    require_tls: bool,
}

impl SmtpMailer {
    pub fn new(
        host: String,
        port: u16,
        sender: SubscriberEmail,
        password: SecretString,
        timeout: Duration,
        require_tls: bool,
    ) -> Self {
        Self {
            host,
            port,
            sender,
            password,
            timeout,
            require_tls,
        }
    }

    pub fn build_message(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<Message, EmailError> {
        let from: Mailbox = self.sender.as_ref().parse()?;
        let to: Mailbox = recipient.as_ref().parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text_content.to_string(),
                html_content.to_string(),
            ))?;
        Ok(message)
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        let credentials = Credentials::new(
            self.sender.as_ref().to_string(),
            self.password.expose_secret().to_string(),
        );
        let builder = if self.require_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
        };
        let transport = builder
            .port(self.port)
            .credentials(credentials)
            .timeout(Some(self.timeout))
            .build();
        Ok(transport)
    }
}

impl Mailer for SmtpMailer {
    #[tracing::instrument(
        name = "Sending email over SMTP",
        skip(self, html_content, text_content),
        fields(smtp_host = %self.host, smtp_port = self.port)
    )]
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), EmailError> {
        let message = self.build_message(recipient, subject, html_content, text_content)?;
        let transport = self.transport()?;
        transport.send(message).await?;
        Ok(())
    }
}
