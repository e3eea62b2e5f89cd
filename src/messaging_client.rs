use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::domain::PhoneNumber;
use crate::helpers::error_chain_fmt;

#[derive(thiserror::Error)]
pub enum MessagingError {
    #[error("Messaging gateway did not answer within the lead time.")]
    Timeout(#[source] reqwest::Error),
    #[error("Messaging gateway rejected the message.")]
    Rejected(#[source] reqwest::Error),
    #[error("Failed to reach the messaging gateway.")]
    Request(#[source] reqwest::Error),
}

impl std::fmt::Debug for MessagingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<reqwest::Error> for MessagingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MessagingError::Timeout(e)
        } else if e.is_status() {
            MessagingError::Rejected(e)
        } else {
            MessagingError::Request(e)
        }
    }
}

/// Anything that can deliver a text message to a phone number right away.
pub trait MessageSender {
    fn send_instant(
        &self,
        phone: &PhoneNumber,
        body: &str,
    ) -> impl Future<Output = Result<(), MessagingError>> + Send;
}

#[derive(Clone)]
pub struct WhatsAppClient {
    http_client: Client,
    base_url: String,
    phone_number_id: String,
    access_token: SecretString,
    lead_time: Duration,
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'a str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    text: TextBody<'a>,
}

impl WhatsAppClient {
    pub fn new(
        base_url: String,
        phone_number_id: String,
        access_token: SecretString,
        lead_time: Duration,
    ) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
            phone_number_id,
            access_token,
            lead_time,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.base_url.trim_end_matches('/'),
            self.phone_number_id
        )
    }
}

impl MessageSender for WhatsAppClient {
    #[tracing::instrument(
        name = "Sending instant message",
        skip(self, phone, body),
        fields(phone = %phone.masked())
    )]
    async fn send_instant(&self, phone: &PhoneNumber, body: &str) -> Result<(), MessagingError> {
        let request = SendMessageRequest {
            messaging_product: "whatsapp",
            to: phone.as_ref(),
            kind: "text",
            text: TextBody { body },
        };

        self.http_client
            .post(self.messages_url())
            .bearer_auth(self.access_token.expose_secret())
            .timeout(self.lead_time)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
