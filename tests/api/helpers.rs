use std::sync::Mutex;
use std::time::Duration;

use mindfuel::{
    domain::{PhoneNumber, SubscriberEmail},
    email_client::{EmailError, Mailer},
    messaging_client::{MessageSender, MessagingError},
    quote_client::QuoteClient,
    telemetry::{get_subscriber, init_subscriber},
    warehouse::Warehouse,
};
use once_cell::sync::Lazy;
use wiremock::MockServer;

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(default_filter_level, std::io::stdout, None);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(default_filter_level, std::io::sink, None);
        init_subscriber(subscriber);
    }
});

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Records every email instead of talking SMTP. Fails for listed recipients.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentEmail>>,
    pub failing: Vec<String>,
}

impl RecordingMailer {
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            failing: recipients.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn emails(&self) -> std::sync::MutexGuard<'_, Vec<SentEmail>> {
        self.sent.lock().unwrap()
    }
}

impl Mailer for RecordingMailer {
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), EmailError> {
        if self.failing.iter().any(|r| r == recipient.as_ref()) {
            let invalid = "not an address".parse::<lettre::Address>().unwrap_err();
            return Err(EmailError::Address(invalid));
        }
        self.sent.lock().unwrap().push(SentEmail {
            recipient: recipient.as_ref().to_string(),
            subject: subject.to_string(),
            html: html_content.to_string(),
            text: text_content.to_string(),
        });
        Ok(())
    }
}

/// Captures every instant message. Numbers listed in `failing` are rejected.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub failing: Vec<String>,
}

impl RecordingSender {
    pub fn failing_for(numbers: &[&str]) -> Self {
        Self {
            failing: numbers.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl MessageSender for RecordingSender {
    async fn send_instant(&self, phone: &PhoneNumber, body: &str) -> Result<(), MessagingError> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.as_ref().to_string(), body.to_string()));
        if self.failing.iter().any(|n| n == phone.as_ref()) {
            let err = reqwest::Client::new()
                .get("not a url")
                .send()
                .await
                .unwrap_err();
            return Err(MessagingError::from(err));
        }
        Ok(())
    }
}

/// An in-memory warehouse holding a single table.
#[derive(Default)]
pub struct InMemoryWarehouse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Warehouse for InMemoryWarehouse {
    async fn table_exists(&mut self, _table: &str) -> Result<bool, sqlx::Error> {
        Ok(!self.columns.is_empty())
    }

    async fn max_value(&mut self, _table: &str, column: &str) -> Result<Option<String>, sqlx::Error> {
        let Some(idx) = self.columns.iter().position(|c| c == column) else {
            return Err(sqlx::Error::ColumnNotFound(column.to_string()));
        };
        Ok(self.rows.iter().filter_map(|r| r[idx].clone()).max())
    }

    async fn insert_rows(
        &mut self,
        _table: &str,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<u64, sqlx::Error> {
        self.columns = columns.to_vec();
        self.rows.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}

pub struct QuoteServer {
    pub server: MockServer,
    pub client: QuoteClient,
}

pub async fn spawn_quote_server() -> QuoteServer {
    init_tracing();

    let server = MockServer::start().await;
    let client = QuoteClient::new(server.uri(), Duration::from_millis(500));
    QuoteServer { server, client }
}
