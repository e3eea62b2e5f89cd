use std::time::Duration;

use mindfuel::{
    domain::PhoneNumber,
    messaging_client::WhatsAppClient,
    rate_limit::Pacing,
    whatsapp::{BroadcastReport, broadcast, render_message},
};
use secrecy::SecretString;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

use super::helpers::{RecordingSender, init_tracing};

const TEMPLATE: &str = "Hi {sender}, sign here: {form_link}";

fn contacts() -> Vec<PhoneNumber> {
    PhoneNumber::parse_list("111,222")
}

#[tokio::test]
async fn every_contact_gets_the_same_rendered_message() {
    init_tracing();
    let sender = RecordingSender::default();
    let message = render_message(TEMPLATE, "http://f", "Bot");

    let report = broadcast(&contacts(), &message, &sender, Pacing::none()).await;

    assert_eq!(
        report,
        BroadcastReport {
            total: 2,
            sent: 2,
            failed: 0
        }
    );
    let attempts = sender.attempts();
    assert_eq!(
        attempts,
        vec![
            ("111".to_string(), "Hi Bot, sign here: http://f".to_string()),
            ("222".to_string(), "Hi Bot, sign here: http://f".to_string()),
        ]
    );
}

#[tokio::test]
async fn a_failed_contact_does_not_stop_the_broadcast() {
    init_tracing();
    let sender = RecordingSender::failing_for(&["111"]);
    let message = render_message(TEMPLATE, "http://f", "Bot");

    let report = broadcast(&contacts(), &message, &sender, Pacing::none()).await;

    assert_eq!(
        report,
        BroadcastReport {
            total: 2,
            sent: 1,
            failed: 1
        }
    );
    assert_eq!(sender.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn the_delay_follows_failed_sends_too() {
    init_tracing();
    let sender = RecordingSender::failing_for(&["111"]);
    let contacts = PhoneNumber::parse_list("111,222,333");

    let start = tokio::time::Instant::now();
    broadcast(&contacts, "hi", &sender, Pacing::new(Duration::from_secs(60))).await;

    assert_eq!(start.elapsed(), Duration::from_secs(120));
}

#[tokio::test]
async fn the_whatsapp_gateway_receives_one_request_per_contact() {
    init_tracing();
    let server = MockServer::start().await;
    let client = WhatsAppClient::new(
        server.uri(),
        "42".into(),
        SecretString::from("token"),
        Duration::from_secs(2),
    );

    Mock::given(path("/42/messages"))
        .and(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "type": "text",
            "text": {"body": "Hi Bot, sign here: http://f"}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let message = render_message(TEMPLATE, "http://f", "Bot");
    let report = broadcast(&contacts(), &message, &client, Pacing::none()).await;

    assert_eq!(report.sent, 2);
}
