use mindfuel::{
    domain::{FALLBACK_QUOTE, Subscriber},
    quote_emailer::{DeliveryReport, EmailTemplates, send_daily_quotes},
    rate_limit::Pacing,
};
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{method, path},
};

use super::helpers::{RecordingMailer, spawn_quote_server};

fn subscriber(first: &str, last: &str, email: &str) -> Subscriber {
    Subscriber::parse(first.into(), last.into(), email.into()).unwrap()
}

#[tokio::test]
async fn each_subscriber_gets_a_personal_quote_email() {
    let app = spawn_quote_server().await;
    let mailer = RecordingMailer::default();

    Mock::given(path("/api/random"))
        .and(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"q": "Test quote", "a": "Tester"}])),
        )
        .expect(1)
        .mount(&app.server)
        .await;

    let subscribers = vec![subscriber("Ada", "Lovelace", "ada@x.com")];
    let report = send_daily_quotes(
        &subscribers,
        &app.client,
        &mailer,
        &EmailTemplates::new().unwrap(),
        Pacing::none(),
    )
    .await;

    assert_eq!(
        report,
        DeliveryReport {
            total: 1,
            succeeded: 1,
            failed: 0
        }
    );

    let emails = mailer.emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].recipient, "ada@x.com");
    assert_eq!(emails[0].subject, "Your Daily Inspiration Quote");
    assert!(emails[0].text.contains("Hello Ada Lovelace!"));
    assert!(emails[0].text.contains("Test quote"));
    assert!(emails[0].html.contains("Test quote"));
}

#[tokio::test]
async fn a_fresh_quote_is_fetched_for_every_subscriber() {
    let app = spawn_quote_server().await;
    let mailer = RecordingMailer::default();

    Mock::given(path("/api/random"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{"q": "Q", "a": "A"}])),
        )
        .expect(3)
        .mount(&app.server)
        .await;

    let subscribers = vec![
        subscriber("Ada", "Lovelace", "ada@x.com"),
        subscriber("Grace", "Hopper", "grace@x.com"),
        subscriber("Alan", "Turing", "alan@x.com"),
    ];
    let report = send_daily_quotes(
        &subscribers,
        &app.client,
        &mailer,
        &EmailTemplates::new().unwrap(),
        Pacing::none(),
    )
    .await;

    assert_eq!(report.succeeded, 3);
    let recipients: Vec<_> = mailer.emails().iter().map(|e| e.recipient.clone()).collect();
    assert_eq!(recipients, vec!["ada@x.com", "grace@x.com", "alan@x.com"]);
}

#[tokio::test]
async fn failed_sends_are_counted_and_the_rest_still_go_out() {
    let app = spawn_quote_server().await;
    let mailer = RecordingMailer::failing_for(&["grace@x.com"]);

    Mock::given(path("/api/random"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{"q": "Q", "a": "A"}])),
        )
        .mount(&app.server)
        .await;

    let subscribers = vec![
        subscriber("Grace", "Hopper", "grace@x.com"),
        subscriber("Ada", "Lovelace", "ada@x.com"),
    ];
    let report = send_daily_quotes(
        &subscribers,
        &app.client,
        &mailer,
        &EmailTemplates::new().unwrap(),
        Pacing::none(),
    )
    .await;

    assert_eq!(
        report,
        DeliveryReport {
            total: 2,
            succeeded: 1,
            failed: 1
        }
    );
    assert_eq!(report.success_rate(), 50.0);
    assert_eq!(mailer.emails()[0].recipient, "ada@x.com");
}

#[tokio::test]
async fn the_fallback_quote_is_sent_when_the_quote_api_is_down() {
    let app = spawn_quote_server().await;
    let mailer = RecordingMailer::default();

    Mock::given(path("/api/random"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&app.server)
        .await;

    let subscribers = vec![subscriber("Ada", "Lovelace", "ada@x.com")];
    let report = send_daily_quotes(
        &subscribers,
        &app.client,
        &mailer,
        &EmailTemplates::new().unwrap(),
        Pacing::none(),
    )
    .await;

    assert_eq!(report.succeeded, 1);
    assert!(mailer.emails()[0].text.contains(FALLBACK_QUOTE));
}
