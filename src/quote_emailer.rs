use std::time::Instant;

use anyhow::Context;
use tera::Tera;

use crate::configuration::Settings;
use crate::domain::{Quote, Subscriber};
use crate::email_client::{EmailError, Mailer};
use crate::quote_client::QuoteClient;
use crate::rate_limit::Pacing;
use crate::warehouse::{PgWarehouse, fetch_subscribers};

pub const SUBJECT: &str = "Your Daily Inspiration Quote";
const HTML_TEMPLATE: &str = "daily_quote.html";

pub struct DailyQuoteEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// The HTML body template, parsed once per run.
pub struct EmailTemplates {
    tera: Tera,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template(HTML_TEMPLATE, include_str!("../views/daily_quote.html"))?;
        Ok(Self { tera })
    }

    pub fn compose(
        &self,
        subscriber: &Subscriber,
        quote: &Quote,
    ) -> Result<DailyQuoteEmail, tera::Error> {
        let name = subscriber.full_name();
        let quote = quote.to_string();

        let mut ctx = tera::Context::new();
        ctx.insert("name", &name);
        ctx.insert("quote", &quote);

        Ok(DailyQuoteEmail {
            subject: SUBJECT.to_string(),
            html: self.tera.render(HTML_TEMPLATE, &ctx)?,
            text: get_email_text(&name, &quote),
        })
    }
}

pub fn compose_email(
    subscriber: &Subscriber,
    quote: &Quote,
) -> Result<DailyQuoteEmail, tera::Error> {
    EmailTemplates::new()?.compose(subscriber, quote)
}

pub fn get_email_text(name: &str, quote: &str) -> String {
    format!(
        "
        Hello {name}!

        Here's your inspirational quote for today:

        {quote}

        Until tomorrow, stay inspired!

        Team MindFuel
    "
    )
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }
}

/// Composes and sends one email. Failures are logged, never retried.
#[tracing::instrument(
    name = "Delivering daily quote",
    skip(mailer, templates, subscriber, quote),
    fields(subscriber_email = %subscriber.email)
)]
pub async fn deliver<M: Mailer>(
    mailer: &M,
    templates: &EmailTemplates,
    subscriber: &Subscriber,
    quote: &Quote,
) -> bool {
    tracing::info!(
        "Preparing email for: {} <{}>",
        subscriber.full_name(),
        subscriber.email
    );

    let email = match templates.compose(subscriber, quote) {
        Ok(email) => email,
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, "FAILED: Could not render email for {}", subscriber.email);
            return false;
        }
    };

    let start = Instant::now();
    match mailer
        .send_email(&subscriber.email, &email.subject, &email.html, &email.text)
        .await
    {
        Ok(()) => {
            tracing::info!(
                "SUCCESS: Email sent to {} in {:.2}s",
                subscriber.email,
                start.elapsed().as_secs_f64()
            );
            true
        }
        Err(e @ EmailError::Authentication(_)) => {
            tracing::error!(
                error.cause_chain = ?e,
                "FAILED: SMTP authentication failed for {}. Check email/password.",
                subscriber.email
            );
            false
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                "FAILED: SMTP error sending to {}",
                subscriber.email
            );
            false
        }
    }
}

/// One fresh quote and one email per subscriber, paced, in list order.
#[tracing::instrument(name = "Sending daily quotes", skip_all, fields(total = subscribers.len()))]
pub async fn send_daily_quotes<M: Mailer>(
    subscribers: &[Subscriber],
    quotes: &QuoteClient,
    mailer: &M,
    templates: &EmailTemplates,
    pacing: Pacing,
) -> DeliveryReport {
    let mut report = DeliveryReport {
        total: subscribers.len(),
        ..Default::default()
    };

    for (idx, subscriber) in subscribers.iter().enumerate() {
        let idx = idx + 1;
        tracing::info!("Processing subscriber {idx}/{}", report.total);

        let quote = quotes.fetch_quote().await;
        if deliver(mailer, templates, subscriber, &quote).await {
            report.succeeded += 1;
        } else {
            report.failed += 1;
        }

        pacing.wait_after(idx, report.total, "email").await;
    }

    report
}

/// Drops rows whose stored details are invalid, logging each.
pub fn valid_subscribers(rows: Vec<Result<Subscriber, anyhow::Error>>) -> Vec<Subscriber> {
    rows.into_iter()
        .filter_map(|row| match row {
            Ok(subscriber) => Some(subscriber),
            Err(err) => {
                tracing::warn!(
                    err.cause_chain = ?err,
                    "Skipping the subscriber. \
                    The stored contact details are invalid."
                );
                None
            }
        })
        .collect()
}

async fn fetch_active_subscribers(settings: &Settings) -> Result<Vec<Subscriber>, anyhow::Error> {
    tracing::info!(
        "Warehouse host: {}:{}, database: {}",
        settings.database.host,
        settings.database.port,
        settings.database.database_name
    );

    let start = Instant::now();
    let mut warehouse = PgWarehouse::connect(&settings.database)
        .await
        .context("Failed to connect to the warehouse.")?;
    tracing::info!(
        "Warehouse connection established in {:.2}s",
        start.elapsed().as_secs_f64()
    );

    let outcome = fetch_subscribers(warehouse.connection(), &settings.subscribers).await;
    if let Err(e) = warehouse.close().await {
        tracing::warn!(error.cause_chain = ?e, "Failed to close the warehouse connection");
    }

    let rows = outcome.context("Failed to query active subscribers.")?;
    Ok(valid_subscribers(rows))
}

pub async fn run(settings: &Settings) -> Result<DeliveryReport, anyhow::Error> {
    tracing::info!("QUOTE EMAILER PIPELINE STARTED");
    let pipeline_start = Instant::now();

    let subscribers = match fetch_active_subscribers(settings).await {
        Ok(subscribers) => subscribers,
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, "PIPELINE ABORTED: Could not fetch subscribers");
            return Err(e);
        }
    };
    if subscribers.is_empty() {
        tracing::warn!("PIPELINE ABORTED: No active subscribers found");
        return Ok(DeliveryReport::default());
    }
    tracing::info!("SUCCESS: Retrieved {} active subscribers", subscribers.len());

    let mailer = settings
        .email_client
        .mailer()
        .map_err(anyhow::Error::msg)
        .context("Invalid sender email address.")?;
    let templates = EmailTemplates::new().context("Failed to load the email template.")?;
    let pacing = Pacing::new(settings.email_client.send_interval());

    let report = send_daily_quotes(
        &subscribers,
        &settings.quotes.client(),
        &mailer,
        &templates,
        pacing,
    )
    .await;

    tracing::info!("PIPELINE COMPLETED");
    tracing::info!(
        "Total execution time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );
    tracing::info!("Total active subscribers: {}", report.total);
    tracing::info!("Emails sent successfully: {}", report.succeeded);
    tracing::info!("Emails failed: {}", report.failed);
    tracing::info!("Success rate: {:.1}%", report.success_rate());

    Ok(report)
}
