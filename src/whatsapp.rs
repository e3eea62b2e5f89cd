use std::time::Instant;

use crate::configuration::Settings;
use crate::domain::PhoneNumber;
use crate::messaging_client::MessageSender;
use crate::rate_limit::Pacing;

/// Literal placeholder substitution, no escaping.
pub fn render_message(template: &str, form_link: &str, sender: &str) -> String {
    template
        .replace("{form_link}", form_link)
        .replace("{sender}", sender)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Sends `message` to every contact in order. A failed send is logged and
/// counted, and the loop carries on.
#[tracing::instrument(name = "Broadcasting message", skip_all, fields(total = contacts.len()))]
pub async fn broadcast<S: MessageSender>(
    contacts: &[PhoneNumber],
    message: &str,
    sender: &S,
    pacing: Pacing,
) -> BroadcastReport {
    let mut report = BroadcastReport {
        total: contacts.len(),
        ..Default::default()
    };

    for (idx, contact) in contacts.iter().enumerate() {
        let idx = idx + 1;
        tracing::info!(
            "Sending message {idx}/{} to {}",
            report.total,
            contact.masked()
        );

        match sender.send_instant(contact, message).await {
            Ok(()) => {
                tracing::info!("Message queued for {}", contact.masked());
                report.sent += 1;
            }
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    "Failed to send to {}",
                    contact.masked()
                );
                report.failed += 1;
            }
        }

        pacing.wait_after(idx, report.total, "message").await;
    }

    report
}

pub async fn run(settings: &Settings) -> Option<BroadcastReport> {
    tracing::info!("WHATSAPP SENDER STARTED");
    let start = Instant::now();

    let config = match settings.whatsapp.broadcast() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return None;
        }
    };
    tracing::info!("Contacts to message: {}", config.contacts.len());

    let message = render_message(
        &config.message_template,
        &config.form_link,
        &config.sender_name,
    );
    let report = broadcast(
        &config.contacts,
        &message,
        &settings.whatsapp.client(),
        Pacing::new(settings.whatsapp.send_interval()),
    )
    .await;

    tracing::info!(
        "WHATSAPP SENDER FINISHED in {:.2}s: {} sent, {} failed",
        start.elapsed().as_secs_f64(),
        report.sent,
        report.failed
    );
    Some(report)
}
