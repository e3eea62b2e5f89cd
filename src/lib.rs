pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod helpers;
pub mod ingestion;
pub mod messaging_client;
pub mod quote_client;
pub mod quote_emailer;
pub mod rate_limit;
pub mod startup;
pub mod table;
pub mod telemetry;
pub mod warehouse;
pub mod whatsapp;
