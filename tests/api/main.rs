mod helpers;
mod ingestion;
mod quote_emailer;
mod whatsapp;
