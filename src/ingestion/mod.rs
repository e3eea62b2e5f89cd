mod clean;
mod csv_store;
mod extract;
mod loader;

pub use clean::{CleaningStep, clean};
pub use csv_store::{CsvChunks, write_csv};
pub use extract::{ExtractError, SheetClient, extract, parse_first_table};
pub use loader::{LoadError, LoadOptions, LoadReport, load_csv, parse_timestamp};

use anyhow::Context;

use crate::configuration::Settings;
use crate::warehouse::PgWarehouse;

impl From<&crate::configuration::IngestionSettings> for LoadOptions {
    fn from(settings: &crate::configuration::IngestionSettings) -> Self {
        Self {
            table: settings.table.clone(),
            batch_size: settings.batch_size,
            incremental: settings.incremental,
            timestamp_column: settings.timestamp_column.clone(),
        }
    }
}

/// Sheet to CSV to warehouse, once.
#[tracing::instrument(name = "Subscriber ingestion", skip_all)]
pub async fn run(settings: &Settings) -> Result<LoadReport, anyhow::Error> {
    let ingestion = &settings.ingestion;

    let client = SheetClient::new(ingestion.timeout()).context("Failed to build HTTP client.")?;
    let table = extract(&client, &ingestion.sheet_url)
        .await
        .context("Failed to extract the subscriber sheet.")?;

    let table = clean(table);
    write_csv(&table, &ingestion.csv_path).context("Failed to save the cleaned sheet to CSV.")?;

    let mut warehouse = PgWarehouse::connect(&settings.database)
        .await
        .context("Failed to connect to the warehouse.")?;
    let outcome = load_csv(&ingestion.csv_path, &mut warehouse, &ingestion.into()).await;

    if let Err(e) = warehouse.close().await {
        tracing::warn!(error.cause_chain = ?e, "Failed to close the warehouse connection");
    }

    outcome.context("Failed to load the CSV into the warehouse.")
}
