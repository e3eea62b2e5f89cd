use mindfuel::ingestion;
use mindfuel::startup::{bootstrap, run_until_interrupted};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = bootstrap("subscribers_records_ingestion.log")?;

    tracing::info!("Starting subscriber records ingestion");
    run_until_interrupted("Subscriber ingestion", ingestion::run(&config)).await;

    Ok(())
}
