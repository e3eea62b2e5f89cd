use mindfuel::quote_emailer;
use mindfuel::startup::{bootstrap, run_until_interrupted};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = bootstrap("quote_emailer.log")?;

    tracing::info!("Starting the daily quote emailer");
    run_until_interrupted("Quote emailer", quote_emailer::run(&config)).await;

    Ok(())
}
