use mindfuel::startup::{bootstrap, run_until_interrupted};
use mindfuel::whatsapp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = bootstrap("whatsapp_sender.log")?;

    let broadcast = async {
        whatsapp::run(&config).await;
        Ok::<(), anyhow::Error>(())
    };
    run_until_interrupted("WhatsApp sender", broadcast).await;

    Ok(())
}
