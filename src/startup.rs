use std::fmt::{Debug, Display};
use std::future::Future;

use crate::configuration::{Settings, get_configuration};
use crate::telemetry::{get_subscriber, init_subscriber, open_log_file};

/// Loads the settings and installs console + file logging for one pipeline.
pub fn bootstrap(log_file_name: &str) -> Result<Settings, anyhow::Error> {
    let config = get_configuration()?;
    let log_file = open_log_file(&config.log_dir, log_file_name)?;

    let subscriber = get_subscriber("info".into(), std::io::stdout, Some(log_file));
    init_subscriber(subscriber);

    Ok(config)
}

/// Drives `pipeline` to completion unless Ctrl-C arrives first.
pub async fn run_until_interrupted<T, E>(
    pipeline_name: &str,
    pipeline: impl Future<Output = Result<T, E>>,
) where
    E: Debug + Display,
{
    tokio::select! {
        outcome = pipeline => report_exit(pipeline_name, outcome),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("{} interrupted by user", pipeline_name)
        }
    }
}

fn report_exit<T, E>(pipeline_name: &str, outcome: Result<T, E>)
where
    E: Debug + Display,
{
    match outcome {
        Ok(_) => {
            tracing::info!("{} has exited", pipeline_name)
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed",
                pipeline_name
            )
        }
    }
}
