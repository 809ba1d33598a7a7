pub mod cli;
pub mod config;
pub mod device;
pub mod mqtt;

use crate::cli::Cli;
use crate::config::RawParams;
use crate::device::{DeviceConfig, ToggleCommand};
use crate::mqtt::{BrokerSettings, MqttHandler, OutboundMessage};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.debug)?;

    let params = load_params(&cli).await?;
    let config = match DeviceConfig::from_params(&params) {
        Ok(config) => config,
        Err(e) => {
            if e.is_missing() {
                error!("Required parameter {} is not set", e.field());
            } else {
                error!("Parameter {} has an unusable value", e.field());
            }
            return Err(e.into());
        }
    };
    debug!("Validated parameters: {:?}", config);

    let command = ToggleCommand::build(&config);
    let message = OutboundMessage::from_command(&command)
        .map_err(|e| eyre!("Failed to serialize toggle payload: {}", e))?;

    if cli.dry_run {
        println!("{}", message.render());
        return Ok(());
    }

    let settings = BrokerSettings::from_device(&config);
    let mut handler = MqttHandler::new(settings)
        .await
        .map_err(|e| eyre!("Failed to prepare MQTT client: {}", e))?;

    info!("Publishing {}", message);
    match handler.publish_once(&message).await {
        Ok(()) => info!(
            "Device {} switched {}",
            config.uuid,
            if config.enabled { "on" } else { "off" }
        ),
        Err(e) => error!("Unable to publish to broker {}: {}", config.broker_ip, e),
    }

    let status = handler.status();
    debug!(
        "{} message(s) sent, final state {:?}, last activity {}",
        status.messages_sent,
        status.connection_state,
        status
            .last_activity
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );

    Ok(())
}

fn setup(debug: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(if debug { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// File parameters first, command-line flags on top.
async fn load_params(cli: &Cli) -> Result<RawParams> {
    let file_params = match &cli.config {
        Some(path) => RawParams::load(path).await?,
        None => RawParams::load_default().await?,
    };
    if file_params.is_empty() {
        debug!("No parameters from file, using command line only");
    }
    Ok(file_params.merge(cli.params()))
}
