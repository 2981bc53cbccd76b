//! Bridge for Arduino serial telemetry.
//!
//! Reads telemetry lines from a serial port and forwards them to a gRPC,
//! Unix socket, stdout or Zenoh sink.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_serial::SerialStream;
use tracing::info;

use arduino_sink_bridge::config::{ArduinoBridgeConfig, Overrides};
use arduino_sink_bridge::pipeline::{Forwarder, PipelineOptions};
use arduino_sink_bridge::sink::AnySink;
use arduino_sink_bridge::{serial, sink};
use serial_bridge_framework::{
    BridgeArgs, BridgeConfig, BridgeRunner, Connector, init_logging, wait_for_signal,
};

/// Bridge for Arduino serial telemetry.
#[derive(Parser, Debug)]
#[command(name = "arduino-sink-bridge")]
#[command(about = "Forwards Arduino serial telemetry to a gRPC, Unix socket or Zenoh sink")]
#[command(version)]
struct Args {
    #[command(flatten)]
    common: BridgeArgs,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration, then layer env/CLI values on top
    let mut config = ArduinoBridgeConfig::load_or_default(&args.common)
        .with_context(|| format!("Failed to load config from {:?}", args.common.config))?;
    config.apply_overrides(&args.overrides)?;
    config.validate()?;

    init_logging(&config, &args.common)?;

    info!("Starting arduino-sink-bridge");
    info!(
        port = %config.serial.port,
        bitrate = config.serial.bitrate,
        sink = %config.sink.describe(),
        "Loaded configuration"
    );

    // Connect the sink, then open the serial port; an interrupt while
    // waiting for either is a clean exit
    let mut connector = Connector::new(config.sink.describe(), config.sink_policy());
    let (sink, reader) = tokio::select! {
        result = establish(&config, &mut connector) => result?,
        _ = wait_for_signal() => {
            info!("Interrupted while connecting, exiting");
            return Ok(());
        }
    };

    let mut runner = BridgeRunner::new("arduino").with_version(env!("CARGO_PKG_VERSION"));
    let shutdown = runner.shutdown_signal();
    let forwarder = Forwarder::new(sink, PipelineOptions::from(&config));
    let on_stream_end = config.pipeline.on_stream_end;

    runner.spawn_critical("pipeline", async move {
        forwarder.run(reader, shutdown).await.settle(on_stream_end)
    });

    let result = runner.run().await;
    connector.close();
    result?;

    Ok(())
}

async fn establish(
    config: &ArduinoBridgeConfig,
    connector: &mut Connector,
) -> Result<(AnySink, BufReader<SerialStream>)> {
    let sink = sink::connect(config, connector).await?;

    let reader = serial::open_source(&config.serial, config.serial_policy())
        .await
        .context("Could not connect to Arduino serial")?;

    Ok((sink, reader))
}
