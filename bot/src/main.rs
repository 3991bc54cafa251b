use std::sync::Arc;

use radiocast_bot::commands::Stations;
use radiocast_bot::config;
use radiocast_bot::console::Console;
use radiocast_bot::directory::VoiceStateDirectory;
use radiocast_bot::transport::UdpVoiceTransport;
use radiocast_sdk::{DecoderCommand, SessionRegistry};
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Replies own stdout; logs go to stderr.
    #[cfg(debug_assertions)]
    {
        use tracing::Level;
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    }

    let relay_addr = config::voice_relay_addr();
    let ffmpeg = config::ffmpeg_path();
    info!("Voice relay: {}", relay_addr);
    info!("Decoder: {}", ffmpeg);

    let directory = Arc::new(VoiceStateDirectory::new());
    let transport = Arc::new(UdpVoiceTransport::new(relay_addr, config::opus_bitrate()));
    let registry = Arc::new(SessionRegistry::new(
        directory.clone(),
        transport,
        DecoderCommand::ffmpeg(ffmpeg),
        config::pipeline_config(),
    ));
    let console = Arc::new(Console::new(registry.clone(), directory, Stations::from_env()));

    let console_task = tokio::spawn(async move {
        match console
            .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
        {
            Ok(()) => info!("Console input closed"),
            Err(e) => error!("Console error: {}", e),
        }
    });

    info!("Bot is now running. Press CTRL+C to exit.");
    shutdown_signal().await?;

    info!("Shutting down bot...");
    console_task.abort();
    registry.shutdown().await;

    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}
