use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use chordcast::audio::{run_audio_output, Synth};
use chordcast::broadcast::ChordBroadcaster;
use chordcast::config::{log_level, AppConfig, Args};
use chordcast::error::AppError;
use chordcast::midi::{list_ports, run_ingestion, MidirSource};
use chordcast::registry::spawn_hub;
use chordcast::server;
use chordcast::state::AppState;
use chordcast::tracker::HeldNotes;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(log_level(args.verbose))
        .init();

    if args.list_ports {
        info!("Available MIDI input ports:");
        for (i, name) in list_ports()?.iter().enumerate() {
            info!("Port {}: {}", i, name);
        }
        return Ok(());
    }

    let config = AppConfig::from_args(&args)?;
    info!(scale = %config.scale, "reference scale");

    let (hub, hub_task) = spawn_hub();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let synth = Synth::new();
    let audio_task = config
        .audio
        .then(|| tokio::spawn(run_audio_output(synth.clone())));

    let ingestion_task = match MidirSource::open(config.midi_port.as_deref()) {
        Ok(source) => {
            info!(port = source.port_name(), "MIDI listener connected");
            let broadcaster = ChordBroadcaster::new(config.scale, hub.clone());
            let ingestion = run_ingestion(
                source,
                HeldNotes::new(),
                broadcaster,
                config.poll_interval,
                shutdown_rx.clone(),
            );
            Some(tokio::spawn(async move {
                if let Err(e) = ingestion.await {
                    error!("MIDI ingestion ended: {}", e);
                }
            }))
        }
        Err(e) => {
            warn!("MIDI input unavailable, serving pages only: {}", e);
            None
        }
    };

    tokio::spawn(server::relay_shutdown(
        tokio::signal::ctrl_c(),
        shutdown_tx,
        hub.clone(),
        synth.clone(),
    ));

    let state = AppState::new(config, hub.clone(), synth.clone());
    if let Err(e) = server::serve(state, shutdown_rx).await {
        error!("HTTP server failed: {}", e);
        hub.shutdown();
        synth.stop();
        return Err(e.into());
    }

    if let Some(task) = ingestion_task {
        let _ = task.await;
    }
    let _ = hub_task.await;
    if let Some(task) = audio_task {
        let _ = task.await;
    }
    info!("bye");
    Ok(())
}
