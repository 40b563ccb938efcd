use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::broadcast::ChordBroadcaster;
use crate::error::MidiError;
use crate::theory::SpecificNote;
use crate::tracker::{HeldNotes, NoteEvent};

const CLIENT_NAME: &str = "chordcast";
const WATCH_CLIENT_NAME: &str = "chordcast-watch";
const PORT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// A raw MIDI message reduced to what the tracker cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn(u8),
    NoteOff(u8),
    Other,
}

impl MidiMessage {
    pub fn decode(bytes: &[u8]) -> Self {
        if bytes.len() < 3 {
            return MidiMessage::Other;
        }
        let status = bytes[0] & 0xF0;
        let note = bytes[1];
        let velocity = bytes[2];
        match (status, velocity) {
            (0x90, v) if v > 0 => MidiMessage::NoteOn(note),
            (0x80, _) | (0x90, 0) => MidiMessage::NoteOff(note),
            _ => MidiMessage::Other,
        }
    }

    pub fn to_event(self) -> Option<NoteEvent> {
        match self {
            MidiMessage::NoteOn(n) => Some(NoteEvent::on(SpecificNote::from_midi(n))),
            MidiMessage::NoteOff(n) => Some(NoteEvent::off(SpecificNote::from_midi(n))),
            MidiMessage::Other => None,
        }
    }
}

/// A MIDI input that can be drained without waiting.
pub trait MidiSource: Send + 'static {
    /// Returns every message received since the previous call, oldest
    /// first; empty when nothing arrived.
    fn drain(&mut self) -> Result<Vec<Vec<u8>>, MidiError>;
}

/// Hardware input opened through `midir`.
///
/// The midir connection lives on its own thread for as long as this value
/// exists; only the message queue crosses threads. That thread also checks
/// once a second that the port is still listed and closes the connection
/// when it is gone, which `drain` then reports as `MidiError::Disconnected`.
pub struct MidirSource {
    messages: Receiver<Vec<u8>>,
    _stop: Sender<()>,
    port_name: String,
}

impl MidirSource {
    /// Opens the first port whose name contains `port`, or the first port
    /// when no name is given.
    pub fn open(port: Option<&str>) -> Result<Self, MidiError> {
        let wanted = port.map(str::to_string);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (tx, messages) = mpsc::channel();

        std::thread::Builder::new()
            .name("midi-input".to_string())
            .spawn(move || {
                let (conn, name) = match connect(wanted.as_deref(), tx) {
                    Ok(connected) => connected,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(name.clone()));

                let lost = match MidiInput::new(WATCH_CLIENT_NAME) {
                    Ok(watcher) => hold_connection(&stop_rx, PORT_CHECK_INTERVAL, || {
                        port_listed(&watcher, &name)
                    }),
                    Err(e) => {
                        warn!("cannot watch MIDI port {}: {}", name, e);
                        let _ = stop_rx.recv();
                        false
                    }
                };
                if lost {
                    warn!("MIDI input {} is gone", name);
                }
                drop(conn);
                debug!("MIDI input closed");
            })?;

        let port_name = ready_rx.recv().map_err(|_| MidiError::Disconnected)??;
        Ok(Self {
            messages,
            _stop: stop_tx,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

fn connect(
    port: Option<&str>,
    tx: Sender<Vec<u8>>,
) -> Result<(MidiInputConnection<()>, String), MidiError> {
    let mut midi_input = MidiInput::new(CLIENT_NAME)?;
    midi_input.ignore(Ignore::None);

    let in_ports = midi_input.ports();
    if in_ports.is_empty() {
        return Err(MidiError::NoPorts);
    }

    let port_name = |p: &MidiInputPort| {
        midi_input
            .port_name(p)
            .unwrap_or_else(|_| "Unknown".to_string())
    };
    for (i, p) in in_ports.iter().enumerate() {
        debug!("Port {}: {}", i, port_name(p));
    }
    let in_port = match port {
        Some(wanted) => in_ports
            .iter()
            .find(|p| port_name(p).contains(wanted))
            .ok_or_else(|| MidiError::PortNotFound(wanted.to_string()))?,
        None => &in_ports[0],
    };
    let name = port_name(in_port);
    info!("Using MIDI input: {}", name);

    let conn = midi_input
        .connect(
            in_port,
            CLIENT_NAME,
            move |_stamp, message, _| {
                // receiver is gone only during shutdown
                let _ = tx.send(message.to_vec());
            },
            (),
        )
        .map_err(|e| MidiError::Connect {
            port: name.clone(),
            message: e.to_string(),
        })?;
    Ok((conn, name))
}

/// Blocks until the owning source is dropped or `port_present` reports the
/// port missing. Returns `true` in the latter case.
fn hold_connection(
    stop: &Receiver<()>,
    check_every: Duration,
    mut port_present: impl FnMut() -> bool,
) -> bool {
    loop {
        match stop.recv_timeout(check_every) {
            Err(RecvTimeoutError::Timeout) => {
                if !port_present() {
                    return true;
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}

fn port_listed(watcher: &MidiInput, name: &str) -> bool {
    watcher
        .ports()
        .iter()
        .any(|p| watcher.port_name(p).is_ok_and(|n| n == name))
}

impl MidiSource for MidirSource {
    fn drain(&mut self) -> Result<Vec<Vec<u8>>, MidiError> {
        let mut batch = Vec::new();
        loop {
            match self.messages.try_recv() {
                Ok(message) => batch.push(message),
                Err(TryRecvError::Empty) => return Ok(batch),
                // hand over what arrived before the loss first
                Err(TryRecvError::Disconnected) if !batch.is_empty() => return Ok(batch),
                Err(TryRecvError::Disconnected) => return Err(MidiError::Disconnected),
            }
        }
    }
}

/// Names of the available MIDI input ports.
pub fn list_ports() -> Result<Vec<String>, MidiError> {
    let midi_input = MidiInput::new(CLIENT_NAME)?;
    Ok(midi_input
        .ports()
        .iter()
        .map(|p| {
            midi_input
                .port_name(p)
                .unwrap_or_else(|_| "Unknown".to_string())
        })
        .collect())
}

/// Applies one drained batch in arrival order. Returns whether it held any
/// note event at all.
pub fn apply_batch(held: &mut HeldNotes, batch: &[Vec<u8>]) -> bool {
    let mut relevant = false;
    for message in batch {
        match MidiMessage::decode(message).to_event() {
            Some(event) => {
                relevant = true;
                held.apply(event);
                debug!(kind = ?event.kind, note = %event.note, "note event");
            }
            None => trace!(?message, "ignoring MIDI message"),
        }
    }
    relevant
}

/// Polls `source` every `interval`, keeps `held` current and broadcasts a
/// snapshot after each batch that carried note events.
///
/// Each drain runs on the blocking pool; the source travels there and back
/// by value, so `held` is only ever touched by this task. Returns when
/// `shutdown` flips to `true`, or with the error that ended the device;
/// reporting that error is left to the caller.
pub async fn run_ingestion<S: MidiSource>(
    mut source: S,
    mut held: HeldNotes,
    mut broadcaster: ChordBroadcaster,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), MidiError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(?interval, "MIDI ingestion running");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        let (returned, batch) = tokio::task::spawn_blocking(move || {
            let batch = source.drain();
            (source, batch)
        })
        .await?;
        source = returned;
        let batch = batch?;

        if apply_batch(&mut held, &batch) {
            broadcaster.broadcast(&held.snapshot());
        }
    }

    info!("MIDI ingestion stopped");
    Ok(())
}
