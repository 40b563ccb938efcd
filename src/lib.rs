//! # chordcast
//!
//! Annotates live MIDI input with chord analysis and pushes every change to
//! connected browsers over a WebSocket, alongside server-rendered scale and
//! interval tables.
//!
//! The live pipeline:
//!
//! * [`midi::run_ingestion`] drains the MIDI input on the blocking pool and
//!   applies note events to [`tracker::HeldNotes`].
//! * [`broadcast::ChordBroadcaster`] turns each new snapshot into a
//!   [`broadcast::ChordPayload`].
//! * The hub in [`registry`] fans payloads out to every open viewer.

pub mod audio;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod midi;
pub mod pages;
pub mod registry;
pub mod server;
pub mod state;
pub mod theory;
pub mod tracker;
