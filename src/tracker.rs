use std::collections::BTreeSet;

use tracing::trace;

use crate::theory::{SpecificChord, SpecificNote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
}

/// A key press or release, already decoded from the MIDI stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub kind: NoteKind,
    pub note: SpecificNote,
}

impl NoteEvent {
    pub fn on(note: SpecificNote) -> Self {
        Self { kind: NoteKind::On, note }
    }

    pub fn off(note: SpecificNote) -> Self {
        Self { kind: NoteKind::Off, note }
    }
}

/// The set of keys currently held down.
///
/// Owned by the ingestion loop; nothing else mutates it.
#[derive(Debug, Default)]
pub struct HeldNotes {
    notes: BTreeSet<SpecificNote>,
}

impl HeldNotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event. Returns whether the held set changed.
    ///
    /// A release for a key that is not held is ignored.
    pub fn apply(&mut self, event: NoteEvent) -> bool {
        let changed = match event.kind {
            NoteKind::On => self.notes.insert(event.note),
            NoteKind::Off => self.notes.remove(&event.note),
        };
        if !changed {
            trace!(?event, "event left held notes unchanged");
        }
        changed
    }

    pub fn snapshot(&self) -> SpecificChord {
        SpecificChord::new(self.notes.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
