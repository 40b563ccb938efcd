use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::registry::HubHandle;
use crate::theory::{Scale, SpecificChord};

/// One chord update as sent to every viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordPayload {
    pub seq: u64,
    pub scale: String,
    pub chord: String,
    pub chord_abstract: String,
    pub possibilities: Vec<String>,
}

impl ChordPayload {
    pub fn build(seq: u64, scale: &Scale, chord: &SpecificChord) -> Self {
        let chord_abstract = chord.abstract_chord();
        Self {
            seq,
            scale: scale.name(),
            chord: chord.to_string(),
            possibilities: chord_abstract
                .possibilities()
                .iter()
                .map(ToString::to_string)
                .collect(),
            chord_abstract: chord_abstract.to_string(),
        }
    }
}

/// Annotates chord snapshots with the reference scale and hands them to
/// the hub, numbering them in issue order.
pub struct ChordBroadcaster {
    scale: Scale,
    hub: HubHandle,
    next_seq: u64,
}

impl ChordBroadcaster {
    pub fn new(scale: Scale, hub: HubHandle) -> Self {
        Self {
            scale,
            hub,
            next_seq: 1,
        }
    }

    pub fn broadcast(&mut self, chord: &SpecificChord) -> Arc<ChordPayload> {
        let payload = Arc::new(ChordPayload::build(self.next_seq, &self.scale, chord));
        self.next_seq += 1;
        debug!(seq = payload.seq, chord = %payload.chord, "broadcasting chord");
        self.hub.broadcast(payload.clone());
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn c_major() -> Scale {
        "C major".parse().unwrap()
    }

    #[test]
    fn silence_has_empty_possibilities() {
        let payload = ChordPayload::build(1, &c_major(), &SpecificChord::default());
        assert_eq!(payload.chord, "<empty>");
        assert_eq!(payload.chord_abstract, "<empty>");
        assert!(payload.possibilities.is_empty());
    }

    #[test]
    fn triad_payload_serializes_all_fields() {
        let chord: SpecificChord = "C4_E4_G4".parse().unwrap();
        let payload = ChordPayload::build(7, &c_major(), &chord);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "seq": 7,
                "scale": "C major",
                "chord": "C4_E4_G4",
                "chord_abstract": "CEG",
                "possibilities": ["CEG/C", "EGC/E", "GCE/G"],
            })
        );
    }

    #[test]
    fn voicing_does_not_change_abstract_form() {
        let open: SpecificChord = "C3_G4_E5".parse().unwrap();
        let close: SpecificChord = "C4_E4_G4".parse().unwrap();
        let a = ChordPayload::build(1, &c_major(), &open);
        let b = ChordPayload::build(1, &c_major(), &close);
        assert_eq!(a.chord_abstract, b.chord_abstract);
        assert_eq!(a.possibilities, b.possibilities);
        assert_ne!(a.chord, b.chord);
    }

    #[tokio::test]
    async fn sequence_numbers_increase() {
        let (hub, _task) = crate::registry::spawn_hub();
        let mut broadcaster = ChordBroadcaster::new(c_major(), hub);
        let first = broadcaster.broadcast(&SpecificChord::default());
        let second = broadcaster.broadcast(&SpecificChord::default());
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
    }
}
