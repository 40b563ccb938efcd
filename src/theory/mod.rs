//! Pitch classes, keyboard notes, chords and the diatonic scales used to
//! label them.

pub mod chord;
pub mod note;
pub mod scale;

pub use chord::{AbstractChord, RootedChord, SpecificChord, EMPTY_CHORD};
pub use note::{PitchClass, SpecificNote};
pub use scale::{Scale, ScaleKind};
