use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use crate::error::TheoryError;

/// One of the 12 chromatic pitch identities, octave ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C (C=0, B=11).
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Wraps any integer onto the chromatic circle.
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    pub fn add(self, semitones: i32) -> Self {
        Self::from_index(self.index() as i32 + semitones)
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pc = match s {
            "C" => PitchClass::C,
            "C#" | "Db" => PitchClass::CSharp,
            "D" => PitchClass::D,
            "D#" | "Eb" => PitchClass::DSharp,
            "E" => PitchClass::E,
            "F" => PitchClass::F,
            "F#" | "Gb" => PitchClass::FSharp,
            "G" => PitchClass::G,
            "G#" | "Ab" => PitchClass::GSharp,
            "A" => PitchClass::A,
            "A#" | "Bb" => PitchClass::ASharp,
            "B" => PitchClass::B,
            _ => return Err(TheoryError::UnknownPitchClass(s.to_string())),
        };
        Ok(pc)
    }
}

/// A pitch class at a concrete octave: one physical key.
///
/// Octaves follow MIDI numbering, so C4 is note 60 and C-1 is note 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecificNote {
    pub pitch: PitchClass,
    pub octave: i8,
}

impl SpecificNote {
    pub fn new(pitch: PitchClass, octave: i8) -> Self {
        Self { pitch, octave }
    }

    /// Absolute pitch index, identical to the MIDI note number in 0..=127.
    pub fn absolute(self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.pitch.index() as i32
    }

    /// Inverse of [`SpecificNote::absolute`]. Fails when the octave does
    /// not fit an `i8`.
    pub fn from_absolute(index: i32) -> Result<Self, TheoryError> {
        let octave = i8::try_from(index.div_euclid(12) - 1)
            .map_err(|_| TheoryError::InvalidNote(format!("absolute index {index}")))?;
        Ok(Self {
            pitch: PitchClass::from_index(index),
            octave,
        })
    }

    pub fn from_midi(note: u8) -> Self {
        Self {
            pitch: PitchClass::from_index(note as i32),
            octave: (note / 12) as i8 - 1,
        }
    }

    /// Frequency in Hz (A4 = 440 Hz)
    pub fn frequency(self) -> f32 {
        440.0 * 2.0_f32.powf((self.absolute() - 69) as f32 / 12.0)
    }
}

impl PartialOrd for SpecificNote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SpecificNote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.absolute().cmp(&other.absolute())
    }
}

impl Sub for SpecificNote {
    type Output = i32;

    fn sub(self, rhs: Self) -> i32 {
        self.absolute() - rhs.absolute()
    }
}

impl fmt::Display for SpecificNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch, self.octave)
    }
}

impl FromStr for SpecificNote {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c == '-' || c.is_ascii_digit())
            .ok_or_else(|| TheoryError::InvalidNote(s.to_string()))?;
        let (pitch, octave) = s.split_at(split);
        let pitch: PitchClass = pitch.parse()?;
        let octave: i8 = octave
            .parse()
            .map_err(|_| TheoryError::InvalidNote(s.to_string()))?;
        Ok(Self { pitch, octave })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_c_is_midi_60() {
        let c4: SpecificNote = "C4".parse().unwrap();
        assert_eq!(c4.absolute(), 60);
        assert_eq!(SpecificNote::from_midi(60), c4);
    }

    #[test]
    fn midi_round_trip_covers_full_range() {
        for i in 0..=127u8 {
            let note = SpecificNote::from_midi(i);
            assert_eq!(note.absolute(), i as i32);
        }
        for octave in -1..=9i8 {
            for pitch in PitchClass::ALL {
                let note = SpecificNote::new(pitch, octave);
                assert_eq!(SpecificNote::from_absolute(note.absolute()), Ok(note));
            }
        }
    }

    #[test]
    fn absolute_index_outside_octave_range_is_rejected() {
        let top = SpecificNote::new(PitchClass::B, i8::MAX);
        assert!(SpecificNote::from_absolute(top.absolute()).is_ok());
        assert!(SpecificNote::from_absolute(top.absolute() + 1).is_err());
        let bottom = SpecificNote::new(PitchClass::C, i8::MIN);
        assert!(SpecificNote::from_absolute(bottom.absolute()).is_ok());
        assert!(SpecificNote::from_absolute(bottom.absolute() - 1).is_err());
    }

    #[test]
    fn ordering_follows_absolute_pitch() {
        let b3: SpecificNote = "B3".parse().unwrap();
        let c4: SpecificNote = "C4".parse().unwrap();
        assert!(b3 < c4);
        assert_eq!(c4 - b3, 1);
        assert_eq!(b3 - c4, -1);
    }

    #[test]
    fn parses_flats_and_negative_octaves() {
        let note: SpecificNote = "Db-1".parse().unwrap();
        assert_eq!(note, SpecificNote::new(PitchClass::CSharp, -1));
        assert_eq!(note.to_string(), "C#-1");
        assert_eq!(note.absolute(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!("H4".parse::<SpecificNote>().is_err());
        assert!("C".parse::<SpecificNote>().is_err());
        assert!("C4x".parse::<SpecificNote>().is_err());
    }

    #[test]
    fn a4_frequency() {
        let a4 = SpecificNote::new(PitchClass::A, 4);
        assert!((a4.frequency() - 440.0).abs() < 0.01);
    }
}
