use std::fmt;
use std::str::FromStr;

use crate::error::TheoryError;
use crate::theory::note::{PitchClass, SpecificNote};

const MAJOR_STEPS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// The seven diatonic modes, in the order they appear on the degrees of major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleKind {
    Major,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Minor,
    Locrian,
}

impl ScaleKind {
    pub const ALL: [ScaleKind; 7] = [
        ScaleKind::Major,
        ScaleKind::Dorian,
        ScaleKind::Phrygian,
        ScaleKind::Lydian,
        ScaleKind::Mixolydian,
        ScaleKind::Minor,
        ScaleKind::Locrian,
    ];

    /// Degree of the major scale this mode starts on.
    fn degree(self) -> usize {
        self as usize
    }

    /// Semitone offsets of each degree from the root.
    pub fn intervals(self) -> [u8; 7] {
        let start = MAJOR_STEPS[self.degree()];
        let mut out = [0; 7];
        for (i, slot) in out.iter_mut().enumerate() {
            let step = MAJOR_STEPS[(self.degree() + i) % 7];
            *slot = (step + 12 - start) % 12;
        }
        out
    }

    pub fn name(self) -> &'static str {
        match self {
            ScaleKind::Major => "major",
            ScaleKind::Dorian => "dorian",
            ScaleKind::Phrygian => "phrygian",
            ScaleKind::Lydian => "lydian",
            ScaleKind::Mixolydian => "mixolydian",
            ScaleKind::Minor => "minor",
            ScaleKind::Locrian => "locrian",
        }
    }
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScaleKind {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| TheoryError::UnknownScale(s.to_string()))
    }
}

/// A named diatonic pitch set used to label chords and lay out tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale {
    pub root: PitchClass,
    pub kind: ScaleKind,
}

impl Scale {
    pub fn from_name(root: PitchClass, kind: ScaleKind) -> Self {
        Self { root, kind }
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.root, self.kind)
    }

    /// Pitch classes in scale order, starting at the root.
    pub fn notes(&self) -> [PitchClass; 7] {
        self.kind.intervals().map(|i| self.root.add(i as i32))
    }

    pub fn contains(&self, pitch: PitchClass) -> bool {
        self.notes().contains(&pitch)
    }

    /// The mode obtained by starting this scale's pitch set on each degree.
    pub fn note_scales(&self) -> [(PitchClass, ScaleKind); 7] {
        let notes = self.notes();
        std::array::from_fn(|i| (notes[i], ScaleKind::ALL[(self.kind.degree() + i) % 7]))
    }

    pub fn mode_of(&self, pitch: PitchClass) -> Option<ScaleKind> {
        self.note_scales()
            .into_iter()
            .find(|(p, _)| *p == pitch)
            .map(|(_, kind)| kind)
    }

    /// Moves `note` by `steps` scale degrees; negative steps move down.
    /// A note outside the scale is first snapped down onto it. Fails when
    /// the result leaves the representable octave range.
    pub fn add_note(&self, note: SpecificNote, steps: i32) -> Result<SpecificNote, TheoryError> {
        let mut index = note.absolute();
        while !self.contains(PitchClass::from_index(index)) {
            index -= 1;
        }
        let direction = steps.signum();
        for _ in 0..steps.abs() {
            index += direction;
            while !self.contains(PitchClass::from_index(index)) {
                index += direction;
            }
        }
        SpecificNote::from_absolute(index)
    }

    /// Scale notes between `low` and `high`, inclusive.
    pub fn note_range(&self, low: SpecificNote, high: SpecificNote) -> Vec<SpecificNote> {
        (low.absolute()..=high.absolute())
            .filter_map(|i| SpecificNote::from_absolute(i).ok())
            .filter(|n| self.contains(n.pitch))
            .collect()
    }

    /// All twelve scales of `kind`, roots ascending by fifths from C.
    pub fn circle_of_fifths(kind: ScaleKind) -> Vec<Scale> {
        (0..12)
            .map(|i| Scale::from_name(PitchClass::from_index(i * 7), kind))
            .collect()
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root, self.kind)
    }
}

impl FromStr for Scale {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(root), Some(kind), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TheoryError::UnknownScale(s.to_string()));
        };
        let root: PitchClass = root.parse()?;
        let kind: ScaleKind = kind.parse()?;
        Ok(Self::from_name(root, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(s: &str) -> SpecificNote {
        s.parse().unwrap()
    }

    #[test]
    fn c_major_notes() {
        let scale: Scale = "C major".parse().unwrap();
        let names: Vec<_> = scale.notes().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["C", "D", "E", "F", "G", "A", "B"]);
        assert_eq!(scale.name(), "C major");
    }

    #[test]
    fn minor_is_sixth_mode() {
        let scale = Scale::from_name(PitchClass::A, ScaleKind::Minor);
        let c_major = Scale::from_name(PitchClass::C, ScaleKind::Major);
        let mut a = scale.notes();
        let mut c = c_major.notes();
        a.sort();
        c.sort();
        assert_eq!(a, c);
        assert_eq!(ScaleKind::Minor.intervals(), [0, 2, 3, 5, 7, 8, 10]);
    }

    #[test]
    fn note_scales_walk_the_modes() {
        let scale: Scale = "C major".parse().unwrap();
        assert_eq!(scale.mode_of(PitchClass::C), Some(ScaleKind::Major));
        assert_eq!(scale.mode_of(PitchClass::D), Some(ScaleKind::Dorian));
        assert_eq!(scale.mode_of(PitchClass::B), Some(ScaleKind::Locrian));
        assert_eq!(scale.mode_of(PitchClass::CSharp), None);
    }

    #[test]
    fn add_note_crosses_octaves() {
        let scale: Scale = "C major".parse().unwrap();
        assert_eq!(scale.add_note(note("B1"), 1), Ok(note("C2")));
        assert_eq!(scale.add_note(note("C1"), -1), Ok(note("B0")));
        assert_eq!(scale.add_note(note("C1"), 7), Ok(note("C2")));
        assert_eq!(scale.add_note(note("C#1"), 0), Ok(note("C1")));
    }

    #[test]
    fn add_note_past_the_octave_range_fails() {
        let scale: Scale = "C major".parse().unwrap();
        assert_eq!(scale.add_note(note("A127"), 1), Ok(note("B127")));
        assert!(scale.add_note(note("B127"), 1).is_err());
        assert!(scale.add_note(note("C-128"), -1).is_err());
    }

    #[test]
    fn note_range_is_inclusive() {
        let scale: Scale = "C major".parse().unwrap();
        let range = scale.note_range(note("C2"), note("C4"));
        assert_eq!(range.len(), 15);
        assert_eq!(range.first(), Some(&note("C2")));
        assert_eq!(range.last(), Some(&note("C4")));
    }

    #[test]
    fn circle_of_fifths_starts_at_c() {
        let roots: Vec<_> = Scale::circle_of_fifths(ScaleKind::Major)
            .iter()
            .map(|s| s.root.name())
            .collect();
        assert_eq!(roots[..4], ["C", "G", "D", "A"]);
        assert_eq!(roots[11], "F");
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("C ionian".parse::<Scale>().is_err());
        assert!("C".parse::<Scale>().is_err());
        assert!("C major extra".parse::<Scale>().is_err());
    }
}
