use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::TheoryError;
use crate::theory::note::{PitchClass, SpecificNote};

/// Rendering shared by every chord form when no note sounds.
pub const EMPTY_CHORD: &str = "<empty>";

/// Notes sounding together. Duplicates collapse, iteration runs low to high.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SpecificChord {
    notes: BTreeSet<SpecificNote>,
}

impl SpecificChord {
    pub fn new(notes: impl IntoIterator<Item = SpecificNote>) -> Self {
        Self {
            notes: notes.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The n-th lowest note.
    pub fn note(&self, n: usize) -> Option<SpecificNote> {
        self.notes.iter().nth(n).copied()
    }

    pub fn notes(&self) -> impl Iterator<Item = SpecificNote> + '_ {
        self.notes.iter().copied()
    }

    pub fn abstract_chord(&self) -> AbstractChord {
        AbstractChord::new(self.notes.iter().map(|n| n.pitch))
    }
}

impl fmt::Display for SpecificChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.notes.is_empty() {
            return f.write_str(EMPTY_CHORD);
        }
        for (i, note) in self.notes.iter().enumerate() {
            if i > 0 {
                f.write_str("_")?;
            }
            write!(f, "{note}")?;
        }
        Ok(())
    }
}

impl FromStr for SpecificChord {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == EMPTY_CHORD {
            return Ok(Self::default());
        }
        let notes = s
            .split('_')
            .map(str::parse::<SpecificNote>)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { notes })
    }
}

/// A chord's pitch-class set, independent of voicing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AbstractChord {
    pitches: BTreeSet<PitchClass>,
}

impl AbstractChord {
    pub fn new(pitches: impl IntoIterator<Item = PitchClass>) -> Self {
        Self {
            pitches: pitches.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn contains(&self, pitch: PitchClass) -> bool {
        self.pitches.contains(&pitch)
    }

    pub fn pitches(&self) -> impl Iterator<Item = PitchClass> + '_ {
        self.pitches.iter().copied()
    }

    /// Every way of reading this set with one of its members as root,
    /// ordered by ascending pitch-class index of the root.
    pub fn possibilities(&self) -> Vec<RootedChord> {
        self.pitches
            .iter()
            .map(|&root| RootedChord {
                pitches: self.clone(),
                root,
            })
            .collect()
    }
}

impl fmt::Display for AbstractChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pitches.is_empty() {
            return f.write_str(EMPTY_CHORD);
        }
        self.pitches.iter().try_for_each(|p| write!(f, "{p}"))
    }
}

/// A pitch-class set with one member designated as the harmonic root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootedChord {
    pitches: AbstractChord,
    root: PitchClass,
}

impl RootedChord {
    /// Returns `None` when `root` is not a member of `pitches`.
    pub fn new(pitches: AbstractChord, root: PitchClass) -> Option<Self> {
        pitches
            .contains(root)
            .then_some(Self { pitches, root })
    }

    pub fn root(&self) -> PitchClass {
        self.root
    }

    pub fn pitches(&self) -> &AbstractChord {
        &self.pitches
    }
}

impl fmt::Display for RootedChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let above = self.pitches.pitches.range(self.root..);
        let below = self.pitches.pitches.range(..self.root);
        for p in above.chain(below) {
            write!(f, "{p}")?;
        }
        write!(f, "/{}", self.root)
    }
}
