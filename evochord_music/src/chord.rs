// Genome representation: chords, chord slots, and the slot sequence.
//
// A genome is one candidate accompaniment: an ordered sequence of slots, two
// per bar of the input song. Each slot normally holds a `Chord` of exactly
// `chords_per_slot` pitches drawn from the active scale. Whether a slot is a
// well-formed chord is decided once, when the slot is built (`Slot::from_notes`),
// rather than being re-inspected by whoever reads it later. Scoring stops at
// the first `Slot::Malformed` it meets (see scoring.rs).
//
// Pitches are MIDI note numbers. Duplicates inside a chord are allowed here;
// the fitness rules penalize them.

use evochord_prng::EvoRng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::scale::Scale;

/// MIDI note number (0-127).
pub type Pitch = u8;

type Notes = SmallVec<[Pitch; 4]>;

/// A fixed-size collection of pitches sounding together in one slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    notes: Notes,
}

impl Chord {
    pub fn new(notes: &[Pitch]) -> Self {
        Chord {
            notes: SmallVec::from_slice(notes),
        }
    }

    /// `size` independent uniform draws from the scale, with replacement.
    pub fn random(size: usize, scale: &Scale, rng: &mut EvoRng) -> Self {
        Chord {
            notes: (0..size).map(|_| scale.choose(rng)).collect(),
        }
    }

    pub fn notes(&self) -> &[Pitch] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Pitches in ascending order.
    pub fn sorted(&self) -> Notes {
        let mut sorted = self.notes.clone();
        sorted.sort_unstable();
        sorted
    }

    /// Number of different pitches in the chord.
    pub fn distinct_count(&self) -> usize {
        let sorted = self.sorted();
        let mut count = 0;
        let mut prev = None;
        for &p in &sorted {
            if prev != Some(p) {
                count += 1;
                prev = Some(p);
            }
        }
        count
    }
}

/// One position in a genome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Chord(Chord),
    /// Pitches that do not form a chord of the expected size.
    Malformed(SmallVec<[Pitch; 4]>),
}

impl Slot {
    /// Classify raw pitches: a chord if there are exactly `chord_size` of
    /// them, malformed otherwise.
    pub fn from_notes(notes: &[Pitch], chord_size: usize) -> Self {
        if notes.len() == chord_size {
            Slot::Chord(Chord::new(notes))
        } else {
            Slot::Malformed(SmallVec::from_slice(notes))
        }
    }

    pub fn as_chord(&self) -> Option<&Chord> {
        match self {
            Slot::Chord(chord) => Some(chord),
            Slot::Malformed(_) => None,
        }
    }

    /// Every pitch in the slot, whether or not it forms a chord.
    pub fn notes(&self) -> &[Pitch] {
        match self {
            Slot::Chord(chord) => chord.notes(),
            Slot::Malformed(notes) => notes,
        }
    }
}

impl From<Chord> for Slot {
    fn from(chord: Chord) -> Self {
        Slot::Chord(chord)
    }
}

/// An ordered sequence of slots; its length is fixed for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genome {
    slots: Vec<Slot>,
}

impl Genome {
    pub fn new(slots: Vec<Slot>) -> Self {
        Genome { slots }
    }

    /// Convenience for building a genome of well-formed chords.
    pub fn from_chords(chords: impl IntoIterator<Item = Chord>) -> Self {
        Genome {
            slots: chords.into_iter().map(Slot::Chord).collect(),
        }
    }

    /// `len` random chords of `chord_size` pitches each.
    pub fn random(len: usize, chord_size: usize, scale: &Scale, rng: &mut EvoRng) -> Self {
        Genome::from_chords((0..len).map(|_| Chord::random(chord_size, scale, rng)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    /// Iterate over every pitch in every slot.
    pub fn pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.slots.iter().flat_map(|s| s.notes().iter().copied())
    }
}
