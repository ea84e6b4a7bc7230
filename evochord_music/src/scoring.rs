// Fitness evaluation for candidate accompaniments.
//
// A genome's fitness starts at a base value and is adjusted additively, one
// chord slot at a time:
//
// - Duplicate notes: a chord with fewer than `min_distinct_notes` different
//   pitches gets `duplicate_note_penalty`.
// - Spread: after sorting the chord ascending, if its lowest two pitches are
//   more than `spread_threshold` semitones apart the chord gets
//   `spread_bonus`. Only that first adjacent pair is looked at, however many
//   notes the chord has.
//
// Scoring walks the slots in order and stops at the first malformed slot;
// slots after it contribute nothing, even well-formed ones.
//
// Scoring is pure and deterministic. Higher is better and there is no bound
// in either direction.

use serde::{Deserialize, Serialize};

use crate::chord::{Chord, Genome, Slot};

/// Weights and thresholds for the fitness rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessRules {
    /// Starting fitness before any slot is scored.
    pub base: i64,
    pub min_distinct_notes: usize,
    /// Added (negative) when a chord repeats a pitch.
    pub duplicate_note_penalty: i64,
    /// Semitone gap the lowest pair must exceed to earn `spread_bonus`.
    pub spread_threshold: u8,
    pub spread_bonus: i64,
}

impl Default for FitnessRules {
    fn default() -> Self {
        FitnessRules {
            base: 100,
            min_distinct_notes: 3,
            duplicate_note_penalty: -50,
            spread_threshold: 2,
            spread_bonus: 200,
        }
    }
}

/// Score a whole genome.
pub fn score_genome(genome: &Genome, rules: &FitnessRules) -> i64 {
    let mut fitness = rules.base;
    for slot in genome.slots() {
        match slot {
            Slot::Chord(chord) => fitness += score_chord(chord, rules),
            Slot::Malformed(_) => break,
        }
    }
    fitness
}

/// Adjustment contributed by one chord.
pub fn score_chord(chord: &Chord, rules: &FitnessRules) -> i64 {
    let mut delta = 0;

    if chord.distinct_count() < rules.min_distinct_notes {
        delta += rules.duplicate_note_penalty;
    }

    let sorted = chord.sorted();
    match sorted.as_slice() {
        [low, next, ..] if next - low > rules.spread_threshold => delta += rules.spread_bonus,
        _ => {}
    }

    delta
}
