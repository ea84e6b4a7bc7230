// One candidate accompaniment in the evolving population.
//
// An `Individual` owns a genome and a cached fitness. The cache is only
// written by `evaluate_fitness`; `mutate` changes the genome and marks the
// cache stale, and it stays stale until the owner rescores. The evolution
// loop rescores the whole population at the end of every generation, so
// nothing stale ever reaches selection.

use evochord_prng::EvoRng;

use crate::chord::{Chord, Genome, Slot};
use crate::scale::Scale;
use crate::scoring::{FitnessRules, score_genome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    genome: Genome,
    fitness: i64,
    scored: bool,
}

impl Individual {
    /// `len` slots, each `chords_per_slot` uniform draws from `scale`.
    /// Fitness is 0 until evaluated.
    pub fn create_random(
        len: usize,
        chords_per_slot: usize,
        scale: &Scale,
        rng: &mut EvoRng,
    ) -> Self {
        Individual::create_from_genome(Genome::random(len, chords_per_slot, scale, rng))
    }

    /// Wrap an existing genome. The caller is responsible for its length.
    pub fn create_from_genome(genome: Genome) -> Self {
        Individual {
            genome,
            fitness: 0,
            scored: false,
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn into_genome(self) -> Genome {
        self.genome
    }

    /// Last evaluated fitness, or 0 if never evaluated.
    pub fn fitness(&self) -> i64 {
        self.fitness
    }

    /// False after creation or mutation until the next `evaluate_fitness`.
    pub fn is_scored(&self) -> bool {
        self.scored
    }

    /// Replace each slot, independently with probability `rate`, by a fresh
    /// random chord. Does not rescore.
    pub fn mutate(
        &mut self,
        rate: f64,
        chords_per_slot: usize,
        scale: &Scale,
        rng: &mut EvoRng,
    ) -> usize {
        let mut replaced = 0;
        for slot in self.genome.slots_mut() {
            if rng.random_bool(rate) {
                *slot = Slot::Chord(Chord::random(chords_per_slot, scale, rng));
                replaced += 1;
            }
        }
        if replaced > 0 {
            self.scored = false;
        }
        replaced
    }

    /// Recompute and cache the fitness.
    pub fn evaluate_fitness(&mut self, rules: &FitnessRules) -> i64 {
        self.fitness = score_genome(&self.genome, rules);
        self.scored = true;
        self.fitness
    }
}
