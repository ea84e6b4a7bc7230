// Evolutionary search over chord sequences.
//
// A fixed-size population of random genomes is improved for a fixed number
// of generations. Each generation:
//
// 1. select     - sort by fitness (stable, best first) and keep the top
//                 `num_survivors`; everyone else is dropped.
// 2. recombine  - every pair of survivors (i < j) yields one child by
//                 two-point crossover, mutated straight away. Children are
//                 appended; survivors stay.
// 3. replenish  - if the population is still short of `population_size`
//                 (fewer than two survivors), top it up with random genomes.
// 4. rescore    - recompute every fitness, in parallel. This is a barrier:
//                 the next selection sees only current values.
// 5. cull       - order by fitness and truncate back to `population_size`
//                 when recombination overshot. The next selection keeps the
//                 top `num_survivors` either way, so this only bounds size.
//
// There is no early stop. Survivors carry over unchanged and scoring is
// deterministic, so the best fitness never decreases between generations
// while `num_survivors >= 1`.
//
// All randomness comes from the `EvoRng` passed in; with the same seed,
// context, and config a run is reproducible bit for bit.

use evochord_prng::EvoRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::chord::{Genome, Slot};
use crate::individual::Individual;
use crate::scale::Scale;
use crate::scoring::FitnessRules;

/// Population and operator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub num_generations: usize,
    /// Per-slot probability that a child's chord is replaced.
    pub mutation_rate: f64,
    /// Fraction of the population kept by selection, rounded.
    pub survivor_fraction: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            population_size: 10,
            num_generations: 100,
            mutation_rate: 0.10,
            survivor_fraction: 0.40,
        }
    }
}

impl EvolutionConfig {
    /// `population_size * survivor_fraction`, with halves rounded to even.
    pub fn num_survivors(&self) -> usize {
        (self.population_size as f64 * self.survivor_fraction).round_ties_even() as usize
    }
}

/// Song-derived facts fixed for a whole run. Built once by the driver and
/// shared read-only by everything in the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Number of chord slots in every genome.
    pub genome_len: usize,
    pub chords_per_slot: usize,
    pub scale: Scale,
}

impl RunContext {
    pub fn new(genome_len: usize, chords_per_slot: usize, scale: Scale) -> Self {
        RunContext {
            genome_len,
            chords_per_slot,
            scale,
        }
    }

    pub fn random_individual(&self, rng: &mut EvoRng) -> Individual {
        Individual::create_random(self.genome_len, self.chords_per_slot, &self.scale, rng)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvolutionResult {
    pub generations: usize,
    pub best_fitness: i64,
    /// Best fitness after each generation.
    pub history: Vec<i64>,
}

/// Two cut points, each uniform in `[0, len]`, returned in order.
pub fn pick_cut_points(len: usize, rng: &mut EvoRng) -> (usize, usize) {
    let a = rng.range_usize_inclusive(0, len);
    let b = rng.range_usize_inclusive(0, len);
    if a <= b { (a, b) } else { (b, a) }
}

/// `first[..lo] + second[lo..hi] + first[hi..]`.
///
/// `lo <= hi <= first.len()` is required, and `second` must be at least
/// `hi` slots long.
pub fn two_point_crossover(first: &Genome, second: &Genome, lo: usize, hi: usize) -> Genome {
    let a = first.slots();
    let b = second.slots();
    let slots: Vec<Slot> = a[..lo]
        .iter()
        .chain(&b[lo..hi])
        .chain(&a[hi..])
        .cloned()
        .collect();
    Genome::new(slots)
}

pub struct EvolutionaryAlgorithm<'a> {
    ctx: &'a RunContext,
    config: EvolutionConfig,
    rules: FitnessRules,
    num_survivors: usize,
    population: Vec<Individual>,
    generation: usize,
}

impl<'a> EvolutionaryAlgorithm<'a> {
    /// Create and score the initial random population.
    pub fn new(
        ctx: &'a RunContext,
        config: &EvolutionConfig,
        rules: FitnessRules,
        rng: &mut EvoRng,
    ) -> Self {
        let population = (0..config.population_size)
            .map(|_| ctx.random_individual(rng))
            .collect();
        let mut ea = EvolutionaryAlgorithm {
            ctx,
            config: config.clone(),
            rules,
            num_survivors: config.num_survivors(),
            population,
            generation: 0,
        };
        ea.rescore();
        debug!(
            population = ea.population.len(),
            survivors = ea.num_survivors,
            genome_len = ctx.genome_len,
            "initial population scored"
        );
        ea
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn num_survivors(&self) -> usize {
        self.num_survivors
    }

    /// Generations completed so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Run all configured generations.
    pub fn run(&mut self, rng: &mut EvoRng) -> EvolutionResult {
        let mut history = Vec::with_capacity(self.config.num_generations);
        for _ in 0..self.config.num_generations {
            self.step(rng);
            history.push(self.best_fitness());
        }
        let best_fitness = self.best_fitness();
        info!(
            generations = self.generation,
            best_fitness,
            "evolution finished"
        );
        EvolutionResult {
            generations: self.generation,
            best_fitness,
            history,
        }
    }

    /// One full generation.
    pub fn step(&mut self, rng: &mut EvoRng) {
        self.select();
        let children = self.recombine(rng);
        let fresh = self.replenish(rng);
        self.rescore();
        self.cull();
        self.generation += 1;
        debug!(
            generation = self.generation,
            children,
            fresh,
            best = self.best_fitness(),
            "generation complete"
        );
    }

    /// Keep the `num_survivors` fittest, best first.
    pub fn select(&mut self) {
        self.sort_by_fitness();
        self.population.truncate(self.num_survivors);
    }

    /// Append one mutated child per survivor pair. Returns the child count.
    pub fn recombine(&mut self, rng: &mut EvoRng) -> usize {
        let parents = self.population.len();
        let mut children = Vec::with_capacity(parents * parents.saturating_sub(1) / 2);
        for i in 0..parents {
            for j in (i + 1)..parents {
                let first = self.population[i].genome();
                let second = self.population[j].genome();
                let (lo, hi) = pick_cut_points(first.len(), rng);
                let genome = two_point_crossover(first, second, lo, hi);
                let mut child = Individual::create_from_genome(genome);
                let replaced = child.mutate(
                    self.config.mutation_rate,
                    self.ctx.chords_per_slot,
                    &self.ctx.scale,
                    rng,
                );
                trace!(i, j, lo, hi, replaced, "child bred");
                children.push(child);
            }
        }
        let count = children.len();
        self.population.extend(children);
        count
    }

    /// Top up with random individuals. Returns how many were added.
    pub fn replenish(&mut self, rng: &mut EvoRng) -> usize {
        let missing = self.config.population_size.saturating_sub(self.population.len());
        for _ in 0..missing {
            self.population.push(self.ctx.random_individual(rng));
        }
        missing
    }

    /// Recompute every individual's fitness.
    pub fn rescore(&mut self) {
        let rules = &self.rules;
        self.population.par_iter_mut().for_each(|ind| {
            ind.evaluate_fitness(rules);
        });
    }

    fn cull(&mut self) {
        self.sort_by_fitness();
        self.population.truncate(self.config.population_size);
    }

    fn sort_by_fitness(&mut self) {
        // Stable: ties keep their current order.
        self.population.sort_by(|a, b| b.fitness().cmp(&a.fitness()));
    }

    /// The fittest individual; the earliest one on ties.
    pub fn best(&self) -> Option<&Individual> {
        self.population
            .iter()
            .reduce(|best, ind| if ind.fitness() > best.fitness() { ind } else { best })
    }

    pub fn into_best(self) -> Option<Individual> {
        self.population
            .into_iter()
            .reduce(|best, ind| if ind.fitness() > best.fitness() { ind } else { best })
    }

    fn best_fitness(&self) -> i64 {
        self.best().map_or(self.rules.base, Individual::fitness)
    }
}
