// End-to-end driver: song in, accompanied song out.
//
// analyze -> resolve scale -> evolve -> write. The song analysis and scale
// are computed once and frozen into a `RunContext` before the search starts;
// nothing the search does can change them.

use std::path::Path;

use evochord_prng::EvoRng;
use tracing::info;

use crate::config::RunConfig;
use crate::error::{EvochordError, Result};
use crate::evolution::{EvolutionaryAlgorithm, RunContext};
use crate::midi::write_accompaniment;
use crate::report::RunReport;
use crate::song::analyze_song;

/// Generate an accompaniment for `input` and write it to `output`.
pub fn accompany(input: &Path, output: &Path, config: &RunConfig, seed: u64) -> Result<RunReport> {
    config.validate()?;

    let song = analyze_song(input)?;
    let resolved = config.scales.resolve_key(song.key.as_ref());
    info!(
        scale = %resolved.label,
        fell_back = resolved.fell_back,
        slots = song.genome_len(),
        "scale chosen"
    );

    let ctx = RunContext::new(song.genome_len(), config.chords_per_slot, resolved.scale.clone());
    let mut rng = EvoRng::new(seed);
    info!(
        seed,
        population = config.evolution.population_size,
        generations = config.evolution.num_generations,
        "starting evolution"
    );
    let mut ea =
        EvolutionaryAlgorithm::new(&ctx, &config.evolution, config.fitness.clone(), &mut rng);
    let result = ea.run(&mut rng);
    let best = ea
        .into_best()
        .ok_or_else(|| EvochordError::Config("population is empty".into()))?
        .into_genome();

    let written = write_accompaniment(input, output, &best, &song, &config.output)?;

    Ok(RunReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        key: song.key,
        scale: resolved.label,
        scale_fell_back: resolved.fell_back,
        scale_pitches: resolved.scale.pitches().to_vec(),
        genome_len: ctx.genome_len,
        seed,
        generations: result.generations,
        best_fitness: result.best_fitness,
        history: result.history,
        velocity: written.velocity,
        chord_ticks: written.chord_ticks,
        chords: RunReport::chords_of(&best),
    })
}
