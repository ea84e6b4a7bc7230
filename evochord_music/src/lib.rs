// Evochord: evolutionary chord accompaniment for melodic MIDI songs.
//
// Given a melody, the generator detects its key, picks a pool of bass-range
// pitches for that key, and evolves a sequence of three-note chords (two per
// bar) under a small set of voicing rules. The fittest sequence is written
// back into the song as an extra track.
//
// Architecture:
// - chord.rs: Pitches, chords, chord slots (well-formed or malformed), genomes
// - scale.rs: Key-to-pitch-pool table with remaps and a default key
// - key.rs: Krumhansl-Schmuckler key estimation from timed notes
// - song.rs: MIDI parsing into notes, bars, timing, and detected key
// - scoring.rs: Rule-based fitness (duplicate penalty, spread bonus)
// - individual.rs: One candidate genome with its cached fitness
// - evolution.rs: Selection, pairwise two-point crossover, mutation,
//   replenishment, and parallel rescoring over a fixed-size population
// - midi.rs: Accompaniment track rendering and output file writing
// - config.rs: JSON-loadable run configuration
// - report.rs: JSON run summary
// - pipeline.rs: analyze -> resolve -> evolve -> write
// - error.rs: Error type for everything outside the search core
//
// The generator is deterministic given a seed, supporting reproducible output.

pub mod chord;
pub mod config;
pub mod error;
pub mod evolution;
pub mod individual;
pub mod key;
pub mod midi;
pub mod pipeline;
pub mod report;
pub mod scale;
pub mod scoring;
pub mod song;
