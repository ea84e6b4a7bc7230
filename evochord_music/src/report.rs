// JSON summary of a finished run.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::chord::{Genome, Pitch};
use crate::error::{EvochordError, Result};
use crate::key::DetectedKey;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub key: Option<DetectedKey>,
    /// Label of the scale table entry used.
    pub scale: String,
    pub scale_fell_back: bool,
    pub scale_pitches: Vec<Pitch>,
    pub genome_len: usize,
    pub seed: u64,
    pub generations: usize,
    pub best_fitness: i64,
    /// Best fitness after each generation.
    pub history: Vec<i64>,
    pub velocity: u8,
    pub chord_ticks: u32,
    /// Winning chords, one entry per slot, in slot order.
    pub chords: Vec<Vec<Pitch>>,
}

impl RunReport {
    pub fn chords_of(genome: &Genome) -> Vec<Vec<Pitch>> {
        genome.slots().iter().map(|s| s.notes().to_vec()).collect()
    }

    pub fn key_label(&self) -> String {
        self.key.map_or_else(|| "none".to_string(), |k| k.label())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json + "\n").map_err(|e| EvochordError::io(path, e))
    }
}
