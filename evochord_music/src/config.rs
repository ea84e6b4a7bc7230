// Run configuration, loadable from JSON.
//
// Every struct in the tree is `#[serde(default)]`, so a config file only
// needs the fields it changes: `{"evolution": {"num_generations": 500}}` is
// a complete config. Command-line flags are applied on top of whatever was
// loaded; see `main.rs`.
//
// `validate` is the single gate between user-supplied values and the search
// core, which assumes sane inputs and has no error path of its own.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvochordError, Result};
use crate::evolution::EvolutionConfig;
use crate::midi::{MAX_DELTA, WriterConfig};
use crate::scale::ScaleTable;
use crate::scoring::FitnessRules;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pitches drawn per chord slot.
    pub chords_per_slot: usize,
    /// PRNG seed. `None` picks one from the clock at startup.
    pub seed: Option<u64>,
    pub evolution: EvolutionConfig,
    pub fitness: FitnessRules,
    pub output: WriterConfig,
    pub scales: ScaleTable,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            chords_per_slot: 3,
            seed: None,
            evolution: EvolutionConfig::default(),
            fitness: FitnessRules::default(),
            output: WriterConfig::default(),
            scales: ScaleTable::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| EvochordError::io(path, e))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chords_per_slot == 0 {
            return Err(EvochordError::Config(
                "chords_per_slot must be at least 1".into(),
            ));
        }
        let evo = &self.evolution;
        if evo.population_size == 0 {
            return Err(EvochordError::Config(
                "population_size must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&evo.mutation_rate) {
            return Err(EvochordError::Config(format!(
                "mutation_rate {} is not a probability",
                evo.mutation_rate
            )));
        }
        if !(0.0..=1.0).contains(&evo.survivor_fraction) {
            return Err(EvochordError::Config(format!(
                "survivor_fraction {} must be between 0 and 1",
                evo.survivor_fraction
            )));
        }
        if self.output.channel > 15 {
            return Err(EvochordError::Config(format!(
                "output channel {} is outside 0..=15",
                self.output.channel
            )));
        }
        for (name, v) in [
            ("velocity", self.output.velocity),
            ("default_velocity", Some(self.output.default_velocity)),
        ] {
            if let Some(v) = v.filter(|&v| v > 127) {
                return Err(EvochordError::Config(format!(
                    "{name} {v} is outside the MIDI range"
                )));
            }
        }
        match self.output.chord_ticks {
            Some(0) => {
                return Err(EvochordError::Config("chord_ticks must be positive".into()));
            }
            Some(t) if t > MAX_DELTA => {
                return Err(EvochordError::Config(format!(
                    "chord_ticks {t} does not fit a MIDI delta time (max {MAX_DELTA})"
                )));
            }
            _ => {}
        }
        self.scales.validate()
    }
}
