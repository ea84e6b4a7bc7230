// Error types for the I/O side of the accompaniment pipeline.
//
// Only the collaborators around the search core can fail: reading and
// parsing the input song, loading a config file, writing the output MIDI
// and report. The core itself (`individual`, `scoring`, `evolution`) absorbs
// every anomaly locally and has no error path.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvochordError {
    #[error("cannot access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a readable MIDI file: {reason}")]
    MidiParse { path: PathBuf, reason: String },

    #[error("'{path}' uses SMPTE timecode timing; only ticks-per-beat files are supported")]
    UnsupportedTiming { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvochordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EvochordError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EvochordError>;
