// Key estimation for a melodic line (Krumhansl-Schmuckler).
//
// Builds a pitch-class histogram weighted by note duration, then correlates
// it (Pearson) against the Krumhansl-Kessler major and minor profiles rotated
// to each of the 12 tonics. The best of the 24 candidates wins; ties go to
// the first candidate in (major C..B, minor C..B) order.
//
// Tonic names follow the spelling the scale table is keyed by: sharps for
// C#, F#, and flats written with '-' for E-, A-, B-.

use serde::{Deserialize, Serialize};

use crate::song::Note;

const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

const TONIC_NAMES: [&str; 12] = [
    "C", "C#", "D", "E-", "E", "F", "F#", "G", "A-", "A", "B-", "B",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Major,
    Minor,
}

impl KeyMode {
    pub fn name(self) -> &'static str {
        match self {
            KeyMode::Major => "major",
            KeyMode::Minor => "minor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedKey {
    /// Pitch class of the tonic, 0 = C.
    pub tonic_pc: u8,
    pub mode: KeyMode,
    /// Pearson correlation of the winning profile, in [-1, 1].
    pub correlation: f64,
}

impl DetectedKey {
    pub fn tonic_name(&self) -> &'static str {
        TONIC_NAMES[(self.tonic_pc % 12) as usize]
    }

    /// `"<tonic> <mode>"`, the form the scale table is keyed by.
    pub fn label(&self) -> String {
        format!("{} {}", self.tonic_name(), self.mode.name())
    }
}

/// Duration-weighted pitch-class histogram.
pub fn pitch_class_histogram(notes: &[Note]) -> [f64; 12] {
    let mut hist = [0.0; 12];
    for note in notes {
        // Zero-length notes still count as heard.
        let weight = note.duration().max(1) as f64;
        hist[(note.pitch % 12) as usize] += weight;
    }
    hist
}

/// Estimate the key. `None` when there are no notes to judge by.
pub fn detect_key(notes: &[Note]) -> Option<DetectedKey> {
    if notes.is_empty() {
        return None;
    }
    let hist = pitch_class_histogram(notes);

    let mut best: Option<DetectedKey> = None;
    for (mode, profile) in [(KeyMode::Major, &MAJOR_PROFILE), (KeyMode::Minor, &MINOR_PROFILE)] {
        for tonic in 0..12u8 {
            let correlation = pearson_correlation(&hist, profile, tonic as usize);
            if best.is_none_or(|b| correlation > b.correlation) {
                best = Some(DetectedKey {
                    tonic_pc: tonic,
                    mode,
                    correlation,
                });
            }
        }
    }
    best
}

/// Correlation of the histogram read from `root` upward against a profile
/// that starts at its tonic.
fn pearson_correlation(hist: &[f64; 12], profile: &[f64; 12], root: usize) -> f64 {
    let n = 12.0;
    let (mut sx, mut sy, mut sxy, mut sx2, mut sy2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (i, &y) in profile.iter().enumerate() {
        let x = hist[(root + i) % 12];
        sx += x;
        sy += y;
        sxy += x * y;
        sx2 += x * x;
        sy2 += y * y;
    }
    let numerator = n * sxy - sx * sy;
    let denominator = ((n * sx2 - sx * sx) * (n * sy2 - sy * sy)).sqrt();
    if denominator < 1e-10 {
        0.0
    } else {
        numerator / denominator
    }
}
