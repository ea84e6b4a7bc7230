// Scale resolution: from a detected key to the pitches chords may use.
//
// The accompaniment never chooses pitches freely. Each run works over one
// `Scale`, a small fixed set of MIDI pitches in the register below the
// melody, picked from a lookup table keyed by `"<tonic> <mode>"` (e.g.
// "C major"). Before lookup a handful of keys are remapped onto a table entry
// (mostly minor keys onto their relative or a nearby major). Anything still
// unknown falls back to the table's default key; that fallback is logged but
// is never an error.
//
// The table is plain data (`ScaleTable`), serializable so a config file can
// replace it. `ScaleTable::validate` is the only place a table can be
// rejected, which happens when a config is loaded.

use std::collections::BTreeMap;

use evochord_prng::EvoRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chord::Pitch;
use crate::error::{EvochordError, Result};
use crate::key::DetectedKey;

/// An immutable, non-empty set of allowed pitches, in table order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Pitch>", into = "Vec<Pitch>")]
pub struct Scale {
    pitches: Vec<Pitch>,
}

impl TryFrom<Vec<Pitch>> for Scale {
    type Error = EvochordError;

    fn try_from(pitches: Vec<Pitch>) -> Result<Self> {
        if pitches.is_empty() {
            return Err(EvochordError::Config(
                "a scale needs at least one pitch".into(),
            ));
        }
        Ok(Scale { pitches })
    }
}

impl From<Scale> for Vec<Pitch> {
    fn from(scale: Scale) -> Self {
        scale.pitches
    }
}

impl Scale {
    /// Panics on an empty pitch list; tables are validated before use.
    pub fn new(pitches: Vec<Pitch>) -> Self {
        assert!(!pitches.is_empty(), "a scale needs at least one pitch");
        Scale { pitches }
    }

    pub fn pitches(&self) -> &[Pitch] {
        &self.pitches
    }

    pub fn contains(&self, pitch: Pitch) -> bool {
        self.pitches.contains(&pitch)
    }

    /// One uniform draw.
    pub fn choose(&self, rng: &mut EvoRng) -> Pitch {
        self.pitches[rng.range_usize(0, self.pitches.len())]
    }
}

/// The outcome of a lookup: which table entry was used and its pitches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedScale {
    /// Label as detected, before remapping. `None` when the song had no key.
    pub requested: Option<String>,
    /// Table key actually used.
    pub label: String,
    /// True when the default entry was used because nothing matched.
    pub fell_back: bool,
    pub scale: Scale,
}

/// Key remaps plus the key-to-pitches table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleTable {
    /// Applied to the detected label before lookup.
    pub remaps: BTreeMap<String, String>,
    pub scales: BTreeMap<String, Vec<Pitch>>,
    /// Entry used when the (remapped) label is not in `scales`.
    pub default_key: String,
}

impl Default for ScaleTable {
    fn default() -> Self {
        let remaps = [
            ("G minor", "C major"),
            ("H minor", "D major"),
            ("A minor", "B major"),
            ("C#", "E major"),
            ("E minor", "G major"),
            ("D minor", "F major"),
        ];
        let scales: [(&str, [Pitch; 9]); 6] = [
            ("B major", [43, 45, 46, 48, 50, 51, 53, 55, 57]),
            ("C major", [45, 47, 48, 50, 52, 53, 55, 57, 59]),
            ("D major", [49, 50, 52, 54, 55, 57, 59, 61, 62]),
            ("E major", [49, 51, 52, 54, 56, 47, 59, 61, 63]),
            ("F major", [48, 50, 52, 53, 55, 57, 58, 60, 62]),
            ("G major", [48, 50, 52, 54, 55, 57, 59, 60, 62]),
        ];
        ScaleTable {
            remaps: remaps
                .iter()
                .map(|&(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            scales: scales
                .iter()
                .map(|(key, pitches)| (key.to_string(), pitches.to_vec()))
                .collect(),
            default_key: "F major".to_string(),
        }
    }
}

impl ScaleTable {
    /// Reject tables that could leave a run without a usable scale.
    pub fn validate(&self) -> Result<()> {
        if !self.scales.contains_key(&self.default_key) {
            return Err(EvochordError::Config(format!(
                "default key '{}' has no scale in the table",
                self.default_key
            )));
        }
        if let Some((key, _)) = self.scales.iter().find(|(_, p)| p.is_empty()) {
            return Err(EvochordError::Config(format!("scale '{key}' is empty")));
        }
        if let Some((key, &p)) = self
            .scales
            .iter()
            .find_map(|(k, ps)| ps.iter().find(|&&p| p > 127).map(|p| (k, p)))
        {
            return Err(EvochordError::Config(format!(
                "scale '{key}' contains pitch {p}, outside the MIDI range"
            )));
        }
        Ok(())
    }

    /// Resolve a `"<tonic> <mode>"` label.
    pub fn resolve(&self, label: &str) -> ResolvedScale {
        let mapped = self.remaps.get(label).map_or(label, String::as_str);
        if let Some(pitches) = self.scales.get(mapped) {
            debug!(requested = label, used = mapped, "scale resolved");
            return ResolvedScale {
                requested: Some(label.to_string()),
                label: mapped.to_string(),
                fell_back: false,
                scale: Scale::new(pitches.clone()),
            };
        }
        warn!(
            requested = label,
            fallback = %self.default_key,
            "no scale for detected key, using default"
        );
        ResolvedScale {
            requested: Some(label.to_string()),
            ..self.fallback()
        }
    }

    /// Resolve a detected key, or the default when no key was found.
    pub fn resolve_key(&self, key: Option<&DetectedKey>) -> ResolvedScale {
        match key {
            Some(key) => self.resolve(&key.label()),
            None => {
                warn!(
                    fallback = %self.default_key,
                    "song has no detectable key, using default scale"
                );
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> ResolvedScale {
        let pitches = self
            .scales
            .get(&self.default_key)
            .cloned()
            .unwrap_or_default();
        ResolvedScale {
            requested: None,
            label: self.default_key.clone(),
            fell_back: true,
            scale: Scale::new(pitches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyMode;

    #[test]
    fn direct_lookup() {
        let table = ScaleTable::default();
        let resolved = table.resolve("C major");
        assert_eq!(resolved.label, "C major");
        assert!(!resolved.fell_back);
        assert_eq!(
            resolved.scale.pitches(),
            &[45, 47, 48, 50, 52, 53, 55, 57, 59]
        );
    }

    #[test]
    fn remapped_minor_keys() {
        let table = ScaleTable::default();
        assert_eq!(table.resolve("G minor").label, "C major");
        assert_eq!(table.resolve("A minor").label, "B major");
        assert_eq!(table.resolve("E minor").label, "G major");
        assert_eq!(table.resolve("D minor").label, "F major");
        assert_eq!(table.resolve("H minor").label, "D major");
        assert!(!table.resolve("G minor").fell_back);
    }

    #[test]
    fn unknown_key_falls_back_to_f_major() {
        let table = ScaleTable::default();
        let resolved = table.resolve("F# minor");
        assert!(resolved.fell_back);
        assert_eq!(resolved.label, "F major");
        assert_eq!(resolved.requested.as_deref(), Some("F# minor"));
        assert_eq!(
            resolved.scale.pitches(),
            &[48, 50, 52, 53, 55, 57, 58, 60, 62]
        );
    }

    #[test]
    fn missing_key_falls_back() {
        let table = ScaleTable::default();
        let resolved = table.resolve_key(None);
        assert!(resolved.fell_back);
        assert_eq!(resolved.requested, None);
        assert_eq!(resolved.label, "F major");
    }

    #[test]
    fn detected_key_is_resolved_by_label() {
        let table = ScaleTable::default();
        let key = DetectedKey {
            tonic_pc: 7,
            mode: KeyMode::Minor,
            correlation: 0.9,
        };
        assert_eq!(table.resolve_key(Some(&key)).label, "C major");
    }

    #[test]
    fn default_table_validates() {
        assert!(ScaleTable::default().validate().is_ok());
    }

    #[test]
    fn table_without_default_entry_is_rejected() {
        let mut table = ScaleTable::default();
        table.default_key = "Z major".to_string();
        assert!(matches!(table.validate(), Err(EvochordError::Config(_))));
    }

    #[test]
    fn table_with_empty_scale_is_rejected() {
        let mut table = ScaleTable::default();
        table.scales.insert("A major".to_string(), Vec::new());
        assert!(matches!(table.validate(), Err(EvochordError::Config(_))));
    }

    #[test]
    fn deserialized_scale_must_not_be_empty() {
        assert!(serde_json::from_str::<Scale>("[]").is_err());
        let scale: Scale = serde_json::from_str("[60, 62]").unwrap();
        assert_eq!(scale.pitches(), &[60, 62]);
        assert_eq!(serde_json::to_string(&scale).unwrap(), "[60,62]");
    }

    #[test]
    fn choose_only_returns_scale_members() {
        let scale = Scale::new(vec![49, 51, 52]);
        let mut rng = EvoRng::new(17);
        for _ in 0..500 {
            assert!(scale.contains(scale.choose(&mut rng)));
        }
    }
}
