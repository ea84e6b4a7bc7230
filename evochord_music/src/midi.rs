// MIDI output: the input song plus one accompaniment track.
//
// The input file is re-parsed and its tracks are kept unchanged; the
// winning genome is rendered as a new track appended after them. Chords are
// block chords on one channel: every pitch of a slot starts together and
// stops together one chord length later, slots back to back from tick 0.
// Format-0 files are promoted to format 1 because they gain a second track.
//
// Chord length defaults to half a bar of the analyzed song. Velocity, when
// not configured, is borrowed from the third event of the second track if
// that is a note with a velocity, which for typical single-melody exports is
// the melody's first note.
//
// Uses the `midly` crate for reading and writing.

use std::path::{Path, PathBuf};

use midly::num::{u4, u7, u28};
use midly::{Format, MetaMessage, MidiMessage, Smf, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chord::Genome;
use crate::error::{EvochordError, Result};
use crate::song::SongAnalysis;

/// Velocity used when neither the config nor the song provides one.
pub const DEFAULT_VELOCITY: u8 = 50;

/// Largest delta time a MIDI event can carry (28 bits).
pub const MAX_DELTA: u32 = (1 << 28) - 1;

const TRACK_NAME: &[u8] = b"Accompaniment";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Fixed velocity for every chord note. `None` borrows the song's.
    pub velocity: Option<u8>,
    /// Used when `velocity` is `None` and the song has no usable velocity.
    pub default_velocity: u8,
    /// Ticks per chord. `None` means half a bar.
    pub chord_ticks: Option<u32>,
    pub channel: u8,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            velocity: None,
            default_velocity: DEFAULT_VELOCITY,
            chord_ticks: None,
            channel: 0,
        }
    }
}

/// What was written, for logging and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WrittenAccompaniment {
    pub velocity: u8,
    pub chord_ticks: u32,
    pub slots: usize,
    pub track_index: usize,
}

/// `result_<name>` next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.mid".to_string());
    input.with_file_name(format!("result_{name}"))
}

/// Velocity of the second track's third event, if it is a sounding note.
pub fn song_velocity(smf: &Smf<'_>) -> Option<u8> {
    let event = smf.tracks.get(1)?.get(2)?;
    match event.kind {
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { vel, .. } | MidiMessage::NoteOff { vel, .. },
            ..
        } if vel.as_int() > 0 => Some(vel.as_int()),
        _ => None,
    }
}

/// Render a genome as a standalone track of block chords.
///
/// `chord_ticks` must not exceed `MAX_DELTA`; `RunConfig::validate` enforces
/// this for configured lengths. Runs of empty slots longer than one delta can
/// hold are split across empty text events.
pub fn render_accompaniment_track(
    genome: &Genome,
    chord_ticks: u32,
    velocity: u8,
    channel: u8,
) -> Track<'static> {
    let channel = u4::new(channel);
    let vel = u7::new(velocity);
    let mut track: Track<'static> = Vec::with_capacity(genome.len() * 6 + 2);

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(TRACK_NAME)),
    });

    // Time owed to the next event, carried over empty slots.
    let mut pending: u32 = 0;
    for slot in genome.slots() {
        let notes = slot.notes();
        if notes.is_empty() {
            if pending > MAX_DELTA.saturating_sub(chord_ticks) {
                track.push(TrackEvent {
                    delta: u28::new(pending),
                    kind: TrackEventKind::Meta(MetaMessage::Text(b"")),
                });
                pending = 0;
            }
            pending += chord_ticks;
            continue;
        }
        for (i, &pitch) in notes.iter().enumerate() {
            track.push(TrackEvent {
                delta: u28::new(if i == 0 { pending } else { 0 }),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: u7::new(pitch),
                        vel,
                    },
                },
            });
        }
        for (i, &pitch) in notes.iter().enumerate() {
            track.push(TrackEvent {
                delta: u28::new(if i == 0 { chord_ticks } else { 0 }),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key: u7::new(pitch),
                        vel,
                    },
                },
            });
        }
        pending = 0;
    }

    track.push(TrackEvent {
        delta: u28::new(pending),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

/// Append the accompaniment track to a parsed song.
pub fn add_accompaniment(
    smf: &mut Smf<'_>,
    genome: &Genome,
    song: &SongAnalysis,
    config: &WriterConfig,
) -> WrittenAccompaniment {
    let velocity = config
        .velocity
        .or_else(|| song_velocity(smf))
        .unwrap_or(config.default_velocity);
    let chord_ticks = config.chord_ticks.unwrap_or_else(|| song.chord_ticks());

    if smf.header.format == Format::SingleTrack {
        debug!("promoting single-track file to parallel format");
        smf.header.format = Format::Parallel;
    }
    smf.tracks
        .push(render_accompaniment_track(genome, chord_ticks, velocity, config.channel));

    WrittenAccompaniment {
        velocity,
        chord_ticks,
        slots: genome.len(),
        track_index: smf.tracks.len() - 1,
    }
}

/// Copy `input` to `output` with the accompaniment track added.
pub fn write_accompaniment(
    input: &Path,
    output: &Path,
    genome: &Genome,
    song: &SongAnalysis,
    config: &WriterConfig,
) -> Result<WrittenAccompaniment> {
    let bytes = std::fs::read(input).map_err(|e| EvochordError::io(input, e))?;
    let mut smf = Smf::parse(&bytes).map_err(|e| EvochordError::MidiParse {
        path: input.to_path_buf(),
        reason: e.to_string(),
    })?;
    let written = add_accompaniment(&mut smf, genome, song, config);
    smf.save(output).map_err(|e| EvochordError::io(output, e))?;
    info!(
        output = %output.display(),
        slots = written.slots,
        velocity = written.velocity,
        chord_ticks = written.chord_ticks,
        "accompaniment written"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::{Chord, Slot};
    use crate::song::analyze_bytes;
    use crate::song::tests::melody_smf;

    fn midi_events(track: &Track<'_>) -> Vec<(u32, bool, u8)> {
        track
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, .. },
                    ..
                } => Some((e.delta.as_int(), true, key.as_int())),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } => Some((e.delta.as_int(), false, key.as_int())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn block_chords_back_to_back() {
        let genome = Genome::from_chords([Chord::new(&[45, 50, 55]), Chord::new(&[47, 52, 57])]);
        let track = render_accompaniment_track(&genome, 960, 64, 0);
        assert_eq!(
            midi_events(&track),
            vec![
                (0, true, 45),
                (0, true, 50),
                (0, true, 55),
                (960, false, 45),
                (0, false, 50),
                (0, false, 55),
                (0, true, 47),
                (0, true, 52),
                (0, true, 57),
                (960, false, 47),
                (0, false, 52),
                (0, false, 57),
            ]
        );
        assert!(matches!(
            track.last().unwrap().kind,
            TrackEventKind::Meta(MetaMessage::EndOfTrack)
        ));
    }

    #[test]
    fn empty_slots_become_rests() {
        let genome = Genome::new(vec![
            Slot::from_notes(&[], 3),
            Slot::Chord(Chord::new(&[45, 50, 55])),
            Slot::from_notes(&[], 3),
        ]);
        let track = render_accompaniment_track(&genome, 100, 64, 0);
        let events = midi_events(&track);
        assert_eq!(events[0], (100, true, 45));
        assert_eq!(track.last().unwrap().delta.as_int(), 100);
    }

    #[test]
    fn long_rests_are_split_instead_of_wrapping() {
        let genome = Genome::new(vec![
            Slot::from_notes(&[], 3),
            Slot::from_notes(&[], 3),
            Slot::from_notes(&[], 3),
            Slot::Chord(Chord::new(&[45, 50, 55])),
        ]);
        let track = render_accompaniment_track(&genome, MAX_DELTA, 64, 0);
        let until_first_note: u64 = track
            .iter()
            .take_while(|e| !matches!(e.kind, TrackEventKind::Midi { .. }))
            .map(|e| u64::from(e.delta.as_int()))
            .sum();
        let first_note = track
            .iter()
            .find(|e| matches!(e.kind, TrackEventKind::Midi { .. }))
            .unwrap();
        assert_eq!(
            until_first_note + u64::from(first_note.delta.as_int()),
            3 * u64::from(MAX_DELTA)
        );
        assert_eq!(midi_events(&track)[3], (MAX_DELTA, false, 45));
    }

    #[test]
    fn empty_genome_renders_name_and_end_only() {
        let track = render_accompaniment_track(&Genome::default(), 960, 64, 0);
        assert_eq!(track.len(), 2);
    }

    #[test]
    fn velocity_borrowed_from_song_or_defaulted() {
        let bytes = melody_smf(&[(60, 0, 480)], 480, Some(4), None);
        let smf = Smf::parse(&bytes).unwrap();
        // Single-track file: there is no second track to borrow from.
        assert_eq!(song_velocity(&smf), None);

        let mut two = smf.clone();
        let melody = two.tracks[0].clone();
        two.tracks.push(melody);
        // Events: TimeSignature, NoteOn, NoteOff, so index 2 is the NoteOff (vel 0).
        assert_eq!(song_velocity(&two), None);
        two.tracks[1].remove(0);
        // Now index 2 is the EndOfTrack meta.
        assert_eq!(song_velocity(&two), None);
        let note_on = two.tracks[1][0];
        two.tracks[1].insert(0, note_on);
        assert_eq!(song_velocity(&two), None);
        two.tracks[1].insert(0, note_on);
        // NoteOn, NoteOn, NoteOn, NoteOff, End: third event is a NoteOn at 64.
        assert_eq!(song_velocity(&two), Some(64));
    }

    #[test]
    fn add_accompaniment_appends_track_and_promotes_format() {
        let bytes = melody_smf(
            &[(60, 0, 480), (64, 480, 480), (67, 1920, 480)],
            480,
            Some(4),
            None,
        );
        let song = analyze_bytes(&bytes, Path::new("m.mid")).unwrap();
        let mut smf = Smf::parse(&bytes).unwrap();
        let genome = Genome::from_chords((0..song.genome_len()).map(|_| Chord::new(&[48, 52, 55])));

        let written = add_accompaniment(&mut smf, &genome, &song, &WriterConfig::default());
        assert_eq!(smf.tracks.len(), 2);
        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(written.track_index, 1);
        assert_eq!(written.chord_ticks, 960);
        assert_eq!(written.velocity, DEFAULT_VELOCITY);
        assert_eq!(written.slots, 4);
    }

    #[test]
    fn configured_velocity_and_length_win() {
        let bytes = melody_smf(&[(60, 0, 480)], 480, None, None);
        let song = analyze_bytes(&bytes, Path::new("m.mid")).unwrap();
        let mut smf = Smf::parse(&bytes).unwrap();
        let config = WriterConfig {
            velocity: Some(90),
            chord_ticks: Some(240),
            ..WriterConfig::default()
        };
        let genome = Genome::from_chords([Chord::new(&[48, 52, 55])]);
        let written = add_accompaniment(&mut smf, &genome, &song, &config);
        assert_eq!(written.velocity, 90);
        assert_eq!(written.chord_ticks, 240);
        let events = midi_events(&smf.tracks[1]);
        assert_eq!(events[3], (240, false, 48));
    }

    #[test]
    fn default_output_path_prefixes_name() {
        assert_eq!(
            default_output_path(Path::new("/songs/input1.mid")),
            PathBuf::from("/songs/result_input1.mid")
        );
        assert_eq!(
            default_output_path(Path::new("tune.mid")),
            PathBuf::from("result_tune.mid")
        );
    }
}
