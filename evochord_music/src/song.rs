// Song analysis: MIDI file in, bars + key + timing out.
//
// The search core needs only two things from the input song: how many chord
// slots the accompaniment has (two per bar) and which key the melody is in.
// This module extracts both, plus the timing facts the writer needs to lay
// chords against the melody.
//
// All bar arithmetic is done in ticks, never seconds: a bar is
// `beats_per_bar * ticks_per_beat` ticks and a note belongs to the bar its
// start tick falls in. Tempo is recorded for reporting only.
//
// Notes are collected from every track and channel. NoteOn/NoteOff pairs are
// matched first-in-first-out per (channel, key); a NoteOn with velocity 0
// counts as a NoteOff; a note still sounding at the end of its track ends
// there.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::Serialize;
use tracing::{debug, info};

use crate::chord::Pitch;
use crate::error::{EvochordError, Result};
use crate::key::{DetectedKey, detect_key};

/// Microseconds per quarter note when the file sets no tempo (120 BPM).
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// Beats per bar when the file has no time signature.
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// A sounding note, in absolute ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Note {
    pub pitch: Pitch,
    pub start: u32,
    pub end: u32,
}

impl Note {
    pub fn duration(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// The notes starting inside one bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bar {
    pub index: usize,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SongAnalysis {
    pub ticks_per_beat: u16,
    pub tempo_us: u32,
    pub beats_per_bar: u32,
    /// Every note in the song, ordered by start tick.
    pub notes: Vec<Note>,
    /// One entry per bar from the first to the last bar holding a note
    /// onset; bars with no onsets are present with no notes.
    pub bars: Vec<Bar>,
    pub total_bars: usize,
    pub key: Option<DetectedKey>,
}

impl SongAnalysis {
    pub fn bar_ticks(&self) -> u32 {
        self.beats_per_bar * u32::from(self.ticks_per_beat)
    }

    /// Length of one chord slot: half a bar.
    pub fn chord_ticks(&self) -> u32 {
        self.bar_ticks() / 2
    }

    /// Number of chord slots in the accompaniment.
    pub fn genome_len(&self) -> usize {
        2 * self.total_bars
    }

    pub fn tempo_bpm(&self) -> f64 {
        60_000_000.0 / f64::from(self.tempo_us)
    }
}

/// Read and analyze a MIDI file.
pub fn analyze_song(path: &Path) -> Result<SongAnalysis> {
    let bytes = std::fs::read(path).map_err(|e| EvochordError::io(path, e))?;
    analyze_bytes(&bytes, path)
}

/// Analyze an in-memory MIDI file. `path` is only used in error messages.
pub fn analyze_bytes(bytes: &[u8], path: &Path) -> Result<SongAnalysis> {
    let smf = Smf::parse(bytes).map_err(|e| EvochordError::MidiParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let analysis = analyze_smf(&smf, path)?;
    let key_label = analysis.key.map(|k| k.label());
    info!(
        bars = analysis.total_bars,
        notes = analysis.notes.len(),
        key = key_label.as_deref().unwrap_or("none"),
        beats_per_bar = analysis.beats_per_bar,
        "song analyzed"
    );
    Ok(analysis)
}

/// Analyze an already-parsed MIDI file.
pub fn analyze_smf(smf: &Smf<'_>, path: &Path) -> Result<SongAnalysis> {
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(..) => {
            return Err(EvochordError::UnsupportedTiming {
                path: path.to_path_buf(),
            });
        }
    };

    let mut tempo_us = DEFAULT_TEMPO_US;
    let mut beats_per_bar = DEFAULT_BEATS_PER_BAR;
    let mut notes = Vec::new();

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick: u32 = 0;
        let mut sounding: BTreeMap<(u8, u8), VecDeque<u32>> = BTreeMap::new();

        for event in track {
            tick = tick.saturating_add(event.delta.as_int());
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => tempo_us = t.as_int(),
                TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, ..)) => {
                    beats_per_bar = u32::from(numerator).max(1);
                }
                TrackEventKind::Midi { channel, message } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        sounding
                            .entry((channel.as_int(), key.as_int()))
                            .or_default()
                            .push_back(tick);
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let start = sounding
                            .get_mut(&(channel.as_int(), key.as_int()))
                            .and_then(VecDeque::pop_front);
                        if let Some(start) = start {
                            notes.push(Note {
                                pitch: key.as_int(),
                                start,
                                end: tick,
                            });
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        for ((_, key), starts) in sounding {
            if !starts.is_empty() {
                debug!(
                    track = track_index,
                    key,
                    count = starts.len(),
                    "closing unterminated notes"
                );
            }
            notes.extend(starts.into_iter().map(|start| Note {
                pitch: key,
                start,
                end: tick,
            }));
        }
    }

    notes.sort_by_key(|n| (n.start, n.pitch));

    let bar_ticks = beats_per_bar * u32::from(ticks_per_beat);
    let bars = group_into_bars(&notes, bar_ticks);
    let total_bars = bars.len();
    let key = detect_key(&notes);

    Ok(SongAnalysis {
        ticks_per_beat,
        tempo_us,
        beats_per_bar,
        notes,
        bars,
        total_bars,
        key,
    })
}

/// Bucket sorted notes by the bar their onset falls in.
fn group_into_bars(notes: &[Note], bar_ticks: u32) -> Vec<Bar> {
    let Some(last) = notes.last() else {
        return Vec::new();
    };
    let bar_ticks = bar_ticks.max(1);
    let count = (last.start / bar_ticks) as usize + 1;
    let mut bars: Vec<Bar> = (0..count)
        .map(|index| Bar {
            index,
            notes: Vec::new(),
        })
        .collect();
    for note in notes {
        bars[(note.start / bar_ticks) as usize].notes.push(*note);
    }
    bars
}
