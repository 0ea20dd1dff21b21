//! # Melody Parsing
//!
//! Turns the melody MIDI file into per-channel parts of notes and rests.
//!
//! ## Steps
//! 1. Decode the file; its ticks-per-quarter becomes the governing resolution.
//! 2. Pair note-on/note-off per track, keyed by (channel, key). A note-on with
//!    velocity 0 is a note-off. Repeated note-ons stack and close
//!    last-in-first-out. Notes left open close at the track's final tick.
//! 3. Group notes by channel into parts. Every part gets the first time and
//!    key signature of the merged stream.
//! 4. Quantize each part to a grid, merge notes that start together into one
//!    element, truncate overlaps and fill gaps with rests.
//!
//! ```text
//! grid units:  0   1   2   3   4   5   6
//! notes:           [60 ]   [62     ]
//!                  [64     ]              same onset, merged: {60, 64} len 2
//! elements:    [R ][60,64 ][62     ]      rest fills the leading gap
//! ```

use crate::error::{FileRole, LeadSheetError};
use crate::events::{
    decode_tracks, merge_tracks, normalize, parse_smf, ticks_per_quarter, RawEvent,
};
use crate::model::{KeySignature, MelodyElement, Mode, TimeSignature};
use midly::{MetaMessage, MidiMessage, TrackEventKind};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Grid divisions per quarter note used when nothing else is configured.
pub const DEFAULT_QUANTIZE: u32 = 12;
/// Finest configurable grid.
pub const MAX_QUANTIZE: u32 = 960;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MelodyEvent {
    NoteOn { channel: u8, key: u8 },
    NoteOff { channel: u8, key: u8 },
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    Other,
}

fn classify_melody_event(kind: TrackEventKind<'_>) -> MelodyEvent {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => MelodyEvent::NoteOn {
                    channel,
                    key: key.as_int(),
                },
                // vel=0 NoteOn is NoteOff
                MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                    MelodyEvent::NoteOff {
                        channel,
                        key: key.as_int(),
                    }
                }
                _ => MelodyEvent::Other,
            }
        }
        TrackEventKind::Meta(MetaMessage::TimeSignature(beats, denom_pow, _, _)) => {
            match 1u8.checked_shl(u32::from(denom_pow)) {
                Some(beat_type) if beats > 0 => {
                    MelodyEvent::TimeSignature(TimeSignature { beats, beat_type })
                }
                _ => MelodyEvent::Other,
            }
        }
        TrackEventKind::Meta(MetaMessage::KeySignature(fifths, minor)) => {
            MelodyEvent::KeySignature(KeySignature {
                fifths,
                mode: if minor { Mode::Minor } else { Mode::Major },
            })
        }
        _ => MelodyEvent::Other,
    }
}

/// A paired note in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimedNote {
    channel: u8,
    key: u8,
    start: u64,
    end: u64,
}

/// The notes and rests played on one MIDI channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MelodyPart {
    /// Raw channel nibble (0-15)
    pub channel: u8,
    pub time_signature: Option<TimeSignature>,
    pub key_signature: Option<KeySignature>,
    pub elements: Vec<MelodyElement>,
}

/// A parsed melody file.
#[derive(Debug, Clone, PartialEq)]
pub struct MelodyFile {
    pub ticks_per_quarter: u16,
    /// Ascending by channel
    pub parts: Vec<MelodyPart>,
}

impl MelodyFile {
    /// Parse melody bytes, quantizing to `quantize` divisions per quarter
    /// (0 keeps the file's own ticks).
    pub fn parse(bytes: &[u8], path: &Path, quantize: u32) -> Result<Self, LeadSheetError> {
        let smf = parse_smf(bytes, path, FileRole::Melody)?;
        let tpq = ticks_per_quarter(&smf.header.timing).ok_or_else(|| {
            LeadSheetError::UnsupportedTiming {
                path: path.to_path_buf(),
            }
        })?;

        let tracks = decode_tracks(&smf, classify_melody_event);
        let notes = pair_notes(&tracks);

        let stream = normalize(merge_tracks(tracks));
        let time_signature = stream.iter().find_map(|e| match e.payload {
            MelodyEvent::TimeSignature(ts) => Some(ts),
            _ => None,
        });
        let key_signature = stream.iter().find_map(|e| match e.payload {
            MelodyEvent::KeySignature(ks) => Some(ks),
            _ => None,
        });

        let mut by_channel: BTreeMap<u8, Vec<TimedNote>> = BTreeMap::new();
        for note in notes {
            by_channel.entry(note.channel).or_default().push(note);
        }

        let grid = if quantize == 0 { u64::from(tpq) } else { u64::from(quantize) };
        let parts = by_channel
            .into_iter()
            .map(|(channel, notes)| MelodyPart {
                channel,
                time_signature,
                key_signature,
                elements: build_elements(&notes, u64::from(tpq), grid),
            })
            .collect();

        Ok(Self {
            ticks_per_quarter: tpq,
            parts,
        })
    }

    /// The part on `channel`, if the file has notes there.
    pub fn find_part(&self, channel: u8) -> Option<&MelodyPart> {
        self.parts.iter().find(|part| part.channel == channel)
    }
}

fn pair_notes(tracks: &[Vec<RawEvent<MelodyEvent>>]) -> Vec<TimedNote> {
    let mut notes = Vec::new();

    for track in tracks {
        let mut tick = 0u64;
        // Map (channel, key) -> stacked onset ticks
        let mut pending: HashMap<(u8, u8), Vec<u64>> = HashMap::new();

        for event in track {
            tick += event.delta;
            match event.payload {
                MelodyEvent::NoteOn { channel, key } => {
                    pending.entry((channel, key)).or_default().push(tick);
                }
                MelodyEvent::NoteOff { channel, key } => {
                    if let Some(start) = pending.get_mut(&(channel, key)).and_then(Vec::pop) {
                        notes.push(TimedNote {
                            channel,
                            key,
                            start,
                            end: tick,
                        });
                    }
                }
                _ => {}
            }
        }

        for ((channel, key), stack) in pending {
            for start in stack {
                notes.push(TimedNote {
                    channel,
                    key,
                    start,
                    end: tick,
                });
            }
        }
    }

    notes
}

/// Ticks to grid units, rounding half up. `tpq` is non-zero.
fn to_grid(tick: u64, tpq: u64, grid: u64) -> u64 {
    let (tick, tpq, grid) = (u128::from(tick), u128::from(tpq), u128::from(grid));
    let units = (tick * grid * 2 + tpq) / (tpq * 2);
    u64::try_from(units).unwrap_or(u64::MAX)
}

/// Quantize, merge shared onsets, truncate overlaps and fill gaps.
fn build_elements(notes: &[TimedNote], tpq: u64, grid: u64) -> Vec<MelodyElement> {
    // onset -> (pitches, end), all in grid units
    let mut onsets: BTreeMap<u64, (Vec<u8>, u64)> = BTreeMap::new();
    for note in notes {
        let start = to_grid(note.start, tpq, grid);
        let end = to_grid(note.end, tpq, grid).max(start.saturating_add(1));
        let (pitches, group_end) = onsets.entry(start).or_insert_with(|| (Vec::new(), end));
        if !pitches.contains(&note.key) {
            pitches.push(note.key);
        }
        *group_end = (*group_end).max(end);
    }

    let quarters = |units: u64| units as f64 / grid as f64;
    let starts: Vec<u64> = onsets.keys().copied().collect();
    let mut elements = Vec::new();
    let mut cursor = 0u64;

    for (i, (start, (mut pitches, end))) in onsets.into_iter().enumerate() {
        if start > cursor {
            elements.push(MelodyElement::rest(quarters(cursor), quarters(start - cursor)));
        }
        let end = match starts.get(i + 1) {
            Some(&next) => end.min(next),
            None => end,
        };
        pitches.sort_unstable();
        elements.push(MelodyElement::note(
            quarters(start),
            quarters(end - start),
            pitches,
        ));
        cursor = end;
    }

    elements
}
