//! # MIDI Event Stream
//!
//! Decodes Standard MIDI Files with `midly` and turns their per-track event
//! lists into one time-ordered stream with absolute tick positions.
//!
//! ## Pipeline
//! ```text
//! bytes ─ Smf::parse ─> per-track TrackEvents
//!       ─ decode_tracks(classify) ─> Vec<Vec<RawEvent<T>>>     (track-local deltas)
//!       ─ merge_tracks ─> Vec<RawEvent<T>>                     (merged-stream deltas)
//!       ─ normalize ─> Vec<TimedEvent<T>>                      (absolute ticks)
//! ```
//!
//! The stages are generic over the payload type `T`. The chord pipeline
//! classifies events into [`EventPayload`]; the melody parser uses its own
//! payload with note and signature events.
//!
//! ## Ordering
//! - `merge_tracks` orders events by absolute tick. Ties keep track order,
//!   then in-track order (a stable sort over tracks concatenated in order).
//! - `normalize` accumulates delta-times in emitted order, so absolute ticks
//!   are monotonically non-decreasing.

use crate::error::{FileRole, LeadSheetError};
use crate::xf::XF_HEADER;
use midly::{MetaMessage, Smf, Timing, TrackEventKind};
use std::path::Path;

/// A decoded message with its delta-time.
///
/// Straight out of [`decode_tracks`] the delta is relative to the previous
/// event of the same track. After [`merge_tracks`] it is relative to the
/// previous event of the merged stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent<T> {
    pub delta: u64,
    pub track: usize,
    /// Position of the event inside its source track
    pub index: usize,
    pub payload: T,
}

/// A message annotated with its absolute tick position.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent<T> {
    pub tick: u64,
    pub track: usize,
    pub index: usize,
    pub payload: T,
}

/// Payload classes that matter for chord extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    SysEx(SysExEvent),
    Text(TextEvent),
    Other,
}

/// A vendor message whose first two bytes equal the XF header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysExEvent {
    pub header: [u8; 2],
    pub event_type: u8,
    pub payload: Vec<u8>,
}

impl SysExEvent {
    /// Build from message data; `None` unless the data carries the XF header
    /// and an event-type byte.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() <= 2 || data[..2] != XF_HEADER {
            return None;
        }
        Some(Self {
            header: [data[0], data[1]],
            event_type: data[2],
            payload: data[3..].to_vec(),
        })
    }

    /// Full message data (header, type byte, payload).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 3);
        bytes.extend_from_slice(&self.header);
        bytes.push(self.event_type);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Meta-event kinds scanned for chord text. Track names are not among them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Text,
    Lyric,
    Marker,
}

impl TextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextKind::Text => "text",
            TextKind::Lyric => "lyrics",
            TextKind::Marker => "marker",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub kind: TextKind,
    pub content: String,
}

/// Parse SMF bytes, tagging failures with the file's role.
pub fn parse_smf<'a>(bytes: &'a [u8], path: &Path, role: FileRole) -> Result<Smf<'a>, LeadSheetError> {
    Smf::parse(bytes).map_err(|e| LeadSheetError::FileParse {
        path: path.to_path_buf(),
        role,
        message: e.to_string(),
    })
}

/// Ticks per quarter note for metrical files.
///
/// `None` for timecode files and for a header declaring zero ticks per
/// quarter, since neither gives a usable timebase.
pub fn ticks_per_quarter(timing: &Timing) -> Option<u16> {
    match timing {
        Timing::Metrical(tpq) => Some(tpq.as_int()).filter(|&tpq| tpq > 0),
        Timing::Timecode(_, _) => None,
    }
}

/// Decode every track, classifying each event's kind into a payload.
pub fn decode_tracks<T>(
    smf: &Smf,
    mut classify: impl FnMut(TrackEventKind<'_>) -> T,
) -> Vec<Vec<RawEvent<T>>> {
    smf.tracks
        .iter()
        .enumerate()
        .map(|(track, events)| {
            events
                .iter()
                .enumerate()
                .map(|(index, event)| RawEvent {
                    delta: u64::from(event.delta.as_int()),
                    track,
                    index,
                    payload: classify(event.kind),
                })
                .collect()
        })
        .collect()
}

/// Classify a track event for chord extraction.
pub fn classify_chord_event(kind: TrackEventKind<'_>) -> EventPayload {
    match kind {
        TrackEventKind::Meta(MetaMessage::SequencerSpecific(data)) => SysExEvent::from_bytes(data)
            .map(EventPayload::SysEx)
            .unwrap_or(EventPayload::Other),
        TrackEventKind::SysEx(data) => {
            let data = data.strip_suffix(&[0xF7]).unwrap_or(data);
            SysExEvent::from_bytes(data)
                .map(EventPayload::SysEx)
                .unwrap_or(EventPayload::Other)
        }
        TrackEventKind::Meta(MetaMessage::Text(bytes)) => text_payload(TextKind::Text, bytes),
        TrackEventKind::Meta(MetaMessage::Lyric(bytes)) => text_payload(TextKind::Lyric, bytes),
        TrackEventKind::Meta(MetaMessage::Marker(bytes)) => text_payload(TextKind::Marker, bytes),
        _ => EventPayload::Other,
    }
}

fn text_payload(kind: TextKind, bytes: &[u8]) -> EventPayload {
    EventPayload::Text(TextEvent {
        kind,
        content: decode_text(bytes),
    })
}

/// Decode meta-event text as UTF-8, falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Merge per-track streams into one stream ordered by absolute tick.
///
/// Returned deltas are relative to the previous event of the merged stream.
pub fn merge_tracks<T>(tracks: Vec<Vec<RawEvent<T>>>) -> Vec<RawEvent<T>> {
    let mut timed: Vec<(u64, RawEvent<T>)> = Vec::new();
    for track in tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta;
            timed.push((tick, event));
        }
    }

    // Stable: ties stay in track order, then in-track order
    timed.sort_by_key(|(tick, _)| *tick);

    let mut previous = 0u64;
    timed
        .into_iter()
        .map(|(tick, mut event)| {
            event.delta = tick - previous;
            previous = tick;
            event
        })
        .collect()
}

/// Annotate a merged stream with absolute tick positions.
pub fn normalize<T>(events: Vec<RawEvent<T>>) -> Vec<TimedEvent<T>> {
    let mut tick = 0u64;
    events
        .into_iter()
        .map(|event| {
            tick += event.delta;
            TimedEvent {
                tick,
                track: event.track,
                index: event.index,
                payload: event.payload,
            }
        })
        .collect()
}
