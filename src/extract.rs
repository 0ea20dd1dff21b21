//! # Chord Extraction
//!
//! Walks the merged event stream of a chord file and collects every chord it
//! can recognize, positioned in quarter notes of the governing resolution.
//!
//! ## Recognizers
//! Each event is offered to an ordered list of [`ChordRecognizer`]s and the
//! first one returning a name wins:
//!
//! ```text
//! TimedEvent ─> XfRecognizer ──(None)──> TextRecognizer ──(None)──> skipped
//!                   │ Some(name)             │ Some(name)
//!                   └──────────┬─────────────┘
//!                       ChordSymbol { name, offset = tick / governing TPQ }
//! ```
//!
//! A name that resolves but does not validate as a chord symbol is skipped
//! with a warning. Unknown XF keys and non-chord text are plain misses.
//!
//! ## Debug Tracing
//! With debug enabled (check mode) every XF event and every non-empty text
//! annotation is reported with its tick, at `info` level.

use crate::events::{
    classify_chord_event, decode_tracks, merge_tracks, normalize, ticks_per_quarter, EventPayload,
    TimedEvent,
};
use crate::model::ChordSymbol;
use crate::text::{scan_text, TextScan};
use crate::xf::{decode_chord, hex_dump, ChordByteKey, ChordTable};
use midly::Smf;
use tracing::{info, warn};

/// One way of turning an event into a chord name.
pub trait ChordRecognizer {
    fn recognize(&self, event: &TimedEvent<EventPayload>, debug: bool) -> Option<String>;
}

/// Yamaha XF chord meta events, looked up in a [`ChordTable`].
pub struct XfRecognizer<'t> {
    table: &'t ChordTable,
}

impl<'t> XfRecognizer<'t> {
    pub fn new(table: &'t ChordTable) -> Self {
        Self { table }
    }
}

impl ChordRecognizer for XfRecognizer<'_> {
    fn recognize(&self, event: &TimedEvent<EventPayload>, debug: bool) -> Option<String> {
        let EventPayload::SysEx(sysex) = &event.payload else {
            return None;
        };

        if debug {
            let data = sysex.to_bytes();
            let id = format!("{:02X}", sysex.event_type);
            info!(
                tick = event.tick,
                id = %id,
                len = data.len(),
                data = %hex_dump(&data),
                "Found XF meta event"
            );
        }

        let name = decode_chord(sysex, self.table)?;
        if debug {
            let bytes = ChordByteKey::from_payload(&sysex.payload)
                .map(|key| hex_dump(key.as_bytes()))
                .unwrap_or_default();
            info!(tick = event.tick, bytes = %bytes, chord = name, "Parsed XF chord bytes");
        }
        Some(name.to_string())
    }
}

/// Chord names written as text, lyric or marker annotations.
pub struct TextRecognizer;

impl ChordRecognizer for TextRecognizer {
    fn recognize(&self, event: &TimedEvent<EventPayload>, debug: bool) -> Option<String> {
        let EventPayload::Text(text) = &event.payload else {
            return None;
        };

        let content = text.content.trim();
        if debug && !content.is_empty() {
            info!(tick = event.tick, kind = text.kind.as_str(), text = content, "Found text");
        }

        match scan_text(content) {
            TextScan::Chord(harmony) => Some(harmony.text),
            TextScan::Rejected { candidate, error } => {
                if debug {
                    info!(candidate = %candidate, reason = %error, "Text looked like a chord but failed to parse");
                }
                None
            }
            TextScan::NoCandidate => None,
        }
    }
}

/// Drives the recognizers over a chord file.
pub struct ChordExtractor<'t> {
    recognizers: Vec<Box<dyn ChordRecognizer + 't>>,
    debug: bool,
}

impl<'t> ChordExtractor<'t> {
    /// XF first, then text.
    pub fn new(table: &'t ChordTable) -> Self {
        Self::with_recognizers(vec![
            Box::new(XfRecognizer::new(table)),
            Box::new(TextRecognizer),
        ])
    }

    pub fn with_recognizers(recognizers: Vec<Box<dyn ChordRecognizer + 't>>) -> Self {
        Self {
            recognizers,
            debug: false,
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Name from the first recognizer that accepts the event.
    pub fn recognize(&self, event: &TimedEvent<EventPayload>) -> Option<String> {
        self.recognizers
            .iter()
            .find_map(|recognizer| recognizer.recognize(event, self.debug))
    }

    /// Extract chords from a decoded file, timing them with `governing_tpq`.
    pub fn extract(&self, smf: &Smf, governing_tpq: u16) -> Vec<ChordSymbol> {
        let native_tpq = ticks_per_quarter(&smf.header.timing);
        if native_tpq != Some(governing_tpq) {
            match native_tpq {
                Some(native) => warn!(
                    melody_tpq = governing_tpq,
                    chord_tpq = native,
                    "TPQ mismatch; using the melody file's TPQ for timing"
                ),
                None => warn!(
                    melody_tpq = governing_tpq,
                    "Chord file has no ticks-per-quarter resolution; using the melody file's TPQ for timing"
                ),
            }
        }

        let events = normalize(merge_tracks(decode_tracks(smf, classify_chord_event)));
        self.extract_events(&events, governing_tpq)
    }

    /// Extract chords from an already normalized stream.
    pub fn extract_events(
        &self,
        events: &[TimedEvent<EventPayload>],
        governing_tpq: u16,
    ) -> Vec<ChordSymbol> {
        let mut chords = Vec::new();
        for event in events {
            let Some(name) = self.recognize(event) else {
                continue;
            };
            let offset = tick_to_offset(event.tick, governing_tpq);
            match ChordSymbol::parse(&name, offset) {
                Ok(chord) => chords.push(chord),
                Err(e) => warn!(chord = %name, error = %e, "Could not create chord from text"),
            }
        }

        info!("Scanned MIDI data and found {} chord symbols.", chords.len());
        chords
    }
}

/// Absolute ticks to quarter notes.
pub fn tick_to_offset(tick: u64, ticks_per_quarter: u16) -> f64 {
    tick as f64 / f64::from(ticks_per_quarter.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SysExEvent, TextEvent, TextKind};
    use crate::xf::{XF_CHORD_ID, XF_HEADER, XF_LYRIC_ID};

    fn xf_event(tick: u64, event_type: u8, payload: &[u8]) -> TimedEvent<EventPayload> {
        TimedEvent {
            tick,
            track: 0,
            index: 0,
            payload: EventPayload::SysEx(SysExEvent {
                header: XF_HEADER,
                event_type,
                payload: payload.to_vec(),
            }),
        }
    }

    fn text_event(tick: u64, kind: TextKind, content: &str) -> TimedEvent<EventPayload> {
        TimedEvent {
            tick,
            track: 0,
            index: 0,
            payload: EventPayload::Text(TextEvent {
                kind,
                content: content.to_string(),
            }),
        }
    }

    #[test]
    fn test_offset_uses_governing_resolution() {
        assert_eq!(tick_to_offset(960, 480), 2.0);
        assert_eq!(tick_to_offset(0, 480), 0.0);
        assert_eq!(tick_to_offset(240, 96), 2.5);
    }

    #[test]
    fn test_mixed_stream() {
        let table = ChordTable::builtin();
        let extractor = ChordExtractor::new(table);
        let events = vec![
            xf_event(0, XF_CHORD_ID, &[0x32, 0x00, 0x7F]),
            text_event(480, TextKind::Marker, "intro"),
            xf_event(960, XF_LYRIC_ID, &[0x32, 0x00]),
            text_event(960, TextKind::Lyric, "Gm7 riff"),
            xf_event(1440, XF_CHORD_ID, &[0x11, 0x11]),
            TimedEvent {
                tick: 1600,
                track: 0,
                index: 0,
                payload: EventPayload::Other,
            },
            xf_event(1920, XF_CHORD_ID, &[0x23, 0x00, 0x35]),
        ];

        let chords = extractor.extract_events(&events, 480);
        let found: Vec<(&str, f64)> = chords.iter().map(|c| (c.name.as_str(), c.offset)).collect();
        assert_eq!(found, vec![("D", 0.0), ("Gm7", 2.0), ("D#/G#", 4.0)]);
    }

    #[test]
    fn test_invalid_table_name_is_skipped() {
        let mut table = ChordTable::empty();
        table.insert(ChordByteKey::Pair([0x11, 0x00]), "X7");
        let extractor = ChordExtractor::new(&table);

        let events = vec![xf_event(0, XF_CHORD_ID, &[0x11, 0x00])];
        assert!(extractor.extract_events(&events, 480).is_empty());
    }

    struct Always(&'static str);

    impl ChordRecognizer for Always {
        fn recognize(&self, _: &TimedEvent<EventPayload>, _: bool) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn test_first_recognizer_wins() {
        let table = ChordTable::builtin();
        let extractor = ChordExtractor::with_recognizers(vec![
            Box::new(XfRecognizer::new(table)),
            Box::new(Always("Am")),
        ]);

        let known = xf_event(0, XF_CHORD_ID, &[0x32, 0x00]);
        assert_eq!(extractor.recognize(&known).as_deref(), Some("D"));

        let unknown = xf_event(0, XF_CHORD_ID, &[0x11, 0x11]);
        assert_eq!(extractor.recognize(&unknown).as_deref(), Some("Am"));
    }

    #[test]
    fn test_debug_does_not_change_results() {
        let table = ChordTable::builtin();
        let events = vec![
            xf_event(0, XF_CHORD_ID, &[0x32, 0x00]),
            text_event(480, TextKind::Text, "C_ riff"),
            text_event(960, TextKind::Text, "F"),
        ];
        let plain = ChordExtractor::new(table).extract_events(&events, 480);
        let debug = ChordExtractor::new(table).debug(true).extract_events(&events, 480);
        assert_eq!(plain, debug);
        assert_eq!(plain.len(), 2);
    }
}
