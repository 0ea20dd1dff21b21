//! # XF Chord Decoding
//!
//! Yamaha XF files carry chord names as sequencer-specific meta events:
//!
//! ```text
//! FF 7F <len> 43 7B <id> <payload...>
//!             └─┬─┘  │
//!          XF header └─ event type (01 = chord, 20 = lyric, 21 = ruby)
//! ```
//!
//! Only chord events are decoded here. Separator bytes (`7F`) are removed
//! from the payload and the remaining 2 or 3 bytes are looked up in a table
//! that was built by reverse-engineering real files. The table is incomplete,
//! so a key it does not know is "no chord", never an error.

use crate::events::SysExEvent;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Vendor (Yamaha) and XF sub-id bytes opening every XF meta event.
pub const XF_HEADER: [u8; 2] = [0x43, 0x7B];
/// Event type carrying a chord name.
pub const XF_CHORD_ID: u8 = 0x01;
/// Event type carrying lyrics. Not decoded as chords.
pub const XF_LYRIC_ID: u8 = 0x20;
/// Event type carrying ruby (reading aid) text. Not decoded as chords.
pub const XF_RUBY_ID: u8 = 0x21;
/// Separator/terminator byte stripped from chord payloads.
pub const XF_SEPARATOR: u8 = 0x7F;

/// Chord payload bytes with separators removed.
///
/// 2-byte and 3-byte keys are distinct: `(0x23, 0x00)` and
/// `(0x23, 0x00, 0x35)` never match each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordByteKey {
    Pair([u8; 2]),
    Triple([u8; 3]),
}

impl ChordByteKey {
    /// Key for bytes that are already free of separators. Other lengths have no key.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [a, b] => Some(ChordByteKey::Pair([a, b])),
            [a, b, c] => Some(ChordByteKey::Triple([a, b, c])),
            _ => None,
        }
    }

    /// Strip separator bytes from a chord payload and build its key.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let bytes: Vec<u8> = payload
            .iter()
            .copied()
            .filter(|&b| b != XF_SEPARATOR)
            .collect();
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ChordByteKey::Pair(bytes) => bytes.as_slice(),
            ChordByteKey::Triple(bytes) => bytes.as_slice(),
        }
    }
}

/// Built-in chord table.
///
/// (0x34, 0x00, 0x23) and (0x52, 0x00, 0x23) both read "Fm/D#", as do the
/// matching add9 pair. Both encodings have been seen in the wild and are kept.
const BUILTIN_CHORDS: &[(&[u8], &str)] = &[
    (&[0x31, 0x22], "C#m7"),
    (&[0x26, 0x02], "Fm7"),
    (&[0x27, 0x13], "F#add9"),
    (&[0x35, 0x0A], "G#7#9"),
    (&[0x31, 0x08], "C#sus4"),
    (&[0x35, 0x13], "G#add9"),
    (&[0x23, 0x13], "D#add9"),
    (&[0x23, 0x00], "D#"),
    (&[0x27, 0x00], "F#"),
    (&[0x23, 0x13, 0x27], "D#add9/F#"),
    (&[0x23, 0x00, 0x35], "D#/G#"),
    (&[0x27, 0x0A], "F#7#9"),
    (&[0x26, 0x00], "Fm"),
    (&[0x35, 0x13, 0x37], "G#add9/A#"),
    (&[0x31, 0x0A], "C#7#9"),
    (&[0x27, 0x0A, 0x22], "F#7#9/C#"),
    (&[0x35, 0x00], "G#"),
    (&[0x35, 0x00, 0x37], "G#/A#"),
    (&[0x27, 0x08], "F#sus4"),
    (&[0x35, 0x02], "G#m7"),
    (&[0x36, 0x13], "Aadd9"),
    (&[0x44, 0x0A], "E7#9"),
    (&[0x37, 0x08], "A#sus4"),
    (&[0x32, 0x13, 0x31], "Dm7/C#"),
    (&[0x32, 0x00], "D"),
    (&[0x45, 0x00], "F"),
    (&[0x36, 0x00], "A"),
    (&[0x27, 0x02], "F#m7"),
    (&[0x34, 0x00, 0x23], "Fm/D#"),
    (&[0x34, 0x00], "Fm"),
    (&[0x31, 0x00], "C#"),
    (&[0x36, 0x13, 0x41], "Aadd9/C#"),
    (&[0x34, 0x13, 0x23], "Fmadd9/D#"),
    (&[0x23, 0x13, 0x22], "D#add9/C#"),
    (&[0x23, 0x00, 0x27], "D#/F#"),
    (&[0x44, 0x13], "Eadd9"),
    (&[0x32, 0x08], "Dsus4"),
    (&[0x31, 0x13], "C#add9"),
    (&[0x36, 0x0A], "A7#9"),
    (&[0x32, 0x0A], "D7#9"),
    (&[0x52, 0x00, 0x23], "Fm/D#"),
    (&[0x52, 0x13, 0x23], "Fmadd9/D#"),
];

static BUILTIN_TABLE: Lazy<ChordTable> = Lazy::new(|| {
    let mut table = ChordTable::empty();
    for (bytes, name) in BUILTIN_CHORDS {
        if let Some(key) = ChordByteKey::from_bytes(bytes) {
            table.insert(key, name);
        }
    }
    table
});

/// Immutable mapping from chord byte keys to chord names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChordTable {
    entries: HashMap<ChordByteKey, String>,
}

impl ChordTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The process-wide built-in table, initialized once on first use.
    pub fn builtin() -> &'static ChordTable {
        &BUILTIN_TABLE
    }

    /// Built-in table extended (and overridden) by extra entries.
    pub fn with_extra<'a>(extra: impl IntoIterator<Item = (ChordByteKey, &'a str)>) -> Self {
        let mut table = Self::builtin().clone();
        for (key, name) in extra {
            table.insert(key, name);
        }
        table
    }

    pub fn insert(&mut self, key: ChordByteKey, name: &str) {
        self.entries.insert(key, name.to_string());
    }

    /// Exact lookup; no prefix or partial matching.
    pub fn get(&self, key: &ChordByteKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChordByteKey, &str)> {
        self.entries.iter().map(|(key, name)| (key, name.as_str()))
    }
}

/// Resolve an XF event to a chord name.
///
/// Returns `None` for foreign headers, non-chord event types, payloads made
/// only of separators, and keys missing from the table.
pub fn decode_chord<'t>(event: &SysExEvent, table: &'t ChordTable) -> Option<&'t str> {
    if event.header != XF_HEADER || event.event_type != XF_CHORD_ID {
        return None;
    }
    let key = ChordByteKey::from_payload(&event.payload)?;
    table.get(&key)
}

/// Space separated upper-case hex dump, e.g. `43 7B 01`.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmony::Harmony;

    fn chord_event(payload: &[u8]) -> SysExEvent {
        SysExEvent {
            header: XF_HEADER,
            event_type: XF_CHORD_ID,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_every_builtin_key_decodes_to_its_name() {
        let table = ChordTable::builtin();
        for (bytes, name) in BUILTIN_CHORDS {
            let event = chord_event(bytes);
            assert_eq!(decode_chord(&event, table), Some(*name), "bytes {:02X?}", bytes);
        }
    }

    #[test]
    fn test_separators_are_stripped() {
        let table = ChordTable::builtin();
        let event = chord_event(&[0x32, 0x00, 0x7F, 0x7F]);
        assert_eq!(decode_chord(&event, table), Some("D"));

        let event = chord_event(&[0x7F, 0x23, 0x7F, 0x00, 0x35, 0x7F]);
        assert_eq!(decode_chord(&event, table), Some("D#/G#"));
    }

    #[test]
    fn test_arity_matters() {
        let table = ChordTable::builtin();
        assert_eq!(decode_chord(&chord_event(&[0x23, 0x00]), table), Some("D#"));
        assert_eq!(decode_chord(&chord_event(&[0x23, 0x00, 0x35]), table), Some("D#/G#"));
        // Leading bytes of a known triple are not a pair entry
        assert_eq!(decode_chord(&chord_event(&[0x52, 0x00]), table), None);
    }

    #[test]
    fn test_separator_only_payload_is_no_chord() {
        let table = ChordTable::builtin();
        for len in 0..6 {
            let payload = vec![XF_SEPARATOR; len];
            assert_eq!(decode_chord(&chord_event(&payload), table), None);
        }
    }

    #[test]
    fn test_unknown_bytes_are_no_chord() {
        let table = ChordTable::builtin();
        assert_eq!(decode_chord(&chord_event(&[0x11]), table), None);
        assert_eq!(decode_chord(&chord_event(&[0x11, 0x11]), table), None);
        assert_eq!(decode_chord(&chord_event(&[0x11, 0x11, 0x11]), table), None);
        assert_eq!(decode_chord(&chord_event(&[0x32, 0x00, 0x01, 0x02]), table), None);
    }

    #[test]
    fn test_non_chord_event_types_are_ignored() {
        let table = ChordTable::builtin();
        for id in [XF_LYRIC_ID, XF_RUBY_ID, 0x02] {
            let event = SysExEvent {
                header: XF_HEADER,
                event_type: id,
                payload: vec![0x32, 0x00],
            };
            assert_eq!(decode_chord(&event, table), None);
        }

        let foreign = SysExEvent {
            header: [0x41, 0x10],
            event_type: XF_CHORD_ID,
            payload: vec![0x32, 0x00],
        };
        assert_eq!(decode_chord(&foreign, table), None);
    }

    #[test]
    fn test_duplicate_encodings_agree() {
        let table = ChordTable::builtin();
        assert_eq!(table.get(&ChordByteKey::Triple([0x34, 0x00, 0x23])), Some("Fm/D#"));
        assert_eq!(table.get(&ChordByteKey::Triple([0x52, 0x00, 0x23])), Some("Fm/D#"));
        assert_eq!(table.len(), BUILTIN_CHORDS.len());
    }

    #[test]
    fn test_extra_entries_extend_and_override() {
        let table = ChordTable::with_extra(vec![
            (ChordByteKey::Pair([0x11, 0x00]), "C"),
            (ChordByteKey::Pair([0x32, 0x00]), "Dmaj7"),
        ]);
        assert_eq!(table.get(&ChordByteKey::Pair([0x11, 0x00])), Some("C"));
        assert_eq!(table.get(&ChordByteKey::Pair([0x32, 0x00])), Some("Dmaj7"));
        // The shared table is untouched
        assert_eq!(ChordTable::builtin().get(&ChordByteKey::Pair([0x32, 0x00])), Some("D"));
    }

    #[test]
    fn test_builtin_names_are_valid_chord_symbols() {
        for (_, name) in ChordTable::builtin().iter() {
            assert!(Harmony::parse(name).is_ok(), "{} should parse", name);
        }
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x43, 0x7B, 0x01, 0x0A]), "43 7B 01 0A");
        assert_eq!(hex_dump(&[]), "");
    }
}
