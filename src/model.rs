//! # Lead Sheet Types
//!
//! In-memory form of a lead sheet: metadata, chord symbols and melody
//! elements, each positioned by an offset in quarter notes.
//!
//! ## Type Hierarchy
//! ```text
//! LeadSheet
//!   ├── divisions (governing ticks per quarter)
//!   ├── title / composer / part_name
//!   └── Vec<Positioned>            (non-decreasing offsets)
//!         ├── offset: f64
//!         └── LeadSheetElement
//!               ├── TimeSignature
//!               ├── KeySignature
//!               ├── Chord(ChordSymbol)       name, offset, parsed Harmony
//!               └── Melody(MelodyElement)    Note { pitches } | Rest, duration
//! ```
//!
//! ## Insertion Order
//! [`LeadSheet::insert`] keeps elements sorted by offset. An element inserted
//! at an offset already in use goes after the elements already there, so
//! elements sharing an offset stay in insertion order.

use crate::harmony::{Harmony, HarmonyError};

/// Part name used when none is configured.
pub const DEFAULT_PART_NAME: &str = "Lead Sheet";

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Measure length in divisions (`divisions` per quarter note).
    pub fn measure_divisions(&self, divisions: u32) -> u64 {
        let beat_type = u64::from(self.beat_type.max(1));
        u64::from(self.beats) * u64::from(divisions) * 4 / beat_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl Mode {
    pub fn musicxml_value(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeySignature {
    pub fifths: i8, // -7 to +7 (flats to sharps)
    pub mode: Mode,
}

/// A recognized chord at a position in quarter notes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordSymbol {
    pub name: String,
    pub offset: f64,
    pub harmony: Harmony,
}

impl ChordSymbol {
    /// Validate `name` and position it at `offset`.
    pub fn parse(name: &str, offset: f64) -> Result<Self, HarmonyError> {
        let harmony = Harmony::parse(name)?;
        Ok(Self {
            name: harmony.text.clone(),
            offset,
            harmony,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MelodyKind {
    /// One or more MIDI key numbers sounding together, ascending
    Note { pitches: Vec<u8> },
    Rest,
}

/// A note or rest of the melody, in quarter notes.
#[derive(Debug, Clone, PartialEq)]
pub struct MelodyElement {
    pub offset: f64,
    pub duration: f64,
    pub kind: MelodyKind,
}

impl MelodyElement {
    pub fn note(offset: f64, duration: f64, pitches: Vec<u8>) -> Self {
        Self {
            offset,
            duration,
            kind: MelodyKind::Note { pitches },
        }
    }

    pub fn rest(offset: f64, duration: f64) -> Self {
        Self {
            offset,
            duration,
            kind: MelodyKind::Rest,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, MelodyKind::Rest)
    }

    pub fn end(&self) -> f64 {
        self.offset + self.duration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeadSheetElement {
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    Chord(ChordSymbol),
    Melody(MelodyElement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Positioned {
    pub offset: f64,
    pub element: LeadSheetElement,
}

/// The merged, offset-ordered lead sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadSheet {
    /// Divisions per quarter note (the governing ticks per quarter)
    pub divisions: u32,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub part_name: String,
    elements: Vec<Positioned>,
}

impl LeadSheet {
    pub fn new(divisions: u32) -> Self {
        Self {
            divisions,
            title: None,
            composer: None,
            part_name: DEFAULT_PART_NAME.to_string(),
            elements: Vec::new(),
        }
    }

    /// Insert at `offset`, after any elements already at that offset.
    pub fn insert(&mut self, offset: f64, element: LeadSheetElement) {
        let offset = offset.max(0.0);
        let at = self.elements.partition_point(|e| e.offset <= offset);
        self.elements.insert(at, Positioned { offset, element });
    }

    pub fn elements(&self) -> &[Positioned] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn chords(&self) -> impl Iterator<Item = &ChordSymbol> {
        self.elements.iter().filter_map(|p| match &p.element {
            LeadSheetElement::Chord(chord) => Some(chord),
            _ => None,
        })
    }

    pub fn melody(&self) -> impl Iterator<Item = &MelodyElement> {
        self.elements.iter().filter_map(|p| match &p.element {
            LeadSheetElement::Melody(element) => Some(element),
            _ => None,
        })
    }

    /// First time signature in the sheet.
    pub fn time_signature(&self) -> Option<TimeSignature> {
        self.elements.iter().find_map(|p| match p.element {
            LeadSheetElement::TimeSignature(ts) => Some(ts),
            _ => None,
        })
    }

    /// First key signature in the sheet.
    pub fn key_signature(&self) -> Option<KeySignature> {
        self.elements.iter().find_map(|p| match p.element {
            LeadSheetElement::KeySignature(ks) => Some(ks),
            _ => None,
        })
    }
}
