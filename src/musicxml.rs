//! # MusicXML Output
//!
//! Serializes a [`LeadSheet`] as a single-part `score-partwise` document.
//!
//! ## Layout
//! - `divisions` is the sheet's governing ticks per quarter, so a tick
//!   position maps to a whole number of divisions.
//! - The melody is written as one voice. Gaps become rests, an element that
//!   overlaps the next one is cut at the next onset, notes crossing a barline
//!   are split and tied, and the last measure is padded with a rest.
//! - Each chord becomes a `<harmony>` written just before the note or rest
//!   sounding at its position, with an `<offset>` when it falls inside it.
//!
//! ```text
//! measure 1 (4/4, divisions 480)
//!   <harmony D>            chord at 0
//!   <note D4  480>
//!   <harmony A offset=240> chord at 1.5
//!   <note E4  960>
//!   <note F#4 480 tie>     ──┐ split at the barline
//! measure 2                  │
//!   <note F#4 480 tie>     ──┘
//!   <rest 1440>              padding
//! ```
//!
//! Output is a pure function of the sheet: no timestamps or generated ids.

use crate::error::LeadSheetError;
use crate::harmony::PitchName;
use crate::model::{ChordSymbol, KeySignature, LeadSheet, MelodyKind, TimeSignature};
use std::fs;
use std::path::Path;

/// Convert a LeadSheet to MusicXML format
pub fn to_musicxml(sheet: &LeadSheet) -> String {
    let mut xml = String::new();

    // XML declaration and doctype
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#);
    xml.push('\n');

    xml.push_str(r#"<score-partwise version="4.0">"#);
    xml.push('\n');

    if let Some(title) = &sheet.title {
        xml.push_str("  <work>\n");
        xml.push_str(&format!("    <work-title>{}</work-title>\n", escape_xml(title)));
        xml.push_str("  </work>\n");
    }

    if let Some(composer) = &sheet.composer {
        xml.push_str("  <identification>\n");
        xml.push_str(&format!(
            "    <creator type=\"composer\">{}</creator>\n",
            escape_xml(composer)
        ));
        xml.push_str("  </identification>\n");
    }

    xml.push_str("  <part-list>\n");
    xml.push_str("    <score-part id=\"P1\">\n");
    xml.push_str(&format!(
        "      <part-name>{}</part-name>\n",
        escape_xml(&sheet.part_name)
    ));
    xml.push_str("    </score-part>\n");
    xml.push_str("  </part-list>\n");

    xml.push_str("  <part id=\"P1\">\n");

    let time_signature = sheet.time_signature().unwrap_or_default();
    let key_signature = sheet.key_signature().unwrap_or_default();
    let layout = Layout::build(sheet, &time_signature);

    let mut chords = layout.harmonies.iter().peekable();
    for (i, segments) in layout.measures.iter().enumerate() {
        xml.push_str(&format!("    <measure number=\"{}\">\n", i + 1));

        if i == 0 {
            xml.push_str(&attributes_to_xml(
                sheet.divisions,
                &key_signature,
                &time_signature,
            ));
        }

        for segment in segments {
            while let Some((position, chord)) =
                chords.next_if(|(position, _)| *position < segment.end())
            {
                xml.push_str(&harmony_to_xml(chord, position.saturating_sub(segment.start)));
            }
            xml.push_str(&segment_to_xml(segment, sheet.divisions, key_signature.fifths));
        }

        xml.push_str("    </measure>\n");
    }

    xml.push_str("  </part>\n");
    xml.push_str("</score-partwise>\n");

    xml
}

/// Serialize `sheet` to `path`, creating parent directories as needed.
pub fn write_musicxml(sheet: &LeadSheet, path: &Path) -> Result<(), LeadSheetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| LeadSheetError::io(parent, e))?;
    }
    fs::write(path, to_musicxml(sheet)).map_err(|e| LeadSheetError::io(path, e))
}

/// A stretch of the single melody voice, in divisions.
#[derive(Debug, Clone, PartialEq)]
struct Span {
    start: u64,
    end: u64,
    /// `None` for a rest
    pitches: Option<Vec<u8>>,
}

/// A span cut to fit inside one measure.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    start: u64,
    duration: u64,
    pitches: Option<Vec<u8>>,
    tie_stop: bool,
    tie_start: bool,
}

impl Segment {
    fn end(&self) -> u64 {
        self.start + self.duration
    }
}

struct Layout<'a> {
    measures: Vec<Vec<Segment>>,
    /// Chords with their positions in divisions, in sheet order
    harmonies: Vec<(u64, &'a ChordSymbol)>,
}

impl<'a> Layout<'a> {
    fn build(sheet: &'a LeadSheet, time_signature: &TimeSignature) -> Self {
        let divisions = sheet.divisions;
        let measure_len = match time_signature.measure_divisions(divisions) {
            0 => u64::from(divisions.max(1)) * 4,
            len => len,
        };

        let harmonies: Vec<(u64, &ChordSymbol)> = sheet
            .chords()
            .map(|chord| (to_divisions(chord.offset, divisions), chord))
            .collect();

        let mut spans = voice_spans(sheet);
        let melody_end = spans.last().map_or(0, |span| span.end);
        let chord_end = harmonies.iter().map(|(pos, _)| pos + 1).max().unwrap_or(0);
        let measure_count = melody_end.max(chord_end).div_ceil(measure_len).max(1);
        let total = measure_count * measure_len;
        if melody_end < total {
            spans.push(Span {
                start: melody_end,
                end: total,
                pitches: None,
            });
        }

        let mut measures: Vec<Vec<Segment>> = vec![Vec::new(); measure_count as usize];
        for span in spans {
            let mut start = span.start;
            while start < span.end {
                let measure = start / measure_len;
                let end = span.end.min((measure + 1) * measure_len);
                measures[measure as usize].push(Segment {
                    start,
                    duration: end - start,
                    pitches: span.pitches.clone(),
                    tie_stop: start > span.start,
                    tie_start: end < span.end,
                });
                start = end;
            }
        }

        Self {
            measures,
            harmonies,
        }
    }
}

/// Melody elements as one gap-free, non-overlapping voice.
fn voice_spans(sheet: &LeadSheet) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();

    for element in sheet.melody() {
        let start = to_divisions(element.offset, sheet.divisions);
        let end = to_divisions(element.end(), sheet.divisions);
        if end <= start {
            continue;
        }

        if let Some(last) = spans.last_mut() {
            if last.end > start {
                if start > last.start {
                    last.end = start;
                } else {
                    continue;
                }
            }
        }

        let cursor = spans.last().map_or(0, |span| span.end);
        if start > cursor {
            spans.push(Span {
                start: cursor,
                end: start,
                pitches: None,
            });
        }

        let pitches = match &element.kind {
            MelodyKind::Note { pitches } if !pitches.is_empty() => Some(pitches.clone()),
            _ => None,
        };
        spans.push(Span {
            start,
            end,
            pitches,
        });
    }

    spans
}

fn to_divisions(quarters: f64, divisions: u32) -> u64 {
    (quarters * f64::from(divisions)).round().max(0.0) as u64
}

fn attributes_to_xml(divisions: u32, key: &KeySignature, time: &TimeSignature) -> String {
    let mut xml = String::new();

    xml.push_str("      <attributes>\n");
    xml.push_str(&format!("        <divisions>{}</divisions>\n", divisions));
    xml.push_str("        <key>\n");
    xml.push_str(&format!("          <fifths>{}</fifths>\n", key.fifths));
    xml.push_str(&format!("          <mode>{}</mode>\n", key.mode.musicxml_value()));
    xml.push_str("        </key>\n");
    xml.push_str("        <time>\n");
    xml.push_str(&format!("          <beats>{}</beats>\n", time.beats));
    xml.push_str(&format!("          <beat-type>{}</beat-type>\n", time.beat_type));
    xml.push_str("        </time>\n");
    xml.push_str("        <clef>\n");
    xml.push_str("          <sign>G</sign>\n");
    xml.push_str("          <line>2</line>\n");
    xml.push_str("        </clef>\n");
    xml.push_str("      </attributes>\n");

    xml
}

fn harmony_to_xml(chord: &ChordSymbol, offset: u64) -> String {
    let harmony = &chord.harmony;
    let mut xml = String::new();

    xml.push_str("      <harmony>\n");
    xml.push_str("        <root>\n");
    xml.push_str(&format!("          <root-step>{}</root-step>\n", harmony.root.step));
    if harmony.root.alter != 0 {
        xml.push_str(&format!("          <root-alter>{}</root-alter>\n", harmony.root.alter));
    }
    xml.push_str("        </root>\n");

    xml.push_str(&format!(
        "        <kind text=\"{}\">{}</kind>\n",
        escape_xml(harmony.kind_text()),
        harmony.kind.musicxml_value()
    ));

    if let Some(bass) = &harmony.bass {
        xml.push_str(&bass_to_xml(bass));
    }

    for degree in &harmony.degrees {
        xml.push_str("        <degree>\n");
        xml.push_str(&format!("          <degree-value>{}</degree-value>\n", degree.value));
        xml.push_str(&format!("          <degree-alter>{}</degree-alter>\n", degree.alter));
        xml.push_str(&format!(
            "          <degree-type>{}</degree-type>\n",
            degree.degree_type.musicxml_value()
        ));
        xml.push_str("        </degree>\n");
    }

    if offset > 0 {
        xml.push_str(&format!("        <offset>{}</offset>\n", offset));
    }

    xml.push_str("      </harmony>\n");
    xml
}

fn bass_to_xml(bass: &PitchName) -> String {
    let mut xml = String::new();
    xml.push_str("        <bass>\n");
    xml.push_str(&format!("          <bass-step>{}</bass-step>\n", bass.step));
    if bass.alter != 0 {
        xml.push_str(&format!("          <bass-alter>{}</bass-alter>\n", bass.alter));
    }
    xml.push_str("        </bass>\n");
    xml
}

fn segment_to_xml(segment: &Segment, divisions: u32, fifths: i8) -> String {
    let note_type = note_type(segment.duration, divisions);

    let Some(pitches) = &segment.pitches else {
        let mut xml = String::new();
        xml.push_str("      <note>\n");
        xml.push_str("        <rest/>\n");
        xml.push_str(&format!("        <duration>{}</duration>\n", segment.duration));
        xml.push_str("        <voice>1</voice>\n");
        xml.push_str(&type_to_xml(note_type));
        xml.push_str("      </note>\n");
        return xml;
    };

    let mut xml = String::new();
    for (i, &key) in pitches.iter().enumerate() {
        let (step, alter, octave) = spell_pitch(key, fifths);

        xml.push_str("      <note>\n");
        if i > 0 {
            xml.push_str("        <chord/>\n");
        }

        xml.push_str("        <pitch>\n");
        xml.push_str(&format!("          <step>{}</step>\n", step));
        if alter != 0 {
            xml.push_str(&format!("          <alter>{}</alter>\n", alter));
        }
        xml.push_str(&format!("          <octave>{}</octave>\n", octave));
        xml.push_str("        </pitch>\n");

        xml.push_str(&format!("        <duration>{}</duration>\n", segment.duration));
        if segment.tie_stop {
            xml.push_str("        <tie type=\"stop\"/>\n");
        }
        if segment.tie_start {
            xml.push_str("        <tie type=\"start\"/>\n");
        }
        xml.push_str("        <voice>1</voice>\n");
        xml.push_str(&type_to_xml(note_type));

        if segment.tie_stop || segment.tie_start {
            xml.push_str("        <notations>\n");
            if segment.tie_stop {
                xml.push_str("          <tied type=\"stop\"/>\n");
            }
            if segment.tie_start {
                xml.push_str("          <tied type=\"start\"/>\n");
            }
            xml.push_str("        </notations>\n");
        }

        xml.push_str("      </note>\n");
    }
    xml
}

fn type_to_xml(note_type: Option<(&'static str, bool)>) -> String {
    match note_type {
        Some((name, dotted)) => {
            let mut xml = format!("        <type>{}</type>\n", name);
            if dotted {
                xml.push_str("        <dot/>\n");
            }
            xml
        }
        None => String::new(),
    }
}

/// Note type names with their length in quarter notes (numerator, denominator).
const NOTE_TYPES: &[(&str, u64, u64)] = &[
    ("whole", 4, 1),
    ("half", 2, 1),
    ("quarter", 1, 1),
    ("eighth", 1, 2),
    ("16th", 1, 4),
    ("32nd", 1, 8),
    ("64th", 1, 16),
];

/// The note type (and dot) matching `duration` exactly, if any.
fn note_type(duration: u64, divisions: u32) -> Option<(&'static str, bool)> {
    let divisions = u64::from(divisions);
    NOTE_TYPES.iter().find_map(|&(name, num, den)| {
        if duration * den == divisions * num {
            Some((name, false))
        } else if duration * den * 2 == divisions * num * 3 {
            Some((name, true))
        } else {
            None
        }
    })
}

const SHARP_SPELLING: [(char, i8); 12] = [
    ('C', 0),
    ('C', 1),
    ('D', 0),
    ('D', 1),
    ('E', 0),
    ('F', 0),
    ('F', 1),
    ('G', 0),
    ('G', 1),
    ('A', 0),
    ('A', 1),
    ('B', 0),
];

const FLAT_SPELLING: [(char, i8); 12] = [
    ('C', 0),
    ('D', -1),
    ('D', 0),
    ('E', -1),
    ('E', 0),
    ('F', 0),
    ('G', -1),
    ('G', 0),
    ('A', -1),
    ('A', 0),
    ('B', -1),
    ('B', 0),
];

/// MIDI key to (step, alter, octave); middle C (60) is C4.
fn spell_pitch(key: u8, fifths: i8) -> (char, i8, i32) {
    let table = if fifths < 0 {
        &FLAT_SPELLING
    } else {
        &SHARP_SPELLING
    };
    let (step, alter) = table[usize::from(key % 12)];
    (step, alter, i32::from(key / 12) - 1)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LeadSheetElement, MelodyElement, Mode};

    fn sheet_with(chords: &[(&str, f64)], melody: Vec<MelodyElement>) -> LeadSheet {
        let mut sheet = LeadSheet::new(480);
        sheet.insert(0.0, LeadSheetElement::TimeSignature(TimeSignature::default()));
        for (name, offset) in chords {
            sheet.insert(
                *offset,
                LeadSheetElement::Chord(ChordSymbol::parse(name, *offset).unwrap()),
            );
        }
        for element in melody {
            sheet.insert(element.offset, LeadSheetElement::Melody(element));
        }
        sheet
    }

    #[test]
    fn test_basic_lead_sheet_output() {
        let sheet = sheet_with(&[("D", 0.0)], vec![MelodyElement::note(0.0, 1.0, vec![62])]);
        let xml = to_musicxml(&sheet);

        assert!(xml.contains("<score-partwise"));
        assert!(xml.contains("<divisions>480</divisions>"));
        assert!(xml.contains("<part-name>Lead Sheet</part-name>"));
        assert!(xml.contains("<root-step>D</root-step>"));
        assert!(xml.contains("<kind text=\"\">major</kind>"));
        assert!(xml.contains("<step>D</step>"));
        assert!(xml.contains("<octave>4</octave>"));
        assert!(xml.contains("<type>quarter</type>"));

        // Harmony comes before the note it sounds with
        assert!(xml.find("<harmony>").unwrap() < xml.find("<pitch>").unwrap());
    }

    #[test]
    fn test_last_measure_is_padded() {
        let sheet = sheet_with(&[], vec![MelodyElement::note(0.0, 1.0, vec![60])]);
        let xml = to_musicxml(&sheet);

        assert_eq!(xml.matches("<measure ").count(), 1);
        assert!(xml.contains("<rest/>\n        <duration>1440</duration>"));
        assert!(xml.contains("<type>half</type>\n        <dot/>"));
    }

    #[test]
    fn test_note_across_barline_is_tied() {
        let sheet = sheet_with(
            &[],
            vec![
                MelodyElement::rest(0.0, 3.0),
                MelodyElement::note(3.0, 2.0, vec![66]),
            ],
        );
        let xml = to_musicxml(&sheet);

        assert_eq!(xml.matches("<measure ").count(), 2);
        assert_eq!(xml.matches("<tie type=\"start\"/>").count(), 1);
        assert_eq!(xml.matches("<tie type=\"stop\"/>").count(), 1);
        assert_eq!(xml.matches("<step>F</step>").count(), 2);
        assert!(xml.contains("<alter>1</alter>"));
    }

    #[test]
    fn test_chord_inside_a_note_gets_an_offset() {
        let sheet = sheet_with(
            &[("Dm7/C#", 0.5)],
            vec![MelodyElement::note(0.0, 4.0, vec![62])],
        );
        let xml = to_musicxml(&sheet);

        assert!(xml.contains("<offset>240</offset>"));
        assert!(xml.contains("<kind text=\"m7\">minor-seventh</kind>"));
        assert!(xml.contains("<bass-step>C</bass-step>"));
        assert!(xml.contains("<bass-alter>1</bass-alter>"));
    }

    #[test]
    fn test_chords_past_the_melody_extend_the_score() {
        let sheet = sheet_with(&[("A", 6.0)], vec![MelodyElement::note(0.0, 1.0, vec![69])]);
        let xml = to_musicxml(&sheet);

        assert_eq!(xml.matches("<measure ").count(), 2);
        assert!(xml.contains("<root-step>A</root-step>"));
        assert!(xml.contains("<offset>960</offset>"));
    }

    #[test]
    fn test_degrees_and_multi_pitch_notes() {
        let sheet = sheet_with(
            &[("G#7#9", 0.0)],
            vec![MelodyElement::note(0.0, 4.0, vec![60, 64, 67])],
        );
        let xml = to_musicxml(&sheet);

        assert!(xml.contains("<root-alter>1</root-alter>"));
        assert!(xml.contains("<degree-value>9</degree-value>"));
        assert!(xml.contains("<degree-type>add</degree-type>"));
        assert_eq!(xml.matches("<chord/>").count(), 2);
        assert_eq!(xml.matches("<type>whole</type>").count(), 3);
    }

    #[test]
    fn test_flat_keys_spell_with_flats() {
        let mut sheet = sheet_with(&[], vec![MelodyElement::note(0.0, 1.0, vec![70])]);
        sheet.insert(
            0.0,
            LeadSheetElement::KeySignature(KeySignature {
                fifths: -1,
                mode: Mode::Major,
            }),
        );
        let xml = to_musicxml(&sheet);

        assert!(xml.contains("<fifths>-1</fifths>"));
        assert!(xml.contains("<step>B</step>\n          <alter>-1</alter>"));
    }

    #[test]
    fn test_overlapping_melody_is_truncated() {
        let sheet = sheet_with(
            &[],
            vec![
                MelodyElement::note(0.0, 2.0, vec![60]),
                MelodyElement::note(1.0, 1.0, vec![62]),
            ],
        );
        let xml = to_musicxml(&sheet);
        assert_eq!(xml.matches("<duration>480</duration>").count(), 2);
    }

    #[test]
    fn test_metadata_is_escaped() {
        let mut sheet = sheet_with(&[], Vec::new());
        sheet.title = Some("Night & Day".to_string());
        sheet.composer = Some("Me".to_string());
        let xml = to_musicxml(&sheet);

        assert!(xml.contains("<work-title>Night &amp; Day</work-title>"));
        assert!(xml.contains("<creator type=\"composer\">Me</creator>"));
        assert!(xml.contains("<duration>1920</duration>"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let sheet = sheet_with(&[("D", 0.0)], vec![MelodyElement::note(0.0, 1.5, vec![62])]);
        assert_eq!(to_musicxml(&sheet), to_musicxml(&sheet));
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("nested").join("sheet.musicxml");
        let sheet = sheet_with(&[], Vec::new());

        write_musicxml(&sheet, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), to_musicxml(&sheet));
    }

    #[test]
    fn test_note_type_lookup() {
        assert_eq!(note_type(480, 480), Some(("quarter", false)));
        assert_eq!(note_type(720, 480), Some(("quarter", true)));
        assert_eq!(note_type(1920, 480), Some(("whole", false)));
        assert_eq!(note_type(400, 480), None);
    }
}
