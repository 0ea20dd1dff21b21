//! Lead-sheet merge: signatures at offset 0, then chords, then the melody.

use crate::melody::MelodyPart;
use crate::model::{ChordSymbol, LeadSheet, LeadSheetElement};

/// Combine chords and a melody part into one offset-ordered lead sheet.
///
/// Elements keep the offsets they arrive with. At a shared offset the
/// insertion order is time signature, key signature, chords, melody.
pub fn merge_lead_sheet(divisions: u32, chords: &[ChordSymbol], melody: &MelodyPart) -> LeadSheet {
    let mut sheet = LeadSheet::new(divisions);

    if let Some(ts) = melody.time_signature {
        sheet.insert(0.0, LeadSheetElement::TimeSignature(ts));
    }
    if let Some(ks) = melody.key_signature {
        sheet.insert(0.0, LeadSheetElement::KeySignature(ks));
    }
    for chord in chords {
        sheet.insert(chord.offset, LeadSheetElement::Chord(chord.clone()));
    }
    for element in &melody.elements {
        sheet.insert(element.offset, LeadSheetElement::Melody(element.clone()));
    }

    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KeySignature, MelodyElement, TimeSignature};
    use pretty_assertions::assert_eq;

    fn part(elements: Vec<MelodyElement>) -> MelodyPart {
        MelodyPart {
            channel: 1,
            time_signature: Some(TimeSignature::default()),
            key_signature: Some(KeySignature::default()),
            elements,
        }
    }

    #[test]
    fn test_merge_interleaves_by_offset() {
        let chords = vec![
            ChordSymbol::parse("D", 0.0).unwrap(),
            ChordSymbol::parse("A", 2.0).unwrap(),
        ];
        let melody = part(vec![
            MelodyElement::note(0.0, 1.0, vec![62]),
            MelodyElement::note(1.0, 1.0, vec![64]),
            MelodyElement::note(2.0, 2.0, vec![66]),
        ]);

        let sheet = merge_lead_sheet(480, &chords, &melody);
        let layout: Vec<(f64, &str)> = sheet
            .elements()
            .iter()
            .map(|p| {
                let tag = match &p.element {
                    LeadSheetElement::TimeSignature(_) => "ts",
                    LeadSheetElement::KeySignature(_) => "ks",
                    LeadSheetElement::Chord(c) => c.name.as_str(),
                    LeadSheetElement::Melody(_) => "note",
                };
                (p.offset, tag)
            })
            .collect();

        assert_eq!(
            layout,
            vec![
                (0.0, "ts"),
                (0.0, "ks"),
                (0.0, "D"),
                (0.0, "note"),
                (1.0, "note"),
                (2.0, "A"),
                (2.0, "note"),
            ]
        );
    }

    #[test]
    fn test_merge_without_signatures_or_chords() {
        let mut melody = part(vec![MelodyElement::rest(0.0, 4.0)]);
        melody.time_signature = None;
        melody.key_signature = None;

        let sheet = merge_lead_sheet(96, &[], &melody);
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.divisions, 96);
        assert_eq!(sheet.chords().count(), 0);
        assert!(sheet.time_signature().is_none());
    }

    #[test]
    fn test_simultaneous_chords_are_all_kept() {
        let chords = vec![
            ChordSymbol::parse("C", 1.0).unwrap(),
            ChordSymbol::parse("Am", 1.0).unwrap(),
        ];
        let sheet = merge_lead_sheet(480, &chords, &part(Vec::new()));
        let names: Vec<&str> = sheet.chords().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "Am"]);
    }
}
