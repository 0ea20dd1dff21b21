//! # Chord Symbol Parsing
//!
//! Validates chord symbols (C, Am, G7, Dm7/C#, F#7#9, Fmadd9/D#, ...) and turns
//! them into the structure MusicXML `<harmony>` elements need.
//!
//! ## Grammar
//! ```text
//! symbol    := root quality? extension? modifier* group? modifier* ("/" bass)?
//! root      := [A-G] ("#" | "b")?
//! quality   := "maj" | "min" | "dim" | "aug" | "sus" | "add"
//!            | "M" | "m" | "-" | "o" | "°" | "+"
//! extension := digits                (5, 6, 7, 9, 11, 13, 69 depending on quality)
//! modifier  := "sus2" | "sus4" | "sus" | "add" n | ("#" | "b") n | ("omit" | "no") n
//! group     := "(" modifier ([, ]+ modifier)* ")"
//! bass      := [A-G] ("#" | "b")?
//! ```
//!
//! Anything outside the grammar is rejected: an unknown separator such as `_`,
//! trailing words, an extension the quality cannot take (`C8`, `Cdim9`), or
//! `add` without a degree.
//!
//! ## Supported Kinds
//! - **Triads**: `C`, `Cm`, `Cdim`, `Caug`, `Csus2`, `Csus4`, `C5`
//! - **Sixths**: `C6`, `Cm6`, `C69`
//! - **Sevenths**: `C7`, `Cmaj7`, `Cm7`, `Cdim7`, `Caug7`
//! - **Extended**: `C9`, `Cmaj9`, `Cm9`, `C11`, `C13`, ...
//! - **Modified**: `Cadd9`, `C7#9`, `C7(b9, #11)`, `C7sus4`, `Comit3`
//!
//! Parsing never normalizes spelling: the original symbol is kept in
//! [`Harmony::text`] and used as the displayed chord name.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarmonyError {
    #[error("empty chord symbol")]
    Empty,

    #[error("'{0}' does not start with a chord root (A-G)")]
    InvalidRoot(String),

    #[error("'{symbol}': extension {extension} is not valid here")]
    UnsupportedExtension { symbol: String, extension: String },

    #[error("'{symbol}': '{degree}' needs a chord degree")]
    MissingDegree { symbol: String, degree: String },

    #[error("'{symbol}': unexpected '{rest}'")]
    UnexpectedText { symbol: String, rest: String },

    #[error("'{symbol}': invalid bass note '{bass}'")]
    InvalidBass { symbol: String, bass: String },
}

/// A note name with chromatic alteration (-1 flat, +1 sharp).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchName {
    pub step: char,
    pub alter: i8,
}

impl fmt::Display for PitchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.step)?;
        match self.alter {
            1 => write!(f, "#"),
            -1 => write!(f, "b"),
            _ => Ok(()),
        }
    }
}

/// MusicXML `kind` values produced by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordKind {
    Major,
    Minor,
    Augmented,
    Diminished,
    Dominant,
    MajorSeventh,
    MinorSeventh,
    DiminishedSeventh,
    AugmentedSeventh,
    MajorSixth,
    MinorSixth,
    DominantNinth,
    MajorNinth,
    MinorNinth,
    Dominant11th,
    Major11th,
    Minor11th,
    Dominant13th,
    Major13th,
    Minor13th,
    SuspendedSecond,
    SuspendedFourth,
    Power,
}

impl ChordKind {
    pub fn musicxml_value(&self) -> &'static str {
        match self {
            ChordKind::Major => "major",
            ChordKind::Minor => "minor",
            ChordKind::Augmented => "augmented",
            ChordKind::Diminished => "diminished",
            ChordKind::Dominant => "dominant",
            ChordKind::MajorSeventh => "major-seventh",
            ChordKind::MinorSeventh => "minor-seventh",
            ChordKind::DiminishedSeventh => "diminished-seventh",
            ChordKind::AugmentedSeventh => "augmented-seventh",
            ChordKind::MajorSixth => "major-sixth",
            ChordKind::MinorSixth => "minor-sixth",
            ChordKind::DominantNinth => "dominant-ninth",
            ChordKind::MajorNinth => "major-ninth",
            ChordKind::MinorNinth => "minor-ninth",
            ChordKind::Dominant11th => "dominant-11th",
            ChordKind::Major11th => "major-11th",
            ChordKind::Minor11th => "minor-11th",
            ChordKind::Dominant13th => "dominant-13th",
            ChordKind::Major13th => "major-13th",
            ChordKind::Minor13th => "minor-13th",
            ChordKind::SuspendedSecond => "suspended-second",
            ChordKind::SuspendedFourth => "suspended-fourth",
            ChordKind::Power => "power",
        }
    }

    /// Highest stacked degree the kind already contains.
    fn top_degree(&self) -> u32 {
        match self {
            ChordKind::DominantNinth | ChordKind::MajorNinth | ChordKind::MinorNinth => 9,
            ChordKind::Dominant11th | ChordKind::Major11th | ChordKind::Minor11th => 11,
            ChordKind::Dominant13th | ChordKind::Major13th | ChordKind::Minor13th => 13,
            _ => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegreeType {
    Add,
    Alter,
    Subtract,
}

impl DegreeType {
    pub fn musicxml_value(&self) -> &'static str {
        match self {
            DegreeType::Add => "add",
            DegreeType::Alter => "alter",
            DegreeType::Subtract => "subtract",
        }
    }
}

/// An added, altered or omitted chord tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Degree {
    pub value: u32,
    pub alter: i8,
    pub degree_type: DegreeType,
}

/// A validated chord symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harmony {
    /// Symbol as written
    pub text: String,
    pub root: PitchName,
    pub kind: ChordKind,
    pub degrees: Vec<Degree>,
    pub bass: Option<PitchName>,
}

/// Quality token directly after the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quality {
    Plain,
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended,
    Added,
}

/// Longest spellings first so "maj" wins over "m"
const QUALITY_TOKENS: &[(&str, Quality)] = &[
    ("maj", Quality::Major),
    ("min", Quality::Minor),
    ("dim", Quality::Diminished),
    ("aug", Quality::Augmented),
    ("sus", Quality::Suspended),
    ("add", Quality::Added),
    ("M", Quality::Major),
    ("m", Quality::Minor),
    ("-", Quality::Minor),
    ("o", Quality::Diminished),
    ("°", Quality::Diminished),
    ("+", Quality::Augmented),
];

const ADDABLE_DEGREES: &[u32] = &[2, 4, 6, 9, 11, 13];
const ALTERABLE_DEGREES: &[u32] = &[5, 9, 11, 13];
const OMITTABLE_DEGREES: &[u32] = &[1, 3, 5];

impl Harmony {
    /// Parse and validate a chord symbol.
    ///
    /// # Examples
    /// ```
    /// use leadsheet::harmony::{ChordKind, Harmony};
    ///
    /// let chord = Harmony::parse("Dm7/C#").unwrap();
    /// assert_eq!(chord.kind, ChordKind::MinorSeventh);
    /// assert_eq!(chord.bass.unwrap().to_string(), "C#");
    ///
    /// assert!(Harmony::parse("C_maj").is_err());
    /// ```
    pub fn parse(symbol: &str) -> Result<Harmony, HarmonyError> {
        let text = symbol.trim();
        if text.is_empty() {
            return Err(HarmonyError::Empty);
        }

        let (root, rest) =
            take_pitch(text).ok_or_else(|| HarmonyError::InvalidRoot(text.to_string()))?;

        let (body, bass) = match rest.rfind('/') {
            Some(slash) => {
                let bass_text = &rest[slash + 1..];
                let bass = match take_pitch(bass_text) {
                    Some((bass, "")) => bass,
                    _ => {
                        return Err(HarmonyError::InvalidBass {
                            symbol: text.to_string(),
                            bass: bass_text.to_string(),
                        })
                    }
                };
                (&rest[..slash], Some(bass))
            }
            None => (rest, None),
        };

        let mut parser = SuffixParser {
            symbol: text,
            rest: body,
            kind: ChordKind::Major,
            degrees: Vec::new(),
        };
        parser.parse_head()?;
        parser.parse_modifiers()?;

        Ok(Harmony {
            text: text.to_string(),
            root,
            kind: parser.kind,
            degrees: parser.degrees,
            bass,
        })
    }

    /// Text between the root and the bass, e.g. `m7` for `C#m7/G#`.
    pub fn kind_text(&self) -> &str {
        let root_len = if self.root.alter == 0 { 1 } else { 2 };
        let after_root = &self.text[root_len..];
        match after_root.rfind('/') {
            Some(slash) if self.bass.is_some() => &after_root[..slash],
            _ => after_root,
        }
    }
}

impl fmt::Display for Harmony {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Parse `[A-G][#b]?` off the front of `s`.
fn take_pitch(s: &str) -> Option<(PitchName, &str)> {
    let mut chars = s.chars();
    let step = chars.next().filter(|c| ('A'..='G').contains(c))?;
    let rest = chars.as_str();
    let (alter, rest) = if let Some(r) = rest.strip_prefix('#') {
        (1, r)
    } else if let Some(r) = rest.strip_prefix('b') {
        (-1, r)
    } else {
        (0, rest)
    };
    Some((PitchName { step, alter }, rest))
}

/// Parse leading ASCII digits.
fn take_number(s: &str) -> (Option<&str>, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        (None, s)
    } else {
        (Some(&s[..end]), &s[end..])
    }
}

struct SuffixParser<'a> {
    symbol: &'a str,
    rest: &'a str,
    kind: ChordKind,
    degrees: Vec<Degree>,
}

impl<'a> SuffixParser<'a> {
    /// Quality and extension directly after the root.
    fn parse_head(&mut self) -> Result<(), HarmonyError> {
        let mut quality = Quality::Plain;
        for (token, q) in QUALITY_TOKENS {
            if let Some(rest) = self.rest.strip_prefix(token) {
                quality = *q;
                self.rest = rest;
                break;
            }
        }

        let (extension, rest) = take_number(self.rest);
        self.rest = rest;

        let symbol = self.symbol;
        let unsupported = |ext: &str| HarmonyError::UnsupportedExtension {
            symbol: symbol.to_string(),
            extension: ext.to_string(),
        };

        self.kind = match (quality, extension) {
            (Quality::Plain, None) => ChordKind::Major,
            (Quality::Plain, Some("5")) => ChordKind::Power,
            (Quality::Plain, Some("6")) => ChordKind::MajorSixth,
            (Quality::Plain, Some("69")) => {
                self.push_degree(9, 0, DegreeType::Add);
                ChordKind::MajorSixth
            }
            (Quality::Plain, Some("7")) => ChordKind::Dominant,
            (Quality::Plain, Some("9")) => ChordKind::DominantNinth,
            (Quality::Plain, Some("11")) => ChordKind::Dominant11th,
            (Quality::Plain, Some("13")) => ChordKind::Dominant13th,

            (Quality::Major, None) => ChordKind::Major,
            (Quality::Major, Some("6")) => ChordKind::MajorSixth,
            (Quality::Major, Some("7")) => ChordKind::MajorSeventh,
            (Quality::Major, Some("9")) => ChordKind::MajorNinth,
            (Quality::Major, Some("11")) => ChordKind::Major11th,
            (Quality::Major, Some("13")) => ChordKind::Major13th,

            (Quality::Minor, None) => ChordKind::Minor,
            (Quality::Minor, Some("6")) => ChordKind::MinorSixth,
            (Quality::Minor, Some("7")) => ChordKind::MinorSeventh,
            (Quality::Minor, Some("9")) => ChordKind::MinorNinth,
            (Quality::Minor, Some("11")) => ChordKind::Minor11th,
            (Quality::Minor, Some("13")) => ChordKind::Minor13th,

            (Quality::Diminished, None) => ChordKind::Diminished,
            (Quality::Diminished, Some("7")) => ChordKind::DiminishedSeventh,

            (Quality::Augmented, None) => ChordKind::Augmented,
            (Quality::Augmented, Some("7")) => ChordKind::AugmentedSeventh,

            (Quality::Suspended, None | Some("4")) => ChordKind::SuspendedFourth,
            (Quality::Suspended, Some("2")) => ChordKind::SuspendedSecond,

            (Quality::Added, None) => {
                return Err(HarmonyError::MissingDegree {
                    symbol: symbol.to_string(),
                    degree: "add".to_string(),
                })
            }
            (Quality::Added, Some(degree)) => {
                let value = degree_value(degree, ADDABLE_DEGREES).ok_or_else(|| unsupported(degree))?;
                self.push_degree(value, 0, DegreeType::Add);
                ChordKind::Major
            }

            (_, Some(ext)) => return Err(unsupported(ext)),
        };
        Ok(())
    }

    /// Modifiers after the head, with at most one parenthesised group.
    fn parse_modifiers(&mut self) -> Result<(), HarmonyError> {
        let mut seen_group = false;
        while !self.rest.is_empty() {
            if let Some(inner) = self.rest.strip_prefix('(') {
                let close = match inner.find(')') {
                    Some(close) if !seen_group => close,
                    _ => return Err(self.unexpected()),
                };
                let group = &inner[..close];
                self.rest = &inner[close + 1..];
                seen_group = true;

                let mut items = group
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|item| !item.is_empty())
                    .peekable();
                if items.peek().is_none() {
                    return Err(self.unexpected_text(&format!("({})", group)));
                }
                for item in items {
                    let rest = self.take_modifier(item)?;
                    if !rest.is_empty() {
                        return Err(self.unexpected_text(item));
                    }
                }
            } else {
                self.rest = self.take_modifier(self.rest)?;
            }
        }
        Ok(())
    }

    /// Apply one modifier at the front of `s`, returning what follows it.
    fn take_modifier<'s>(&mut self, s: &'s str) -> Result<&'s str, HarmonyError> {
        if let Some(rest) = s.strip_prefix("sus") {
            let (degree, rest) = take_number(rest);
            let suspended = match degree {
                None | Some("4") => ChordKind::SuspendedFourth,
                Some("2") => ChordKind::SuspendedSecond,
                Some(other) => return Err(self.unsupported(other)),
            };
            match self.kind {
                ChordKind::Major => {}
                ChordKind::Dominant => self.push_degree(7, -1, DegreeType::Add),
                _ => return Err(self.unexpected_text(s)),
            }
            self.kind = suspended;
            return Ok(rest);
        }

        if let Some(rest) = s.strip_prefix("add") {
            let (degree, rest) = take_number(rest);
            let degree = degree.ok_or_else(|| self.missing_degree("add"))?;
            let value = degree_value(degree, ADDABLE_DEGREES).ok_or_else(|| self.unsupported(degree))?;
            self.push_degree(value, 0, DegreeType::Add);
            return Ok(rest);
        }

        for prefix in ["omit", "no"] {
            if let Some(rest) = s.strip_prefix(prefix) {
                let (degree, rest) = take_number(rest);
                let degree = degree.ok_or_else(|| self.missing_degree(prefix))?;
                let value =
                    degree_value(degree, OMITTABLE_DEGREES).ok_or_else(|| self.unsupported(degree))?;
                self.push_degree(value, 0, DegreeType::Subtract);
                return Ok(rest);
            }
        }

        let alter = match s.chars().next() {
            Some('#') => 1,
            Some('b') => -1,
            _ => return Err(self.unexpected_text(s)),
        };
        let (degree, rest) = take_number(&s[1..]);
        let degree = degree.ok_or_else(|| self.unexpected_text(s))?;
        let value = degree_value(degree, ALTERABLE_DEGREES).ok_or_else(|| self.unsupported(degree))?;
        let degree_type = if value == 5 || value <= self.kind.top_degree() {
            DegreeType::Alter
        } else {
            DegreeType::Add
        };
        self.push_degree(value, alter, degree_type);
        Ok(rest)
    }

    fn push_degree(&mut self, value: u32, alter: i8, degree_type: DegreeType) {
        self.degrees.push(Degree {
            value,
            alter,
            degree_type,
        });
    }

    fn unexpected(&self) -> HarmonyError {
        self.unexpected_text(self.rest)
    }

    fn unexpected_text(&self, rest: &str) -> HarmonyError {
        HarmonyError::UnexpectedText {
            symbol: self.symbol.to_string(),
            rest: rest.to_string(),
        }
    }

    fn unsupported(&self, extension: &str) -> HarmonyError {
        HarmonyError::UnsupportedExtension {
            symbol: self.symbol.to_string(),
            extension: extension.to_string(),
        }
    }

    fn missing_degree(&self, degree: &str) -> HarmonyError {
        HarmonyError::MissingDegree {
            symbol: self.symbol.to_string(),
            degree: degree.to_string(),
        }
    }
}

fn degree_value(digits: &str, allowed: &[u32]) -> Option<u32> {
    digits.parse().ok().filter(|value| allowed.contains(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kind_of(symbol: &str) -> ChordKind {
        Harmony::parse(symbol).unwrap().kind
    }

    #[test]
    fn test_triads_and_sevenths() {
        assert_eq!(kind_of("C"), ChordKind::Major);
        assert_eq!(kind_of("Am"), ChordKind::Minor);
        assert_eq!(kind_of("Amin"), ChordKind::Minor);
        assert_eq!(kind_of("A-"), ChordKind::Minor);
        assert_eq!(kind_of("CM"), ChordKind::Major);
        assert_eq!(kind_of("Bdim"), ChordKind::Diminished);
        assert_eq!(kind_of("Caug"), ChordKind::Augmented);
        assert_eq!(kind_of("G7"), ChordKind::Dominant);
        assert_eq!(kind_of("Cmaj7"), ChordKind::MajorSeventh);
        assert_eq!(kind_of("CM7"), ChordKind::MajorSeventh);
        assert_eq!(kind_of("Gm7"), ChordKind::MinorSeventh);
        assert_eq!(kind_of("Bo7"), ChordKind::DiminishedSeventh);
        assert_eq!(kind_of("Dsus4"), ChordKind::SuspendedFourth);
        assert_eq!(kind_of("Dsus"), ChordKind::SuspendedFourth);
        assert_eq!(kind_of("Dsus2"), ChordKind::SuspendedSecond);
        assert_eq!(kind_of("E5"), ChordKind::Power);
        assert_eq!(kind_of("F13"), ChordKind::Dominant13th);
    }

    #[test]
    fn test_root_and_bass_spelling() {
        let chord = Harmony::parse("Fmadd9/D#").unwrap();
        assert_eq!(chord.root, PitchName { step: 'F', alter: 0 });
        assert_eq!(chord.kind, ChordKind::Minor);
        assert_eq!(
            chord.degrees,
            vec![Degree {
                value: 9,
                alter: 0,
                degree_type: DegreeType::Add
            }]
        );
        assert_eq!(chord.bass, Some(PitchName { step: 'D', alter: 1 }));
        assert_eq!(chord.kind_text(), "madd9");

        let chord = Harmony::parse("Bbm7").unwrap();
        assert_eq!(chord.root, PitchName { step: 'B', alter: -1 });
        assert_eq!(chord.kind_text(), "m7");
    }

    #[test]
    fn test_altered_dominant() {
        let chord = Harmony::parse("G#7#9").unwrap();
        assert_eq!(chord.root.to_string(), "G#");
        assert_eq!(chord.kind, ChordKind::Dominant);
        assert_eq!(
            chord.degrees,
            vec![Degree {
                value: 9,
                alter: 1,
                degree_type: DegreeType::Add
            }]
        );

        let chord = Harmony::parse("C9(b5)").unwrap();
        assert_eq!(chord.degrees[0].degree_type, DegreeType::Alter);
        assert_eq!(chord.degrees[0].alter, -1);
    }

    #[test]
    fn test_parenthesised_group() {
        let chord = Harmony::parse("C7(b9, #11)").unwrap();
        assert_eq!(chord.degrees.len(), 2);
        assert_eq!(chord.degrees[1].value, 11);

        let chord = Harmony::parse("C(add9)").unwrap();
        assert_eq!(chord.kind, ChordKind::Major);
        assert_eq!(chord.degrees[0].value, 9);

        assert!(Harmony::parse("C()").is_err());
        assert!(Harmony::parse("C(hello)").is_err());
        assert!(Harmony::parse("C(b9)(#11)").is_err());
    }

    #[test]
    fn test_dominant_sus() {
        let chord = Harmony::parse("G7sus4").unwrap();
        assert_eq!(chord.kind, ChordKind::SuspendedFourth);
        assert_eq!(chord.degrees[0].value, 7);
        assert_eq!(chord.degrees[0].alter, -1);
    }

    #[test]
    fn test_rejects_non_chords() {
        assert_eq!(Harmony::parse("  "), Err(HarmonyError::Empty));
        assert!(matches!(Harmony::parse("Hmaj"), Err(HarmonyError::InvalidRoot(_))));
        assert!(matches!(Harmony::parse("intro"), Err(HarmonyError::InvalidRoot(_))));
        assert!(matches!(
            Harmony::parse("C_"),
            Err(HarmonyError::UnexpectedText { .. })
        ));
        assert!(matches!(
            Harmony::parse("Cadd"),
            Err(HarmonyError::MissingDegree { .. })
        ));
        assert!(matches!(
            Harmony::parse("C8"),
            Err(HarmonyError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            Harmony::parse("Cdim9"),
            Err(HarmonyError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            Harmony::parse("C/H"),
            Err(HarmonyError::InvalidBass { .. })
        ));
        assert!(Harmony::parse("Gm7 riff").is_err());
    }

    #[test]
    fn test_symbol_text_is_preserved() {
        let chord = Harmony::parse(" D#add9/F# ").unwrap();
        assert_eq!(chord.text, "D#add9/F#");
        assert_eq!(chord.to_string(), "D#add9/F#");
        assert_eq!(chord.kind_text(), "add9");
    }
}
