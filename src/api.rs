//! # Public API
//!
//! Entry points for building lead sheets.
//!
//! - [`generate_lead_sheet()`] - Read both MIDI files, merge, write MusicXML
//! - [`build_lead_sheet()`] - Same pipeline on in-memory bytes, nothing written
//! - [`check_chords()`] - Report the chords a single MIDI file carries
//!
//! ## Pipeline
//! 1. Parse the melody file. Its ticks per quarter governs all timing.
//! 2. Locate the melody part on the configured channel.
//! 3. Extract chords from the chord file.
//! 4. Merge chords and melody into a [`LeadSheet`].
//! 5. Serialize to MusicXML and write the output file.
//!
//! A failing step aborts the run; the output file is only created after every
//! earlier step succeeded.
//!
//! ## Typical Usage
//!
//! ```no_run
//! use leadsheet::{generate_lead_sheet, Config};
//! use std::path::Path;
//!
//! let summary = generate_lead_sheet(
//!     Path::new("input/chords.mid"),
//!     Path::new("input/melody.mid"),
//!     Path::new("output/sheet.musicxml"),
//!     &Config::default(),
//! )?;
//! println!("{} chords written to {}", summary.chord_count, summary.output_path.display());
//! # Ok::<(), leadsheet::LeadSheetError>(())
//! ```

use crate::config::Config;
use crate::error::{FileRole, LeadSheetError};
use crate::events::{parse_smf, ticks_per_quarter};
use crate::extract::ChordExtractor;
use crate::melody::{MelodyFile, MelodyPart};
use crate::merge::merge_lead_sheet;
use crate::model::{ChordSymbol, LeadSheet};
use crate::musicxml::write_musicxml;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A MIDI file's bytes together with the path they came from.
#[derive(Debug, Clone, Copy)]
pub struct MidiSource<'a> {
    pub path: &'a Path,
    pub bytes: &'a [u8],
}

impl<'a> MidiSource<'a> {
    pub fn new(path: &'a Path, bytes: &'a [u8]) -> Self {
        Self { path, bytes }
    }
}

/// What a successful generation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadSheetSummary {
    pub output_path: PathBuf,
    pub chord_count: usize,
    pub melody_elements: usize,
    pub ticks_per_quarter: u32,
}

/// Build a lead sheet from two MIDI files and write it as MusicXML.
///
/// # Errors
/// - [`LeadSheetError::FileParse`] if either input cannot be read or decoded
/// - [`LeadSheetError::UnsupportedTiming`] if the melody has no ticks-per-quarter resolution
/// - [`LeadSheetError::MissingMelodyChannel`] if no part is on the melody channel
/// - [`LeadSheetError::Io`] if the output cannot be written
pub fn generate_lead_sheet(
    chord_path: &Path,
    melody_path: &Path,
    output_path: &Path,
    config: &Config,
) -> Result<LeadSheetSummary, LeadSheetError> {
    info!(chord_file = %chord_path.display(), melody_file = %melody_path.display(), output = %output_path.display(), "Starting lead sheet generation");

    let melody_bytes = read_midi(melody_path, FileRole::Melody)?;
    info!("Parsing melody file...");
    let melody_file = MelodyFile::parse(&melody_bytes, melody_path, config.quantize)?;
    let part = melody_part(&melody_file, config)?;

    let chord_bytes = read_midi(chord_path, FileRole::Chords)?;
    let sheet = assemble(
        MidiSource::new(chord_path, &chord_bytes),
        melody_file.ticks_per_quarter,
        part,
        config,
    )?;

    info!(output = %output_path.display(), "Writing to MusicXML file");
    write_musicxml(&sheet, output_path)?;

    Ok(LeadSheetSummary {
        output_path: output_path.to_path_buf(),
        chord_count: sheet.chords().count(),
        melody_elements: sheet.melody().count(),
        ticks_per_quarter: sheet.divisions,
    })
}

/// Run the whole pipeline in memory.
///
/// The melody is parsed first: its ticks per quarter becomes the sheet's
/// divisions and the timing unit for chord offsets.
pub fn build_lead_sheet(
    chords: MidiSource<'_>,
    melody: MidiSource<'_>,
    config: &Config,
) -> Result<LeadSheet, LeadSheetError> {
    info!("Parsing melody file...");
    let melody_file = MelodyFile::parse(melody.bytes, melody.path, config.quantize)?;
    let part = melody_part(&melody_file, config)?;
    assemble(chords, melody_file.ticks_per_quarter, part, config)
}

fn melody_part<'m>(file: &'m MelodyFile, config: &Config) -> Result<&'m MelodyPart, LeadSheetError> {
    file.find_part(config.melody_channel)
        .ok_or(LeadSheetError::MissingMelodyChannel {
            channel: config.melody_channel,
        })
}

/// Extract chords timed by the melody's `tpq` and merge them with `part`.
fn assemble(
    chords: MidiSource<'_>,
    tpq: u16,
    part: &MelodyPart,
    config: &Config,
) -> Result<LeadSheet, LeadSheetError> {
    info!("Parsing chord file for chord symbols...");
    let chord_smf = parse_smf(chords.bytes, chords.path, FileRole::Chords)?;
    let table = config.chord_table();
    let extracted = ChordExtractor::new(&table).extract(&chord_smf, tpq);
    if extracted.is_empty() {
        warn!("No chord symbols were found in the chord file.");
    }

    info!("Merging {} chords and melody...", extracted.len());
    let mut sheet = merge_lead_sheet(u32::from(tpq), &extracted, part);
    sheet.title = config.title.clone();
    sheet.composer = config.composer.clone();
    sheet.part_name = config.part_name.clone();

    Ok(sheet)
}

/// Extract the chords of one MIDI file with debug tracing enabled.
///
/// Offsets use the file's own ticks per quarter.
///
/// # Errors
/// - [`LeadSheetError::FileNotFound`] if `path` does not exist
/// - [`LeadSheetError::FileParse`] if it cannot be decoded or has no ticks-per-quarter resolution
pub fn check_chords(path: &Path, config: &Config) -> Result<Vec<ChordSymbol>, LeadSheetError> {
    info!(file = %path.display(), "Checking for chords");
    if !path.exists() {
        return Err(LeadSheetError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = read_midi(path, FileRole::Chords)?;
    let smf = parse_smf(&bytes, path, FileRole::Chords)?;
    let tpq = ticks_per_quarter(&smf.header.timing).ok_or_else(|| LeadSheetError::FileParse {
        path: path.to_path_buf(),
        role: FileRole::Chords,
        message: "no ticks-per-quarter resolution (timecode timing or zero)".to_string(),
    })?;

    let table = config.chord_table();
    let chords = ChordExtractor::new(&table).debug(true).extract(&smf, tpq);
    Ok(chords)
}

fn read_midi(path: &Path, role: FileRole) -> Result<Vec<u8>, LeadSheetError> {
    fs::read(path).map_err(|e| LeadSheetError::FileParse {
        path: path.to_path_buf(),
        role,
        message: e.to_string(),
    })
}
