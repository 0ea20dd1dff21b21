pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod harmony;
pub mod melody;
pub mod merge;
pub mod model;
pub mod musicxml;
pub mod text;
pub mod xf;

pub use api::{build_lead_sheet, check_chords, generate_lead_sheet, LeadSheetSummary, MidiSource};
pub use config::Config;
pub use error::*;
pub use extract::{ChordExtractor, ChordRecognizer, TextRecognizer, XfRecognizer};
pub use harmony::{Harmony, HarmonyError};
pub use melody::{MelodyFile, MelodyPart};
pub use model::*;
pub use musicxml::{to_musicxml, write_musicxml};
pub use xf::{ChordByteKey, ChordTable};
