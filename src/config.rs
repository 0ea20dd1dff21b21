//! # Configuration
//!
//! Optional YAML settings for a conversion. Without a file,
//! [`Config::default`] gives the standard behaviour: melody on channel 1,
//! quantization to twelfths of a quarter, built-in XF chord table.
//! `quantize` is at most 960; 0 keeps the melody file's own ticks.
//!
//! ```yaml
//! melody-channel: 1
//! quantize: 12
//! title: Night Drive
//! composer: Someone
//! part-name: Lead Sheet
//! xf-chords:
//!   - bytes: [17, 0]
//!     name: C
//!   - bytes: [50, 19, 49]
//!     name: Dadd9/C#
//! ```
//!
//! `xf-chords` entries extend the built-in table and replace entries with the
//! same bytes. Each key must have 2 or 3 bytes, none of them the `0x7F`
//! separator, and each name must be a valid chord symbol.

use crate::error::LeadSheetError;
use crate::harmony::Harmony;
use crate::melody::{DEFAULT_QUANTIZE, MAX_QUANTIZE};
use crate::model::DEFAULT_PART_NAME;
use crate::xf::{ChordByteKey, ChordTable, XF_SEPARATOR};
use serde::Deserialize;
use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// Channel the melody is read from when nothing else is configured.
pub const DEFAULT_MELODY_CHANNEL: u8 = 1;

/// Raw configuration for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawConfig {
    pub melody_channel: Option<u8>,
    pub quantize: Option<u32>,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub part_name: Option<String>,
    #[serde(default)]
    pub xf_chords: Vec<RawXfChord>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct RawXfChord {
    pub bytes: Vec<u8>,
    pub name: String,
}

/// Validated settings for one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Raw MIDI channel nibble of the melody part (0-15)
    pub melody_channel: u8,
    /// Grid divisions per quarter note; 0 keeps the melody file's ticks
    pub quantize: u32,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub part_name: String,
    pub xf_chords: Vec<(ChordByteKey, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            melody_channel: DEFAULT_MELODY_CHANNEL,
            quantize: DEFAULT_QUANTIZE,
            title: None,
            composer: None,
            part_name: DEFAULT_PART_NAME.to_string(),
            xf_chords: Vec::new(),
        }
    }
}

impl Config {
    /// Read and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, LeadSheetError> {
        let content = fs::read_to_string(path).map_err(|e| LeadSheetError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content, path)
    }

    /// Parse YAML content; `path` only labels errors.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, LeadSheetError> {
        let invalid = |message: String| LeadSheetError::Config {
            path: path.to_path_buf(),
            message,
        };

        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?
        };

        let melody_channel = raw.melody_channel.unwrap_or(DEFAULT_MELODY_CHANNEL);
        if melody_channel > 15 {
            return Err(invalid(format!(
                "melody-channel must be between 0 and 15, got {}",
                melody_channel
            )));
        }

        let quantize = raw.quantize.unwrap_or(DEFAULT_QUANTIZE);
        if quantize > MAX_QUANTIZE {
            return Err(invalid(format!(
                "quantize must be between 0 and {}, got {}",
                MAX_QUANTIZE, quantize
            )));
        }

        let mut xf_chords = Vec::with_capacity(raw.xf_chords.len());
        for entry in raw.xf_chords {
            if entry.bytes.contains(&XF_SEPARATOR) {
                return Err(invalid(format!(
                    "xf-chords entry '{}' contains the separator byte 0x7F",
                    entry.name
                )));
            }
            let key = ChordByteKey::from_bytes(&entry.bytes).ok_or_else(|| {
                invalid(format!(
                    "xf-chords entry '{}' must have 2 or 3 bytes, got {}",
                    entry.name,
                    entry.bytes.len()
                ))
            })?;
            Harmony::parse(&entry.name)
                .map_err(|e| invalid(format!("xf-chords entry: {}", e)))?;
            xf_chords.push((key, entry.name));
        }

        Ok(Self {
            melody_channel,
            quantize,
            title: raw.title,
            composer: raw.composer,
            part_name: raw.part_name.unwrap_or_else(|| DEFAULT_PART_NAME.to_string()),
            xf_chords,
        })
    }

    /// The chord table to decode with: the shared built-in table, or a copy
    /// extended with the configured entries.
    pub fn chord_table(&self) -> Cow<'static, ChordTable> {
        if self.xf_chords.is_empty() {
            Cow::Borrowed(ChordTable::builtin())
        } else {
            Cow::Owned(ChordTable::with_extra(
                self.xf_chords.iter().map(|(key, name)| (*key, name.as_str())),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Config, LeadSheetError> {
        Config::from_yaml(content, Path::new("leadsheet.yaml"))
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse("").unwrap(), Config::default());
        assert_eq!(parse("   \n").unwrap(), Config::default());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
melody-channel: 0
quantize: 4
title: Night Drive
composer: Someone
part-name: Vocals
xf-chords:
  - bytes: [17, 0]
    name: C
  - bytes: [50, 19, 49]
    name: Dadd9/C#
"#,
        )
        .unwrap();

        assert_eq!(config.melody_channel, 0);
        assert_eq!(config.quantize, 4);
        assert_eq!(config.title.as_deref(), Some("Night Drive"));
        assert_eq!(config.part_name, "Vocals");
        assert_eq!(
            config.xf_chords,
            vec![
                (ChordByteKey::Pair([0x11, 0x00]), "C".to_string()),
                (ChordByteKey::Triple([0x32, 0x13, 0x31]), "Dadd9/C#".to_string()),
            ]
        );

        let table = config.chord_table();
        assert_eq!(table.get(&ChordByteKey::Pair([0x11, 0x00])), Some("C"));
        assert_eq!(table.get(&ChordByteKey::Triple([0x32, 0x13, 0x31])), Some("Dadd9/C#"));
        assert_eq!(table.get(&ChordByteKey::Pair([0x32, 0x00])), Some("D"));
    }

    #[test]
    fn test_default_table_is_builtin() {
        let config = Config::default();
        assert!(matches!(config.chord_table(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_invalid_entries_are_rejected() {
        let bad_len = parse("xf-chords:\n  - bytes: [17]\n    name: C\n");
        assert!(matches!(bad_len, Err(LeadSheetError::Config { .. })));

        let separator = parse("xf-chords:\n  - bytes: [17, 127]\n    name: C\n");
        assert!(matches!(separator, Err(LeadSheetError::Config { .. })));

        let bad_name = parse("xf-chords:\n  - bytes: [17, 0]\n    name: C_maj\n");
        assert!(matches!(bad_name, Err(LeadSheetError::Config { .. })));

        let bad_channel = parse("melody-channel: 16\n");
        assert!(matches!(bad_channel, Err(LeadSheetError::Config { .. })));

        let huge_grid = parse("quantize: 4000000000\n");
        assert!(matches!(huge_grid, Err(LeadSheetError::Config { .. })));
        assert!(parse("quantize: 960\n").is_ok());
        assert!(parse("quantize: 0\n").is_ok());

        let unknown = parse("tempo: 120\n");
        assert!(matches!(unknown, Err(LeadSheetError::Config { .. })));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Config::load(Path::new("/nonexistent/leadsheet.yaml")).unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }
}
