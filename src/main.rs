use clap::{CommandFactory, Parser};
use leadsheet::error::{EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};
use leadsheet::{check_chords, generate_lead_sheet, Config, LeadSheetError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "leadsheet")]
#[command(about = "Tools for building a MusicXML lead sheet from MIDI files")]
#[command(version)]
#[command(after_help = "Examples:
  # Generate a lead sheet
  leadsheet --chord-file input/chords.mid --melody-file input/melody.mid --output output/sheet.musicxml

  # Check a single MIDI file for chord information
  leadsheet --check-chords song.mid")]
struct Cli {
    /// MIDI file containing chord data (XF meta events or text)
    #[arg(long, value_name = "FILE", help_heading = "Lead Sheet Generation")]
    chord_file: Option<PathBuf>,

    /// MIDI file containing the cleaned-up melody
    #[arg(long, value_name = "FILE", help_heading = "Lead Sheet Generation")]
    melody_file: Option<PathBuf>,

    /// Path for the generated MusicXML file
    #[arg(long, value_name = "FILE", help_heading = "Lead Sheet Generation")]
    output: Option<PathBuf>,

    /// Check a single MIDI file for chord information and exit
    #[arg(long, value_name = "FILE", help_heading = "Utilities")]
    check_chords: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let no_arguments = cli.chord_file.is_none()
        && cli.melody_file.is_none()
        && cli.output.is_none()
        && cli.check_chords.is_none()
        && cli.config.is_none();
    if no_arguments {
        let _ = Cli::command().print_help();
        return EXIT_USAGE;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report(&e),
    };

    if let Some(path) = &cli.check_chords {
        return match check_chords(path, &config) {
            Ok(chords) if chords.is_empty() => {
                println!("No chord symbols were found in the file.");
                EXIT_SUCCESS
            }
            Ok(chords) => {
                println!("Found {} chords in the file.", chords.len());
                EXIT_SUCCESS
            }
            Err(e) => report(&e),
        };
    }

    match (&cli.chord_file, &cli.melody_file, &cli.output) {
        (Some(chord_file), Some(melody_file), Some(output)) => {
            match generate_lead_sheet(chord_file, melody_file, output, &config) {
                Ok(summary) => {
                    let resolved = fs::canonicalize(&summary.output_path)
                        .unwrap_or(summary.output_path);
                    println!("Successfully created lead sheet: {}", resolved.display());
                    EXIT_SUCCESS
                }
                Err(e) => report(&e),
            }
        }
        _ => {
            eprintln!(
                "For lead sheet generation, you must provide --chord-file, --melody-file, and --output."
            );
            eprintln!("Use --help for more options.");
            EXIT_USAGE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, LeadSheetError> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn report(e: &LeadSheetError) -> i32 {
    let code = e.exit_code();
    if code == EXIT_FAILURE {
        error!("An unexpected error occurred: {}", e);
    } else {
        error!("{}", e);
    }
    code
}
