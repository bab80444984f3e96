//! spectcrf CLI
//!
//! Replays recorded step traces through the camera-response aggregator.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::redundant_closure_for_method_calls,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand};

use spectcrf_core::{ConfigError, EventAggregator, RecordMode, RecordSink, Vec3};
use spectcrf_io::{
    open_record_sink, replay, replay_entries, ActorSettings, MappedTraceReader, TraceEntry,
    TraceSummary,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    SpectcrfIo(#[from] spectcrf_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] spectcrf_core::Error),
}

/// Camera-response-function record builder for simulated SPECT heads.
#[derive(Parser)]
#[command(name = "spectcrf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Command-line overrides of the settings file.
#[derive(Args, Debug, Default)]
struct ActorOverrides {
    /// Crystal volume name
    #[arg(long)]
    crystal: Option<String>,

    /// Volume the actor is attached to
    #[arg(long)]
    attach_to: Option<String>,

    /// Camera width axis as x,y,z
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    orientation_x: Option<Vec3>,

    /// Camera height axis as x,y,z
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    orientation_y: Option<Vec3>,

    /// Keep one in N undetected records
    #[arg(long, allow_hyphen_values = true)]
    roulette_factor: Option<i64>,

    /// Diagnostic echo level (1: records, 2: start directions)
    #[arg(long)]
    debug_level: Option<i32>,

    /// One record per history with primary/secondary hit flags
    #[arg(long)]
    single_record: bool,
}

impl ActorOverrides {
    fn apply(&self, settings: &mut ActorSettings) {
        let config = &mut settings.config;
        if let Some(volume) = &self.attach_to {
            config.attach_to(volume);
        }
        if let Some(crystal) = &self.crystal {
            config.set_crystal_volume(crystal, &settings.geometry);
        }
        if let Some(x) = self.orientation_x {
            config.set_orientation_x(x);
        }
        if let Some(y) = self.orientation_y {
            config.set_orientation_y(y);
        }
        if let Some(factor) = self.roulette_factor {
            config.set_roulette_factor(factor);
        }
        if let Some(level) = self.debug_level {
            config.set_debug_level(level);
        }
        if self.single_record {
            config.set_record_mode(RecordMode::PerEvent);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay step traces and write detection records
    Process {
        /// Actor settings file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        overrides: ActorOverrides,

        /// Output file path (.csv, .bin/.dat, .h5)
        #[arg(short, long)]
        output: PathBuf,

        /// Input trace file(s), replayed in order
        #[arg(required = true)]
        input: Vec<PathBuf>,
    },

    /// Print the actor configuration and check it against the geometry
    Describe {
        /// Actor settings file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        overrides: ActorOverrides,
    },

    /// Show information about a trace file
    Info {
        /// Input trace file
        input: PathBuf,
    },
}

fn parse_vec3(s: &str) -> std::result::Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z but got {s:?}"));
    }
    let mut v = [0.0; 3];
    for (slot, part) in v.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|e| format!("invalid component {part:?}: {e}"))?;
    }
    Ok(Vec3::from(v))
}

fn load_settings(path: &Path, overrides: &ActorOverrides) -> Result<ActorSettings> {
    let mut settings = ActorSettings::from_file(path)?;
    overrides.apply(&mut settings);
    Ok(settings)
}

fn read_trace(path: &Path) -> Result<Vec<TraceEntry>> {
    log::info!("Reading: {}", path.display());
    let reader = MappedTraceReader::open(path)?;
    Ok(reader.read_entries()?)
}

/// Validates the settings, then opens the output. An invalid setup leaves the
/// output file untouched.
fn build_aggregator(
    settings: &mut ActorSettings,
    output: &Path,
) -> Result<EventAggregator<Box<dyn RecordSink>>> {
    settings.config.set_output(output);
    let validated = settings
        .config
        .validate(&settings.geometry)
        .map_err(spectcrf_core::Error::from)?;
    log::debug!(
        "CRF actor {} attached to {} (crystal {})",
        validated.name,
        validated.attached_volume,
        validated.crystal_volume
    );
    let sink = open_record_sink(output, validated.record_mode)?;
    Ok(EventAggregator::new(validated, sink))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Process {
            config,
            overrides,
            output,
            input,
        } => {
            let mut settings = load_settings(&config, &overrides)?;
            let mut aggregator = build_aggregator(&mut settings, &output)?;

            let start = Instant::now();
            let last = input.len().saturating_sub(1);
            for (i, path) in input.iter().enumerate() {
                let entries = read_trace(path)?;
                let summary = if i == last {
                    replay(&entries, &mut aggregator)?
                } else {
                    replay_entries(&entries, &mut aggregator)?;
                    TraceSummary::of(&entries)
                };
                log::debug!(
                    "  {}: {} steps, {} events",
                    path.display(),
                    summary.steps,
                    summary.events
                );
            }

            let stats = aggregator.statistics();
            let elapsed = start.elapsed();

            println!(
                "Processed {} files in {:.2}s",
                input.len(),
                elapsed.as_secs_f64()
            );
            println!("Total steps: {}", stats.steps_seen);
            println!("Ignored steps: {}", stats.steps_ignored);
            println!("Total events: {}", stats.events);
            println!("Records opened: {}", stats.records_opened);
            println!("Records written: {}", stats.records_written);
            println!("Records dropped by roulette: {}", stats.records_dropped);
            println!("Output: {}", output.display());
        }

        Commands::Describe { config, overrides } => {
            let settings = load_settings(&config, &overrides)?;
            print!("{}", settings.config.describe());
            match validation_status(&settings) {
                Ok(()) => println!("Status: valid"),
                Err(e) => println!("Status: invalid ({e})"),
            }
        }

        Commands::Info { input } => {
            let reader = MappedTraceReader::open(&input)?;
            let file_size = reader.file_size();
            let entries = reader.read_entries()?;
            let summary = TraceSummary::of(&entries);

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Entries: {}", entries.len());
            println!("Steps: {}", summary.steps);
            println!("Events: {}", summary.events);
            println!("Distinct tracks: {}", summary.distinct_tracks);
            println!(
                "End of acquisition: {}",
                if summary.has_end_of_acquisition {
                    "yes"
                } else {
                    "no"
                }
            );
        }
    }

    Ok(())
}

/// Validation result of the settings; a missing output is not reported here.
fn validation_status(settings: &ActorSettings) -> std::result::Result<(), ConfigError> {
    let mut config = settings.config.clone();
    if config.output().is_none() {
        config.set_output("-");
    }
    config.validate(&settings.geometry).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectcrf_core::StepHandler;

    #[test]
    fn test_parse_vec3() {
        let v = parse_vec3("0, -1,2.5").unwrap();
        assert_eq!(v, Vec3::new(0.0, -1.0, 2.5));
        assert!(parse_vec3("1,2").is_err());
        assert!(parse_vec3("1,x,2").is_err());
    }

    #[test]
    fn test_cli_parses_process() {
        let cli = Cli::try_parse_from([
            "spectcrf",
            "process",
            "--config",
            "crf.json",
            "--crystal",
            "crystal",
            "--orientation-x",
            "0,-1,0",
            "--roulette-factor",
            "20",
            "--single-record",
            "--output",
            "out.csv",
            "a.jsonl",
            "b.jsonl",
        ])
        .unwrap();
        match cli.command {
            Commands::Process {
                overrides, input, ..
            } => {
                assert_eq!(overrides.crystal.as_deref(), Some("crystal"));
                assert_eq!(overrides.orientation_x, Some(Vec3::new(0.0, -1.0, 0.0)));
                assert_eq!(overrides.roulette_factor, Some(20));
                assert!(overrides.single_record);
                assert_eq!(input.len(), 2);
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let mut settings = ActorSettings::from_json(
            r#"{"actor": {"attach_to": "head", "roulette_factor": 4},
                "geometry": [{"name": "head"}, {"name": "crystal", "mother": "head"}]}"#,
        )
        .unwrap();
        let overrides = ActorOverrides {
            crystal: Some("crystal".to_string()),
            roulette_factor: Some(0),
            debug_level: Some(2),
            single_record: true,
            ..ActorOverrides::default()
        };
        overrides.apply(&mut settings);

        assert_eq!(settings.config.crystal_volume(), Some("crystal"));
        // values below one are ignored
        assert_eq!(settings.config.roulette_factor(), 4);
        assert_eq!(settings.config.debug_level(), 2);
        assert_eq!(settings.config.record_mode(), RecordMode::PerEvent);
        assert!(validation_status(&settings).is_ok());
    }

    #[test]
    fn test_invalid_setup_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");
        std::fs::write(&output, "precious").unwrap();

        let mut settings = ActorSettings::from_json(
            r#"{"actor": {"attach_to": "world", "crystal": "crystal"},
                "geometry": [{"name": "crystal"}]}"#,
        )
        .unwrap();
        let err = build_aggregator(&mut settings, &output).err().unwrap();
        assert!(matches!(
            err,
            CliError::Core(spectcrf_core::Error::Config(ConfigError::AttachedToWorld))
        ));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "precious");
    }

    #[test]
    fn test_valid_setup_opens_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");

        let mut settings = ActorSettings::from_json(
            r#"{"actor": {"attach_to": "head", "crystal": "crystal"},
                "geometry": [{"name": "head"}, {"name": "crystal", "mother": "head"}]}"#,
        )
        .unwrap();
        let mut aggregator = build_aggregator(&mut settings, &output).unwrap();
        assert_eq!(aggregator.config().crystal_volume, "crystal");
        aggregator.on_acquisition_end().unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(content.trim_end(), RecordMode::PerPass.columns().join(","));
    }
}
