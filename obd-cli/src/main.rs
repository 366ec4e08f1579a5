//! OBD Signal Decoder CLI Application
//!
//! This is the command-line interface for the OBD signal decoder.
//! It uses the obd-decoder library and adds:
//! - Signal-set and CAN dump file loading
//! - TOML configuration with command-line overrides
//! - Parallel decoding of several dumps
//! - JSON and text output

use anyhow::{bail, Context, Result};
use clap::Parser;
use obd_decoder::{CanIdFormat, Decoder, DecoderConfig, SignalSet};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

mod config;
mod report;

use config::{AppConfig, OutputFormat};
use report::DumpReport;

/// OBD Signal Decoder - Decode diagnostic responses from CAN dumps
#[derive(Parser, Debug)]
#[command(name = "obd-cli")]
#[command(about = "Decode OBD/UDS responses in ASCII CAN dumps using a signal set", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the vehicle signal-set JSON
    #[arg(short, long, value_name = "FILE")]
    signalset: Option<PathBuf>,

    /// Path to a generic signal set applied underneath the vehicle signal set
    #[arg(short, long, value_name = "FILE")]
    base: Option<PathBuf>,

    /// CAN dump file(s) to decode (can be repeated; default: stdin)
    #[arg(short, long, value_name = "FILE")]
    input: Vec<PathBuf>,

    /// Frame identifiers are 29-bit (8 hex characters)
    #[arg(long)]
    twenty_nine_bit: bool,

    /// Frames carry an extended address after the identifier
    #[arg(short, long)]
    extended_addressing: bool,

    /// Only decode commands that apply to this model year
    #[arg(short, long, value_name = "YEAR")]
    model_year: Option<u32>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file for decoded signals (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

/// Effective settings after merging the config file and command line
#[derive(Debug)]
struct Settings {
    signalset: PathBuf,
    base_signalset: Option<PathBuf>,
    dumps: Vec<PathBuf>,
    decoder: DecoderConfig,
    format: OutputFormat,
    output: Option<PathBuf>,
}

impl Settings {
    /// Command-line values win over config file values
    fn resolve(args: &Args, file: AppConfig) -> Result<Self> {
        let Some(signalset) = args.signalset.clone().or(file.input.signalset) else {
            bail!("No signal set given; use --signalset or [input] signalset in the config file");
        };

        let mut decoder = file.decoder;
        if args.twenty_nine_bit {
            decoder.can_id_format = CanIdFormat::TwentyNineBit;
        }
        if args.extended_addressing {
            decoder.extended_addressing = true;
        }
        if let Some(model_year) = args.model_year {
            decoder.model_year = Some(model_year);
        }

        Ok(Self {
            signalset,
            base_signalset: args.base.clone().or(file.input.base_signalset),
            dumps: if args.input.is_empty() {
                file.input.dumps
            } else {
                args.input.clone()
            },
            decoder,
            format: args.format.unwrap_or(file.output.format),
            output: args.output.clone().or(file.output.path),
        })
    }
}

/// A dump's text and where it came from
struct Dump {
    source: String,
    text: String,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("OBD Signal Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", obd_decoder::VERSION);

    let file_config = match &args.config {
        Some(config_path) => {
            log::info!("Loading configuration from: {:?}", config_path);
            config::load_config(config_path)?
        }
        None => AppConfig::default(),
    };
    let settings = Settings::resolve(&args, file_config)?;
    log::debug!("Effective settings: {:?}", settings);

    let rendered = run(&settings)?;

    match &settings.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write output file: {:?}", path))?;
            log::info!("Wrote decoded signals to {:?}", path);
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

/// Load signal sets, decode every dump and render the report
fn run(settings: &Settings) -> Result<String> {
    let vehicle = load_signal_set(&settings.signalset, SignalSet::from_json)?;
    let base = settings
        .base_signalset
        .as_deref()
        .map(|path| load_signal_set(path, SignalSet::base_from_json))
        .transpose()?;

    let decoder = Decoder::for_config(base.as_ref(), &vehicle, &settings.decoder);
    let stats = decoder.registry_stats();
    log::info!(
        "Command registry: {} commands, {} signals",
        stats.num_commands,
        stats.num_signals
    );

    let dumps = read_dumps(&settings.dumps)?;
    let reports: Vec<DumpReport> = dumps
        .par_iter()
        .map(|dump| {
            let values = decoder.decode(&dump.text, &settings.decoder);
            log::debug!("{}: {} signals decoded", dump.source, values.len());
            DumpReport {
                source: dump.source.clone(),
                values,
            }
        })
        .collect();

    report::render(&reports, settings.format)
}

fn load_signal_set(
    path: &Path,
    parse: fn(&str) -> obd_decoder::Result<SignalSet>,
) -> Result<SignalSet> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read signal set: {:?}", path))?;
    let signal_set =
        parse(&json).with_context(|| format!("Failed to load signal set: {:?}", path))?;
    log::info!(
        "Loaded {:?}: {} commands, {} signals",
        path,
        signal_set.commands.len(),
        signal_set.num_signals()
    );
    Ok(signal_set)
}

/// Read every dump file, or stdin when none are given
fn read_dumps(paths: &[PathBuf]) -> Result<Vec<Dump>> {
    if paths.is_empty() {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read CAN dump from stdin")?;
        return Ok(vec![Dump {
            source: "<stdin>".to_string(),
            text,
        }]);
    }

    paths
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read CAN dump: {:?}", path))?;
            Ok(Dump {
                source: path.display().to_string(),
                text,
            })
        })
        .collect()
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNAL_SET: &str = r#"{"commands": [
        {"hdr": "720", "rax": "728", "cmd": {"22": "404C"}, "freq": 5,
         "signals": [{"id": "F150_ODO", "name": "Odometer", "fmt": {"len": 24, "max": 1677721, "div": 10, "unit": "kilometers"}}]}
    ]}"#;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("obd-cli").chain(argv.iter().copied()))
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = AppConfig::default();
        file.input.signalset = Some(PathBuf::from("from-file.json"));
        file.input.dumps = vec![PathBuf::from("file-dump.txt")];
        file.decoder.model_year = Some(2015);
        file.output.format = OutputFormat::Text;

        let settings = Settings::resolve(
            &args(&["--signalset", "cli.json", "--model-year", "2020", "--twenty-nine-bit"]),
            file,
        )
        .unwrap();

        assert_eq!(settings.signalset, PathBuf::from("cli.json"));
        assert_eq!(settings.dumps, vec![PathBuf::from("file-dump.txt")]);
        assert_eq!(settings.decoder.model_year, Some(2020));
        assert_eq!(settings.decoder.can_id_format, CanIdFormat::TwentyNineBit);
        assert_eq!(settings.format, OutputFormat::Text);
    }

    #[test]
    fn test_missing_signal_set_is_an_error() {
        assert!(Settings::resolve(&args(&[]), AppConfig::default()).is_err());
    }

    #[test]
    fn test_run_decodes_dump_files() {
        let dir = tempfile::tempdir().unwrap();
        let signalset = dir.path().join("f150.json");
        let dump = dir.path().join("odometer.txt");
        fs::write(&signalset, SIGNAL_SET).unwrap();
        fs::write(&dump, "7280662404C23CE1C\n").unwrap();

        let settings = Settings::resolve(
            &args(&[
                "-s",
                signalset.to_str().unwrap(),
                "-i",
                dump.to_str().unwrap(),
                "--format",
                "text",
            ]),
            AppConfig::default(),
        )
        .unwrap();

        assert_eq!(run(&settings).unwrap(), "F150_ODO = 234652.4\n");
    }

    #[test]
    fn test_run_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let signalset = dir.path().join("f150.json");
        fs::write(&signalset, SIGNAL_SET).unwrap();

        let settings = Settings::resolve(
            &args(&[
                "-s",
                signalset.to_str().unwrap(),
                "-i",
                dir.path().join("missing.txt").to_str().unwrap(),
            ]),
            AppConfig::default(),
        )
        .unwrap();

        let error = run(&settings).unwrap_err();
        assert!(format!("{:#}", error).contains("Failed to read CAN dump"));
    }
}
