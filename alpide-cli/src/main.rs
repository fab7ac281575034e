//! alpide: decode ALPIDE readout captures from the command line.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use alpide_decoder::{AlpideDecoder, DecoderConfig, WordKind, Words};
use alpide_io::{
    BatchDecoder, CaptureReader, DecodeSummary, HitFileWriter, HitSink, OutputFormat,
    RecordFilter,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
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

    #[error("{0}")]
    AlpideIo(#[from] alpide_io::Error),

    #[error("decoder error: {0}")]
    Decoder(#[from] alpide_decoder::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid hex input: {0}")]
    Hex(String),
}

/// Output encoding selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Comma separated text with a header line
    Csv,
    /// 28 byte little-endian records
    Bin,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => OutputFormat::Csv,
            Format::Bin => OutputFormat::Binary,
        }
    }
}

/// ALPIDE readout decoder.
#[derive(Parser)]
#[command(name = "alpide")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Worker threads for parallel decoding (default: all cores)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode capture files into hit records
    Decode {
        /// Input capture file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Decoder configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Drop hits with a quality flag other than ok
        #[arg(long)]
        skip_corrupted: bool,

        /// Output format; defaults to the output file extension
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Decode on a single thread
        #[arg(long)]
        sequential: bool,
    },

    /// Show information about a capture file
    Info {
        /// Input capture file
        input: PathBuf,

        /// Decoder configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Classify and decode a hex string word by word
    Words {
        /// Event bytes, e.g. "a1 00 c2 4005 b0"
        hex: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = configure_threads(cli.threads).and_then(|()| run(cli.command)) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Decode {
            input,
            output,
            config,
            skip_corrupted,
            format,
            sequential,
        } => {
            let config = load_config(config.as_deref())?;
            let format = format.map_or_else(|| OutputFormat::from_path(&output), Into::into);
            let filter = if skip_corrupted {
                RecordFilter::SkipCorrupted
            } else {
                RecordFilter::All
            };

            log::info!(
                "decoding {} file(s) into {} ({:?}, {:?})",
                input.len(),
                output.display(),
                format,
                filter
            );

            let start = Instant::now();
            let batch = BatchDecoder::new(config).with_parallel(!sequential);
            let mut writer = HitFileWriter::create(&output, format, filter)?;
            let mut total = DecodeSummary::default();

            for path in &input {
                let reader = CaptureReader::open(path)?;
                let frames = reader.read_frames()?;
                let summary = batch.decode_into(&frames, &mut writer)?;
                log::info!(
                    "{}: {} events, {} hits",
                    path.display(),
                    summary.events,
                    summary.hits
                );
                total.merge(&summary);
            }
            writer.finish()?;

            println!(
                "Decoded {} file(s) in {:.2}s",
                input.len(),
                start.elapsed().as_secs_f64()
            );
            println!("{total}");
        }

        Commands::Info { input, config } => {
            let config = load_config(config.as_deref())?;
            let reader = CaptureReader::open(&input)?;
            let frames = reader.read_frames()?;

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                reader.file_size(),
                reader.file_size() as f64 / 1_000_000.0
            );
            println!("Frames: {}", frames.len());

            let histogram = word_histogram(frames.iter().map(|frame| frame.payload));
            let payload_bytes: usize = frames.iter().map(|frame| frame.payload.len()).sum();
            let count_where = |pred: fn(WordKind) -> bool| -> usize {
                histogram
                    .iter()
                    .filter(|(kind, _)| pred(**kind))
                    .map(|(_, count)| count)
                    .sum()
            };
            println!("Payload: {} bytes", payload_bytes);
            println!(
                "Words: {} data, {} filler",
                count_where(WordKind::is_data),
                count_where(WordKind::is_filler)
            );
            for kind in WordKind::ALL {
                let count = histogram.get(&kind).copied().unwrap_or(0);
                if count > 0 {
                    println!("  {:<14} {}", kind.name(), count);
                }
            }

            let outcomes = BatchDecoder::new(config).decode(&frames);
            println!("{}", DecodeSummary::from_outcomes(&outcomes));
        }

        Commands::Words { hex } => {
            let data = parse_hex(&hex)?;
            for (offset, kind, word) in Words::new(&data) {
                let bytes: Vec<String> = word.iter().map(|b| format!("{b:02x}")).collect();
                println!("{:>6}  {:<8}  {}", offset, bytes.join(" "), kind);
            }

            let mut decoder = AlpideDecoder::new();
            match decoder.decode_event(&data, alpide_decoder::TriggerTime::default()) {
                Ok(status) => println!(
                    "event ok: {} hit(s), corrupt = {}, readout flags = {:#x}",
                    status.hits, status.corrupt, status.readout_flags
                ),
                Err(e) => println!("event rejected: {e}"),
            }
            for hit in decoder.hits() {
                println!("  {} | flag {}", hit, hit.quality_flag());
            }
        }
    }

    Ok(())
}

/// Counts word kinds over a set of event buffers.
fn word_histogram<'a>(payloads: impl IntoIterator<Item = &'a [u8]>) -> HashMap<WordKind, usize> {
    let mut histogram = HashMap::new();
    for payload in payloads {
        for (_, kind, _) in Words::new(payload) {
            *histogram.entry(kind).or_default() += 1;
        }
    }
    histogram
}

fn configure_threads(threads: Option<usize>) -> Result<()> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new().num_threads(n).build_global()?;
        log::debug!("using {n} worker threads");
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DecoderConfig> {
    let Some(path) = path else {
        return Ok(DecoderConfig::default());
    };
    let config = DecoderConfig::from_file(path)?;
    log::debug!("loaded {}: {:?}", path.display(), config);
    Ok(config)
}

/// Parses hex digits, ignoring whitespace and an optional `0x` prefix per token.
fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input
        .split_whitespace()
        .map(|token| token.trim_start_matches("0x"))
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::Hex(format!("odd number of digits in {input:?}")));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = digits.get(i..i + 2).unwrap_or_default();
            u8::from_str_radix(pair, 16).map_err(|_| CliError::Hex(format!("bad byte {pair:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(
            parse_hex("a1 00 c2 4005 b0").unwrap(),
            vec![0xa1, 0x00, 0xc2, 0x40, 0x05, 0xb0]
        );
        assert_eq!(parse_hex("0xff 0xe1").unwrap(), vec![0xff, 0xe1]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_word_histogram() {
        let events: [&[u8]; 2] = [&[0xa1, 0x00, 0xc2, 0x40, 0x05, 0xb0], &[0xff, 0xe3, 0x00]];
        let histogram = word_histogram(events);
        assert_eq!(histogram[&WordKind::ChipHeader], 1);
        assert_eq!(histogram[&WordKind::DataShort], 1);
        assert_eq!(histogram[&WordKind::Idle], 1);
        assert_eq!(histogram[&WordKind::EmptyFrame], 1);
        assert!(!histogram.contains_key(&WordKind::DataLong));
    }

    #[test]
    fn test_cli_parses_decode() {
        let cli = Cli::try_parse_from([
            "alpide",
            "-v",
            "-j",
            "4",
            "decode",
            "a.cap",
            "b.cap",
            "-o",
            "hits.bin",
            "--skip-corrupted",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.threads, Some(4));
        match cli.command {
            Commands::Decode {
                input,
                skip_corrupted,
                format,
                ..
            } => {
                assert_eq!(input.len(), 2);
                assert!(skip_corrupted);
                assert!(format.is_none());
            }
            _ => panic!("expected decode"),
        }
    }
}
