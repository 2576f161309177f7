//! csv-typed CLI - read selected columns of a CSV file

use clap::Parser;
use csv_typed::{
    Comment, Converter, CsvError, CsvReader, HeaderPolicy, Overflow, Quote, ReaderBuilder,
    detect_charset, tie,
};
use log::{LevelFilter, info, warn};
use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Bytes inspected when guessing the input charset.
const DETECT_SAMPLE_LEN: u64 = 64 * 1024;

/// Read the requested columns of a CSV file, in the requested order.
///
/// Logging is controlled with RUST_LOG (e.g. RUST_LOG=debug).
#[derive(Parser, Debug)]
#[command(name = "csv-typed")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input CSV file
    file: PathBuf,

    /// Comma-separated column names to read
    #[arg(short = 'c', long, required = true, value_delimiter = ',')]
    columns: Vec<String>,

    /// Field delimiter (single character)
    #[arg(short = 'd', long, default_value = ",")]
    delimiter: char,

    /// Quote character (single character, or 'none')
    #[arg(short = 'q', long, default_value = "none")]
    quote: String,

    /// Characters trimmed from both ends of every field
    #[arg(long, default_value = " \t")]
    trim: String,

    /// Skip lines starting with any of these characters
    #[arg(long)]
    comment: Option<String>,

    /// Skip empty and whitespace-only lines
    #[arg(long)]
    skip_blank: bool,

    /// Clamp out-of-range numbers instead of failing
    #[arg(long)]
    clamp: bool,

    /// Tolerate header columns that were not requested
    #[arg(long)]
    ignore_extra: bool,

    /// Tolerate requested columns missing from the header
    #[arg(long)]
    ignore_missing: bool,

    /// Pad rows with too few fields
    #[arg(long)]
    allow_short: bool,

    /// Drop trailing fields of rows with too many fields
    #[arg(long)]
    allow_long: bool,

    /// Charset of the input ('auto' to guess); fields are printed as UTF-8
    #[arg(short = 'e', long)]
    encoding: Option<String>,

    /// Maximum line length in bytes
    #[arg(long)]
    max_line_len: Option<usize>,

    /// Log bad rows and keep reading instead of stopping
    #[arg(long)]
    skip_bad: bool,

    /// Only print the number of rows read
    #[arg(long)]
    count: bool,
}

fn init_logging() {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if env::var("RUST_LOG").is_err() {
        builder.filter_module("csv_typed", LevelFilter::Warn);
    }
    let _ = builder.format_timestamp_millis().try_init();
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match read_file(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error processing {}: {}", args.file.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn read_file(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let converter = resolve_converter(args)?;
    let mut reader = build_reader(args)?;

    let names: Vec<&str> = args.columns.iter().map(String::as_str).collect();
    let policy = HeaderPolicy::new(args.ignore_extra, args.ignore_missing);
    reader.read_header(policy, &names)?;
    for name in &names {
        if !reader.has_column(name) {
            warn!("column \"{name}\" is not in the header; printing it empty");
        }
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut values = vec![String::new(); names.len()];
    let mut bad_rows = 0u64;

    loop {
        match read_row(&mut reader, converter.as_ref(), &mut values) {
            Ok(true) => {
                if !args.count {
                    writeln!(out, "{}", values.join("\t"))?;
                }
            }
            Ok(false) => break,
            Err(e @ (CsvError::LineTooLong { .. } | CsvError::Io { .. })) => return Err(e.into()),
            Err(e) if args.skip_bad => {
                bad_rows += 1;
                warn!("skipping line {}: {e}", reader.line_number());
            }
            Err(e) => return Err(e.into()),
        }
    }

    if args.count {
        writeln!(out, "{}", reader.rows_read())?;
    }
    out.flush()?;
    info!(
        "{}: {} row(s) read, {} skipped",
        reader.source_name(),
        reader.rows_read(),
        bad_rows
    );
    Ok(())
}

/// One row into `values`, through the converter when one is set.
fn read_row(
    reader: &mut CsvReader<'_>,
    converter: Option<&Converter>,
    values: &mut [String],
) -> csv_typed::Result<bool> {
    match converter {
        Some(conv) => {
            let mut tied: Vec<_> = values.iter_mut().map(|v| tie(conv, v)).collect();
            reader.read_row(&mut tied[..])
        }
        None => reader.read_row(values),
    }
}

fn build_reader(args: &Args) -> Result<CsvReader<'static>, Box<dyn std::error::Error>> {
    let mut builder = ReaderBuilder::new(args.columns.len());

    builder
        .delimiter(ascii_byte(args.delimiter, "delimiter")?)
        .quote(parse_quote(&args.quote)?)
        .trim(args.trim.as_bytes())
        .overflow(if args.clamp {
            Overflow::Clamp
        } else {
            Overflow::Fail
        })
        .allow_short_rows(args.allow_short)
        .allow_long_rows(args.allow_long);

    let markers = args.comment.as_deref().map(str::as_bytes);
    builder.comment(match (markers, args.skip_blank) {
        (None, false) => Comment::None,
        (None, true) => Comment::Blank,
        (Some(m), false) => Comment::prefix(m),
        (Some(m), true) => Comment::prefix_or_blank(m),
    });

    if let Some(len) = args.max_line_len {
        builder.max_line_len(len);
    }

    Ok(builder.from_path(&args.file)?)
}

fn resolve_converter(args: &Args) -> Result<Option<Converter>, Box<dyn std::error::Error>> {
    let Some(label) = args.encoding.as_deref() else {
        return Ok(None);
    };
    let from = if label.eq_ignore_ascii_case("auto") {
        let mut sample = Vec::new();
        File::open(&args.file)?
            .take(DETECT_SAMPLE_LEN)
            .read_to_end(&mut sample)?;
        let guessed = detect_charset(&sample);
        info!("{}: guessed charset {guessed}", args.file.display());
        guessed.to_string()
    } else {
        label.to_string()
    };
    Ok(Some(Converter::new("UTF-8", &from)?))
}

fn parse_quote(value: &str) -> Result<Quote, Box<dyn std::error::Error>> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(Quote::None);
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Quote::Some(ascii_byte(c, "quote")?)),
        _ => Err(format!("quote must be a single character or 'none', got {value:?}").into()),
    }
}

fn ascii_byte(c: char, what: &str) -> Result<u8, Box<dyn std::error::Error>> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| format!("{what} must be an ASCII character, got {c:?}").into())
}
