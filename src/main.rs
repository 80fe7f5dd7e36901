//! CLI for charcard: print character cards (or raw container metadata) from image files.

#![cfg(feature = "cli")]

use charcard::{parse_image_metadata, read_card, CharacterCard, Error, SpecVersion};
use clap::{Parser, ValueEnum};
use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use walkdir::{DirEntry, WalkDir};

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Card shape to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SpecArg {
    /// Record exactly as decoded
    Raw,
    V1,
    V2,
    V3,
    /// Merge of v1, v2 and v3
    Max,
}

#[derive(Parser)]
#[command(name = "charcard")]
#[command(about = "Extract character cards embedded in PNG, JPEG and WebP images", long_about = None)]
struct Args {
    /// Path to an image or directory (use -d/--directory to scan a whole directory)
    path: Option<String>,

    /// Scan a whole directory (optionally with -r to recurse into subdirectories)
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directory: Option<String>,

    /// When scanning a directory, recurse into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// File extensions to read (comma-separated). No-extension files are always read (type guessed from content).
    #[arg(short, long, default_value = "png,jpg,jpeg,webp")]
    extensions: String,

    /// Read all files and guess type from content (ignore extension filter)
    #[arg(long)]
    all: bool,

    /// Card shape to print
    #[arg(long, value_enum, default_value = "raw")]
    spec: SpecArg,

    /// Print the container chunk/segment listing instead of the card
    #[arg(long)]
    metadata: bool,

    /// Run the card's lorebook over this text and print matching entries
    #[arg(long, value_name = "TEXT")]
    scan: Option<String>,

    /// Output JSON per result (one line per file unless --pretty)
    #[arg(long)]
    json: bool,

    /// Pretty-print JSON (use with --json)
    #[arg(long)]
    pretty: bool,

    /// Quiet: only print files that carry a card
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let exts: HashSet<String> = args
        .extensions
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .collect();

    let path_str = args
        .directory
        .as_ref()
        .or(args.path.as_ref())
        .ok_or("Missing path: give a file/directory as argument or use -d/--directory <DIR>")?;
    let path = Path::new(path_str.as_str());

    if !path.exists() {
        eprintln!("Not found: {}", path.display());
        std::process::exit(1);
    }

    if path.is_file() {
        if args.directory.is_some() {
            eprintln!("--directory expects a directory, not a file: {}", path.display());
            std::process::exit(1);
        }
        let found = read_file(path, &args, &exts)?;
        if !found {
            std::process::exit(2);
        }
        return Ok(());
    }

    if path.is_dir() {
        if !args.quiet {
            eprintln!("Reading directory: {} {}", path.display(), if args.recursive { "(recursive)" } else { "" });
        }
        read_dir(path, &args, &exts)?;
        return Ok(());
    }

    eprintln!("Not a file or directory: {}", path.display());
    std::process::exit(1);
}

fn extension_allowed(path: &Path, args: &Args, exts: &HashSet<String>) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    // No extension => always read (guess from content).
    args.all || ext.is_empty() || exts.is_empty() || exts.contains(&ext)
}

/// Returns whether the file carried a readable card (or metadata was printed).
fn read_file(
    path: &Path,
    args: &Args,
    exts: &HashSet<String>,
) -> Result<bool, Box<dyn std::error::Error>> {
    if !extension_allowed(path, args, exts) {
        if !args.quiet {
            eprintln!("Skip (extension): {}", path.display());
        }
        return Ok(false);
    }
    let bytes = fs::read(path)?;
    if args.metadata {
        print_metadata(path.display().to_string(), &bytes, args)?;
        return Ok(true);
    }
    let result = read_card(&bytes);
    let found = result.is_ok();
    print_result(path.display().to_string(), &result, args, &bytes)?;
    Ok(found)
}

/// Dot-files and dot-directories below the walk root. The root itself is never hidden, so
/// `-d .` still walks the current directory.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn read_dir(
    dir: &Path,
    args: &Args,
    exts: &HashSet<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let walker = if args.recursive {
        WalkDir::new(dir).into_iter()
    } else {
        WalkDir::new(dir).max_depth(1).into_iter()
    };

    let mut total = 0u64;
    let mut cards = 0u64;
    let mut corrupt = 0u64;

    for entry in walker.filter_entry(|e| !is_hidden(e)) {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !extension_allowed(path, args, exts) {
            continue;
        }
        total += 1;
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable file");
                continue;
            }
        };
        if args.metadata {
            print_metadata(path.display().to_string(), &bytes, args)?;
            continue;
        }
        let result = read_card(&bytes);
        match &result {
            Ok(_) => cards += 1,
            Err(e) if e.is_corrupt_card() => corrupt += 1,
            Err(_) => {}
        }
        print_result(path.display().to_string(), &result, args, &bytes)?;
    }

    if !args.quiet && !args.metadata {
        eprintln!(
            "Read {} files, {} cards, {} corrupted",
            total, cards, corrupt
        );
    }
    Ok(())
}

fn to_json_string(value: &impl serde::Serialize, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

fn print_metadata(path: String, bytes: &[u8], args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = IndexMap::<String, Value>::new();
    out.insert("sha256".to_string(), Value::String(sha256_hex(bytes)));
    out.insert("path".to_string(), Value::String(path));
    match parse_image_metadata(bytes) {
        Ok(meta) => {
            out.insert("metadata".to_string(), serde_json::to_value(&meta)?);
        }
        Err(e) => {
            out.insert("error".to_string(), Value::String(e.to_string()));
        }
    }
    println!("{}", to_json_string(&out, args.pretty)?);
    Ok(())
}

fn card_value(card: &CharacterCard, spec: SpecArg) -> Result<Value, serde_json::Error> {
    Ok(match spec {
        SpecArg::Raw => serde_json::to_value(card.raw())?,
        SpecArg::V1 => card.to_spec(SpecVersion::V1),
        SpecArg::V2 => card.to_spec(SpecVersion::V2),
        SpecArg::V3 => card.to_spec(SpecVersion::V3),
        SpecArg::Max => card.to_max_compatible_spec(),
    })
}

fn status_label(result: &Result<CharacterCard, Error>) -> &'static str {
    match result {
        Ok(_) => "card",
        Err(e) if e.is_card_missing() => "no_card",
        Err(e) if e.is_corrupt_card() => "corrupt_card",
        Err(_) => "unreadable",
    }
}

fn print_result(
    path: String,
    result: &Result<CharacterCard, Error>,
    args: &Args,
    bytes: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    if args.quiet && result.is_err() {
        return Ok(());
    }
    if args.json {
        let mut out = IndexMap::<String, Value>::new();
        out.insert("sha256".to_string(), Value::String(sha256_hex(bytes)));
        out.insert("path".to_string(), Value::String(path));
        out.insert("status".to_string(), Value::String(status_label(result).to_string()));
        match result {
            Ok(card) => {
                out.insert("format".to_string(), serde_json::to_value(card.source_format())?);
                out.insert("spec".to_string(), Value::String(card.spec().to_string()));
                out.insert("name".to_string(), Value::String(card.name()));
                out.insert("card".to_string(), card_value(card, args.spec)?);
                if let Some(text) = &args.scan {
                    let book = card.get_book();
                    let matched: Vec<_> = book.scan(text);
                    out.insert("lore".to_string(), serde_json::to_value(&matched)?);
                }
            }
            Err(e) => {
                out.insert("error".to_string(), Value::String(e.to_string()));
            }
        }
        println!("{}", to_json_string(&out, args.pretty)?);
        return Ok(());
    }

    // Human-readable output: sha256 first
    println!("  sha256: {}", sha256_hex(bytes));
    match result {
        Ok(card) => {
            println!("CARD {} ({} bytes)", path, bytes.len());
            println!("  spec: {} {}", card.spec(), card.spec_version());
            println!("  name: {}", card.name());
            let tags = card.tags();
            if !tags.is_empty() {
                println!("  tags: {}", tags.join(", "));
            }
            let book = card.get_book();
            println!("  lorebook: {} ({} entries)", book.name, book.entries.len());
            if let Some(text) = &args.scan {
                for entry in book.scan(text) {
                    println!("    match [{}]: {}", entry.keys.join(", "), entry.content);
                }
            }
            if !args.quiet {
                println!("{}", to_json_string(&card_value(card, args.spec)?, true)?);
            }
        }
        Err(e) if e.is_card_missing() => println!("NO CARD {}", path),
        Err(e) if e.is_corrupt_card() => println!("CORRUPT {}: {}", path, e),
        Err(e) => println!("UNREADABLE {}: {}", path, e),
    }
    Ok(())
}
