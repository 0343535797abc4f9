//! rudnik - Extract place names and coordinates from captured protobuf responses
//!
//! This tool reads captured response bodies (and their `.meta.txt` request
//! metadata, when present) and either probes them without a schema or
//! decodes them as Mapbox vector tiles.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rudnik_core::{Capture, ClassifierConfig, Pipeline, PlaceRecord, TileConfig};
use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Extract place names and coordinates from captured protobuf responses
#[derive(Parser, Debug)]
#[command(name = "rudnik")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode captures without a schema and classify every field
    Probe(ProbeArgs),
    /// Decode captures as vector tiles and list named places
    Tiles(TilesArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single capture
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of captures to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CommonArgs {
    #[command(flatten)]
    input: InputMode,

    /// File extension of captures when scanning a directory
    #[arg(long, default_value = "pbf")]
    extension: String,

    /// Skip captures whose bytes are identical to one already seen
    #[arg(long)]
    dedup: bool,

    /// Dry run - don't write the output file, just report what was found
    #[arg(long)]
    dry_run: bool,

    /// Overwrite an existing output file
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output JSON document
    #[arg(short, long, default_value = "extracted.json")]
    output: PathBuf,

    /// Strings must have more chars than this to count as text
    #[arg(long, default_value_t = rudnik_core::classify::DEFAULT_MIN_TEXT_CHARS)]
    min_text_chars: usize,

    /// Opaque spans must be longer than this to be walked as messages
    #[arg(long, default_value_t = rudnik_core::classify::DEFAULT_MIN_NESTED_SPAN)]
    min_nested_span: usize,

    /// Only accept text containing at least one letter
    #[arg(long)]
    require_letter: bool,

    /// Keep opaque spans as byte items instead of dropping them
    #[arg(long)]
    retain_bytes: bool,

    /// Do not descend deeper than this many nested messages
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Args, Debug)]
struct TilesArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output file, one JSON object per line
    #[arg(short, long, default_value = "extracted_places.jsonl")]
    output: PathBuf,

    /// Property keys searched for a place name, in order (repeatable)
    #[arg(long = "name-key")]
    name_keys: Vec<String>,

    /// Extent assumed for layers that do not declare one
    #[arg(long, default_value_t = rudnik_core::geo::DEFAULT_EXTENT)]
    default_extent: u32,
}

/// Tracks capture contents for deduplication
#[derive(Default)]
struct CaptureRegistry {
    /// Content hashes already accepted
    seen: HashSet<String>,
    /// Statistics
    stats: RegistryStats,
}

#[derive(Default)]
struct RegistryStats {
    total_found: usize,
    duplicates_skipped: usize,
    unreadable: usize,
    failed: usize,
    written: usize,
}

impl CaptureRegistry {
    fn new() -> Self {
        Self::default()
    }

    /// Compute a short hash of the content (first 16 chars of blake3)
    fn content_hash(content: &[u8]) -> String {
        let hash = blake3::hash(content);
        hash.to_hex()[..16].to_string()
    }

    /// Register a capture; returns false if identical bytes were seen before
    fn register(&mut self, capture: &Capture, dedup: bool) -> bool {
        self.stats.total_found += 1;
        if !dedup {
            return true;
        }

        let hash = Self::content_hash(&capture.data);
        if !self.seen.insert(hash.clone()) {
            debug!(
                "Skipping duplicate: {} (hash: {})",
                capture.source_identifier, hash
            );
            self.stats.duplicates_skipped += 1;
            return false;
        }
        true
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} found, {} duplicates skipped, {} unreadable, {} failed, {} written",
            self.stats.total_found,
            self.stats.duplicates_skipped,
            self.stats.unreadable,
            self.stats.failed,
            self.stats.written
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match &cli.command {
        Command::Probe(args) => run_probe(args),
        Command::Tiles(args) => run_tiles(args),
    }
}

impl ProbeArgs {
    fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig::new()
            .min_text_chars(self.min_text_chars)
            .min_nested_span(self.min_nested_span)
            .require_letter(self.require_letter)
            .retain_opaque_spans(self.retain_bytes)
            .max_depth(self.max_depth)
    }
}

impl TilesArgs {
    fn tile_config(&self) -> TileConfig {
        let config = TileConfig::new().default_extent(self.default_extent);
        if self.name_keys.is_empty() {
            config
        } else {
            config.name_keys(self.name_keys.iter().cloned())
        }
    }
}

/// Schema-less extraction over every capture
fn run_probe(args: &ProbeArgs) -> Result<()> {
    let mut registry = CaptureRegistry::new();
    let captures = load_captures(&args.common, &mut registry)?;

    let pipeline = Pipeline::with_config(args.classifier_config(), TileConfig::default());
    let results: Vec<_> = pipeline
        .probe_all(&captures)
        .into_iter()
        .filter(|result| {
            if result.items.is_empty() {
                info!("No items found in {}", result.source_identifier);
                false
            } else {
                info!(
                    "Found {} potential items in {}",
                    result.items.len(),
                    result.source_identifier
                );
                true
            }
        })
        .collect();

    let total_items: usize = results.iter().map(|r| r.items.len()).sum();
    if args.common.dry_run {
        println!(
            "Would write {} items from {} captures to {}",
            total_items,
            results.len(),
            args.output.display()
        );
    } else {
        let json = serde_json::to_vec_pretty(&results).context("Failed to serialize results")?;
        write_output(&args.output, &json, args.common.force)?;
        registry.stats.written = results.len();
        println!("Wrote {} items to {}", total_items, args.output.display());
    }

    registry.print_summary();
    Ok(())
}

/// Vector tile decoding over every capture
fn run_tiles(args: &TilesArgs) -> Result<()> {
    let mut registry = CaptureRegistry::new();
    let captures = load_captures(&args.common, &mut registry)?;

    let pipeline = Pipeline::with_config(ClassifierConfig::default(), args.tile_config());
    let mut places: Vec<PlaceRecord> = Vec::new();
    for outcome in pipeline.decode_tiles_all(&captures) {
        match outcome {
            Ok(extraction) => {
                let found = extraction.place_records();
                info!(
                    "Found {} places ({} features) in {}",
                    found.len(),
                    extraction.feature_count(),
                    extraction.source_identifier
                );
                places.extend(found);
            }
            Err(failure) => {
                warn!("Error decoding {}", failure);
                registry.stats.failed += 1;
            }
        }
    }

    if args.common.dry_run {
        println!(
            "Would write {} places to {}",
            places.len(),
            args.output.display()
        );
    } else {
        let mut lines = Vec::new();
        for place in &places {
            serde_json::to_writer(&mut lines, place).context("Failed to serialize place")?;
            lines.push(b'\n');
        }
        write_output(&args.output, &lines, args.common.force)?;
        registry.stats.written = places.len();
        println!("Wrote {} places to {}", places.len(), args.output.display());
    }

    registry.print_summary();
    Ok(())
}

/// Resolve the input mode to a sorted list of capture paths
fn collect_paths(common: &CommonArgs) -> Result<Vec<PathBuf>> {
    if let Some(ref file) = common.input.file {
        if !file.exists() {
            bail!("Input file does not exist: {}", file.display());
        }
        if !file.is_file() {
            bail!("Input path is not a file: {}", file.display());
        }
        return Ok(vec![file.clone()]);
    }

    let Some(ref directory) = common.input.directory else {
        bail!("Either --file or --directory must be specified")
    };
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut paths = Vec::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Skip directories
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        if !has_extension(path, &common.extension) {
            trace!("Skipping non-capture: {}", path.display());
            continue;
        }

        paths.push(path.to_path_buf());
    }

    paths.sort();
    Ok(paths)
}

/// Case-insensitive extension check
fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Read every capture, dropping unreadable files and duplicates
fn load_captures(common: &CommonArgs, registry: &mut CaptureRegistry) -> Result<Vec<Capture>> {
    let mut captures = Vec::new();

    for path in collect_paths(common)? {
        trace!("Reading {}", path.display());
        match Capture::from_path(&path) {
            Ok(capture) => {
                if registry.register(&capture, common.dedup) {
                    captures.push(capture);
                }
            }
            Err(e) => {
                // Log error but continue with other captures
                warn!("Error reading {}: {}", path.display(), e);
                registry.stats.unreadable += 1;
            }
        }
    }

    info!("Loaded {} captures", captures.len());
    Ok(captures)
}

/// Write an output file, refusing to clobber unless forced
fn write_output(output_path: &Path, content: &[u8], force: bool) -> Result<()> {
    // Create parent directories
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    // Check if file exists
    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    let file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    writer
        .write_all(content)
        .and_then(|()| writer.flush())
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}
