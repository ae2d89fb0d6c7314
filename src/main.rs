//! NeoX CLI - Command-line tool for NeoX engine archive extraction.
//!
//! This is the main entry point for the NeoX command-line application.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use neox::prelude::*;

/// NeoX - NetEase NeoX engine archive extraction tool
#[derive(Parser)]
#[command(name = "neox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct KeyArgs {
    /// Archive key as a hex string
    #[arg(long, env = "NEOX_KEY", conflicts_with = "key_seed")]
    key: Option<String>,

    /// Derive the archive key from a single seed byte
    #[arg(long)]
    key_seed: Option<u8>,
}

impl KeyArgs {
    fn resolve(&self) -> Result<Option<CipherKey>> {
        match (&self.key, self.key_seed) {
            (Some(hex), _) => Ok(Some(
                CipherKey::from_hex(hex).context("Invalid archive key")?,
            )),
            (None, Some(seed)) => Ok(Some(CipherKey::from_seed(seed))),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Args, Clone)]
struct MeshArgs {
    /// Flip the V texture coordinate
    #[arg(long)]
    flip_uv: bool,

    /// Uniform scale for PMX and glTF output
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Force a bone index layout instead of trying both
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,
}

impl MeshArgs {
    fn options(&self) -> ExportOptions {
        ExportOptions {
            flip_uv: self.flip_uv,
            scale: self.scale,
        }
    }

    fn decoder(&self) -> MeshDecoder {
        match self.layout {
            Some(LayoutArg::Wide) => MeshDecoder::with_layout(BoneLayout::Wide),
            Some(LayoutArg::Narrow) => MeshDecoder::with_layout(BoneLayout::Narrow),
            None => MeshDecoder::new(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    /// 16-bit bone indices
    Wide,
    /// 8-bit bone indices
    Narrow,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract files from NPK archives
    Extract {
        /// Path to an NPK file, or a directory searched for *.npk
        #[arg(short, long, env = "NEOX_NPK")]
        npk: PathBuf,

        /// Output directory
        #[arg(short, long, env = "NEOX_OUTPUT")]
        output: PathBuf,

        /// Filter pattern (glob-style, matched against entry names)
        #[arg(short, long)]
        filter: Option<String>,

        /// Also convert meshes to these formats (obj, smd, ascii, pmx, iqe, glb)
        #[arg(long, value_delimiter = ',')]
        convert_mesh: Vec<MeshFormat>,

        /// Worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        key: KeyArgs,

        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// List contents of an NPK archive
    List {
        /// Path to the NPK file
        #[arg(short, long, env = "NEOX_NPK")]
        npk: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,

        #[command(flatten)]
        key: KeyArgs,
    },

    /// Show header and index statistics of an NPK archive
    Info {
        /// Path to the NPK file
        #[arg(short, long, env = "NEOX_NPK")]
        npk: PathBuf,

        #[command(flatten)]
        key: KeyArgs,
    },

    /// Convert a .mesh file to other formats
    MeshConvert {
        /// Input mesh file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output formats
        #[arg(short, long, value_delimiter = ',', default_value = "obj")]
        format: Vec<MeshFormat>,

        #[command(flatten)]
        mesh: MeshArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Extract {
            npk,
            output,
            filter,
            convert_mesh,
            jobs,
            key,
            mesh,
        } => {
            if let Some(jobs) = jobs {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .context("Failed to configure worker threads")?;
            }
            let settings = ExtractSettings {
                filter: filter.as_deref().map(Pattern::new).transpose()?,
                key: key.resolve()?,
                convert: convert_mesh,
                decoder: mesh.decoder(),
                options: mesh.options(),
            };
            cmd_extract(&npk, &output, &settings)?;
        }
        Commands::List {
            npk,
            filter,
            detailed,
            key,
        } => {
            let pattern = filter.as_deref().map(Pattern::new).transpose()?;
            cmd_list(&npk, pattern.as_ref(), detailed, key.resolve()?.as_ref())?;
        }
        Commands::Info { npk, key } => {
            cmd_info(&npk, key.resolve()?.as_ref())?;
        }
        Commands::MeshConvert {
            input,
            output,
            format,
            mesh,
        } => {
            cmd_mesh_convert(&input, output.as_deref(), &format, &mesh)?;
        }
    }

    Ok(())
}

/// A memory-mapped archive and its parsed index.
struct MappedArchive {
    name: String,
    mmap: Mmap,
    catalog: Catalog,
}

fn open_archive(path: &Path, key: Option<&CipherKey>) -> Result<MappedArchive> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map {}", path.display()))?;
    let catalog = Catalog::open_with(&mmap, key, OpenOptions::default())
        .with_context(|| format!("Failed to read NPK index of {}", path.display()))?;

    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(MappedArchive {
        name,
        mmap,
        catalog,
    })
}

fn matches_filter(pattern: Option<&Pattern>, entry: &EntryDescriptor) -> bool {
    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    pattern.map_or(true, |p| {
        p.matches_with(&entry.display_name().replace('\\', "/"), OPTIONS)
    })
}

/// Archives to process: the path itself, or every `.npk` below it.
fn collect_archives(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("{} is neither a file nor a directory", path.display());
    }

    let mut archives: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("npk"))
        })
        .map(|entry| entry.into_path())
        .collect();
    archives.sort();
    Ok(archives)
}

struct ExtractSettings {
    filter: Option<Pattern>,
    key: Option<CipherKey>,
    convert: Vec<MeshFormat>,
    decoder: MeshDecoder,
    options: ExportOptions,
}

#[derive(Default)]
struct ExtractStats {
    written: AtomicUsize,
    failed: AtomicUsize,
    crc_mismatch: AtomicUsize,
    meshes: AtomicUsize,
    mesh_failed: AtomicUsize,
}

fn cmd_extract(npk: &Path, output: &Path, settings: &ExtractSettings) -> Result<()> {
    let archives = collect_archives(npk)?;
    if archives.is_empty() {
        bail!("No .npk files found in {}", npk.display());
    }

    fs::create_dir_all(output)?;

    let start = Instant::now();
    for path in &archives {
        match extract_archive(path, output, settings) {
            Ok(()) => {}
            Err(err) if archives.len() > 1 => warn!("Skipping {}: {err:#}", path.display()),
            Err(err) => return Err(err),
        }
    }

    println!("Extraction completed in {:?}", start.elapsed());
    Ok(())
}

fn extract_archive(path: &Path, output: &Path, settings: &ExtractSettings) -> Result<()> {
    println!("Opening NPK archive: {}", path.display());

    let start = Instant::now();
    let archive = open_archive(path, settings.key.as_ref())?;
    println!(
        "Loaded {} entries ({}) in {:?}",
        archive.catalog.len(),
        archive.catalog.header().variant,
        start.elapsed()
    );
    if !archive.catalog.rejected().is_empty() {
        warn!(
            "{} index rows point outside the archive and were skipped",
            archive.catalog.rejected().len()
        );
    }

    let entries: Vec<&EntryDescriptor> = archive
        .catalog
        .iter()
        .filter(|e| matches_filter(settings.filter.as_ref(), e))
        .collect();

    println!("Extracting {} entries...", entries.len());

    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let stats = ExtractStats::default();
    entries.par_iter().for_each(|entry| {
        if let Err(err) = extract_entry(&archive, entry, output, settings, &stats) {
            warn!(entry = %entry.display_name(), offset = entry.offset, "{err:#}");
            stats.failed.fetch_add(1, Ordering::Relaxed);
        }
        pb.inc(1);
    });

    pb.finish_with_message("Done");
    println!(
        "{}: {} written, {} failed, {} CRC mismatches",
        archive.name,
        stats.written.load(Ordering::Relaxed),
        stats.failed.load(Ordering::Relaxed),
        stats.crc_mismatch.load(Ordering::Relaxed),
    );
    if !settings.convert.is_empty() {
        println!(
            "{}: {} meshes converted, {} failed",
            archive.name,
            stats.meshes.load(Ordering::Relaxed),
            stats.mesh_failed.load(Ordering::Relaxed),
        );
    }

    Ok(())
}

fn extract_entry(
    archive: &MappedArchive,
    entry: &EntryDescriptor,
    output: &Path,
    settings: &ExtractSettings,
    stats: &ExtractStats,
) -> Result<()> {
    let file = materialize(&archive.mmap, entry, settings.key.as_ref())?;
    if !file.valid {
        stats.crc_mismatch.fetch_add(1, Ordering::Relaxed);
    }
    match file.wrapping {
        Some(wrapping) if !file.unwrapped => {
            debug!(
                entry = %entry.display_name(),
                wrapping = wrapping.name(),
                "payload is still wrapped"
            );
        }
        _ => {}
    }

    let output_path = output.join(neox::output_path(&archive.name, entry, file.extension));
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output_path, &file.data)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    stats.written.fetch_add(1, Ordering::Relaxed);

    if file.category == FileCategory::Mesh && !settings.convert.is_empty() {
        match convert_mesh(&file.data, &output_path, settings) {
            Ok(()) => {
                stats.meshes.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!(entry = %entry.display_name(), "mesh conversion failed: {err:#}");
                stats.mesh_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    Ok(())
}

fn convert_mesh(data: &[u8], base: &Path, settings: &ExtractSettings) -> Result<()> {
    let model = settings.decoder.decode(data)?;
    for &format in &settings.convert {
        let bytes = encode(&model, format, &settings.options)?;
        fs::write(base.with_extension(format.extension()), bytes)?;
    }
    Ok(())
}

fn cmd_list(
    npk: &Path,
    filter: Option<&Pattern>,
    detailed: bool,
    key: Option<&CipherKey>,
) -> Result<()> {
    let archive = open_archive(npk, key)?;

    let mut count = 0;
    for entry in archive.catalog.iter() {
        if !matches_filter(filter, entry) {
            continue;
        }

        if detailed {
            println!(
                "{:>10} {:>10} {:>10} {:<5} {:<8} {:08x} {}",
                entry.offset,
                entry.stored_len,
                entry.original_len,
                entry.compression.name(),
                entry.encryption.name(),
                entry.crc,
                entry.display_name()
            );
        } else {
            println!("{}", entry.display_name());
        }
        count += 1;
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_info(npk: &Path, key: Option<&CipherKey>) -> Result<()> {
    let archive = open_archive(npk, key)?;
    let catalog = &archive.catalog;
    let header = catalog.header();

    println!("Archive:      {}", npk.display());
    println!("Variant:      {}", header.variant);
    println!("Entries:      {}", header.entry_count);
    println!("Index offset: {:#x}", header.index_offset);
    println!("Row width:    {} bytes", catalog.row_width().size());
    println!("Encrypt mode: {}", header.encrypt_mode);
    println!("Hash mode:    {}", header.hash_mode);
    println!("Name table:   {}", if header.has_name_table() { "yes" } else { "no" });
    println!("Rejected:     {}", catalog.rejected().len());

    let mut compression: BTreeMap<&str, usize> = BTreeMap::new();
    let mut encryption: BTreeMap<&str, usize> = BTreeMap::new();
    let mut stored = 0u64;
    let mut original = 0u64;
    for entry in catalog.iter() {
        *compression.entry(entry.compression.name()).or_default() += 1;
        *encryption.entry(entry.encryption.name()).or_default() += 1;
        stored += u64::from(entry.stored_len);
        original += u64::from(entry.original_len);
    }

    println!("Stored:       {} bytes", stored);
    println!("Original:     {} bytes", original);
    println!("\nCompression:");
    for (name, count) in &compression {
        println!("  {:<8} {}", name, count);
    }
    println!("\nEncryption:");
    for (name, count) in &encryption {
        println!("  {:<8} {}", name, count);
    }

    Ok(())
}

fn cmd_mesh_convert(
    input: &Path,
    output: Option<&Path>,
    formats: &[MeshFormat],
    mesh: &MeshArgs,
) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let model = mesh
        .decoder()
        .decode(&data)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    info!(
        vertices = model.vertices.len(),
        triangles = model.triangles.len(),
        submeshes = model.submeshes.len(),
        bones = model.skeleton().map_or(0, |s| s.len()),
        "decoded mesh"
    );

    let dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    fs::create_dir_all(&dir)?;
    let stem = input
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("mesh");

    let options = mesh.options();
    for &format in formats {
        let bytes = encode(&model, format, &options)
            .with_context(|| format!("Failed to export {}", format.name()))?;
        let path = dir.join(format!("{stem}.{}", format.extension()));
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}
