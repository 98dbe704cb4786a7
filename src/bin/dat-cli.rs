//! dat-cli - Command-line interface for Allegro datafiles
//!
//! A command-line tool for listing, extracting, adding and repacking the
//! objects of Allegro DAT packfiles.

use allegro_dat::archive::{count_objects, find_by_name, find_by_path};
use allegro_dat::bitmap::pcx;
use allegro_dat::{
    ArchiveObject, BitmapData, CompressionMode, ConvertOptions, Datafile, GrabberInfo, Palette,
    Payload, Tag, UpdateStatus, DEFAULT_PALETTE, F_NOPACK_MAGIC, F_PACK_MAGIC,
};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Files above this size get a progress bar
const PROGRESS_THRESHOLD: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "dat-cli")]
#[command(about = "A CLI tool for Allegro DAT packfiles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Datafile password (defaults to the one in the settings file)
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Settings file with a [grabber] section
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the objects of a datafile
    List {
        /// Datafile to list
        input: PathBuf,
    },

    /// Write one object to a file
    Extract {
        /// Datafile to read
        input: PathBuf,

        /// Object name, or a path like FOLDER/NAME
        name: String,

        /// Output file
        output: PathBuf,

        /// Write the stored payload instead of converting bitmaps to PCX
        #[arg(short, long)]
        raw: bool,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Add a file as a new object, creating the datafile if needed
    Add {
        /// Datafile to modify
        datafile: PathBuf,

        /// File to add; PCX files become bitmaps
        file: PathBuf,

        /// Object name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Object type tag, e.g. BMP, RLE, FONT, DATA
        #[arg(short = 't', long = "type")]
        type_id: Option<String>,

        /// Colour depth for bitmaps (0 keeps the source depth)
        #[arg(short, long, default_value_t = 0)]
        bits: i32,
    },

    /// Refresh objects from their ORIG files
    Update {
        /// Datafile to update
        datafile: PathBuf,

        /// Update even if the source is unchanged
        #[arg(short, long)]
        force: bool,
    },

    /// Show envelope details and grabber settings
    Info {
        /// Datafile to analyze
        input: PathBuf,
    },

    /// Rewrite a datafile with a different compression mode or password
    Repack {
        /// Datafile to read
        input: PathBuf,

        /// Output datafile
        output: PathBuf,

        /// Compression mode
        #[arg(short = 'm', long, value_enum, default_value_t = CliCompressionMode::Global)]
        mode: CliCompressionMode,

        /// Password for the output (defaults to none)
        #[arg(long)]
        new_password: Option<String>,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Show or write the grabber settings file
    Config {
        /// Write the settings back (creating the file with defaults)
        #[arg(short, long)]
        write: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CliCompressionMode {
    /// Stored, no compression
    None,
    /// Individual compression
    Individual,
    /// Whole-file compression - Default
    Global,
}

impl From<CliCompressionMode> for CompressionMode {
    fn from(mode: CliCompressionMode) -> Self {
        match mode {
            CliCompressionMode::None => CompressionMode::None,
            CliCompressionMode::Individual => CompressionMode::Individual,
            CliCompressionMode::Global => CompressionMode::Global,
        }
    }
}

/// Settings and flags shared by every command
struct Context {
    settings: GrabberInfo,
    config_path: PathBuf,
    password: String,
    verbose: bool,
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = make_context(&cli).and_then(|ctx| match cli.command {
        Commands::List { input } => list_objects(&ctx, &input),
        Commands::Extract {
            input,
            name,
            output,
            raw,
            force,
        } => extract_object(&ctx, &input, &name, &output, raw, force),
        Commands::Add {
            datafile,
            file,
            name,
            type_id,
            bits,
        } => add_object(&ctx, &datafile, &file, name, type_id, bits),
        Commands::Update { datafile, force } => update_objects(&ctx, &datafile, force),
        Commands::Info { input } => show_file_info(&ctx, &input),
        Commands::Repack {
            input,
            output,
            mode,
            new_password,
            force,
        } => repack_file(&ctx, &input, &output, mode.into(), new_password, force),
        Commands::Config { write } => show_config(&ctx, write),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn make_context(cli: &Cli) -> CliResult<Context> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("allegro.cfg"));
    let settings = if config_path.exists() {
        GrabberInfo::load_config(&config_path)?
    } else {
        if cli.config.is_some() {
            log::warn!("settings file {} not found", config_path.display());
        }
        GrabberInfo::default()
    };
    let password = cli
        .password
        .clone()
        .unwrap_or_else(|| settings.password.clone());

    Ok(Context {
        settings,
        config_path,
        password,
        verbose: cli.verbose,
        quiet: cli.quiet,
    })
}

fn progress_bar(ctx: &Context, size: usize, message: &'static str) -> CliResult<Option<ProgressBar>> {
    if ctx.quiet || size <= PROGRESS_THRESHOLD {
        return Ok(None);
    }
    let pb = ProgressBar::new(2);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    Ok(Some(pb))
}

fn open_datafile(ctx: &Context, path: &Path, password: &str) -> CliResult<Datafile> {
    if !path.exists() {
        return Err(format!("Input file '{}' does not exist", path.display()).into());
    }
    let data = fs::read(path)?;
    let progress = progress_bar(ctx, data.len(), "Reading...")?;
    if let Some(ref pb) = progress {
        pb.inc(1);
    }

    let datafile = Datafile::from_bytes(&data, password)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;

    if let Some(ref pb) = progress {
        pb.inc(1);
        pb.finish_with_message("Reading complete");
    }
    Ok(datafile)
}

/// First palette object of the file, or the default palette
fn current_palette(objects: &[ArchiveObject]) -> Palette {
    objects
        .iter()
        .find_map(|object| match &object.payload {
            Payload::Bitmap(bitmap) => bitmap.palette(),
            _ => None,
        })
        .unwrap_or(DEFAULT_PALETTE)
}

fn convert_options(settings: &GrabberInfo) -> ConvertOptions {
    ConvertOptions {
        dither: settings.dither,
        preserve_transparency: settings.transparency,
    }
}

fn print_tree(objects: &[ArchiveObject], depth: usize, verbose: bool) {
    for object in objects {
        let name = if object.name().is_empty() {
            "<unnamed>"
        } else {
            object.name()
        };
        println!(
            "{:indent$}[{}] {} - {}",
            "",
            object.type_id,
            name,
            object.caption(),
            indent = depth * 2
        );
        if verbose {
            for (key, value) in object.properties() {
                if *key != Tag::NAME {
                    println!(
                        "{:indent$}  {} = {}",
                        "",
                        key,
                        String::from_utf8_lossy(value),
                        indent = depth * 2
                    );
                }
            }
        }
        print_tree(object.children(), depth + 1, verbose);
    }
}

fn list_objects(ctx: &Context, input: &Path) -> CliResult {
    let datafile = open_datafile(ctx, input, &ctx.password)?;
    print_tree(&datafile.objects, 0, ctx.verbose);
    if !ctx.quiet {
        println!("{} objects", count_objects(&datafile.objects));
    }
    Ok(())
}

fn extract_object(
    ctx: &Context,
    input: &Path,
    name: &str,
    output: &Path,
    raw: bool,
    force: bool,
) -> CliResult {
    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }

    let datafile = open_datafile(ctx, input, &ctx.password)?;
    let object = find_by_path(&datafile.objects, name)
        .or_else(|| find_by_name(&datafile.objects, name))
        .ok_or_else(|| format!("Object '{}' not found", name))?;

    match &object.payload {
        Payload::Bitmap(bitmap) if !raw => {
            let palette = current_palette(&datafile.objects);
            let image = if bitmap.is_palette() {
                bitmap.to_image(&palette, false)
            } else {
                bitmap.to_image(&palette, true)
            };
            pcx::save(output, &image)?;
        }
        payload => fs::write(output, payload.serialize()?)?,
    }

    if !ctx.quiet {
        println!("✓ Extracted {} to {}", object.name(), output.display());
    }
    Ok(())
}

fn add_object(
    ctx: &Context,
    datafile_path: &Path,
    file: &Path,
    name: Option<String>,
    type_id: Option<String>,
    bits: i32,
) -> CliResult {
    if !file.exists() {
        return Err(format!("Input file '{}' does not exist", file.display()).into());
    }

    let mut datafile = if datafile_path.exists() {
        open_datafile(ctx, datafile_path, &ctx.password)?
    } else {
        let mut datafile = Datafile::default();
        datafile.info = ctx.settings.clone();
        datafile
    };

    let is_pcx = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pcx"));
    let type_id = match type_id {
        Some(text) => Tag::from_str_lossy(&text),
        None if is_pcx => Tag::BITMAP,
        None => Tag::DATA,
    };

    let payload = if type_id.is_bitmap() {
        let image = pcx::load(file)?;
        let palette = current_palette(&datafile.objects);
        Payload::Bitmap(BitmapData::from_image(
            type_id,
            &image,
            bits,
            &palette,
            convert_options(&datafile.info),
        )?)
    } else {
        Payload::Raw(fs::read(file)?)
    };

    let name = name.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().to_uppercase())
            .unwrap_or_default()
    });
    let mut object = ArchiveObject::new(type_id, payload);
    object.set_name(name);
    object.set_property(Tag::ORIG, file.to_string_lossy().as_bytes());
    object.touch();
    let caption = object.caption();
    datafile.objects.push(object);
    datafile.sort_if_enabled();

    datafile.save(datafile_path, &ctx.password)?;
    if !ctx.quiet {
        println!("✓ Added {} to {}", caption, datafile_path.display());
    }
    Ok(())
}

fn update_tree(
    objects: &mut [ArchiveObject],
    force: bool,
    palette: &Palette,
    options: ConvertOptions,
    quiet: bool,
) -> usize {
    let mut updated = 0;
    for object in objects {
        match object.update(force, palette, options) {
            Ok(UpdateStatus::Updated) => {
                updated += 1;
                if !quiet {
                    println!("✓ Updated {}", object.name());
                }
            }
            Ok(UpdateStatus::Skipped(message)) => {
                if !quiet {
                    println!("  {}", message);
                }
            }
            Err(e) => log::error!("{}: {}", object.name(), e),
        }
        if let Payload::Nested(children) = &mut object.payload {
            updated += update_tree(children, force, palette, options, quiet);
        }
    }
    updated
}

fn update_objects(ctx: &Context, datafile_path: &Path, force: bool) -> CliResult {
    let mut datafile = open_datafile(ctx, datafile_path, &ctx.password)?;
    let palette = current_palette(&datafile.objects);
    let options = convert_options(&datafile.info);
    let updated = update_tree(&mut datafile.objects, force, &palette, options, ctx.quiet);

    if updated > 0 {
        datafile.save(datafile_path, &ctx.password)?;
    }
    if !ctx.quiet {
        println!("✓ {} objects updated", updated);
    }
    Ok(())
}

fn show_file_info(ctx: &Context, input: &Path) -> CliResult {
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }
    let data = fs::read(input)?;
    if data.len() < 4 {
        return Err("File too small to be a valid datafile".into());
    }

    let stored_magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let envelope = match stored_magic {
        F_PACK_MAGIC => "compressed",
        F_NOPACK_MAGIC => "stored",
        _ => "encrypted or unknown",
    };

    println!("Datafile Information:");
    println!("  File: {}", input.display());
    println!("  Size: {} bytes", data.len());
    println!("  Magic: 0x{:08x} ({})", stored_magic, envelope);

    let start_time = Instant::now();
    match Datafile::from_bytes(&data, &ctx.password) {
        Ok(datafile) => {
            let info = &datafile.info;
            println!("  Compressed: {}", if datafile.compressed { "yes" } else { "no" });
            println!("  Objects: {}", count_objects(&datafile.objects));
            println!("  Grid: {}x{}", info.xgrid, info.ygrid);
            println!("  Compression mode: {:?}", info.pack);
            println!(
                "  Backups: {}, Dither: {}, Transparency: {}, Sort: {}, Relative: {}",
                info.backup, info.dither, info.transparency, info.sort, info.relative
            );
            println!("  Status: ✓ Valid datafile");
            if ctx.verbose {
                println!("  Parse time: {:.2?}", start_time.elapsed());
            }
        }
        Err(e) => {
            println!("  Status: ✗ Invalid, corrupted or wrong password");
            if ctx.verbose {
                println!("  Error: {}", e);
            }
        }
    }
    Ok(())
}

fn repack_file(
    ctx: &Context,
    input: &Path,
    output: &Path,
    mode: CompressionMode,
    new_password: Option<String>,
    force: bool,
) -> CliResult {
    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }

    let start_time = Instant::now();
    let input_size = fs::metadata(input).map(|m| m.len()).unwrap_or(0);
    let mut datafile = open_datafile(ctx, input, &ctx.password)?;
    datafile.info.pack = mode;

    let password = new_password.unwrap_or_default();
    let bytes = datafile.to_bytes(&password)?;
    let progress = progress_bar(ctx, bytes.len(), "Writing...")?;
    fs::write(output, &bytes)?;
    if let Some(ref pb) = progress {
        pb.inc(2);
        pb.finish_with_message("Writing complete");
    }

    if !ctx.quiet {
        println!("✓ Repack successful!");
        println!("  Input:  {} bytes", input_size);
        println!("  Output: {} bytes", bytes.len());
        println!("  Mode:   {:?}", mode);
        println!("  Time:   {:.2?}", start_time.elapsed());
    }
    Ok(())
}

fn show_config(ctx: &Context, write: bool) -> CliResult {
    if write {
        ctx.settings.save_config(&ctx.config_path)?;
        if !ctx.quiet {
            println!("✓ Wrote {}", ctx.config_path.display());
        }
    } else {
        print!("{}", ctx.settings.config_text()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use allegro_dat::RgbImage;
    use tempfile::tempdir;

    fn quiet_context() -> Context {
        Context {
            settings: GrabberInfo::default(),
            config_path: PathBuf::from("allegro.cfg"),
            password: String::new(),
            verbose: false,
            quiet: true,
        }
    }

    #[test]
    fn test_add_extract_repack() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let dat = dir.path().join("game.dat");
        let blob = dir.path().join("notes.txt");
        let picture = dir.path().join("hero.pcx");
        fs::write(&blob, b"some notes")?;
        pcx::save(&picture, &RgbImage::filled(4, 3, [0, 128, 255]))?;

        let ctx = quiet_context();
        add_object(&ctx, &dat, &blob, None, None, 0)?;
        add_object(&ctx, &dat, &picture, Some("HERO".to_string()), None, 24)?;

        let datafile = Datafile::open(&dat, "")?;
        assert_eq!(datafile.objects.len(), 2);
        assert_eq!(datafile.objects[0].name(), "NOTES");
        assert_eq!(datafile.objects[1].type_id, Tag::BITMAP);

        let out_blob = dir.path().join("notes.out");
        extract_object(&ctx, &dat, "NOTES", &out_blob, false, false)?;
        assert_eq!(fs::read(&out_blob)?, b"some notes");

        let out_pcx = dir.path().join("hero.out.pcx");
        extract_object(&ctx, &dat, "HERO", &out_pcx, false, false)?;
        assert_eq!(pcx::load(&out_pcx)?.pixel(3, 2), [0, 128, 255]);
        assert!(extract_object(&ctx, &dat, "HERO", &out_pcx, false, false).is_err());

        let locked = dir.path().join("locked.dat");
        repack_file(
            &ctx,
            &dat,
            &locked,
            CompressionMode::Global,
            Some("pw".to_string()),
            false,
        )?;
        assert!(Datafile::open(&locked, "").is_err());
        let reopened = Datafile::open(&locked, "pw")?;
        assert!(reopened.compressed);
        assert_eq!(reopened.objects, datafile.objects);
        Ok(())
    }

    #[test]
    fn test_update_from_origin() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let dat = dir.path().join("game.dat");
        let blob = dir.path().join("level.bin");
        fs::write(&blob, [1, 2, 3])?;

        let ctx = quiet_context();
        add_object(&ctx, &dat, &blob, None, Some("DATA".to_string()), 0)?;
        fs::write(&blob, [4, 5, 6, 7])?;
        update_objects(&ctx, &dat, false)?;

        let datafile = Datafile::open(&dat, "")?;
        assert_eq!(datafile.objects[0].payload, Payload::Raw(vec![4, 5, 6, 7]));
        Ok(())
    }
}
