use clap::{Parser, ValueEnum};
use glob::glob;
use log::{debug, error};
use std::fs;
use std::path::{Path, PathBuf};

use apngload::{ApngLoader, FrameWriter, LoaderOptions, ZeroDenominator};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ZeroDen {
    Literal,
    Hundredths,
    Thousandths,
}

impl From<ZeroDen> for ZeroDenominator {
    fn from(value: ZeroDen) -> Self {
        match value {
            ZeroDen::Literal => ZeroDenominator::Literal,
            ZeroDen::Hundredths => ZeroDenominator::Hundredths,
            ZeroDen::Thousandths => ZeroDenominator::Thousandths,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(name = "apngload")]
struct Cli {
    #[arg(required = true, help = "Input file or glob pattern")]
    path: String,

    #[arg(short = 'o', long = "output-dir", help = "Output directory for frame dumps")]
    output_dir: Option<String>,

    #[arg(long, help = "Print the stream summary without decoding frames")]
    info: bool,

    #[arg(long, help = "Decode every frame without writing to a file")]
    void: bool,

    #[arg(long = "zero-den", value_enum, help = "Denominator used when a frame delay has a zero denominator")]
    zero_den: Option<ZeroDen>,
}

fn get_files(path: &str) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let absolute_pattern = if Path::new(path).is_relative() {
        base_dir.join(path).to_string_lossy().into_owned()
    } else {
        path.to_string()
    };

    for entry in glob(&absolute_pattern)? {
        match entry {
            Ok(path) => {
                if !path.is_file() {
                    continue;
                }

                files.push(path);
            }
            Err(e) => error!("{}", e),
        }
    }

    Ok(files)
}

fn get_output_dir(file: &Path, output_dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let output_dir = match output_dir {
        Some(dir) => {
            let dir = Path::new(dir);

            if dir.is_relative() {
                std::env::current_dir()?.join(dir)
            } else {
                dir.to_path_buf()
            }
        }
        // Dumps go next to the input file by default
        None => file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
    };

    if !output_dir.exists() {
        fs::create_dir_all(&output_dir)?;
    }

    Ok(output_dir)
}

fn process_file(file: &Path, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = LoaderOptions::default();
    if let Some(zero_den) = cli.zero_den {
        options = options.with_zero_denominator(zero_den.into());
    }

    let mut loader = ApngLoader::open_from_file_with_options(file, options)?;

    if cli.info {
        println!("{}: {:?}", file.display(), loader.info());
        return Ok(());
    }

    let stem = file
        .file_stem()
        .ok_or("Invalid file name")?
        .to_str()
        .ok_or("Invalid file stem")?
        .to_string();

    let output_dir = if cli.void {
        None
    } else {
        Some(get_output_dir(file, cli.output_dir.as_deref())?)
    };

    let total = loader.num_frames();

    println!(
        "\"{}\" ({}x{}), {} frames, {} times to loop (0 indicates infinite looping)",
        file.display(),
        loader.width(),
        loader.height(),
        total,
        loader.num_plays()
    );

    while loader.has_frame() {
        let frame = loader.next_frame()?;

        println!(
            " {} / {} : \"{}_{:03}.png\" ({}x{}) delay={}/{}{}",
            frame.index,
            total,
            stem,
            frame.index,
            frame.image.width(),
            frame.image.height(),
            frame.delay_num,
            frame.delay_den,
            if frame.is_default { " [default]" } else { "" }
        );

        if let Some(dir) = &output_dir {
            let written = FrameWriter::write_frame(dir, &stem, &frame)?;
            debug!("Wrote {}", written.display());
        }
    }

    Ok(())
}

/// Processes every file, reporting errors as they happen. Returns the number of failures.
fn process_files(files: &[PathBuf], cli: &Cli) -> usize {
    let mut failed = 0;

    for file in files {
        if let Err(err) = process_file(file, cli) {
            eprintln!("Error processing file {}: {}", file.display(), err);
            failed += 1;
        }
    }

    failed
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let files = get_files(&cli.path)?;

    if files.is_empty() {
        eprintln!("No files found matching pattern: {}", cli.path);
        return Ok(());
    }

    let failed = process_files(&files, &cli);

    if failed > 0 {
        eprintln!("{} of {} files failed", failed, files.len());
        std::process::exit(1);
    }

    Ok(())
}
