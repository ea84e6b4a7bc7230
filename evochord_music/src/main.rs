// Evochord accompaniment generator, CLI entry point.
//
// Reads a melodic MIDI file, evolves a chord accompaniment for it, and
// writes the song plus the accompaniment track to a new file.
//
// Usage:
//   cargo run -p evochord_music -- song.mid [-o out.mid] [-c config.json]
//     [--seed N] [--generations N] [--population N] [--report run.json] [-v]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use evochord_music::config::RunConfig;
use evochord_music::error::Result;
use evochord_music::midi::default_output_path;
use evochord_music::pipeline::accompany;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Generate a chord accompaniment for a melodic MIDI file.
#[derive(Parser, Debug)]
#[command(name = "accompany")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input MIDI file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output MIDI file (defaults to result_<input name> next to the input)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// JSON run configuration
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// PRNG seed (overrides the config file)
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Number of generations (overrides the config file)
    #[arg(long, value_name = "N")]
    generations: Option<usize>,

    /// Population size (overrides the config file)
    #[arg(long, value_name = "N")]
    population: Option<usize>,

    /// Write a JSON run report here
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, default_value = "false")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    apply_overrides(&mut config, cli);

    let seed = match config.seed {
        Some(seed) => seed,
        None => {
            let seed = clock_seed();
            info!(seed, "no seed given, using clock");
            seed
        }
    };
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    let report = accompany(&cli.input, &output, &config, seed)?;

    if let Some(path) = &cli.report {
        report.write(path)?;
    }
    if !cli.quiet {
        println!("Key:          {}", report.key_label());
        println!(
            "Scale:        {}{}",
            report.scale,
            if report.scale_fell_back { " (default)" } else { "" }
        );
        println!("Chord slots:  {}", report.genome_len);
        println!("Seed:         {}", report.seed);
        println!("Best fitness: {}", report.best_fitness);
        println!("Output:       {}", report.output.display());
    }
    Ok(())
}

fn apply_overrides(config: &mut RunConfig, cli: &Cli) {
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(n) = cli.generations {
        config.evolution.num_generations = n;
    }
    if let Some(n) = cli.population {
        config.evolution.population_size = n;
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

fn init_logging(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if cli.quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
