//! `haversine` - generate, parse and profile haversine benchmark inputs

mod logging;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use haversine::{
    Arena, JsonValue, ParserOptions, StringMode,
    distance::mean_haversine,
    generator::{DEFAULT_PAIR_COUNT, DEFAULT_SEED, GeneratorOptions, Layout, write_json},
    pairs::{HaversinePair, decode_pairs, pairs_array},
    parse, profile_scope,
    profiler::{Clock, CpuClock, OsClock, ProfileReport, Profiler, RepetitionProfiler},
};

#[derive(Parser)]
#[command(name = "haversine")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an input file, then read, parse and sum it under the profiler
    /// (the default)
    Run(RunArgs),
    /// Write an input file only
    Generate(GeneratorArgs),
    /// Parse a JSON file
    Parse(ParseArgs),
    /// Read and parse a file repeatedly, reporting min/max/mean/median
    Repeat(RepeatArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    /// A bare array of pair objects
    Array,
    /// An object whose "pairs" member holds the array
    Pairs,
}

impl From<LayoutArg> for Layout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Array => Layout::BareArray,
            LayoutArg::Pairs => Layout::PairsObject,
        }
    }
}

#[derive(Args, Clone, Debug)]
struct GeneratorArgs {
    /// Number of pairs to generate
    #[arg(short = 'n', long, default_value_t = DEFAULT_PAIR_COUNT)]
    count: usize,

    /// Seed for the random coordinates
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Where to write the generated input
    #[arg(short, long, value_name = "FILE", default_value = "input.json")]
    output: PathBuf,

    /// Top-level shape of the document
    #[arg(long, value_enum, default_value_t = LayoutArg::Array)]
    layout: LayoutArg,

    /// Decimal places per coordinate
    #[arg(long, default_value_t = 2)]
    precision: u32,
}

impl GeneratorArgs {
    fn options(&self) -> GeneratorOptions {
        GeneratorOptions {
            count: self.count,
            seed: self.seed,
            precision: self.precision,
            layout: self.layout.into(),
            ..GeneratorOptions::default()
        }
    }
}

#[derive(Args, Clone, Debug)]
struct ParserArgs {
    /// Arena size for copied strings, in MiB
    #[arg(long, value_name = "MIB", default_value_t = 64)]
    arena_mb: usize,

    /// Borrow strings from the input instead of copying them into the arena
    #[arg(long)]
    view: bool,
}

impl ParserArgs {
    fn arena(&self) -> Result<Arena> {
        let bytes = self
            .arena_mb
            .checked_mul(1024 * 1024)
            .context("arena size is too large")?;
        Ok(Arena::with_capacity(bytes))
    }

    fn options(&self) -> ParserOptions {
        ParserOptions {
            string_mode: if self.view {
                StringMode::View
            } else {
                StringMode::Copy
            },
            ..ParserOptions::default()
        }
    }
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    #[command(flatten)]
    generator: GeneratorArgs,

    #[command(flatten)]
    parser: ParserArgs,

    /// Time regions with the CPU time stamp counter instead of the OS clock
    #[arg(long)]
    cpu_timer: bool,

    /// Print the results and profile as JSON
    #[arg(long)]
    json_report: bool,

    /// Show the source location of each region in the profile table
    #[arg(long)]
    show_locations: bool,
}

#[derive(Args, Clone, Debug)]
struct ParseArgs {
    /// JSON file to parse
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Print the parsed document as compact JSON
    #[arg(long)]
    print: bool,

    #[command(flatten)]
    parser: ParserArgs,
}

#[derive(Args, Clone, Debug)]
struct RepeatArgs {
    /// JSON file to read and parse
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Number of trials
    #[arg(long, default_value_t = 10)]
    trials: usize,

    /// Time trials with the CPU time stamp counter instead of the OS clock
    #[arg(long)]
    cpu_timer: bool,

    /// Print every trial as `[i] <ms> ms, <rate> MB/s` before the summary
    #[arg(long)]
    trials_out: bool,

    #[command(flatten)]
    parser: ParserArgs,
}

fn main() {
    logging::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Command::Run(cli.run)) {
        Command::Run(args) => run(&args),
        Command::Generate(args) => generate(&args),
        Command::Parse(args) => parse_file(&args),
        Command::Repeat(args) => repeat(&args),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "haversine failed");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn cpu_clock() -> Result<CpuClock> {
    let clock = CpuClock::new();
    if clock.frequency() == 0 {
        bail!("could not calibrate the CPU timer");
    }
    Ok(clock)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn run(args: &RunArgs) -> Result<()> {
    if args.cpu_timer {
        run_with_clock(args, cpu_clock()?)
    } else {
        run_with_clock(args, OsClock::new())
    }
}

fn run_with_clock<C: Clock>(args: &RunArgs, clock: C) -> Result<()> {
    let mut profiler =
        Profiler::with_clock("haversine", clock).show_locations(args.show_locations);
    let path = &args.generator.output;
    let arena = args.parser.arena()?;

    let generated = {
        let mut scope = profile_scope!(profiler, "generate");
        let generated = write_json(path, &args.generator.options())?;
        scope.add_bytes(generated.json.len() as u64)?;
        generated
    };

    let input = {
        let mut scope = profile_scope!(profiler, "read");
        let input = read_input(path)?;
        scope.add_bytes(input.len() as u64)?;
        input
    };

    let document = {
        let _scope = profile_scope!(profiler, "parse", bytes = input.len() as u64);
        parse(&input, &arena, args.parser.options())
            .with_context(|| format!("parsing {}", path.display()))?
    };

    let pairs = decode(&mut profiler, &document, path)?;

    let pair_bytes = (pairs.len() * size_of::<HaversinePair>()) as u64;
    let mean = {
        let _scope = profile_scope!(profiler, "sum", bytes = pair_bytes);
        mean_haversine(&pairs)
    };

    let report = profiler.end().context("profiler ended twice")?;
    if pairs.len() != generated.pairs.len() {
        bail!(
            "parsed {} pairs but generated {}",
            pairs.len(),
            generated.pairs.len()
        );
    }

    if args.json_report {
        let summary = serde_json::json!({
            "input_bytes": input.len(),
            "pair_count": pairs.len(),
            "mean": mean,
            "reference_mean": generated.expected_mean,
            "arena_used": arena.used(),
            "profile": report,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(input.len(), &pairs, mean, generated.expected_mean, &report);
    }
    Ok(())
}

fn decode<C: Clock>(
    profiler: &mut Profiler<C>,
    document: &JsonValue<'_>,
    path: &Path,
) -> Result<Vec<HaversinePair>> {
    let _scope = profile_scope!(profiler);
    decode_pairs(document).with_context(|| format!("decoding {}", path.display()))
}

fn print_summary(
    input_bytes: usize,
    pairs: &[HaversinePair],
    mean: f64,
    reference: f64,
    report: &ProfileReport,
) {
    println!("Input size: {input_bytes}");
    println!("Pair count: {}", pairs.len());
    println!("Haversine mean: {mean:.16}");
    println!();
    println!("Validation:");
    println!("Reference mean: {reference:.16}");
    println!("Difference: {:.16}", mean - reference);
    println!();
    println!("{report}");
}

fn generate(args: &GeneratorArgs) -> Result<()> {
    let generated = write_json(&args.output, &args.options())?;
    println!(
        "Wrote {} pairs to {}",
        generated.pairs.len(),
        args.output.display()
    );
    println!("Expected mean: {:.16}", generated.expected_mean);
    Ok(())
}

fn parse_file(args: &ParseArgs) -> Result<()> {
    let input = read_input(&args.file)?;
    let arena = args.parser.arena()?;
    let document = parse(&input, &arena, args.parser.options())
        .with_context(|| format!("parsing {}", args.file.display()))?;

    if args.print {
        println!("{document}");
        return Ok(());
    }

    println!("Parsed {} bytes: top-level {}", input.len(), document.kind());
    println!("Arena bytes used: {}", arena.used());
    if let Ok(items) = pairs_array(&document) {
        println!("Elements: {}", items.len());
    }
    if let JsonValue::Object(object) = &document {
        println!("Keys: {}", object.len());
    }
    Ok(())
}

fn repeat(args: &RepeatArgs) -> Result<()> {
    if args.cpu_timer {
        repeat_with_clock(args, cpu_clock()?)
    } else {
        repeat_with_clock(args, OsClock::new())
    }
}

fn repeat_with_clock<C: Clock>(args: &RepeatArgs, clock: C) -> Result<()> {
    let mut arena = args.parser.arena()?;
    let options = args.parser.options();

    // fail before timing anything if the file is unusable
    {
        let input = read_input(&args.file)?;
        parse(&input, &arena, options).with_context(|| format!("parsing {}", args.file.display()))?;
    }

    let mut failure = None;
    let label = format!("read and parse {}", args.file.display());
    let mut repetition = RepetitionProfiler::new(label, args.trials, clock);
    let report = repetition.run(|trial| {
        if failure.is_some() {
            return;
        }
        arena.reset();
        let outcome = read_input(&args.file).and_then(|input| {
            parse(&input, &arena, options)?;
            Ok(input.len())
        });
        match outcome {
            Ok(bytes) => trial.add_bytes(bytes as u64),
            Err(err) => failure = Some(err),
        }
    })?;

    if let Some(err) = failure {
        return Err(err.context("input changed during the repetition test"));
    }
    if args.trials_out {
        println!("{}", report.trial_lines());
    }
    println!("{report}");
    Ok(())
}
