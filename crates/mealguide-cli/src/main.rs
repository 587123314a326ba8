use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mealguide_contracts::metrics_log::MetricsLogger;
use mealguide_engine::session::MealSession;
use mealguide_engine::{
    OllamaClient, OllamaConfig, DEFAULT_CLINICAL_KEEP_ALIVE, DEFAULT_CLINICAL_MODEL, DEFAULT_HOST,
    DEFAULT_VISION_KEEP_ALIVE, DEFAULT_VISION_MODEL,
};

#[derive(Debug, Parser)]
#[command(name = "mealguide", version, about = "Meal-photo dietary guidance for diverticulitis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect edible items on a meal photo, review the list, and get
    /// Safe/Unsafe/Caution guidance for the given digestive condition.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    /// Path to the meal photo.
    #[arg(long)]
    image: PathBuf,
    /// Digestive condition description, e.g. "history of diverticulitis,
    /// currently in remission".
    #[arg(long, default_value = "")]
    condition: String,
    /// Comma-separated items to add to the detected list (repeatable).
    #[arg(long)]
    add: Vec<String>,
    /// Skip the interactive review prompt.
    #[arg(long, default_value_t = false)]
    no_review: bool,
    /// Print the raw vision-model output before the parsed list.
    #[arg(long, default_value_t = false)]
    raw: bool,
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value = DEFAULT_VISION_MODEL)]
    vision_model: String,
    #[arg(long, default_value = DEFAULT_CLINICAL_MODEL)]
    clinical_model: String,
    /// Metrics CSV path.
    #[arg(long, default_value = "dietary_guidance_metrics.csv")]
    log: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("mealguide error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let image = image::open(&args.image)
        .with_context(|| format!("failed opening meal image {}", args.image.display()))?;
    let image_ref = args.image.to_string_lossy().to_string();

    let client = OllamaClient::new(OllamaConfig {
        host: args.host,
        vision_model: args.vision_model,
        clinical_model: args.clinical_model,
        vision_keep_alive: DEFAULT_VISION_KEEP_ALIVE.to_string(),
        clinical_keep_alive: DEFAULT_CLINICAL_KEEP_ALIVE.to_string(),
    });
    let logger = MetricsLogger::new(&args.log);
    let mut session = MealSession::new(args.condition, image_ref);

    if session.condition().trim().is_empty() {
        println!("No digestive condition given; nothing to analyze.");
        return Ok(0);
    }

    println!("Detecting edible items...");
    let detection = session.detect(&client, &image).clone();
    if args.raw && !detection.raw_text.is_empty() {
        println!("--- vision output ---");
        println!("{}", detection.raw_text);
        println!("---------------------");
    }

    if !session.review_ready() {
        println!("No edible items detected.");
        print_warnings(&session);
        return Ok(0);
    }

    println!("Detected: {}", session.items().joined());

    for additions in &args.add {
        session.correct(additions);
    }
    if !args.no_review {
        review_loop(&mut session)?;
    }
    println!("Final list: {}", session.items().joined());

    println!("Requesting dietary guidance...");
    let guidance = session.request_guidance(&client, &logger)?;
    if guidance.trim().is_empty() {
        println!("No guidance returned.");
    } else {
        println!("{guidance}");
    }
    println!("Metrics logged to {}", logger.path().display());
    print_warnings(&session);
    Ok(0)
}

fn review_loop(session: &mut MealSession) -> Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("Add any missed food/drink items (comma separated, blank to continue): ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']).trim();
        if input.is_empty() {
            break;
        }
        session.correct(input);
        println!("Current list: {}", session.items().joined());
    }
    Ok(())
}

fn print_warnings(session: &MealSession) {
    for warning in session.warnings() {
        eprintln!("warning: {warning}");
    }
}
