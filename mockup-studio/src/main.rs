// Mockup Studio entry point.
//
// `generate` sequence:
// 1. Initialize tracing (log to file, stdout is reserved for results)
// 2. Load config (copying defaults on first run)
// 3. Read the product, design and optional background images
// 4. Fan out the five variant requests, printing progress to stderr
// 5. Save the mockups and print their paths

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use mockup_studio::app::{self, GenerationError, MockupGenerator};
use mockup_studio::config;
use mockup_studio::llm::prompt::VARIANT_COUNT;
use mockup_studio::media::ImageData;
use mockup_studio::protocol::{
    Background, GenerationEvent, MockupRequest, ModelType, PredefinedBackground,
};

/// Generate photorealistic product mockups from a product photo and a design.
#[derive(Parser, Debug)]
#[command(name = "mockup-studio", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate five mockup variants
    Generate(GenerateArgs),
    /// Copy default config files into config/
    Init,
    /// List the available presentation models
    Models,
    /// List the predefined backgrounds
    Backgrounds,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Product photo (PNG, JPEG or WEBP)
    #[arg(long, value_name = "FILE")]
    product: PathBuf,

    /// Design to place on the product (PNG, JPEG or WEBP)
    #[arg(long, value_name = "FILE")]
    design: PathBuf,

    /// Presentation model; defaults to `generation.default_model`
    #[arg(short, long, value_name = "MODEL")]
    model: Option<ModelType>,

    /// Predefined background, or `none`
    #[arg(long, value_name = "NAME", value_parser = parse_background, conflicts_with = "background_image")]
    background: Option<Background>,

    /// Custom background scene image
    #[arg(long, value_name = "FILE")]
    background_image: Option<PathBuf>,

    /// Output directory; defaults to `output.dir`
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,
}

fn parse_background(s: &str) -> Result<Background, String> {
    if s.trim().eq_ignore_ascii_case("none") {
        return Ok(Background::None);
    }
    s.parse::<PredefinedBackground>().map(Background::Predefined)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => {
            init_tracing()?;
            info!("Mockup studio starting up");
            let result = generate(args).await;
            if let Err(e) = &result {
                error!("Generation run failed: {:#}", e);
            }
            result
        }
        Command::Init => {
            let cwd = std::env::current_dir()?;
            let copied = config::ensure_config_files(&cwd).context("failed to initialize config")?;
            if copied.is_empty() {
                println!("config/ is already up to date");
            }
            for path in copied {
                println!("created {}", path.display());
            }
            Ok(())
        }
        Command::Models => {
            for model in ModelType::ALL {
                println!("{:<12} {}", model.slug(), model.label());
            }
            Ok(())
        }
        Command::Backgrounds => {
            println!("{:<18} {}", "none", "Neutral studio");
            for bg in PredefinedBackground::ALL {
                println!("{:<18} {}", bg.slug(), bg.label());
            }
            Ok(())
        }
    }
}

async fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: model={}, required_successes={}",
        config.gemini.model, config.generation.required_successes
    );

    let product = ImageData::from_path(&args.product).context("failed to load product image")?;
    let design = ImageData::from_path(&args.design).context("failed to load design image")?;
    let background = match (args.background_image, args.background) {
        (Some(path), _) => Background::Custom(
            ImageData::from_path(&path).context("failed to load background image")?,
        ),
        (None, Some(bg)) => bg,
        (None, None) => Background::None,
    };
    let model_type = args.model.unwrap_or(config.generation.default_model);

    let request = MockupRequest::new(product, design)
        .with_model(model_type)
        .with_background(background);

    let (event_tx, event_rx) = mpsc::channel(2 * VARIANT_COUNT);
    let generator = MockupGenerator::from_config(&config)
        .context("failed to build Gemini client")?
        .with_events(event_tx);

    eprintln!(
        "Generating {VARIANT_COUNT} mockups ({}, background: {})...",
        request.model_type,
        request.background.describe()
    );
    let progress = tokio::spawn(print_progress(event_rx));

    let outcome = generator.generate(&request).await;
    // Close the event channel so the progress printer finishes.
    drop(generator);
    finish_progress(progress).await;

    let set = match outcome {
        Ok(set) => set,
        Err(e) => {
            report_failures(&e);
            return Err(e.into());
        }
    };

    let base = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));
    let dir = app::run_directory(&base, config.output.timestamped_runs, chrono::Local::now());
    let written = app::save_mockups(&set, &dir).context("failed to save mockups")?;

    for path in &written {
        println!("{}", path.display());
    }
    info!("Wrote {} mockups to {}", written.len(), dir.display());
    Ok(())
}

async fn print_progress(mut rx: mpsc::Receiver<GenerationEvent>) {
    let mut done = 0;
    while let Some(event) = rx.recv().await {
        if let GenerationEvent::VariantFinished {
            variant,
            produced_image,
        } = event
        {
            done += 1;
            let status = if produced_image { "ok" } else { "failed" };
            eprintln!("[{done}/{VARIANT_COUNT}] variant {} {status}", variant + 1);
        }
    }
}

/// Wait for the progress printer, logging a panic or cancellation. Returns
/// whether it finished cleanly.
async fn finish_progress(handle: tokio::task::JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!("Progress printer task failed: {}", e);
            false
        }
    }
}

fn report_failures(err: &GenerationError) {
    let GenerationError::Incomplete { failures, .. } = err;
    for failure in failures {
        eprintln!("  variant {}: {}", failure.variant + 1, failure.reason);
    }
}

/// Initialize tracing to log to a file (stdout carries the written paths).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("mockup-studio.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mockup_studio=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
