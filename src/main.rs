use clap::{Parser, Subcommand};
use magnify::config::{self, UpscaleConfig};
use magnify::history::HistoryLog;
use magnify::imaging::{
    Dimensions, ImageBackend, RustBackend, plan_upscale, supported_input_extensions,
};
use magnify::output;
use magnify::pipeline::Upscaler;
use magnify::provider::CallOptions;
use magnify::save::save_outcome;
use magnify::types::{Factor, UpscaleRequest};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};

/// Flags for the `upscale` command.
#[derive(clap::Args)]
struct UpscaleArgs {
    /// Images to upscale (jpg, jpeg, png, webp)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Upscale factor. Defaults to `pipeline.default_factor`
    #[arg(long)]
    factor: Option<u32>,

    /// Directory for result files
    #[arg(long, default_value = "upscaled")]
    out_dir: PathBuf,

    /// Also write each upscaled image, not only its JSON report
    #[arg(long)]
    save_image: bool,

    /// Give up on provider calls that are still running after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "magnify")]
#[command(about = "Upscale images with a remote enhancement provider or a local fallback")]
#[command(long_about = "\
Upscale images with a remote enhancement provider or a local fallback

Each input is upscaled by the requested factor, capped so neither edge
exceeds the provider limit (4096px by default). The result is written as a
JSON report holding the upscaled image as a data URL.

Modes:

  enhanced   REAL_UPSCALE_API_KEY (or the variable named by
             provider.api_key_env) is set. Images go to the provider;
             provider errors fail the input.
  degraded   No key. Images are resized locally; if that fails a
             built-in placeholder is used. Inputs never fail here
             unless their dimensions are invalid.

Output files:

  upscaled/
  ├── dawn-upscaled-2x-1f3a9c07.json   # Report: dimensions, origin, data URL
  └── dawn-upscaled-2x-1f3a9c07.jpg    # Image (with --save-image)

The 8-hex tag is hashed from the input path, so inputs sharing a file
name never overwrite each other.

Logging goes to stderr and is controlled by RUST_LOG (default: info).

Run 'magnify gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upscale one or more images
    Upscale(UpscaleArgs),
    /// Show the target dimensions for an image size and factor
    Plan {
        width: u32,
        height: u32,
        /// Upscale factor. Defaults to `pipeline.default_factor`
        #[arg(long)]
        factor: Option<u32>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Upscale(args) => {
            let config = config::load_config(&cli.config_dir)?;
            let total = args.inputs.len();
            let failed = run_upscale(&config, &args)?;
            if failed > 0 {
                return Err(format!("{failed} of {total} images failed").into());
            }
        }
        Command::Plan {
            width,
            height,
            factor,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let factor = resolve_factor(&config, factor)?;
            let original = Dimensions { width, height };
            let max = config.provider.max_dimension;
            let plan = plan_upscale(original, factor.get(), max)?;
            println!("{}", output::format_plan(original, factor.get(), max, &plan));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` overrides the default `info`.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn resolve_factor(
    config: &UpscaleConfig,
    requested: Option<u32>,
) -> Result<Factor, Box<dyn std::error::Error>> {
    let value = requested.unwrap_or(config.pipeline.default_factor);
    Ok(Factor::new(value, &config.pipeline.supported_factors)?)
}

/// Upscale every input, print a report, and return the number of failures.
fn run_upscale(
    config: &UpscaleConfig,
    args: &UpscaleArgs,
) -> Result<usize, Box<dyn std::error::Error>> {
    init_thread_pool(&config.processing);
    let factor = resolve_factor(config, args.factor)?;

    // The only place the environment is read.
    let provider = config.provider.resolve(|name| std::env::var(name).ok());
    let upscaler = Upscaler::from_config(config, &provider)?;
    println!("{}", output::format_mode(upscaler.mode()));

    let backend = RustBackend::new();
    let measured: Vec<Result<UpscaleRequest, &'static str>> = args
        .inputs
        .iter()
        .map(|input| measure(&backend, input, factor))
        .collect();
    let requests: Vec<UpscaleRequest> = measured
        .iter()
        .filter_map(|m| m.as_ref().ok().cloned())
        .collect();

    std::fs::create_dir_all(&args.out_dir)?;

    let mut call = CallOptions::default();
    if let Some(secs) = args.timeout {
        call = call.with_timeout(Duration::from_secs(secs));
    }
    let mut results = upscaler.upscale_all(&requests, &call).into_iter();

    let history = config.history.path.as_ref().map(HistoryLog::new);
    let mut pending = Vec::new();
    let mut succeeded = 0;

    for (i, (input, measured)) in args.inputs.iter().zip(measured).enumerate() {
        let index = i + 1;
        let request = match measured {
            Ok(request) => request,
            Err(message) => {
                output::print_lines(&output::format_failure(index, input, message));
                continue;
            }
        };
        // One result per measured request, in order.
        let Some(result) = results.next() else {
            break;
        };
        match result {
            Ok(outcome) => {
                let written =
                    match save_outcome(&args.out_dir, args.save_image, &request, &outcome) {
                        Ok(written) => written,
                        Err(err) => {
                            error!(source = %input.display(), error = %err, "cannot write result");
                            output::print_lines(&output::format_failure(
                                index,
                                input,
                                "The result could not be written.",
                            ));
                            continue;
                        }
                    };
                if let Some(log) = &history {
                    pending.push(log.record_detached(&request, &outcome));
                }
                output::print_lines(&output::format_outcome(
                    index,
                    input,
                    request.original,
                    request.factor,
                    &outcome,
                    &written,
                ));
                succeeded += 1;
            }
            Err(err) => {
                error!(source = %input.display(), error = %err, "upscale failed");
                output::print_lines(&output::format_failure(index, input, err.user_message()));
            }
        }
    }

    for handle in pending {
        // Recording failures are already logged by the worker.
        let _ = handle.join();
    }

    println!();
    println!("{}", output::format_summary(succeeded, args.inputs.len()));
    Ok(args.inputs.len() - succeeded)
}

/// Validate and measure one input. The error is a user-facing message.
fn measure(
    backend: &RustBackend,
    input: &Path,
    factor: Factor,
) -> Result<UpscaleRequest, &'static str> {
    let supported = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| supported_input_extensions().contains(&e.to_ascii_lowercase().as_str()));
    if !supported {
        return Err("Unsupported file type (expected jpg, jpeg, png or webp).");
    }
    let original = backend.identify(input).map_err(|err| {
        warn!(source = %input.display(), error = %err, "cannot measure image");
        "The image could not be read."
    })?;
    Ok(UpscaleRequest::new(input, factor, original))
}
