//! Council - a multi-agent engineering chat
//!
//! Main entry point for the CLI application.

use clap::Parser;
use council::cli::commands::render_outcome;
use council::{Config, Council, Repl};
use tracing_subscriber::EnvFilter;

/// Council - a multi-agent engineering chat
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Primary model (for agent turns)
    #[arg(long)]
    primary: Option<String>,

    /// Fast model (for routing, interjections and summaries)
    #[arg(long)]
    fast: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

fn init_tracing(debug: bool) {
    let level = if debug { "council=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::default_config_toml());
        return Ok(());
    }

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref primary) = args.primary {
        config.models.primary = primary.clone();
    }

    if let Some(ref fast) = args.fast {
        config.models.fast = fast.clone();
    }

    if args.debug {
        config.council.debug = true;
    }

    init_tracing(config.council.debug);

    let council = match Council::from_config(config) {
        Ok(council) => council,
        Err(e) if e.is_session_fatal() => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let outcome = council.process(&prompt).await;
        council.shutdown().await;
        let outcome = outcome?;
        println!("{}", render_outcome(&outcome, council.registry()).trim_start());
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::new(council);
    repl.run().await?;

    Ok(())
}
