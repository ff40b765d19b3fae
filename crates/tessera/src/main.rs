//! Tessera CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::EngineArgs;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(version)]
#[command(about = "Compile and render directive templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a template and print (or write) the compiled artifact
    Compile {
        /// Template name, relative to the templates directory
        template: String,

        #[command(flatten)]
        engine: EngineArgs,

        /// Do not write the artifact and manifest to the cache
        #[arg(long)]
        no_cache: bool,

        /// Write the compiled text to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<String>,
    },

    /// Render a template with JSON data
    Render {
        /// Template name, relative to the templates directory
        template: String,

        #[command(flatten)]
        engine: EngineArgs,

        /// JSON file with the data to render against
        #[arg(short = 'd', long)]
        data: Option<String>,

        /// Set a single value (KEY=VALUE, VALUE parsed as JSON when possible)
        #[arg(short = 's', long = "set")]
        set: Vec<String>,

        /// Compile in memory instead of using the artifact cache
        #[arg(long)]
        uncached: bool,

        /// Report render failures in detail
        #[arg(long)]
        debug: bool,

        /// Treat undefined variables as errors
        #[arg(long)]
        strict: bool,
    },

    /// Show whether a template's cached artifact is fresh
    Status {
        /// Template name, relative to the templates directory
        template: String,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            template,
            engine,
            no_cache,
            output,
        } => commands::compile::execute(commands::compile::CompileArgs {
            template,
            engine,
            no_cache,
            output,
        }),
        Commands::Render {
            template,
            engine,
            data,
            set,
            uncached,
            debug,
            strict,
        } => commands::render::execute(commands::render::RenderArgs {
            template,
            engine,
            data,
            set,
            uncached,
            debug,
            strict,
        }),
        Commands::Status { template, engine } => {
            commands::status::execute(commands::status::StatusArgs { template, engine })
        }
    }
}
