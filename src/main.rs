#![forbid(unsafe_code)]
//! Checkmate Command Line Interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use checkmate::commands::{
    execute_export, execute_inspect, execute_pack, execute_render, execute_set, ExportFormat,
    ExportOptions, InspectOptions, PackOptions, RenderOptions, SetOptions,
};
use checkmate::config::CONFIG_FILE;
use checkmate::Config;

#[derive(Parser)]
#[command(name = "checkmate")]
#[command(about = "Expression-driven compliance checklists")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the UI schema and model of a bundle
    Inspect {
        /// Bundle directory, archive or name
        bundle: PathBuf,

        /// Only this top-level feature
        #[arg(short, long)]
        feature: Option<String>,
    },

    /// Print the current answers
    Export {
        /// Bundle directory, archive or name
        bundle: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormatArg::Json)]
        format: ExportFormatArg,
    },

    /// Apply tag=value changes
    Set {
        /// Bundle directory, archive or name
        bundle: PathBuf,

        /// Changes as tag=value; values are parsed as JSON when possible
        #[arg(required = true)]
        assignments: Vec<String>,

        /// Save answers back into the bundle archive
        #[arg(long)]
        save: bool,

        /// Save to a different archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a template
    Render {
        /// Bundle directory, archive or name
        bundle: PathBuf,

        /// Template name (default: first template)
        #[arg(short, long)]
        template: Option<String>,
    },

    /// Pack a bundle directory into an archive
    Pack {
        /// Bundle directory
        dir: PathBuf,

        /// Archive path (default: <dir>.chlx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Output format for the export command
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum ExportFormatArg {
    #[default]
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "checkmate=debug" } else { "checkmate=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load config
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Inspect { bundle, feature } => {
            execute_inspect(InspectOptions { bundle, feature }, &config)
        }
        Commands::Export { bundle, format } => execute_export(
            ExportOptions {
                bundle,
                format: format.into(),
            },
            &config,
        ),
        Commands::Set {
            bundle,
            assignments,
            save,
            output,
        } => execute_set(
            SetOptions {
                bundle,
                assignments,
                save,
                output,
            },
            &config,
        ),
        Commands::Render { bundle, template } => {
            execute_render(RenderOptions { bundle, template }, &config)
        }
        Commands::Pack { dir, output } => execute_pack(PackOptions { dir, output }),
    };

    if let Err(err) = result {
        eprintln!("{} {:#}", style("✗").red(), err);
        std::process::exit(1);
    }
    Ok(())
}
