#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use cockpit_core::config::{load_project_config, load_user_config};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "cockpit: contract and ticket timeline",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging (debug level unless `COCKPIT_LOG` is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Project root holding `.cockpit/config.toml`. Defaults to the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Timeline",
        about = "Stack both feeds into rows",
        long_about = "Load the contracts and tickets feeds, lay them out into collision-free rows and print the rows.",
        after_help = "EXAMPLES:\n    # Lay out two item files\n    cockpit layout --contracts contracts.json --tickets tickets.json\n\n    # Derive from raw records as of a fixed day\n    cockpit layout --contracts raw.json --contracts-format records --tickets t.json --today 2025-03-01\n\n    # Emit machine-readable output\n    cockpit layout --json"
    )]
    Layout(cmd::layout::LayoutArgs),

    #[command(
        next_help_heading = "Timeline",
        about = "Show one event",
        long_about = "Select one event of the current timeline and print its detail view.",
        after_help = "EXAMPLES:\n    # Show a contract milestone\n    cockpit show contract-milestone-c1 --contracts raw.json --contracts-format records --tickets t.json\n\n    # Emit machine-readable output\n    cockpit show ticket-42 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Records",
        about = "Derive timeline items from raw records",
        long_about = "Convert a file of raw contract or ticket records into timeline items.",
        after_help = "EXAMPLES:\n    # Contracts as of today\n    cockpit derive contracts contracts.json\n\n    # Tickets as of a fixed day\n    cockpit derive tickets tickets.json --today 2025-03-01"
    )]
    Derive(cmd::derive::DeriveArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    cockpit completions bash > ~/.local/share/bash-completion/completions/cockpit"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Filter used when `COCKPIT_LOG` is unset.
const fn default_filter(verbose: bool, debug_env: bool) -> &'static str {
    if verbose || debug_env {
        "cockpit=debug,info"
    } else {
        "cockpit=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("COCKPIT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(default_filter(verbose, env::var("DEBUG").is_ok()))
    });

    let format = env::var("COCKPIT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if cli.verbose {
        debug!("Verbose mode enabled");
    }

    let project_root = cli.root.clone().map_or_else(env::current_dir, Ok)?;

    let user = load_user_config().unwrap_or_else(|err| {
        warn!("ignoring user config: {err:#}");
        cockpit_core::config::UserConfig::default()
    });
    let output = output::resolve_output_mode(cli.format, cli.json, user.output.as_deref());

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let config = match load_project_config(&project_root) {
        Ok(config) => config,
        Err(err) => {
            let code = cockpit_core::ErrorCode::ConfigParseError;
            let error = output::CliError::from_code(code, format!("{err:#}"));
            output::render_error(output, &error)?;
            return Err(err);
        }
    };

    match cli.command {
        Commands::Layout(ref args) => {
            cmd::layout::run_layout(args, &config, output, &project_root)
        }
        Commands::Show(ref args) => cmd::show::run_show(args, &config, output, &project_root),
        Commands::Derive(ref args) => cmd::derive::run_derive(args, &config, output),
        Commands::Completions(_) => Ok(()),
    }
}
